use serde_json::{Value, json};

use crate::api::{Message, Role, ToolCall, ToolDefinition};
use crate::config::ResolvedModel;
use crate::errors::ProviderError;
use crate::types::ModelId;

use super::{InferenceResponse, ModelClient, ProviderHttpClient, Usage};

/// Chat-completions client for OpenRouter and other OpenAI-compatible APIs.
pub struct OpenRouterClient {
    http: ProviderHttpClient,
    key: String,
    model: ModelId,
    endpoint: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenRouterClient {
    pub fn new(settings: &ResolvedModel) -> Result<Self, ProviderError> {
        Ok(Self {
            http: ProviderHttpClient::new(settings.http_timeout_secs)?,
            key: settings.api_key.clone(),
            model: settings.model.clone(),
            endpoint: format!(
                "{}/chat/completions",
                settings.base_url.trim_end_matches('/')
            ),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }

    fn convert_message(msg: &Message) -> Value {
        match msg.role {
            Role::Assistant => {
                let mut out = json!({ "role": "assistant" });
                out["content"] = if msg.content.is_empty() && !msg.tool_calls.is_empty() {
                    Value::Null
                } else {
                    json!(msg.content)
                };
                if !msg.tool_calls.is_empty() {
                    out["tool_calls"] = msg
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id.as_str(),
                                "type": "function",
                                "function": {
                                    "name": call.name.as_str(),
                                    "arguments": Value::Object(call.arguments.clone()).to_string(),
                                }
                            })
                        })
                        .collect();
                }
                out
            }
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id.as_ref().map(|id| id.as_str()),
                "content": msg.content,
            }),
            Role::System => json!({ "role": "system", "content": msg.content }),
            Role::User => json!({ "role": "user", "content": msg.content }),
        }
    }

    fn request_body(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let tools = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name.as_str(),
                        "description": t.description,
                        "parameters": t.input_schema(),
                    }
                })
            })
            .collect::<Vec<_>>();

        let mut body = json!({
            "model": self.model.as_str(),
            "messages": messages.iter().map(Self::convert_message).collect::<Vec<_>>(),
            "tool_choice": if tools.is_empty() { "none" } else { "auto" },
            "tools": tools,
            "usage": { "include": true },
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    fn parse_response(response_json: &Value) -> Result<InferenceResponse, ProviderError> {
        let message = response_json
            .get("choices")
            .and_then(|arr| arr.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| ProviderError::MalformedResponse("no message in choices".into()))?;

        let text = message
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
            for call in calls {
                let (Some(id), Some(function)) = (call.get("id"), call.get("function")) else {
                    continue;
                };
                let Some(name) = function.get("name").and_then(|v| v.as_str()) else {
                    continue;
                };
                let id = id.as_str().unwrap_or_default();
                let call = match function.get("arguments") {
                    Some(Value::String(s)) if s.trim().is_empty() => {
                        ToolCall::new(id, name, Value::Null)
                    }
                    Some(Value::String(s)) => match serde_json::from_str(s) {
                        Ok(arguments) => ToolCall::new(id, name, arguments),
                        Err(e) => {
                            log::debug!("unreadable arguments for {name}: {e}");
                            ToolCall::malformed(id, name, e)
                        }
                    },
                    Some(other) => ToolCall::new(id, name, other.clone()),
                    None => ToolCall::new(id, name, Value::Null),
                };
                tool_calls.push(call);
            }
        }

        let usage = response_json
            .get("usage")
            .map(|u| {
                let prompt = u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0);
                let completion = u
                    .get("completion_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                Usage {
                    total_tokens: u
                        .get("total_tokens")
                        .and_then(Value::as_u64)
                        .unwrap_or(prompt + completion),
                    cost: u.get("cost").and_then(Value::as_f64).unwrap_or(0.0),
                }
            })
            .unwrap_or_default();

        Ok(InferenceResponse {
            message: Message::assistant(text, tool_calls),
            usage,
        })
    }
}

#[async_trait::async_trait]
impl ModelClient for OpenRouterClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<InferenceResponse, ProviderError> {
        let body = self.request_body(messages, tools);

        let res = self
            .http
            .client()
            .post(&self.endpoint)
            .bearer_auth(&self.key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await?;
            return Err(ProviderError::Api { status, body });
        }

        let response_json: Value = res.json().await?;
        let response = Self::parse_response(&response_json)?;
        log::debug!(
            "{} responded with {} tool call(s), {} tokens",
            self.model,
            response.message.tool_calls.len(),
            response.usage.total_tokens
        );
        Ok(response)
    }

    fn name(&self) -> &str {
        "openrouter"
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        if self.key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey(self.model.to_string()));
        }
        Ok(())
    }
}
