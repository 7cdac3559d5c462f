use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::types::{ToolId, ToolName};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<ToolId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<ToolName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, text)
        }
    }

    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            ..Self::plain(Role::Tool, content)
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            name: None,
            tool_calls: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: ToolId,
    pub name: ToolName,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Set when the model sent arguments that could not be read as an object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_error: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        let (arguments, argument_error) = match arguments {
            Value::Object(map) => (map, None),
            Value::Null => (Map::new(), None),
            other => (
                Map::new(),
                Some(format!("arguments must be a JSON object, got {other}")),
            ),
        };
        Self {
            id: ToolId::new(id),
            name: ToolName::new(name),
            arguments,
            argument_error,
        }
    }

    /// A call whose raw argument text failed to parse.
    pub fn malformed(
        id: impl Into<String>,
        name: impl Into<String>,
        error: impl std::fmt::Display,
    ) -> Self {
        Self {
            argument_error: Some(format!("malformed JSON arguments: {error}")),
            ..Self::new(id, name, Value::Null)
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub required: bool,
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: ToolName,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolDefinition {
    /// JSON-schema object for the `parameters` field of a function tool.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.ty.as_str(),
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello world");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello world");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn test_tool_result_references_call() {
        let call = ToolCall::new("call_7", "click", json!({"selector": "#go"}));
        let msg = Message::tool_result(&call, "clicked");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_ref().map(ToolId::as_str), Some("call_7"));
        assert_eq!(msg.name.as_ref().map(ToolName::as_str), Some("click"));
    }

    #[test]
    fn test_tool_call_non_object_arguments_are_flagged() {
        let call = ToolCall::new("1", "wait", json!("five"));
        assert!(call.arguments.is_empty());
        assert!(call.argument_error.as_deref().unwrap().contains("JSON object"));

        let bare = ToolCall::new("2", "get_html", Value::Null);
        assert!(bare.arguments.is_empty());
        assert!(bare.argument_error.is_none());
    }

    #[test]
    fn test_malformed_tool_call_keeps_parse_error() {
        let err = serde_json::from_str::<Value>("{\"selector\": ").unwrap_err();
        let call = ToolCall::malformed("3", "click", err);
        assert_eq!(call.name, "click");
        assert!(call.arguments.is_empty());
        assert!(
            call.argument_error
                .as_deref()
                .unwrap()
                .starts_with("malformed JSON arguments:")
        );
        let json = serde_json::to_value(&call).unwrap();
        assert!(json.get("argument_error").is_some());
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let json = serde_json::to_value(Message::system("rules")).unwrap();
        assert_eq!(json["role"], "system");
        assert!(json.get("tool_call_id").is_none());
        assert!(json.get("tool_calls").is_none());

        let call = ToolCall::new("a", "navigate", json!({"url": "https://example.com"}));
        let json = serde_json::to_value(Message::assistant("", vec![call])).unwrap();
        assert_eq!(json["tool_calls"][0]["name"], "navigate");
        assert_eq!(json["tool_calls"][0]["arguments"]["url"], "https://example.com");
    }

    #[test]
    fn test_param_type_matches() {
        assert!(ParamType::Integer.matches(&json!(3)));
        assert!(!ParamType::Integer.matches(&json!(3.5)));
        assert!(ParamType::Number.matches(&json!(3.5)));
        assert!(!ParamType::String.matches(&json!(3)));
        assert!(ParamType::Boolean.matches(&json!(false)));
    }

    #[test]
    fn test_input_schema() {
        let def = ToolDefinition {
            name: ToolName::new("scroll"),
            description: "Scroll the page".to_string(),
            parameters: vec![
                ToolParameter {
                    name: "direction".to_string(),
                    ty: ParamType::String,
                    required: true,
                    description: "up or down".to_string(),
                },
                ToolParameter {
                    name: "pixels".to_string(),
                    ty: ParamType::Integer,
                    required: false,
                    description: "distance".to_string(),
                },
            ],
        };

        let schema = def.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["pixels"]["type"], "integer");
        assert_eq!(schema["required"], json!(["direction"]));
    }
}
