//! Scripted model and executor doubles shared by the unit tests.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{Message, ToolCall, ToolDefinition};
use crate::errors::{ProviderError, SessionError, ToolError};
use crate::providers::{InferenceResponse, ModelClient, ModelClientFactory, Usage};
use crate::test_suite::Test;
use crate::tools::{ActionExecutor, ElementInfo, SessionFactory};
use crate::types::ModelId;

pub(crate) fn sample_test() -> Test {
    Test {
        name: "search".to_string(),
        description: "Search the shop".to_string(),
        url: "https://shop.example".to_string(),
        goal: "Find the AI agent book".to_string(),
        constraints: vec!["Use the search box".to_string()],
        oracle: vec!["Results list the book".to_string()],
    }
}

pub(crate) enum Scripted {
    Respond(InferenceResponse),
    Fail(String),
    /// Never answers within any reasonable timeout.
    Hang,
}

pub(crate) fn response_with_cost(
    text: &str,
    tool_calls: Vec<ToolCall>,
    tokens: u64,
    cost: f64,
) -> InferenceResponse {
    InferenceResponse {
        message: Message::assistant(text, tool_calls),
        usage: Usage {
            total_tokens: tokens,
            cost,
        },
    }
}

pub(crate) fn response(text: &str, tool_calls: Vec<ToolCall>, tokens: u64) -> InferenceResponse {
    response_with_cost(text, tool_calls, tokens, 0.0)
}

pub(crate) fn tool_turn(id: &str, name: &str, args: Value, tokens: u64) -> Scripted {
    Scripted::Respond(response("", vec![ToolCall::new(id, name, args)], tokens))
}

pub(crate) fn text_turn(text: &str, tokens: u64) -> Scripted {
    Scripted::Respond(response(text, vec![], tokens))
}

/// Replays a fixed script of responses and records every transcript it saw.
pub(crate) struct ScriptedClient {
    model: ModelId,
    script: Mutex<VecDeque<Scripted>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            model: ModelId::new("scripted/model"),
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedClient {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<InferenceResponse, ProviderError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(body)) => Err(ProviderError::Api { status: 503, body }),
            Some(Scripted::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::MalformedResponse("woke from hang".into()))
            }
            None => Ok(response("out of script", vec![], 0)),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// In-memory executor that logs every capability call.
#[derive(Clone, Default)]
pub(crate) struct ScriptedExecutor {
    calls: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    fail_pattern: Option<String>,
    panic_pattern: Option<String>,
    real_wait: bool,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any capability whose logged call contains `pattern`.
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.fail_pattern = Some(pattern.to_string());
        self
    }

    pub fn panicking_on(mut self, pattern: &str) -> Self {
        self.panic_pattern = Some(pattern.to_string());
        self
    }

    /// Make `wait` actually sleep for the requested time.
    pub fn sleeping(mut self) -> Self {
        self.real_wait = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, tool: &str, args: &[&str]) -> Result<(), ToolError> {
        let entry = if args.is_empty() {
            tool.to_string()
        } else {
            format!("{tool}({})", args.join(", "))
        };
        self.calls.lock().unwrap().push(entry.clone());

        if let Some(pattern) = &self.panic_pattern
            && entry.contains(pattern.as_str())
        {
            panic!("executor panicked on {entry}");
        }
        match &self.fail_pattern {
            Some(pattern) if entry.contains(pattern.as_str()) => Err(ToolError::Execution(
                format!("{tool} failed on {}", args.join(", ")),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn navigate(&mut self, url: &str) -> Result<String, ToolError> {
        self.record("navigate", &[url])?;
        Ok(format!("Successfully navigated to {url}"))
    }

    async fn click(&mut self, selector: &str) -> Result<String, ToolError> {
        self.record("click", &[selector])?;
        Ok(format!("Successfully clicked on element with selector: {selector}"))
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<String, ToolError> {
        self.record("type_text", &[selector, text])?;
        Ok(format!("Successfully typed text into element with selector: {selector}"))
    }

    async fn get_text(&mut self, selector: &str) -> Result<String, ToolError> {
        self.record("get_text", &[selector])?;
        Ok(format!("text of {selector}"))
    }

    async fn get_html(&mut self, selector: &str) -> Result<String, ToolError> {
        self.record("get_html", &[selector])?;
        Ok(format!("<html {selector}>"))
    }

    async fn scroll(&mut self, direction: &str, pixels: i64) -> Result<String, ToolError> {
        self.record("scroll", &[direction, &pixels.to_string()])?;
        Ok(format!("Successfully scrolled {direction} by {pixels} pixels."))
    }

    async fn wait(&mut self, seconds: u64) -> Result<String, ToolError> {
        self.record("wait", &[&seconds.to_string()])?;
        if self.real_wait {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
        }
        Ok(format!("Waited for {seconds} seconds."))
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<ElementInfo>, ToolError> {
        self.record("find_elements", &[selector])?;
        Ok(vec![
            ElementInfo { tag: "a".into() },
            ElementInfo {
                tag: "button".into(),
            },
        ])
    }

    async fn snapshot(&mut self) -> Result<String, ToolError> {
        self.record("snapshot", &[])?;
        Ok("<body><input id=\"search\"></body>".to_string())
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out executors that share one call log and close counter.
#[derive(Clone, Default)]
pub(crate) struct ScriptedSessions {
    template: ScriptedExecutor,
    opened: Arc<AtomicUsize>,
    refuse: bool,
}

impl ScriptedSessions {
    pub fn new(template: ScriptedExecutor) -> Self {
        Self {
            template,
            ..Self::default()
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.template.closed()
    }
}

#[async_trait::async_trait]
impl SessionFactory for ScriptedSessions {
    async fn open(&self) -> Result<Box<dyn ActionExecutor>, SessionError> {
        if self.refuse {
            return Err(SessionError("browser unavailable".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.template.clone()))
    }
}

/// Builds one `ScriptedClient` per model from a per-model script.
#[derive(Default)]
pub(crate) struct ScriptedFactory {
    scripts: Mutex<std::collections::HashMap<String, Vec<Scripted>>>,
}

impl ScriptedFactory {
    pub fn new(scripts: Vec<(&str, Vec<Scripted>)>) -> Self {
        Self {
            scripts: Mutex::new(
                scripts
                    .into_iter()
                    .map(|(id, script)| (id.to_string(), script))
                    .collect(),
            ),
        }
    }
}

impl ModelClientFactory for ScriptedFactory {
    fn create(
        &self,
        model: &crate::config::ResolvedModel,
    ) -> Result<Arc<dyn ModelClient>, ProviderError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .remove(&model.id)
            .unwrap_or_default();
        Ok(Arc::new(ScriptedClient::new(script)))
    }
}
