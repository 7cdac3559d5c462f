//! Step-bounded agent loop driving one model against one test.
//!
//! Each step observes the page, asks the model for a decision and dispatches
//! at most one tool call. The run ends when the model calls `finish`, stops
//! calling tools, the model call fails, the run is cancelled, or the step
//! budget is spent.

use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::api::ToolCall;
use crate::config::{BenchConfig, DEFAULT_MAX_STEPS};
use crate::errors::{ErrorKind, ProviderError, ToolError};
use crate::metrics::TestResult;
use crate::providers::{InferenceResponse, ModelClient, Usage};
use crate::test_suite::Test;
use crate::tools::{self, ActionExecutor, FINISH_TOOL, ToolCatalog};
use crate::transcript::Transcript;

pub const NO_TOOL_CALL: &str = "no tool call";
pub const MAX_STEPS_REACHED: &str = "Max steps reached.";
pub const MODEL_CALL_FAILED: &str = "Model call failed.";
pub const CANCELLED: &str = "Cancelled.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    pub max_steps: u32,
    pub model_timeout: Option<Duration>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            model_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl LoopSettings {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            model_timeout: config.model_timeout(),
        }
    }
}

/// One model call over the whole transcript, bounded by `timeout`.
async fn decide(
    client: &dyn ModelClient,
    transcript: &Transcript,
    catalog: &ToolCatalog,
    timeout: Option<Duration>,
) -> Result<InferenceResponse, ProviderError> {
    let call = client.complete(transcript.messages(), catalog.definitions());
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| ProviderError::Timeout(limit.as_secs()))?,
        None => call.await,
    }
}

/// Final result of a run together with the transcript that produced it.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub result: TestResult,
    pub transcript: Transcript,
}

#[derive(Debug)]
enum Termination {
    Finished(String),
    NoToolCall,
    StepBudget,
    ModelFailure(ProviderError),
    Cancelled,
}

pub struct AgentLoop<'a> {
    test: &'a Test,
    client: &'a dyn ModelClient,
    executor: &'a mut dyn ActionExecutor,
    catalog: ToolCatalog,
    transcript: Transcript,
    settings: LoopSettings,
    cancel: CancellationToken,
    usage: Usage,
}

impl<'a> AgentLoop<'a> {
    pub fn new(
        test: &'a Test,
        client: &'a dyn ModelClient,
        executor: &'a mut dyn ActionExecutor,
        settings: LoopSettings,
    ) -> Self {
        let catalog = ToolCatalog::for_executor(&*executor);
        let transcript = Transcript::start(test, &catalog);
        Self {
            test,
            client,
            executor,
            catalog,
            transcript,
            settings,
            cancel: CancellationToken::new(),
            usage: Usage::default(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Drive the loop to termination. Never fails: every outcome, including
    /// model transport errors, is reported in the returned `TestResult`.
    /// Releasing the executor is the caller's job.
    pub async fn run(mut self) -> AgentRun {
        let started = Instant::now();
        log::info!(
            "[{}] starting '{}' (max {} steps)",
            self.client.model(),
            self.test.name,
            self.settings.max_steps
        );

        let (steps, termination) = self.drive().await;
        let result = self.conclude(steps, termination, started.elapsed());

        log::info!(
            "[{}] '{}' ended: success={} steps={} reason={}",
            self.client.model(),
            result.test_name,
            result.success,
            result.steps,
            result.finish_reason().unwrap_or_default()
        );

        AgentRun {
            result,
            transcript: self.transcript,
        }
    }

    async fn drive(&mut self) -> (u32, Termination) {
        let cancel = self.cancel.clone();

        for step in 1..=self.settings.max_steps {
            if cancel.is_cancelled() {
                return (step - 1, Termination::Cancelled);
            }

            self.observe().await;

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return (step, Termination::Cancelled),
                response = decide(
                    self.client,
                    &self.transcript,
                    &self.catalog,
                    self.settings.model_timeout,
                ) => response,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    log::warn!("[{}] model call failed at step {step}: {e}", self.client.model());
                    return (step, Termination::ModelFailure(e));
                }
            };

            self.usage.total_tokens += response.usage.total_tokens;
            self.usage.cost += response.usage.cost;

            let Some(call) = self.record_decision(response) else {
                return (step, Termination::NoToolCall);
            };

            if call.name == FINISH_TOOL {
                match self.catalog.validate(&call) {
                    Ok(_) => {
                        let result = call
                            .arguments
                            .get("result")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        return (step, Termination::Finished(result));
                    }
                    Err(e) => {
                        self.transcript.push_tool_result(&call, e.observation());
                        continue;
                    }
                }
            }

            let acted = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                acted = self.act(&call) => Some(acted),
            };
            let Some(acted) = acted else {
                // Every recorded call keeps a matching tool result.
                self.transcript
                    .push_tool_result(&call, format!("Error: {CANCELLED}"));
                return (step, Termination::Cancelled);
            };

            let content = match acted {
                Ok(output) => output,
                Err(e) => {
                    log::debug!(
                        "[{}] step {step}: {} -> {} ({})",
                        self.client.model(),
                        call.name,
                        e,
                        e.kind().as_str()
                    );
                    e.observation()
                }
            };
            self.transcript.push_tool_result(&call, content);
        }

        (self.settings.max_steps, Termination::StepBudget)
    }

    async fn observe(&mut self) {
        let observation = match self.executor.snapshot().await {
            Ok(page) => format!("Current page:\n{page}"),
            Err(e) => e.observation(),
        };
        self.transcript.push_observation(observation);
    }

    /// Append the model's turn, keeping only the first tool call.
    fn record_decision(&mut self, response: InferenceResponse) -> Option<ToolCall> {
        let message = response.message;
        if message.tool_calls.len() > 1 {
            log::debug!(
                "[{}] discarding {} extra tool call(s)",
                self.client.model(),
                message.tool_calls.len() - 1
            );
        }
        let selected = message.tool_calls.into_iter().next();
        self.transcript
            .push_assistant(message.content, selected.as_ref());
        selected
    }

    async fn act(&mut self, call: &ToolCall) -> Result<String, ToolError> {
        self.catalog.validate(call)?;
        tools::invoke(&mut *self.executor, call).await
    }

    fn conclude(&self, steps: u32, termination: Termination, elapsed: Duration) -> TestResult {
        let mut details = Map::new();
        let success = matches!(termination, Termination::Finished(_));

        let finish_reason = match termination {
            Termination::Finished(result) => result,
            Termination::NoToolCall => NO_TOOL_CALL.to_string(),
            Termination::StepBudget => MAX_STEPS_REACHED.to_string(),
            Termination::ModelFailure(e) => {
                details.insert("error".into(), Value::from(e.to_string()));
                details.insert("error_kind".into(), Value::from(e.kind().as_str()));
                MODEL_CALL_FAILED.to_string()
            }
            Termination::Cancelled => {
                details.insert("error_kind".into(), Value::from(ErrorKind::Cancelled.as_str()));
                CANCELLED.to_string()
            }
        };
        details.insert("finish_reason".into(), Value::from(finish_reason));
        details.insert("model".into(), Value::from(self.client.model().as_str()));

        TestResult {
            test_name: self.test.name.clone(),
            success,
            steps,
            response_time: elapsed.as_secs_f64(),
            token_usage: self.usage.total_tokens,
            cost: self.usage.cost,
            details,
        }
    }
}
