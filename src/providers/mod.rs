use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod openrouter;

use crate::api::{Message, ToolDefinition};
use crate::config::ResolvedModel;
use crate::errors::ProviderError;
use crate::types::ModelId;
use reqwest::Client;

pub(crate) struct ProviderHttpClient {
    client: Client,
}

impl ProviderHttpClient {
    pub fn new(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Response structure from one model decision
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    /// Assistant message; may carry zero or more requested tool calls.
    pub message: Message,
    pub usage: Usage,
}

/// Usage telemetry for a single model response
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub total_tokens: u64,
    pub cost: f64,
}

/// Trait for model backends driving the agent loop
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    /// Produce the next assistant message for the full transcript.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<InferenceResponse, ProviderError>;

    /// Get the name of this provider
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &ModelId;

    /// Validate that this provider is properly configured
    fn validate_config(&self) -> Result<(), ProviderError>;
}

/// Builds one client per benchmarked model.
pub trait ModelClientFactory: Send + Sync {
    fn create(&self, model: &ResolvedModel) -> Result<Arc<dyn ModelClient>, ProviderError>;
}

/// Factory for OpenAI-compatible endpoints (OpenRouter by default).
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenRouterFactory;

impl ModelClientFactory for OpenRouterFactory {
    fn create(&self, model: &ResolvedModel) -> Result<Arc<dyn ModelClient>, ProviderError> {
        let client = openrouter::OpenRouterClient::new(model)?;
        client.validate_config()?;
        Ok(Arc::new(client))
    }
}
