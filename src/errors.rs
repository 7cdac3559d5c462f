use serde::Serialize;
use thiserror::Error;

use crate::types::ToolName;

/// Coarse classification the agent loop branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ToolExecution,
    ToolNotFound,
    InvalidArguments,
    ModelTransport,
    Configuration,
    Session,
    Cancelled,
    Aborted,
}

impl ErrorKind {
    /// Recoverable errors are fed back to the model as observations.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::ToolExecution | ErrorKind::ToolNotFound | ErrorKind::InvalidArguments
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ToolExecution => "tool_execution",
            ErrorKind::ToolNotFound => "tool_not_found",
            ErrorKind::InvalidArguments => "invalid_arguments",
            ErrorKind::ModelTransport => "model_transport",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Session => "session",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Aborted => "aborted",
        }
    }
}

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found.")]
    NotFound(ToolName),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: ToolName, reason: String },

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter type for {key}: expected {expected}")]
    InvalidParameterType { key: String, expected: &'static str },

    #[error("{0}")]
    Execution(String),

    #[error("{tool} is not supported by this backend")]
    Unsupported { tool: &'static str },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::NotFound(_) => ErrorKind::ToolNotFound,
            ToolError::InvalidArguments { .. }
            | ToolError::MissingParameter(_)
            | ToolError::InvalidParameterType { .. } => ErrorKind::InvalidArguments,
            ToolError::Execution(_) | ToolError::Unsupported { .. } | ToolError::Http(_) => {
                ErrorKind::ToolExecution
            }
        }
    }

    /// Text appended to the transcript in place of a tool result.
    pub fn observation(&self) -> String {
        format!("Error: {self}")
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Model call timed out after {0}s")]
    Timeout(u64),

    #[error("Missing API key for {0}")]
    MissingApiKey(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::MissingApiKey(_) | ProviderError::Config(_) => ErrorKind::Configuration,
            _ => ErrorKind::ModelTransport,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("No API key configured for model {model}; set {env_var} or api_key")]
    MissingCredential { model: String, env_var: &'static str },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

#[derive(Error, Debug)]
#[error("Could not open browsing session: {0}")]
pub struct SessionError(pub String);
