use serde::{Deserialize, Serialize};

use super::{BROWSER_CAPABILITIES, CapabilitySpec};
use crate::errors::{SessionError, ToolError};

/// Summary of one element returned by `find_elements`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
}

/// One exclusively owned browsing session (e.g. a single browser page).
///
/// Every capability may fail; failures are returned as `ToolError` and turned
/// into observations by the agent loop.
#[async_trait::async_trait]
pub trait ActionExecutor: Send {
    async fn navigate(&mut self, url: &str) -> Result<String, ToolError>;

    async fn click(&mut self, selector: &str) -> Result<String, ToolError>;

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<String, ToolError>;

    async fn get_text(&mut self, selector: &str) -> Result<String, ToolError>;

    async fn get_html(&mut self, selector: &str) -> Result<String, ToolError>;

    async fn scroll(&mut self, direction: &str, pixels: i64) -> Result<String, ToolError>;

    async fn wait(&mut self, seconds: u64) -> Result<String, ToolError>;

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<ElementInfo>, ToolError>;

    /// Capability set exposed to the model. Backends that only implement a
    /// subset of the methods above can narrow it here.
    fn capabilities(&self) -> &'static [CapabilitySpec] {
        BROWSER_CAPABILITIES
    }

    /// Page representation shown to the model at the start of each step.
    async fn snapshot(&mut self) -> Result<String, ToolError> {
        self.get_html("body").await
    }

    /// Release the session. Called exactly once, on every exit path.
    async fn close(&mut self) {}
}

/// Opens a fresh, unshared session for each (model, test) run.
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ActionExecutor>, SessionError>;
}
