pub mod agent;
pub mod api;
pub mod config;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod providers;
pub mod test_suite;
pub mod tools;
pub mod trace;
pub mod transcript;
pub mod types;

#[cfg(test)]
mod testing;

pub use crate::agent::{AgentLoop, AgentRun, LoopSettings};
pub use crate::api::{Message, Role, ToolCall, ToolDefinition};
pub use crate::config::BenchConfig;
pub use crate::errors::{ConfigError, ErrorKind, ProviderError, SessionError, ToolError};
pub use crate::metrics::{BenchmarkResults, MetricsCollector, TestResult};
pub use crate::orchestrator::{BenchmarkOrchestrator, RunOutput};
pub use crate::providers::{InferenceResponse, ModelClient, ModelClientFactory, Usage};
pub use crate::test_suite::{Test, TestSuite};
pub use crate::tools::{ActionExecutor, ElementInfo, SessionFactory, ToolCatalog};
pub use crate::transcript::Transcript;
