//! Runs the model × test matrix.
//!
//! Every model gets its own task; a model's tests share one client but each
//! test opens, uses and closes its own browsing session. Failures are
//! recorded as failing `TestResult`s and never cross model boundaries.

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentLoop, LoopSettings};
use crate::config::{API_KEY_ENV, BenchConfig};
use crate::errors::ErrorKind;
use crate::metrics::{BenchmarkResults, MetricsCollector, TestResult};
use crate::providers::{ModelClient, ModelClientFactory};
use crate::test_suite::Test;
use crate::tools::SessionFactory;
use crate::trace;

/// Aggregated results keyed by model registry id.
pub type RunOutput = BTreeMap<String, BenchmarkResults>;

pub struct BenchmarkOrchestrator {
    config: Arc<BenchConfig>,
    clients: Arc<dyn ModelClientFactory>,
    sessions: Arc<dyn SessionFactory>,
    cancel: CancellationToken,
    fallback_key: Option<String>,
}

impl BenchmarkOrchestrator {
    pub fn new(
        config: Arc<BenchConfig>,
        clients: Arc<dyn ModelClientFactory>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            config,
            clients,
            sessions,
            cancel: CancellationToken::new(),
            fallback_key: std::env::var(API_KEY_ENV).ok(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Override the credential used by models without their own `api_key`.
    pub fn with_fallback_key(mut self, key: Option<String>) -> Self {
        self.fallback_key = key;
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run every requested model over the suite; models run concurrently.
    pub async fn run(&self, models: &[String], suite: &[Test]) -> RunOutput {
        let suite: Arc<[Test]> = Arc::from(suite.to_vec());
        let requested: BTreeSet<String> = models.iter().cloned().collect();

        let mut tasks = JoinSet::new();
        for id in &requested {
            let unit = ModelRun {
                id: id.clone(),
                config: Arc::clone(&self.config),
                clients: Arc::clone(&self.clients),
                sessions: Arc::clone(&self.sessions),
                cancel: self.cancel.clone(),
                fallback_key: self.fallback_key.clone(),
                suite: Arc::clone(&suite),
            };
            tasks.spawn(async move {
                let collector = unit.run().await;
                (unit.id, collector)
            });
        }

        let mut output = RunOutput::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, collector)) => {
                    output.insert(id, collector.aggregate());
                }
                Err(e) => log::error!("model task failed to complete: {e}"),
            }
        }

        // A model task that died still reports one failure per test.
        for id in requested {
            output.entry(id).or_insert_with(|| {
                suite
                    .iter()
                    .map(|t| TestResult::failed(&t.name, ErrorKind::Aborted, "model task aborted"))
                    .collect::<MetricsCollector>()
                    .aggregate()
            });
        }

        output
    }

    /// The "start run" control operation: run, then persist wholesale.
    pub async fn run_and_persist(&self, models: &[String], suite: &[Test]) -> Result<RunOutput> {
        let output = self.run(models, suite).await;
        persist_results(&self.config.results_path, &output)?;
        Ok(output)
    }
}

/// Everything one model task needs, owned so the task can be spawned.
struct ModelRun {
    id: String,
    config: Arc<BenchConfig>,
    clients: Arc<dyn ModelClientFactory>,
    sessions: Arc<dyn SessionFactory>,
    cancel: CancellationToken,
    fallback_key: Option<String>,
    suite: Arc<[Test]>,
}

impl ModelRun {
    async fn run(&self) -> MetricsCollector {
        let resolved = match self
            .config
            .resolve_model_with(&self.id, self.fallback_key.as_deref())
        {
            Ok(resolved) => resolved,
            Err(e) => {
                log::error!("[{}] {e}", self.id);
                return self.fail_all(e.kind(), &e);
            }
        };

        let client = match self.clients.create(&resolved) {
            Ok(client) => client,
            Err(e) => {
                log::error!("[{}] could not create model client: {e}", self.id);
                return self.fail_all(e.kind(), &e);
            }
        };

        let settings = LoopSettings::from_config(&self.config);
        let limit = self.config.max_sessions_per_model.max(1);
        log::info!(
            "[{}] running {} test(s), {} session(s) at a time",
            self.id,
            self.suite.len(),
            limit
        );

        stream::iter(0..self.suite.len())
            .map(|i| self.run_test(client.as_ref(), &self.suite[i], settings))
            .buffered(limit)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }

    async fn run_test(
        &self,
        client: &dyn ModelClient,
        test: &Test,
        settings: LoopSettings,
    ) -> TestResult {
        if self.cancel.is_cancelled() {
            return TestResult::failed(&test.name, ErrorKind::Cancelled, "run cancelled");
        }

        let mut executor = match self.sessions.open().await {
            Ok(executor) => executor,
            Err(e) => {
                log::error!("[{}] '{}': {e}", self.id, test.name);
                return TestResult::failed(&test.name, ErrorKind::Session, &e);
            }
        };

        let outcome = AssertUnwindSafe(
            AgentLoop::new(test, client, executor.as_mut(), settings)
                .with_cancellation(self.cancel.clone())
                .run(),
        )
        .catch_unwind()
        .await;
        executor.close().await;

        match outcome {
            Ok(run) => {
                if let Some(dir) = &self.config.trace_dir
                    && let Err(e) = trace::append_run_trace(dir, &self.id, &run)
                {
                    log::warn!("[{}] could not write trace: {e:#}", self.id);
                }
                run.result
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("[{}] '{}' aborted: {message}", self.id, test.name);
                TestResult::failed(&test.name, ErrorKind::Aborted, message)
            }
        }
    }

    fn fail_all(&self, kind: ErrorKind, error: &dyn std::fmt::Display) -> MetricsCollector {
        self.suite
            .iter()
            .map(|t| TestResult::failed(&t.name, kind, error))
            .collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "agent loop panicked".to_string())
}

/// Write the whole output object, replacing any previous file.
pub fn persist_results(path: &Path, output: &RunOutput) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(output)?)
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    log::info!("wrote results for {} model(s) to {}", output.len(), path.display());
    Ok(())
}

/// The "get results" control operation; empty when nothing was persisted yet.
pub fn load_results(path: &Path) -> Result<RunOutput> {
    if !path.exists() {
        return Ok(RunOutput::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let output = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(output)
}
