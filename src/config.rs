use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ConfigError;
use crate::types::ModelId;

pub const CONFIG_PATH: &str = ".browsebench/config.json";
pub const DEFAULT_MAX_STEPS: u32 = 10;
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Credential used when a model entry has no `api_key` of its own.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Registry entry for one benchmarked model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Upstream model name sent to the endpoint
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Defaults to [`DEFAULT_BASE_URL`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelSettings {
    fn new(model: &str, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            api_key: None,
            base_url: None,
            max_tokens: Some(max_tokens),
        }
    }
}

/// A registry entry with every fallback applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    /// Registry key, used to label results
    pub id: String,
    pub model: ModelId,
    pub api_key: String,
    pub base_url: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub http_timeout_secs: u64,
}

/// Benchmark configuration. Loaded once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub max_steps: u32,
    /// Upper bound on a single model call; `None` waits indefinitely.
    pub model_timeout_secs: Option<u64>,
    pub http_timeout_secs: u64,
    pub max_sessions_per_model: usize,
    pub temperature: Option<f32>,
    pub tests_dir: PathBuf,
    pub results_path: PathBuf,
    /// When set, each run's transcript is written here.
    pub trace_dir: Option<PathBuf>,
    pub models: BTreeMap<String, ModelSettings>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        let models = [
            ("gpt-4", ModelSettings::new("openai/gpt-4", 2000)),
            ("claude-3", ModelSettings::new("anthropic/claude-3-opus", 2000)),
            ("gemini", ModelSettings::new("google/gemini-2.0-flash-001", 2000)),
        ]
        .into_iter()
        .map(|(id, settings)| (id.to_string(), settings))
        .collect();

        Self {
            max_steps: DEFAULT_MAX_STEPS,
            model_timeout_secs: Some(120),
            http_timeout_secs: 120,
            max_sessions_per_model: 1,
            temperature: None,
            tests_dir: PathBuf::from("tests/browsebench"),
            results_path: PathBuf::from("results/benchmark_results.json"),
            trace_dir: None,
            models,
        }
    }
}

impl BenchConfig {
    /// Load from `.browsebench/config.json`, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn model_timeout(&self) -> Option<Duration> {
        self.model_timeout_secs.map(Duration::from_secs)
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    /// Resolve a registry entry, reading the fallback credential from the environment.
    pub fn resolve_model(&self, id: &str) -> Result<ResolvedModel, ConfigError> {
        let env_key = std::env::var(API_KEY_ENV).ok();
        self.resolve_model_with(id, env_key.as_deref())
    }

    pub fn resolve_model_with(
        &self,
        id: &str,
        fallback_key: Option<&str>,
    ) -> Result<ResolvedModel, ConfigError> {
        let settings = self
            .models
            .get(id)
            .ok_or_else(|| ConfigError::UnknownModel(id.to_string()))?;

        let api_key = settings
            .api_key
            .as_deref()
            .or(fallback_key)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential {
                model: id.to_string(),
                env_var: API_KEY_ENV,
            })?;

        Ok(ResolvedModel {
            id: id.to_string(),
            model: ModelId::new(&settings.model),
            api_key: api_key.to_string(),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_tokens: settings.max_tokens,
            temperature: self.temperature,
            http_timeout_secs: self.http_timeout_secs,
        })
    }
}
