use anyhow::Result;
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::agent::AgentRun;

/// File-name safe form of a model or test identifier.
fn slug(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

pub fn trace_path(base_dir: &Path, model_id: &str, test_name: &str) -> PathBuf {
    base_dir
        .join(slug(model_id))
        .join(format!("{}.jsonl", slug(test_name)))
}

/// Append one record holding the run's result and full transcript.
pub fn append_run_trace(base_dir: &Path, model_id: &str, run: &AgentRun) -> Result<PathBuf> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let path = trace_path(base_dir, model_id, &run.result.test_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let record = json!({
        "timestamp": timestamp,
        "model": model_id,
        "result": &run.result,
        "transcript": &run.transcript,
    });

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "{}", serde_json::to_string(&record)?)?;

    Ok(path)
}
