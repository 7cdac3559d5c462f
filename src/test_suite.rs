use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// One benchmark case, loaded from a YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Test {
    pub name: String,
    pub description: String,
    pub url: String,
    pub goal: String,
    pub constraints: Vec<String>,
    /// Expected observations for graders; not shown to the model.
    pub oracle: Vec<String>,
}

pub type TestSuite = Vec<Test>;

pub fn load_test(path: &Path) -> Result<Test> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let test: Test =
        serde_yaml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(test)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Load every `*.yaml`/`*.yml` test under `dir`, in path order.
///
/// Files that fail to load are logged and left out of the suite.
pub fn load_suite(dir: &Path) -> Result<TestSuite> {
    if !dir.is_dir() {
        anyhow::bail!("test directory not found: {}", dir.display());
    }

    let mut suite = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_yaml(entry.path()) {
            continue;
        }
        match load_test(entry.path()) {
            Ok(test) => suite.push(test),
            Err(e) => log::warn!("excluding invalid test: {e:#}"),
        }
    }

    log::info!("loaded {} test(s) from {}", suite.len(), dir.display());
    Ok(suite)
}

/// Load the suite and keep only the named tests; an empty selector keeps all.
pub fn select_suite(dir: &Path, names: &[String]) -> Result<TestSuite> {
    let suite = load_suite(dir)?;
    if names.is_empty() {
        return Ok(suite);
    }

    for name in names {
        if !suite.iter().any(|t| &t.name == name) {
            log::warn!("selected test '{name}' not found in {}", dir.display());
        }
    }
    Ok(suite
        .into_iter()
        .filter(|t| names.contains(&t.name))
        .collect())
}
