use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ErrorKind;

/// Outcome of one agent run against one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub success: bool,
    pub steps: u32,
    /// Wall-clock seconds
    pub response_time: f64,
    pub token_usage: u64,
    pub cost: f64,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl TestResult {
    /// Result for a run that failed before any agent step could execute.
    pub fn failed(test_name: impl Into<String>, kind: ErrorKind, error: impl ToString) -> Self {
        let mut details = Map::new();
        details.insert("finish_reason".into(), Value::from("error"));
        details.insert("error_kind".into(), Value::from(kind.as_str()));
        details.insert("error".into(), Value::from(error.to_string()));
        Self {
            test_name: test_name.into(),
            success: false,
            steps: 0,
            response_time: 0.0,
            token_usage: 0,
            cost: 0.0,
            details,
        }
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.details.get("finish_reason").and_then(Value::as_str)
    }

    pub fn error_kind(&self) -> Option<&str> {
        self.details.get("error_kind").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub total_tests: usize,
    pub completed_tests: usize,
    pub completion_rate: f64,
    pub average_steps: f64,
    pub average_response_time: f64,
    pub total_token_usage: u64,
    pub total_cost: f64,
    #[serde(default)]
    pub results: Vec<TestResult>,
}

/// Collects results for one model; aggregates are always derived from the
/// full list.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    results: Vec<TestResult>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: TestResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn aggregate(&self) -> BenchmarkResults {
        let total_tests = self.results.len();
        if total_tests == 0 {
            return BenchmarkResults::default();
        }

        let n = total_tests as f64;
        let completed_tests = self.results.iter().filter(|r| r.success).count();

        BenchmarkResults {
            total_tests,
            completed_tests,
            completion_rate: completed_tests as f64 / n,
            average_steps: self.results.iter().map(|r| f64::from(r.steps)).sum::<f64>() / n,
            average_response_time: self.results.iter().map(|r| r.response_time).sum::<f64>() / n,
            total_token_usage: self.results.iter().map(|r| r.token_usage).sum(),
            total_cost: self.results.iter().map(|r| r.cost).sum(),
            results: self.results.clone(),
        }
    }
}

impl FromIterator<TestResult> for MetricsCollector {
    fn from_iter<I: IntoIterator<Item = TestResult>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}
