//! Per-test results and suite summaries

use serde::{Deserialize, Serialize};

/// Status of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Stable lowercase name (used in the results database)
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::TimedOut => "timed_out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "succeeded" => Some(RunStatus::Succeeded),
            "failed" => Some(RunStatus::Failed),
            "timed_out" => Some(RunStatus::TimedOut),
            _ => None,
        }
    }

    /// Console label
    pub fn label(self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "PASS",
            RunStatus::Failed => "FAIL",
            RunStatus::TimedOut => "TIMEOUT",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why and when a run did not succeed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub reason: String,
    pub tick: u64,
    /// Last retried assertion, for runs that timed out waiting on one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Final record for one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub suite: String,
    pub name: String,
    pub status: RunStatus,
    pub elapsed_ticks: u64,
    pub failure: Option<FailureInfo>,
}

impl TestResult {
    pub fn id(&self) -> String {
        format!("{}/{}", self.suite, self.name)
    }

    pub fn passed(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn reason(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.reason.as_str())
    }
}

/// Counts across a set of results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl RunSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a TestResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.add(result.status);
        }
        summary
    }

    pub fn add(&mut self, status: RunStatus) {
        match status {
            RunStatus::Succeeded => self.succeeded += 1,
            RunStatus::Failed => self.failed += 1,
            RunStatus::TimedOut => self.timed_out += 1,
            RunStatus::Running => {}
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.timed_out
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: RunStatus) -> TestResult {
        TestResult {
            suite: "s".to_string(),
            name: "n".to_string(),
            status,
            elapsed_ticks: 1,
            failure: None,
        }
    }

    #[test]
    fn test_summary_counts() {
        let results = [
            result(RunStatus::Succeeded),
            result(RunStatus::Failed),
            result(RunStatus::TimedOut),
            result(RunStatus::Succeeded),
        ];
        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.total(), 4);
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_status_names_roundtrip() {
        for status in [RunStatus::Succeeded, RunStatus::Failed, RunStatus::TimedOut] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_serialized_status_is_snake_case() {
        let json = serde_json::to_string(&result(RunStatus::TimedOut)).unwrap();
        assert!(json.contains("\"timed_out\""));
    }
}
