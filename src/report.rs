//! Console output and the JSON report

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::harness::{RunStatus, RunSummary, TestResult};

/// Width the test name is padded to with dots
const NAME_WIDTH: usize = 40;

fn dots(name: &str) -> String {
    ".".repeat(NAME_WIDTH - name.len().min(NAME_WIDTH - 1))
}

/// One console line per result, plus the reason when it did not pass
pub fn format_result(result: &TestResult, verbose: bool) -> String {
    let mut out = format!(
        "  {} {} {} ({} ticks)",
        result.name,
        dots(&result.name),
        result.status.label(),
        result.elapsed_ticks
    );

    if let Some(failure) = &result.failure {
        out.push_str(&format!("\n    {}", failure.reason));
        if verbose {
            out.push_str(&format!("\n    at tick {}", failure.tick));
            if let Some(detail) = &failure.detail {
                out.push_str(&format!("\n    last check: {}", detail));
            }
        }
    }
    out
}

/// Print results grouped under their suite
pub fn print_results(results: &[TestResult], verbose: bool) {
    let mut current_suite = "";
    for result in results {
        if result.suite != current_suite {
            if !current_suite.is_empty() {
                println!();
            }
            println!("{}/", result.suite);
            current_suite = result.suite.as_str();
        }
        println!("{}", format_result(result, verbose));
    }
}

/// A file that never made it to a run
pub fn print_load_error(name: &str, message: &str) {
    println!("  {} {} ERROR", name, dots(name));
    println!("    {}", message);
}

pub fn format_summary(summary: &RunSummary, load_errors: usize) -> String {
    format!(
        "Results: {} passed, {} failed, {} timed out, {} errors",
        summary.succeeded, summary.failed, summary.timed_out, load_errors
    )
}

/// Everything one run produced, as written to `--output`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub session_id: String,
    /// RFC 3339 timestamp
    pub generated_at: String,
    pub summary: RunSummary,
    pub results: Vec<TestResult>,
}

impl RunReport {
    pub fn new(session_id: impl Into<String>, results: Vec<TestResult>) -> Self {
        Self {
            session_id: session_id.into(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            summary: RunSummary::from_results(&results),
            results,
        }
    }

    /// Fresh random session id
    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results
            .iter()
            .filter(|r| r.status != RunStatus::Succeeded)
    }

    /// Write the report as pretty JSON, creating parent directories
    pub fn write_to_file(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
