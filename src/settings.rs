//! Runner settings
//!
//! Loads from runner_settings.json (local, gitignored) or falls back to
//! runner_settings.template.json (tracked). CLI flags override file settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::harness::{DEFAULT_TIMEOUT_TICKS, TagFilter};
use crate::sandbox::FIXTURES_FILE;
use crate::scenario::{SCENARIOS_DIR, ScenarioDefaults};

/// Path to local settings file (gitignored)
pub const SETTINGS_FILE: &str = "config/runner_settings.json";
/// Path to template file (tracked in git)
pub const TEMPLATE_FILE: &str = "config/runner_settings.template.json";

/// Settings for one run of the scenario runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Root of the scenario tree
    pub scenarios_dir: String,
    /// Fixture library (TOML)
    pub fixtures_file: String,
    /// Deadline for scenarios that do not set `timeout`
    pub default_timeout: u64,
    /// Only run tests carrying every one of these tags
    pub include_tags: Vec<String>,
    /// Skip tests carrying any of these tags
    pub exclude_tags: Vec<String>,
    /// Worker threads (0 = sequential)
    pub parallel: usize,
    /// JSON report path (None = no report)
    pub output_file: Option<String>,
    /// SQLite results database (None = not stored)
    pub db_path: Option<String>,
    /// Print failure details
    pub verbose: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            scenarios_dir: SCENARIOS_DIR.to_string(),
            fixtures_file: FIXTURES_FILE.to_string(),
            default_timeout: DEFAULT_TIMEOUT_TICKS,
            include_tags: Vec::new(),
            exclude_tags: vec!["disabled".to_string()],
            parallel: 0,
            output_file: None,
            db_path: None,
            verbose: false,
        }
    }
}

impl RunnerSettings {
    /// Load with priority: local file > template > defaults
    pub fn load() -> Self {
        Self::load_from(Path::new(SETTINGS_FILE), Path::new(TEMPLATE_FILE))
    }

    pub fn load_from(local: &Path, template: &Path) -> Self {
        for path in [local, template] {
            if !path.exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(settings) => {
                    info!("Loaded runner settings from {}", path.display());
                    return settings;
                }
                Err(e) => warn!("{}, trying next source", e),
            }
        }

        info!("No runner settings found, using defaults");
        Self::default()
    }

    /// Load one settings file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn tag_filter(&self) -> TagFilter {
        TagFilter {
            include: self.include_tags.clone(),
            exclude: self.exclude_tags.clone(),
        }
    }

    pub fn scenario_defaults(&self) -> ScenarioDefaults {
        ScenarioDefaults {
            timeout: self.default_timeout,
        }
    }
}
