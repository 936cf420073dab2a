//! Error types raised before a test runs.
//!
//! Run-time problems (failed assertions, action errors, deadlines) never
//! surface as errors; they end up in a [`crate::TestResult`]. The errors here
//! mean a test was declared or loaded incorrectly and cannot be run at all.

use std::path::PathBuf;

use thiserror::Error;

/// Problems detected when a test case is registered or looked up
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("test '{suite}/{name}' is already registered")]
    Duplicate { suite: String, name: String },

    #[error("test cases need a non-empty suite and name")]
    EmptyName,

    #[error("test '{suite}/{name}' has an empty step list")]
    EmptySequence { suite: String, name: String },

    #[error("test '{suite}/{name}' has a timeout of zero ticks")]
    ZeroTimeout { suite: String, name: String },

    #[error("test '{suite}/{name}' step #{index} idles for zero ticks")]
    ZeroIdle {
        suite: String,
        name: String,
        index: usize,
    },

    #[error("test '{suite}/{name}' step #{index} has a zero-tick retry bound")]
    ZeroWithin {
        suite: String,
        name: String,
        index: usize,
    },

    #[error("no test '{suite}/{name}' is registered")]
    UnknownTest { suite: String, name: String },
}

/// Problems loading a scenario or fixture file
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid check '{check}': {reason}")]
    InvalidCheck { check: String, reason: String },

    #[error("scenario '{name}' must declare either steps or succeed_when, not both")]
    AmbiguousBody { name: String },

    #[error("scenario '{name}' declares neither steps nor succeed_when")]
    MissingBody { name: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
