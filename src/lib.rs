//! Ticktest - tick-driven test sequencing for simulations
//!
//! Test cases are ordered steps (idle, execute, assert, succeed, fail) or a
//! single succeed-when predicate, driven one tick at a time against a system
//! under test. The bundled sandbox world (a small bevy ECS simulation) and
//! TOML scenario files make the harness usable from the `ticktest` CLI.

// Core modules
pub mod clock;
pub mod error;
pub mod harness;
pub mod parallel;

// Sandbox world and scenario files
pub mod sandbox;
pub mod scenario;

// Runner plumbing
pub mod db;
pub mod report;
pub mod settings;

// Re-export commonly used types for convenience
pub use clock::TickClock;
pub use db::{ResultDatabase, ResultFilter, StoredResult};
pub use error::{ConfigError, ScenarioError};
pub use harness::{
    Action, ActionError, AssertionFailure, Comparison, DEFAULT_FIXTURE, DEFAULT_TIMEOUT_TICKS,
    FailureInfo, FailurePolicy, Predicate, RunStatus, RunSummary, SequenceRunner, Simulation, Step,
    SutFactory, TagFilter, TestBody, TestCase, TestRegistry, TestResult, run_test,
};
pub use parallel::init_parallel;
pub use report::RunReport;
pub use sandbox::{FixtureLibrary, SandboxWorld, WorldSnapshot};
pub use scenario::{SCENARIOS_DIR, SandboxFactory, build_registry, load_dir};
pub use settings::RunnerSettings;
