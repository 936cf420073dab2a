//! Tick-driven test harness
//!
//! Runs declared test cases against a system under test that can only be
//! stepped one tick at a time and queried synchronously.

pub mod assertions;
pub mod case;
pub mod registry;
pub mod result;
pub mod runner;
pub mod step;

pub use assertions::{AssertionFailure, Comparison};
pub use case::{FailurePolicy, TestBody, TestCase};
pub use registry::{SutFactory, TagFilter, TestRegistry, run_test};
pub use result::{FailureInfo, RunStatus, RunSummary, TestResult};
pub use runner::{DEADLINE_REASON, RunState, SequenceRunner};
pub use step::{Action, ActionError, Predicate, Step};

/// Default deadline for a test, in ticks
pub const DEFAULT_TIMEOUT_TICKS: u64 = 100;

/// Fixture used when a test does not name one
pub const DEFAULT_FIXTURE: &str = "empty";

/// A system under test that advances in discrete ticks
pub trait Simulation {
    /// Step the simulation forward by one tick
    fn advance_tick(&mut self);
}
