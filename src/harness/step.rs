//! Steps making up a test sequence

use super::assertions::AssertionFailure;

/// Read-only check against the system under test
pub type Predicate<S> = Box<dyn Fn(&S) -> Result<(), AssertionFailure> + Send + Sync>;

/// Mutation applied to the system under test
pub type Action<S> = Box<dyn Fn(&mut S) -> Result<(), ActionError> + Send + Sync>;

/// Error raised by an `Execute` step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError {
    pub message: String,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ActionError {}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// One instruction in a test sequence
pub enum Step<S> {
    /// Wait this many ticks
    Idle(u64),
    /// Run an action once
    Execute(Action<S>),
    /// Evaluate a predicate
    Assert {
        predicate: Predicate<S>,
        /// Re-evaluate on later ticks instead of failing
        retry: bool,
        /// Give up after this many ticks on this step (retrying steps only)
        within: Option<u64>,
    },
    /// End the run successfully
    Succeed,
    /// End the run with a failure
    Fail(String),
}

impl<S> Step<S> {
    pub fn idle(ticks: u64) -> Self {
        Step::Idle(ticks)
    }

    pub fn execute<F>(action: F) -> Self
    where
        F: Fn(&mut S) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        Step::Execute(Box::new(action))
    }

    /// Assertion that fails the run the first time it does not hold
    pub fn assert<F>(predicate: F) -> Self
    where
        F: Fn(&S) -> Result<(), AssertionFailure> + Send + Sync + 'static,
    {
        Step::Assert {
            predicate: Box::new(predicate),
            retry: false,
            within: None,
        }
    }

    /// Assertion retried every tick until it holds or the deadline hits
    pub fn assert_eventually<F>(predicate: F) -> Self
    where
        F: Fn(&S) -> Result<(), AssertionFailure> + Send + Sync + 'static,
    {
        Step::Assert {
            predicate: Box::new(predicate),
            retry: true,
            within: None,
        }
    }

    /// Retried assertion with its own tick bound
    pub fn assert_within<F>(ticks: u64, predicate: F) -> Self
    where
        F: Fn(&S) -> Result<(), AssertionFailure> + Send + Sync + 'static,
    {
        Step::Assert {
            predicate: Box::new(predicate),
            retry: true,
            within: Some(ticks),
        }
    }

    pub fn succeed() -> Self {
        Step::Succeed
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Step::Fail(reason.into())
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Idle(_) => "idle",
            Step::Execute(_) => "execute",
            Step::Assert { .. } => "assert",
            Step::Succeed => "succeed",
            Step::Fail(_) => "fail",
        }
    }

    /// Succeed/Fail resolve without consuming a tick
    pub fn is_instant(&self) -> bool {
        matches!(self, Step::Succeed | Step::Fail(_))
    }
}

impl<S> std::fmt::Debug for Step<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Idle(ticks) => write!(f, "Idle({})", ticks),
            Step::Execute(_) => f.write_str("Execute(..)"),
            Step::Assert { retry, within, .. } => f
                .debug_struct("Assert")
                .field("retry", retry)
                .field("within", within)
                .finish_non_exhaustive(),
            Step::Succeed => f.write_str("Succeed"),
            Step::Fail(reason) => write!(f, "Fail({:?})", reason),
        }
    }
}
