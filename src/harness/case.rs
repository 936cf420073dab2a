//! Declared test cases

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::step::{Predicate, Step};
use super::{DEFAULT_FIXTURE, DEFAULT_TIMEOUT_TICKS};
use crate::error::ConfigError;

/// What a test does each tick
pub enum TestBody<S> {
    /// Ordered steps, walked front to back
    Steps(Vec<Step<S>>),
    /// One predicate polled every tick until it holds
    SucceedWhen(Predicate<S>),
}

/// How non-retrying assertion failures are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// First failure ends the run
    #[default]
    ShortCircuit,
    /// Record the failure and keep going; fail when the sequence ends
    CollectAll,
}

/// A named, registered test
pub struct TestCase<S> {
    pub suite: String,
    pub name: String,
    pub body: TestBody<S>,
    /// Hard deadline in ticks
    pub timeout: u64,
    /// Fixture the SUT factory builds the world from
    pub fixture: String,
    pub tags: BTreeSet<String>,
    pub policy: FailurePolicy,
}

impl<S> TestCase<S> {
    pub fn new(suite: impl Into<String>, name: impl Into<String>, steps: Vec<Step<S>>) -> Self {
        Self::with_body(suite, name, TestBody::Steps(steps))
    }

    pub fn succeed_when<F>(suite: impl Into<String>, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&S) -> Result<(), super::AssertionFailure> + Send + Sync + 'static,
    {
        Self::with_body(suite, name, TestBody::SucceedWhen(Box::new(predicate)))
    }

    pub fn with_body(suite: impl Into<String>, name: impl Into<String>, body: TestBody<S>) -> Self {
        Self {
            suite: suite.into(),
            name: name.into(),
            body,
            timeout: DEFAULT_TIMEOUT_TICKS,
            fixture: DEFAULT_FIXTURE.to_string(),
            tags: BTreeSet::new(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn timeout(mut self, ticks: u64) -> Self {
        self.timeout = ticks;
        self
    }

    pub fn fixture(mut self, fixture: impl Into<String>) -> Self {
        self.fixture = fixture.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `suite/name`
    pub fn id(&self) -> String {
        format!("{}/{}", self.suite, self.name)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Reject cases that could never run meaningfully
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.suite.trim().is_empty() || self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.timeout == 0 {
            return Err(ConfigError::ZeroTimeout {
                suite: self.suite.clone(),
                name: self.name.clone(),
            });
        }

        let TestBody::Steps(steps) = &self.body else {
            return Ok(());
        };
        if steps.is_empty() {
            return Err(ConfigError::EmptySequence {
                suite: self.suite.clone(),
                name: self.name.clone(),
            });
        }
        for (index, step) in steps.iter().enumerate() {
            match step {
                Step::Idle(0) => {
                    return Err(ConfigError::ZeroIdle {
                        suite: self.suite.clone(),
                        name: self.name.clone(),
                        index,
                    });
                }
                Step::Assert {
                    within: Some(0), ..
                } => {
                    return Err(ConfigError::ZeroWithin {
                        suite: self.suite.clone(),
                        name: self.name.clone(),
                        index,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl<S> std::fmt::Debug for TestCase<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match &self.body {
            TestBody::Steps(steps) => format!("{} steps", steps.len()),
            TestBody::SucceedWhen(_) => "succeed_when".to_string(),
        };
        f.debug_struct("TestCase")
            .field("suite", &self.suite)
            .field("name", &self.name)
            .field("body", &body)
            .field("timeout", &self.timeout)
            .field("fixture", &self.fixture)
            .field("tags", &self.tags)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    #[test]
    fn test_defaults() {
        let case: TestCase<Nothing> = TestCase::new("suite", "name", vec![Step::succeed()]);
        assert_eq!(case.timeout, DEFAULT_TIMEOUT_TICKS);
        assert_eq!(case.fixture, DEFAULT_FIXTURE);
        assert_eq!(case.policy, FailurePolicy::ShortCircuit);
        assert_eq!(case.id(), "suite/name");
        assert!(case.validate().is_ok());
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let case: TestCase<Nothing> = TestCase::new("suite", "empty", Vec::new());
        assert!(matches!(
            case.validate(),
            Err(ConfigError::EmptySequence { .. })
        ));
    }

    #[test]
    fn test_zero_idle_and_timeout_rejected() {
        let case: TestCase<Nothing> =
            TestCase::new("suite", "idle", vec![Step::idle(3), Step::idle(0)]);
        assert!(matches!(
            case.validate(),
            Err(ConfigError::ZeroIdle { index: 1, .. })
        ));

        let case: TestCase<Nothing> =
            TestCase::new("suite", "deadline", vec![Step::succeed()]).timeout(0);
        assert!(matches!(case.validate(), Err(ConfigError::ZeroTimeout { .. })));
    }

    #[test]
    fn test_blank_name_rejected() {
        let case: TestCase<Nothing> = TestCase::new("suite", "  ", vec![Step::succeed()]);
        assert_eq!(case.validate(), Err(ConfigError::EmptyName));
    }

    #[test]
    fn test_tags() {
        let case: TestCase<Nothing> = TestCase::new("suite", "tagged", vec![Step::succeed()])
            .tag("default")
            .tags(["slow", "parity"]);
        assert!(case.has_tag("default"));
        assert!(case.has_tag("parity"));
        assert!(!case.has_tag("disabled"));
    }
}
