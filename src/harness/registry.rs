//! Test registry: holds declared cases, runs them, keeps their results

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use tracing::{info, warn};

use super::case::TestCase;
use super::result::{FailureInfo, RunStatus, RunSummary, TestResult};
use super::runner::{SequenceRunner, panic_message};
use super::Simulation;
use crate::error::ConfigError;

/// Builds a fresh SUT for one run of a test case
pub type SutFactory<S> = Box<dyn Fn(&TestCase<S>) -> Result<S, String> + Send + Sync>;

/// Tag-based selection of test cases
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    /// Every listed tag must be present
    pub include: Vec<String>,
    /// None of the listed tags may be present
    pub exclude: Vec<String>,
}

impl TagFilter {
    /// Matches everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches cases carrying `tag`
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            include: vec![tag.into()],
            exclude: Vec::new(),
        }
    }

    pub fn excluding(mut self, tag: impl Into<String>) -> Self {
        self.exclude.push(tag.into());
        self
    }

    pub fn matches<S>(&self, case: &TestCase<S>) -> bool {
        self.include.iter().all(|t| case.has_tag(t))
            && !self.exclude.iter().any(|t| case.has_tag(t))
    }
}

/// Drive one test case to completion against `sut`.
///
/// Each tick advances the SUT first, then lets the runner act on the new
/// state. A panicking SUT ends the run as failed.
pub fn run_test<S: Simulation>(case: &TestCase<S>, mut sut: S) -> TestResult {
    let mut runner = SequenceRunner::new(case);
    while runner.is_running() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| sut.advance_tick())) {
            runner.abort(format!("simulation panicked: {}", panic_message(&*payload)));
            break;
        }
        runner.on_tick(&mut sut);
    }

    let result = runner.into_result();
    log_result(&result);
    result
}

/// Build the SUT through `factory` and run the case on it
pub(crate) fn run_with_factory<S: Simulation>(
    case: &TestCase<S>,
    factory: &SutFactory<S>,
) -> TestResult {
    match factory(case) {
        Ok(sut) => run_test(case, sut),
        Err(message) => {
            let result = TestResult {
                suite: case.suite.clone(),
                name: case.name.clone(),
                status: RunStatus::Failed,
                elapsed_ticks: 0,
                failure: Some(FailureInfo {
                    reason: format!("fixture setup failed: {}", message),
                    tick: 0,
                    detail: None,
                }),
            };
            log_result(&result);
            result
        }
    }
}

fn log_result(result: &TestResult) {
    match result.status {
        RunStatus::Succeeded => info!("{} passed in {} ticks", result.id(), result.elapsed_ticks),
        _ => warn!(
            "{} {} after {} ticks: {}",
            result.id(),
            result.status,
            result.elapsed_ticks,
            result.reason().unwrap_or("no reason recorded")
        ),
    }
}

/// Registered test cases plus the latest result for each
pub struct TestRegistry<S> {
    factory: SutFactory<S>,
    cases: Vec<TestCase<S>>,
    index: HashMap<(String, String), usize>,
    results: Vec<Option<TestResult>>,
}

impl<S: Simulation> TestRegistry<S> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&TestCase<S>) -> Result<S, String> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            cases: Vec::new(),
            index: HashMap::new(),
            results: Vec::new(),
        }
    }

    /// Add a case; rejects duplicates and malformed cases
    pub fn register(&mut self, case: TestCase<S>) -> Result<(), ConfigError> {
        case.validate()?;
        let key = (case.suite.clone(), case.name.clone());
        if self.index.contains_key(&key) {
            return Err(ConfigError::Duplicate {
                suite: case.suite,
                name: case.name,
            });
        }
        self.index.insert(key, self.cases.len());
        self.cases.push(case);
        self.results.push(None);
        Ok(())
    }

    /// Register every case under `suite`. Stops at the first error; cases
    /// before it stay registered.
    pub fn register_suite<I>(&mut self, suite: &str, cases: I) -> Result<usize, ConfigError>
    where
        I: IntoIterator<Item = TestCase<S>>,
    {
        let mut count = 0;
        for mut case in cases {
            case.suite = suite.to_string();
            self.register(case)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn get(&self, suite: &str, name: &str) -> Option<&TestCase<S>> {
        self.position(suite, name).map(|idx| &self.cases[idx])
    }

    pub fn cases(&self) -> impl Iterator<Item = &TestCase<S>> {
        self.cases.iter()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Run one registered case, replacing its previous result
    pub fn run(&mut self, suite: &str, name: &str) -> Result<TestResult, ConfigError> {
        let idx = self
            .position(suite, name)
            .ok_or_else(|| ConfigError::UnknownTest {
                suite: suite.to_string(),
                name: name.to_string(),
            })?;
        let result = run_with_factory(&self.cases[idx], &self.factory);
        self.record(idx, result.clone());
        Ok(result)
    }

    /// Run every case matching `filter`, in registration order
    pub fn run_all(&mut self, filter: &TagFilter) -> Vec<TestResult> {
        let selected = self.selected(filter);
        let mut fresh = Vec::with_capacity(selected.len());
        for idx in selected {
            let result = run_with_factory(&self.cases[idx], &self.factory);
            self.record(idx, result.clone());
            fresh.push(result);
        }
        fresh
    }

    /// Latest result per case in registration order; cases never run are skipped
    pub fn all_results(&self) -> Vec<&TestResult> {
        self.results.iter().flatten().collect()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_results(self.results.iter().flatten())
    }

    fn position(&self, suite: &str, name: &str) -> Option<usize> {
        self.index
            .get(&(suite.to_string(), name.to_string()))
            .copied()
    }

    pub(crate) fn selected(&self, filter: &TagFilter) -> Vec<usize> {
        self.cases
            .iter()
            .enumerate()
            .filter(|(_, case)| filter.matches(case))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub(crate) fn case_at(&self, idx: usize) -> &TestCase<S> {
        &self.cases[idx]
    }

    pub(crate) fn factory(&self) -> &SutFactory<S> {
        &self.factory
    }

    pub(crate) fn record(&mut self, idx: usize, result: TestResult) {
        self.results[idx] = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{AssertionFailure, Step};

    /// Minimal simulation: a tick counter plus a flag actions can flip
    #[derive(Default)]
    struct Ticker {
        ticks: u64,
        lit: bool,
    }

    impl Simulation for Ticker {
        fn advance_tick(&mut self) {
            self.ticks += 1;
        }
    }

    fn registry() -> TestRegistry<Ticker> {
        TestRegistry::new(|case: &TestCase<Ticker>| {
            if case.fixture == "missing" {
                Err("fixture 'missing' not found".to_string())
            } else {
                Ok(Ticker::default())
            }
        })
    }

    fn lit_after(ticks: u64) -> TestCase<Ticker> {
        TestCase::new(
            "lamps",
            format!("lit_after_{}", ticks),
            vec![
                Step::idle(ticks),
                Step::execute(|sut: &mut Ticker| {
                    sut.lit = true;
                    Ok(())
                }),
                Step::assert(|sut: &Ticker| {
                    if sut.lit {
                        Ok(())
                    } else {
                        Err(AssertionFailure::new("lamp is off"))
                    }
                }),
                Step::succeed(),
            ],
        )
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = registry();
        registry.register(lit_after(3)).unwrap();
        let err = registry.register(lit_after(3)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Duplicate {
                suite: "lamps".to_string(),
                name: "lit_after_3".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_malformed_case_rejected() {
        let mut registry = registry();
        let err = registry
            .register(TestCase::new("lamps", "empty", Vec::new()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptySequence { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_run_records_result() {
        let mut registry = registry();
        registry.register(lit_after(3)).unwrap();
        let result = registry.run("lamps", "lit_after_3").unwrap();
        assert_eq!(result.status, RunStatus::Succeeded);
        assert_eq!(result.elapsed_ticks, 5);
        assert_eq!(registry.all_results().len(), 1);

        // Re-running overwrites rather than appends
        registry.run("lamps", "lit_after_3").unwrap();
        assert_eq!(registry.all_results().len(), 1);
    }

    #[test]
    fn test_run_unknown_test() {
        let mut registry = registry();
        assert!(matches!(
            registry.run("lamps", "nope"),
            Err(ConfigError::UnknownTest { .. })
        ));
    }

    #[test]
    fn test_run_all_in_registration_order_with_filter() {
        let mut registry = registry();
        registry.register(lit_after(4).tag("slow")).unwrap();
        registry.register(lit_after(1)).unwrap();
        registry.register(lit_after(2).tag("disabled")).unwrap();

        let results = registry.run_all(&TagFilter::all().excluding("disabled"));
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["lit_after_4", "lit_after_1"]);

        let results = registry.run_all(&TagFilter::tag("slow"));
        assert_eq!(results.len(), 1);

        let all: Vec<_> = registry.all_results().iter().map(|r| r.name.clone()).collect();
        assert_eq!(all, ["lit_after_4", "lit_after_1"]);
        assert_eq!(registry.summary().succeeded, 2);
    }

    #[test]
    fn test_register_suite_rehomes_cases() {
        let mut registry = registry();
        let count = registry
            .register_suite("redstone", [lit_after(1), lit_after(2)])
            .unwrap();
        assert_eq!(count, 2);
        assert!(registry.get("redstone", "lit_after_2").is_some());
        assert!(registry.get("lamps", "lit_after_2").is_none());
    }

    #[test]
    fn test_register_suite_stops_at_first_error() {
        let mut registry = registry();
        let err = registry
            .register_suite("redstone", [lit_after(1), lit_after(2), lit_after(1), lit_after(3)])
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Duplicate {
                suite: "redstone".to_string(),
                name: "lit_after_1".to_string()
            }
        );
        assert_eq!(registry.len(), 2);
        assert!(registry.get("redstone", "lit_after_2").is_some());
        assert!(registry.get("redstone", "lit_after_3").is_none());
    }

    #[test]
    fn test_factory_error_becomes_failed_result() {
        let mut registry = registry();
        registry.register(lit_after(1).fixture("missing")).unwrap();
        let result = registry.run("lamps", "lit_after_1").unwrap();
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.elapsed_ticks, 0);
        assert!(result.reason().unwrap().starts_with("fixture setup failed"));
    }

    #[test]
    fn test_run_test_advances_sut_once_per_tick() {
        let case = TestCase::succeed_when("clock", "count", |sut: &Ticker| {
            if sut.ticks >= 7 {
                Ok(())
            } else {
                Err(AssertionFailure::mismatch("ticks", ">= 7", sut.ticks.to_string()))
            }
        });
        let result = run_test(&case, Ticker::default());
        assert_eq!(result.status, RunStatus::Succeeded);
        assert_eq!(result.elapsed_ticks, 7);
    }
}
