//! Parallel test execution
//!
//! Uses Rayon to run independent test cases concurrently. Every run builds
//! its own SUT through the registry's factory, so nothing is shared between
//! runs besides the immutable test cases.

use rayon::prelude::*;

use crate::harness::registry::run_with_factory;
use crate::harness::{Simulation, TagFilter, TestRegistry, TestResult};

/// Initialize the global Rayon pool with the given thread count.
/// Call this once at startup; `0` keeps Rayon's default (one per core).
pub fn init_parallel(threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }
    Ok(())
}

impl<S: Simulation> TestRegistry<S> {
    /// Same contract as [`TestRegistry::run_all`], with cases spread over
    /// the Rayon pool. Results come back in registration order.
    pub fn run_all_parallel(&mut self, filter: &TagFilter) -> Vec<TestResult> {
        let selected = self.selected(filter);

        let results: Vec<TestResult> = {
            let registry = &*self;
            selected
                .par_iter()
                .map(|&idx| run_with_factory(registry.case_at(idx), registry.factory()))
                .collect()
        };

        for (&idx, result) in selected.iter().zip(&results) {
            self.record(idx, result.clone());
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{AssertionFailure, RunStatus, Step, TestCase};

    struct Steps(u64);

    impl Simulation for Steps {
        fn advance_tick(&mut self) {
            self.0 += 1;
        }
    }

    fn reaches(target: u64) -> TestCase<Steps> {
        TestCase::new(
            "parallel",
            format!("reaches_{}", target),
            vec![Step::assert_eventually(move |sut: &Steps| {
                if sut.0 >= target {
                    Ok(())
                } else {
                    Err(AssertionFailure::new(format!("at {}", sut.0)))
                }
            })],
        )
        .timeout(50)
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut registry = TestRegistry::new(|_: &TestCase<Steps>| Ok(Steps(0)));
        for target in [30, 5, 80, 12] {
            registry.register(reaches(target)).unwrap();
        }

        let parallel = registry.run_all_parallel(&TagFilter::all());
        let sequential = registry.run_all(&TagFilter::all());
        assert_eq!(parallel, sequential);

        let statuses: Vec<_> = parallel.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            [
                RunStatus::Succeeded,
                RunStatus::Succeeded,
                RunStatus::TimedOut,
                RunStatus::Succeeded
            ]
        );
        assert_eq!(parallel[0].elapsed_ticks, 30);
        assert_eq!(parallel[2].elapsed_ticks, 50);
    }
}
