//! Sequence runner: the per-test state machine driven once per tick

use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use super::assertions::AssertionFailure;
use super::case::{FailurePolicy, TestBody, TestCase};
use super::result::{FailureInfo, RunStatus, TestResult};
use super::step::{Action, Predicate, Step};
use crate::clock::TickClock;

/// Reason recorded when a run hits its timeout
pub const DEADLINE_REASON: &str = "deadline exceeded";

/// Mutable progress of one executing test
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub clock: TickClock,
    /// Index of the current step; only ever moves forward
    pub step_index: usize,
    /// Ticks spent on the current step (idle progress, retry count)
    pub step_ticks: u64,
    pub status: RunStatus,
    /// Terminal failure, set once
    pub failure: Option<AssertionFailure>,
    /// Most recent failure of a retrying assertion
    pub pending: Option<AssertionFailure>,
    /// Failures recorded under [`FailurePolicy::CollectAll`]
    pub collected: Vec<AssertionFailure>,
}

/// Walks a [`TestCase`] one tick at a time.
///
/// Each call to [`SequenceRunner::on_tick`] does at most one unit of work
/// (one idle tick, one action, or one predicate evaluation), then resolves
/// any `Succeed`/`Fail` steps that follow without spending another tick.
pub struct SequenceRunner<'a, S> {
    case: &'a TestCase<S>,
    state: RunState,
}

impl<'a, S> SequenceRunner<'a, S> {
    pub fn new(case: &'a TestCase<S>) -> Self {
        Self {
            case,
            state: RunState::default(),
        }
    }

    pub fn case(&self) -> &TestCase<S> {
        self.case
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn status(&self) -> RunStatus {
        self.state.status
    }

    pub fn is_running(&self) -> bool {
        self.state.status == RunStatus::Running
    }

    pub fn elapsed(&self) -> u64 {
        self.state.clock.elapsed()
    }

    pub fn failure(&self) -> Option<&AssertionFailure> {
        self.state.failure.as_ref()
    }

    /// Advance the run by one tick. No-op once the run is terminal.
    pub fn on_tick(&mut self, sut: &mut S) -> RunStatus {
        if self.state.status.is_terminal() {
            return self.state.status;
        }

        let tick = self.state.clock.advance();
        let case = self.case;
        match &case.body {
            TestBody::Steps(steps) => self.step_sequence(steps, sut, tick),
            TestBody::SucceedWhen(predicate) => self.poll(predicate, sut, tick),
        }

        if self.is_running() && tick >= case.timeout {
            debug!("{} reached its {} tick deadline", case.id(), case.timeout);
            self.state.status = RunStatus::TimedOut;
            self.state.failure = Some(AssertionFailure::new(DEADLINE_REASON).at_tick(tick));
        }

        self.state.status
    }

    /// End the run as failed from outside, e.g. when the SUT itself broke
    pub fn abort(&mut self, reason: impl Into<String>) {
        if self.is_running() {
            let tick = self.elapsed();
            self.fail(AssertionFailure::new(reason).at_tick(tick));
        }
    }

    /// Final record for this run
    pub fn into_result(self) -> TestResult {
        let failure = match self.state.status {
            RunStatus::Succeeded | RunStatus::Running => None,
            RunStatus::Failed | RunStatus::TimedOut => {
                self.state.failure.as_ref().map(|failure| FailureInfo {
                    reason: failure.reason(),
                    tick: failure.tick,
                    detail: match self.state.status {
                        RunStatus::TimedOut => self.state.pending.as_ref().map(|p| p.reason()),
                        _ => None,
                    },
                })
            }
        };

        TestResult {
            suite: self.case.suite.clone(),
            name: self.case.name.clone(),
            status: self.state.status,
            elapsed_ticks: self.state.clock.elapsed(),
            failure,
        }
    }

    fn step_sequence(&mut self, steps: &[Step<S>], sut: &mut S, tick: u64) {
        if let Some(step) = steps.get(self.state.step_index) {
            if !step.is_instant() {
                self.work(step, sut, tick);
            }
        }

        while self.is_running() {
            match steps.get(self.state.step_index) {
                None | Some(Step::Succeed) => self.finish(tick),
                Some(Step::Fail(reason)) => {
                    self.fail(AssertionFailure::new(reason.clone()).at_tick(tick))
                }
                Some(_) => break,
            }
        }
    }

    fn work(&mut self, step: &Step<S>, sut: &mut S, tick: u64) {
        self.state.step_ticks += 1;

        match step {
            Step::Idle(ticks) => {
                if self.state.step_ticks >= *ticks {
                    self.advance(step, tick);
                }
            }
            Step::Execute(action) => match execute(action, sut) {
                Ok(()) => self.advance(step, tick),
                Err(message) => self.fail(AssertionFailure::new(message).at_tick(tick)),
            },
            Step::Assert {
                predicate,
                retry,
                within,
            } => match evaluate(predicate, sut) {
                Ok(Ok(())) => self.advance(step, tick),
                Ok(Err(failure)) => {
                    let failure = failure.at_tick(tick);
                    let exhausted = match within {
                        Some(limit) => self.state.step_ticks >= *limit,
                        None => false,
                    };
                    if *retry && !exhausted {
                        debug!(
                            "{} step #{} retrying at tick {}: {}",
                            self.case.id(),
                            self.state.step_index,
                            tick,
                            failure.message
                        );
                        self.state.pending = Some(failure);
                    } else {
                        self.assertion_failed(step, failure, tick);
                    }
                }
                Err(message) => self.fail(AssertionFailure::new(message).at_tick(tick)),
            },
            Step::Succeed | Step::Fail(_) => {}
        }
    }

    fn poll(&mut self, predicate: &Predicate<S>, sut: &mut S, tick: u64) {
        self.state.step_ticks += 1;
        match evaluate(predicate, sut) {
            Ok(Ok(())) => {
                self.state.pending = None;
                self.state.status = RunStatus::Succeeded;
            }
            Ok(Err(failure)) => self.state.pending = Some(failure.at_tick(tick)),
            Err(message) => self.fail(AssertionFailure::new(message).at_tick(tick)),
        }
    }

    fn assertion_failed(&mut self, step: &Step<S>, failure: AssertionFailure, tick: u64) {
        match self.case.policy {
            FailurePolicy::ShortCircuit => self.fail(failure),
            FailurePolicy::CollectAll => {
                debug!(
                    "{} recorded failure at tick {}: {}",
                    self.case.id(),
                    tick,
                    failure.message
                );
                self.state.collected.push(failure);
                self.advance(step, tick);
            }
        }
    }

    fn advance(&mut self, step: &Step<S>, tick: u64) {
        debug!(
            "{} step #{} ({}) done at tick {}",
            self.case.id(),
            self.state.step_index,
            step.kind(),
            tick
        );
        self.state.step_index += 1;
        self.state.step_ticks = 0;
        self.state.pending = None;
    }

    /// Sequence reached `Succeed` or ran out of steps
    fn finish(&mut self, tick: u64) {
        if self.state.collected.is_empty() {
            self.state.status = RunStatus::Succeeded;
            return;
        }
        let first = self.state.collected[0].tick;
        let reason = join_reasons(&self.state.collected);
        debug!("{} finished at tick {} with recorded failures", self.case.id(), tick);
        self.state.status = RunStatus::Failed;
        self.state.failure = Some(AssertionFailure::new(reason).at_tick(first));
    }

    fn fail(&mut self, failure: AssertionFailure) {
        self.state.status = RunStatus::Failed;
        if self.state.collected.is_empty() {
            self.state.failure = Some(failure);
            return;
        }
        let first = self.state.collected[0].tick;
        self.state.collected.push(failure);
        let reason = join_reasons(&self.state.collected);
        self.state.failure = Some(AssertionFailure::new(reason).at_tick(first));
    }
}

fn join_reasons(failures: &[AssertionFailure]) -> String {
    failures
        .iter()
        .map(AssertionFailure::reason)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Run an action, turning errors and panics into a failure message
fn execute<S>(action: &Action<S>, sut: &mut S) -> Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(|| action(sut))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.message),
        Err(payload) => Err(format!("action panicked: {}", panic_message(&*payload))),
    }
}

/// Evaluate a predicate; the outer error is a panic message
fn evaluate<S>(
    predicate: &Predicate<S>,
    sut: &S,
) -> Result<Result<(), AssertionFailure>, String> {
    panic::catch_unwind(AssertUnwindSafe(|| predicate(sut)))
        .map_err(|payload| format!("predicate panicked: {}", panic_message(&*payload)))
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
