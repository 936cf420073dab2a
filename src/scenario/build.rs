//! Turn a parsed scenario into a registered test case

use std::path::Path;

use tracing::warn;

use super::checks::{all_hold, parse_checks};
use super::discover::relative;
use super::parser::{ScenarioDefinition, StepDef};
use crate::error::ScenarioError;
use crate::harness::{DEFAULT_FIXTURE, Step, TestBody, TestCase};
use crate::sandbox::{EntityDef, SandboxWorld};

/// Suite used for files sitting directly in the scenarios directory
pub const ROOT_SUITE: &str = "default";

/// Values a scenario falls back to when it leaves them out
#[derive(Debug, Clone, Copy)]
pub struct ScenarioDefaults {
    pub timeout: u64,
}

/// World setup a case needs beyond its fixture
#[derive(Debug, Clone, Default)]
pub struct WorldSetup {
    pub seed: u64,
    pub entities: Vec<EntityDef>,
}

/// A scenario ready to register
pub struct LoadedScenario {
    pub case: TestCase<SandboxWorld>,
    pub setup: WorldSetup,
    pub description: Option<String>,
}

impl ScenarioDefinition {
    /// Build the test case for the file at `path` under `base`
    pub fn into_scenario(
        self,
        base: &Path,
        path: &Path,
        defaults: ScenarioDefaults,
    ) -> Result<LoadedScenario, ScenarioError> {
        let name = self.name.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        });
        let suite = self.suite.unwrap_or_else(|| suite_for(base, path));

        let body = match (self.steps, self.succeed_when) {
            (Some(_), Some(_)) => return Err(ScenarioError::AmbiguousBody { name }),
            (None, None) => return Err(ScenarioError::MissingBody { name }),
            (Some(steps), None) => TestBody::Steps(
                steps
                    .into_iter()
                    .map(build_step)
                    .collect::<Result<_, _>>()?,
            ),
            (None, Some(checks)) => {
                let checks = parse_checks(&checks)?;
                TestBody::SucceedWhen(Box::new(move |world: &SandboxWorld| {
                    all_hold(&checks, world.snapshot())
                }))
            }
        };

        let case = TestCase::with_body(suite, name, body)
            .timeout(self.timeout.unwrap_or(defaults.timeout))
            .fixture(self.fixture.unwrap_or_else(|| DEFAULT_FIXTURE.to_string()))
            .tags(self.tags)
            .policy(self.policy);

        Ok(LoadedScenario {
            case,
            setup: WorldSetup {
                seed: self.seed.unwrap_or(0),
                entities: self.setup.entities,
            },
            description: self.description,
        })
    }
}

/// Directory of `path` relative to `base`
fn suite_for(base: &Path, path: &Path) -> String {
    let rel = relative(base, path);
    match rel.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => ROOT_SUITE.to_string(),
    }
}

fn build_step(def: StepDef) -> Result<Step<SandboxWorld>, ScenarioError> {
    let step = match def {
        StepDef::Execute { command } => {
            Step::execute(move |world: &mut SandboxWorld| command.apply(world))
        }
        StepDef::Idle { ticks } => Step::idle(ticks),
        StepDef::Assert {
            checks,
            retry,
            within,
        } => {
            let checks = parse_checks(&checks)?;
            let retry = retry.unwrap_or(within.is_some());
            if !retry && within.is_some() {
                warn!("`within` has no effect on an assert with retry = false");
            }
            Step::Assert {
                predicate: Box::new(move |world: &SandboxWorld| {
                    all_hold(&checks, world.snapshot())
                }),
                retry,
                within: within.filter(|_| retry),
            }
        }
        StepDef::Succeed => Step::succeed(),
        StepDef::Fail { reason } => Step::fail(reason),
    };
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{FailurePolicy, RunStatus, run_test};
    use crate::sandbox::SandboxPhysics;

    const DEFAULTS: ScenarioDefaults = ScenarioDefaults { timeout: 100 };

    fn load(toml: &str, path: &str) -> Result<LoadedScenario, ScenarioError> {
        let path = Path::new("scenarios").join(path);
        ScenarioDefinition::from_toml_str(toml, &path)?.into_scenario(
            Path::new("scenarios"),
            &path,
            DEFAULTS,
        )
    }

    #[test]
    fn test_names_default_from_path() {
        let loaded = load(
            "succeed_when = [\"items.count = 0\"]",
            "signals/quiet.toml",
        )
        .unwrap();
        assert_eq!(loaded.case.id(), "signals/quiet");
        assert_eq!(loaded.case.timeout, 100);
        assert_eq!(loaded.case.fixture, "empty");
        assert_eq!(loaded.case.policy, FailurePolicy::ShortCircuit);
        assert!(matches!(loaded.case.body, TestBody::SucceedWhen(_)));

        let loaded = load("succeed_when = [\"items.count = 0\"]", "top.toml").unwrap();
        assert_eq!(loaded.case.suite, ROOT_SUITE);
    }

    #[test]
    fn test_explicit_fields_win() {
        let toml = r#"
name = "custom"
suite = "elsewhere"
timeout = 7
seed = 42
tags = ["slow"]

[[steps]]
type = "assert"
checks = ["signal.0 = 0"]
retry = true

[[steps]]
type = "succeed"
"#;
        let loaded = load(toml, "items/file.toml").unwrap();
        assert_eq!(loaded.case.id(), "elsewhere/custom");
        assert_eq!(loaded.case.timeout, 7);
        assert!(loaded.case.has_tag("slow"));
        assert_eq!(loaded.setup.seed, 42);

        let TestBody::Steps(steps) = &loaded.case.body else {
            panic!("expected steps");
        };
        assert!(matches!(
            steps[0],
            Step::Assert {
                retry: true,
                within: None,
                ..
            }
        ));
    }

    #[test]
    fn test_body_must_be_exactly_one() {
        let both = r#"
succeed_when = ["items.count = 0"]
[[steps]]
type = "succeed"
"#;
        assert!(matches!(
            load(both, "a/b.toml"),
            Err(ScenarioError::AmbiguousBody { .. })
        ));
        assert!(matches!(
            load("tags = []", "a/b.toml"),
            Err(ScenarioError::MissingBody { .. })
        ));
    }

    #[test]
    fn test_bad_check_rejected_at_load() {
        let toml = r#"
[[steps]]
type = "assert"
checks = ["hopper.colour = red"]
"#;
        assert!(matches!(
            load(toml, "a/b.toml"),
            Err(ScenarioError::InvalidCheck { .. })
        ));
    }

    fn first_assert(loaded: &LoadedScenario) -> (bool, Option<u64>) {
        match &loaded.case.body {
            TestBody::Steps(steps) => match &steps[0] {
                Step::Assert { retry, within, .. } => (*retry, *within),
                other => panic!("expected an assert, got {:?}", other),
            },
            TestBody::SucceedWhen(_) => panic!("expected steps"),
        }
    }

    fn run_on_empty_world(loaded: &LoadedScenario) -> crate::harness::TestResult {
        run_test(&loaded.case, SandboxWorld::new(SandboxPhysics::default(), 0))
    }

    #[test]
    fn test_no_retry_with_within_fails_on_first_tick() {
        let toml = r#"
[[steps]]
type = "assert"
checks = ["items.count = 1"]
retry = false
within = 5
"#;
        let loaded = load(toml, "items/once.toml").unwrap();
        assert_eq!(first_assert(&loaded), (false, None));

        let result = run_on_empty_world(&loaded);
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.elapsed_ticks, 1);
        assert_eq!(result.failure.unwrap().tick, 1);
    }

    #[test]
    fn test_within_alone_retries_until_bound() {
        let toml = r#"
[[steps]]
type = "assert"
checks = ["items.count = 1"]
within = 5
"#;
        let loaded = load(toml, "items/bounded.toml").unwrap();
        assert_eq!(first_assert(&loaded), (true, Some(5)));

        let result = run_on_empty_world(&loaded);
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.elapsed_ticks, 5);
    }
}
