//! Scenario files: TOML-declared test cases run against the sandbox world
//!
//! Layout: `tests/scenarios/<suite>/<name>.toml`. Each file is parsed,
//! its checks are compiled, and the result is registered as a
//! [`TestCase`](crate::harness::TestCase) whose SUT is built from a fixture.

pub mod build;
pub mod checks;
pub mod discover;
pub mod parser;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub use build::{LoadedScenario, ROOT_SUITE, ScenarioDefaults, WorldSetup};
pub use checks::{Check, Target};
pub use discover::discover_scenarios;
pub use parser::{Command, ScenarioDefinition, StepDef, parse_scenario_file};

use crate::error::{ConfigError, ScenarioError};
use crate::harness::{TestCase, TestRegistry};
use crate::sandbox::{FixtureLibrary, SandboxWorld};

/// Default scenarios directory
pub const SCENARIOS_DIR: &str = "tests/scenarios";

/// Parse and build one scenario file
pub fn load_scenario(
    base: &Path,
    path: &Path,
    defaults: ScenarioDefaults,
) -> Result<LoadedScenario, ScenarioError> {
    parse_scenario_file(path)?.into_scenario(base, path, defaults)
}

/// A file that could not become a registered test
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: ScenarioError,
}

/// Everything loaded from a scenarios directory
pub struct LoadedSuite {
    pub scenarios: Vec<(PathBuf, LoadedScenario)>,
    pub failures: Vec<LoadFailure>,
}

/// Discover and load every scenario under `base`. Broken files are
/// collected as failures instead of aborting the load.
pub fn load_dir(base: &Path, filter: Option<&str>, defaults: ScenarioDefaults) -> LoadedSuite {
    let mut suite = LoadedSuite {
        scenarios: Vec::new(),
        failures: Vec::new(),
    };

    for path in discover_scenarios(base, filter) {
        match load_scenario(base, &path, defaults) {
            Ok(scenario) => {
                debug!("Loaded {} from {}", scenario.case.id(), path.display());
                suite.scenarios.push((path, scenario));
            }
            Err(error) => {
                warn!("Skipping {}: {}", path.display(), error);
                suite.failures.push(LoadFailure { path, error });
            }
        }
    }
    suite
}

/// Builds sandbox worlds: the case's fixture plus its own setup entities
pub struct SandboxFactory {
    fixtures: FixtureLibrary,
    setups: HashMap<String, WorldSetup>,
}

impl SandboxFactory {
    pub fn new(fixtures: FixtureLibrary) -> Self {
        Self {
            fixtures,
            setups: HashMap::new(),
        }
    }

    /// Attach setup to the case with id `suite/name`
    pub fn add_setup(&mut self, case_id: String, setup: WorldSetup) {
        self.setups.insert(case_id, setup);
    }

    pub fn build(&self, case: &TestCase<SandboxWorld>) -> Result<SandboxWorld, String> {
        let setup = self.setups.get(&case.id());
        let seed = setup.map(|s| s.seed).unwrap_or(0);
        let mut world = self.fixtures.build(&case.fixture, seed)?;
        for entity in setup.iter().flat_map(|s| &s.entities) {
            entity.spawn(&mut world);
        }
        Ok(world)
    }
}

/// Register loaded scenarios with a registry that builds worlds from
/// `fixtures`. Cases the registry would reject become load failures, and
/// only accepted cases contribute their setup.
pub fn build_registry(
    fixtures: FixtureLibrary,
    scenarios: Vec<(PathBuf, LoadedScenario)>,
) -> (TestRegistry<SandboxWorld>, Vec<LoadFailure>) {
    let mut factory = SandboxFactory::new(fixtures);
    let mut accepted = Vec::with_capacity(scenarios.len());
    let mut failures = Vec::new();
    let mut seen = HashSet::new();

    // The factory is sealed into the registry, so screen cases first
    for (path, scenario) in scenarios {
        let case = scenario.case;
        let checked = case.validate().and_then(|()| {
            if seen.insert(case.id()) {
                Ok(())
            } else {
                Err(ConfigError::Duplicate {
                    suite: case.suite.clone(),
                    name: case.name.clone(),
                })
            }
        });
        match checked {
            Ok(()) => {
                factory.add_setup(case.id(), scenario.setup);
                accepted.push((path, case));
            }
            Err(error) => reject(&mut failures, path, error),
        }
    }

    let mut registry = TestRegistry::new(move |case: &TestCase<SandboxWorld>| factory.build(case));
    for (path, case) in accepted {
        if let Err(error) = registry.register(case) {
            reject(&mut failures, path, error);
        }
    }
    (registry, failures)
}

fn reject(failures: &mut Vec<LoadFailure>, path: PathBuf, error: ConfigError) {
    warn!("Not registering {}: {}", path.display(), error);
    failures.push(LoadFailure {
        path,
        error: error.into(),
    });
}
