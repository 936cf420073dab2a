//! TOML scenario file parsing

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ScenarioError;
use crate::harness::{ActionError, FailurePolicy};
use crate::sandbox::fixtures::default_level;
use crate::sandbox::{EntityDef, SandboxWorld};

/// Complete scenario definition from a TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioDefinition {
    /// Defaults to the file stem
    pub name: Option<String>,
    /// Defaults to the directory the file sits in
    pub suite: Option<String>,
    pub description: Option<String>,
    pub fixture: Option<String>,
    pub timeout: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub policy: FailurePolicy,
    pub seed: Option<u64>,
    #[serde(default)]
    pub setup: ScenarioSetup,
    pub steps: Option<Vec<StepDef>>,
    pub succeed_when: Option<Vec<String>>,
}

/// Entities spawned on top of the fixture before the first tick
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioSetup {
    #[serde(default)]
    pub entities: Vec<EntityDef>,
}

/// One `[[steps]]` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDef {
    Execute {
        command: Command,
    },
    Idle {
        ticks: u64,
    },
    Assert {
        checks: Vec<String>,
        /// Defaults to retrying when `within` is set
        #[serde(default)]
        retry: Option<bool>,
        /// Per-step bound; only meaningful for retrying asserts
        #[serde(default)]
        within: Option<u64>,
    },
    Succeed,
    Fail {
        reason: String,
    },
}

/// World mutation run by an `execute` step
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SpawnItem {
        kind: String,
        #[serde(default = "default_count")]
        count: u32,
        x: f32,
        y: f32,
        #[serde(default)]
        velocity_x: f32,
        #[serde(default)]
        velocity_y: f32,
        #[serde(default)]
        id: Option<String>,
    },
    SpawnBody {
        id: String,
        x: f32,
        y: f32,
        #[serde(default)]
        velocity_x: f32,
        #[serde(default)]
        velocity_y: f32,
    },
    SpawnCollector {
        id: String,
        x: f32,
        y: f32,
        #[serde(default = "default_radius")]
        radius: f32,
    },
    /// Power `cell` for `ticks` ticks
    Pulse {
        cell: i32,
        #[serde(default = "default_level")]
        level: u8,
        ticks: u32,
    },
    /// Power `cell` until unpowered
    Power {
        cell: i32,
        #[serde(default = "default_level")]
        level: u8,
    },
    Unpower {
        cell: i32,
    },
    Despawn {
        id: String,
    },
    SetVelocity {
        id: String,
        x: f32,
        y: f32,
    },
}

fn default_count() -> u32 {
    1
}

fn default_radius() -> f32 {
    1.0
}

impl Command {
    pub fn apply(&self, world: &mut SandboxWorld) -> Result<(), ActionError> {
        match self {
            Command::SpawnItem {
                kind,
                count,
                x,
                y,
                velocity_x,
                velocity_y,
                id,
            } => EntityDef::Item {
                kind: kind.clone(),
                count: *count,
                x: *x,
                y: *y,
                velocity_x: *velocity_x,
                velocity_y: *velocity_y,
                id: id.clone(),
            }
            .spawn(world),
            Command::SpawnBody {
                id,
                x,
                y,
                velocity_x,
                velocity_y,
            } => EntityDef::Body {
                id: id.clone(),
                x: *x,
                y: *y,
                velocity_x: *velocity_x,
                velocity_y: *velocity_y,
            }
            .spawn(world),
            Command::SpawnCollector { id, x, y, radius } => EntityDef::Collector {
                id: id.clone(),
                x: *x,
                y: *y,
                radius: *radius,
            }
            .spawn(world),
            Command::Pulse { cell, level, ticks } => {
                if *ticks == 0 {
                    return Err(ActionError::new(format!("pulse on cell {} lasts zero ticks", cell)));
                }
                world.add_source(*cell, *level, Some(*ticks), None);
            }
            Command::Power { cell, level } => {
                world.add_source(*cell, *level, None, None);
            }
            Command::Unpower { cell } => {
                if world.remove_sources(*cell) == 0 {
                    return Err(ActionError::new(format!("nothing powers cell {}", cell)));
                }
            }
            Command::Despawn { id } => world.despawn(id)?,
            Command::SetVelocity { id, x, y } => world.set_velocity(id, *x, *y)?,
        }
        Ok(())
    }
}

impl ScenarioDefinition {
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ScenarioError> {
        toml::from_str(content).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Parse a scenario file from path
pub fn parse_scenario_file(path: &Path) -> Result<ScenarioDefinition, ScenarioError> {
    let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ScenarioDefinition::from_toml_str(&content, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::Simulation;
    use crate::sandbox::SandboxPhysics;

    #[test]
    fn test_parse_basic() {
        let toml = r#"
fixture = "flat_floor"
policy = "collect_all"
tags = ["smoke"]

[[setup.entities]]
type = "collector"
id = "hopper"
x = 0.0
y = 0.0

[[steps]]
type = "execute"
command = { type = "spawn_item", kind = "apple", x = 0.0, y = 4.0 }

[[steps]]
type = "assert"
checks = ["hopper.collected = 1"]
within = 10

[[steps]]
type = "succeed"
"#;
        let def = ScenarioDefinition::from_toml_str(toml, Path::new("basic.toml")).unwrap();
        assert_eq!(def.name, None);
        assert_eq!(def.fixture.as_deref(), Some("flat_floor"));
        assert_eq!(def.policy, FailurePolicy::CollectAll);
        assert_eq!(def.setup.entities.len(), 1);

        let steps = def.steps.unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(
            steps[0],
            StepDef::Execute {
                command: Command::SpawnItem {
                    kind: "apple".to_string(),
                    count: 1,
                    x: 0.0,
                    y: 4.0,
                    velocity_x: 0.0,
                    velocity_y: 0.0,
                    id: None
                }
            }
        );
        assert_eq!(
            steps[1],
            StepDef::Assert {
                checks: vec!["hopper.collected = 1".to_string()],
                retry: None,
                within: Some(10)
            }
        );
        assert_eq!(steps[2], StepDef::Succeed);
    }

    #[test]
    fn test_unknown_step_type_is_parse_error() {
        let toml = r#"
[[steps]]
type = "teleport"
"#;
        let err = ScenarioDefinition::from_toml_str(toml, Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ScenarioError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = parse_scenario_file(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, ScenarioError::Io { .. }));
    }

    #[test]
    fn test_commands_apply() {
        let mut world = SandboxWorld::new(SandboxPhysics::default(), 0);
        world.add_wire(0..3);

        Command::Power { cell: 0, level: 15 }.apply(&mut world).unwrap();
        world.advance_tick();
        world.advance_tick();
        assert_eq!(world.snapshot().signal_level(1), 14);

        Command::Unpower { cell: 0 }.apply(&mut world).unwrap();
        assert!(Command::Unpower { cell: 0 }.apply(&mut world).is_err());

        let err = Command::Despawn {
            id: "ghost".to_string(),
        }
        .apply(&mut world)
        .unwrap_err();
        assert!(err.message.contains("ghost"));
    }
}
