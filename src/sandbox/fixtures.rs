//! Pre-authored fixtures a test's world is built from

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use super::components::{MAX_SIGNAL, Position, SandboxPhysics, Velocity};
use super::world::SandboxWorld;
use crate::error::ScenarioError;
use crate::harness::DEFAULT_FIXTURE;

/// Entity placed by a fixture or a scenario's setup
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityDef {
    Item {
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
    Body {
        id: String,
        x: f32,
        y: f32,
        #[serde(default)]
        velocity_x: f32,
        #[serde(default)]
        velocity_y: f32,
    },
    Collector {
        id: String,
        x: f32,
        y: f32,
        #[serde(default = "default_radius")]
        radius: f32,
    },
    Source {
        cell: i32,
        #[serde(default = "default_level")]
        level: u8,
        /// Pulse length; absent means always on
        #[serde(default)]
        ticks: Option<u32>,
        #[serde(default)]
        id: Option<String>,
    },
}

fn default_count() -> u32 {
    1
}

fn default_radius() -> f32 {
    1.0
}

pub(crate) fn default_level() -> u8 {
    MAX_SIGNAL
}

impl EntityDef {
    /// Spawn into `world`
    pub fn spawn(&self, world: &mut SandboxWorld) {
        match self {
            EntityDef::Item {
                kind,
                count,
                x,
                y,
                velocity_x,
                velocity_y,
                id,
            } => {
                world.spawn_item(
                    kind,
                    *count,
                    Position { x: *x, y: *y },
                    Velocity {
                        x: *velocity_x,
                        y: *velocity_y,
                    },
                    id.as_deref(),
                );
            }
            EntityDef::Body {
                id,
                x,
                y,
                velocity_x,
                velocity_y,
            } => {
                world.spawn_body(
                    id,
                    Position { x: *x, y: *y },
                    Velocity {
                        x: *velocity_x,
                        y: *velocity_y,
                    },
                );
            }
            EntityDef::Collector { id, x, y, radius } => {
                world.spawn_collector(id, Position { x: *x, y: *y }, *radius);
            }
            EntityDef::Source {
                cell,
                level,
                ticks,
                id,
            } => {
                world.add_source(*cell, *level, *ticks, id.as_deref());
            }
        }
    }
}

/// A named starting world
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fixture {
    pub name: String,
    #[serde(default)]
    pub floor_y: f32,
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    #[serde(default = "default_friction")]
    pub friction: f32,
    #[serde(default)]
    pub jitter: f32,
    /// Cells that carry signal
    #[serde(default)]
    pub wire: Vec<i32>,
    #[serde(default)]
    pub entities: Vec<EntityDef>,
}

fn default_gravity() -> f32 {
    SandboxPhysics::default().gravity
}

fn default_friction() -> f32 {
    SandboxPhysics::default().friction
}

impl Fixture {
    /// Flat floor at zero, nothing placed
    pub fn empty() -> Self {
        let physics = SandboxPhysics::default();
        Self {
            name: DEFAULT_FIXTURE.to_string(),
            floor_y: physics.floor_y,
            gravity: physics.gravity,
            friction: physics.friction,
            jitter: physics.jitter,
            wire: Vec::new(),
            entities: Vec::new(),
        }
    }

    pub fn physics(&self) -> SandboxPhysics {
        SandboxPhysics {
            floor_y: self.floor_y,
            gravity: self.gravity,
            friction: self.friction,
            jitter: self.jitter,
        }
    }

    /// Build a fresh world from this fixture
    pub fn build(&self, seed: u64) -> SandboxWorld {
        let mut world = SandboxWorld::new(self.physics(), seed);
        world.add_wire(self.wire.iter().copied());
        for entity in &self.entities {
            entity.spawn(&mut world);
        }
        world
    }
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default, rename = "fixture")]
    fixtures: Vec<Fixture>,
}

/// All known fixtures, looked up by name
#[derive(Debug, Clone)]
pub struct FixtureLibrary {
    fixtures: Vec<Fixture>,
}

impl Default for FixtureLibrary {
    fn default() -> Self {
        Self {
            fixtures: vec![Fixture::empty()],
        }
    }
}

impl FixtureLibrary {
    /// Parse `[[fixture]]` tables; the built-in `empty` fixture is kept
    /// unless the file redefines it
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ScenarioError> {
        let file: FixtureFile = toml::from_str(content).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut library = Self::default();
        for fixture in file.fixtures {
            library.insert(fixture);
        }
        Ok(library)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let library = Self::from_toml_str(&content, path)?;
        info!("Loaded {} fixtures from {}", library.len(), path.display());
        Ok(library)
    }

    /// Load `path` if it exists, otherwise only the built-in fixtures
    pub fn load_or_default(path: &Path) -> Result<Self, ScenarioError> {
        if !path.exists() {
            warn!("No fixtures file at {}, using built-in fixtures", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Add or replace a fixture by name
    pub fn insert(&mut self, fixture: Fixture) {
        match self.fixtures.iter_mut().find(|f| f.name == fixture.name) {
            Some(existing) => *existing = fixture,
            None => self.fixtures.push(fixture),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Fixture> {
        self.fixtures.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.fixtures.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Build the named fixture, or explain which fixtures exist
    pub fn build(&self, name: &str, seed: u64) -> Result<SandboxWorld, String> {
        let fixture = self.get(name).ok_or_else(|| {
            format!("Fixture '{}' not found. Available: {:?}", name, self.names())
        })?;
        Ok(fixture.build(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURES: &str = r#"
[[fixture]]
name = "hopper_pit"
floor_y = -2.0
wire = [0, 1, 2]

[[fixture.entities]]
type = "collector"
id = "hopper"
x = 0.0
y = -2.0
radius = 1.5

[[fixture.entities]]
type = "source"
cell = 0
ticks = 4
"#;

    #[test]
    fn test_parse_fixtures() {
        let library = FixtureLibrary::from_toml_str(FIXTURES, Path::new("fixtures.toml")).unwrap();
        assert_eq!(library.names(), ["empty", "hopper_pit"]);

        let pit = library.get("hopper_pit").unwrap();
        assert_eq!(pit.floor_y, -2.0);
        assert_eq!(pit.gravity, 0.5);
        assert_eq!(
            pit.entities[1],
            EntityDef::Source {
                cell: 0,
                level: 15,
                ticks: Some(4),
                id: None
            }
        );
    }

    #[test]
    fn test_build_places_entities() {
        let library = FixtureLibrary::from_toml_str(FIXTURES, Path::new("fixtures.toml")).unwrap();
        let world = library.build("hopper_pit", 1).unwrap();
        let hopper = world.snapshot().collector("hopper").unwrap();
        assert_eq!(hopper.y, -2.0);
        assert_eq!(world.physics().floor_y, -2.0);
    }

    #[test]
    fn test_unknown_fixture_lists_available() {
        let library = FixtureLibrary::default();
        let err = library.build("castle", 0).err().unwrap();
        assert!(err.contains("castle"));
        assert!(err.contains("empty"));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = FixtureLibrary::from_toml_str("[[fixture]]\nfloor_y = 1", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ScenarioError::Parse { .. }));
    }
}
