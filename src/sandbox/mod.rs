//! Sandbox world used as the system under test
//!
//! A headless bevy ECS world with falling item stacks, collectors that
//! swallow nearby items, and a one-dimensional signal wire. One
//! `App::update` is one tick.

pub mod components;
pub mod fixtures;
pub mod systems;
pub mod world;

pub use components::{
    Collector, Grounded, Item, MAX_SIGNAL, Position, SandboxPhysics, SignalGrid, SignalSource,
    TestEntityId, Velocity,
};
pub use fixtures::{EntityDef, Fixture, FixtureLibrary};
pub use world::{BodyState, CollectorState, ItemState, SandboxWorld, WorldSnapshot};

/// Default path for the fixture library
pub const FIXTURES_FILE: &str = "config/fixtures.toml";
