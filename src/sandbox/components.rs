//! Components and resources of the sandbox world

use std::collections::{BTreeMap, BTreeSet};

use bevy::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// World position
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

/// On the floor (no gravity applied)
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Grounded(pub bool);

/// Name a test refers to an entity by
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct TestEntityId(pub String);

/// A stack of items lying in the world
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub kind: String,
    pub count: u32,
}

/// Pulls in items within `radius` (hopper)
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Collector {
    pub radius: f32,
    pub collected: u32,
    /// Collected counts per item kind
    pub by_kind: BTreeMap<String, u32>,
}

impl Collector {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            collected: 0,
            by_kind: BTreeMap::new(),
        }
    }
}

/// Emits a signal into a cell, optionally for a limited number of ticks
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSource {
    pub cell: i32,
    pub level: u8,
    /// Ticks left before the source expires; `None` is permanent
    pub remaining: Option<u32>,
    /// Ticks emitted so far; the signal front reaches `age - 1` cells out
    pub age: u32,
}

impl SignalSource {
    pub fn new(cell: i32, level: u8, remaining: Option<u32>) -> Self {
        Self {
            cell,
            level: level.min(MAX_SIGNAL),
            remaining,
            age: 0,
        }
    }
}

/// Strongest signal level
pub const MAX_SIGNAL: u8 = 15;

/// Physical constants of the current fixture
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct SandboxPhysics {
    pub floor_y: f32,
    /// Downward acceleration per tick
    pub gravity: f32,
    /// Horizontal speed kept after touching the floor (0-1)
    pub friction: f32,
    /// Max random horizontal nudge per tick for airborne bodies
    pub jitter: f32,
}

impl Default for SandboxPhysics {
    fn default() -> Self {
        Self {
            floor_y: 0.0,
            gravity: 0.5,
            friction: 0.5,
            jitter: 0.0,
        }
    }
}

/// Seeded RNG so jittery worlds still replay identically
#[derive(Resource)]
pub struct SandboxRng(pub StdRng);

impl SandboxRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

/// Signal wire and current levels
#[derive(Resource, Debug, Clone, Default)]
pub struct SignalGrid {
    /// Cells that carry signal to their neighbours
    pub wire: BTreeSet<i32>,
    /// Non-zero levels only
    pub levels: BTreeMap<i32, u8>,
}

impl SignalGrid {
    pub fn level(&self, cell: i32) -> u8 {
        self.levels.get(&cell).copied().unwrap_or(0)
    }
}

/// Ticks simulated so far
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SandboxTick(pub u64);
