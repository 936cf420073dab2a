//! Sandbox world: a headless bevy `App` stepped one update per tick

use std::collections::{BTreeMap, HashMap};

use bevy::prelude::*;

use super::components::*;
use super::systems::{
    apply_gravity, apply_velocity, collect_items, count_tick, floor_collision, propagate_signal,
};
use crate::harness::Simulation;

/// Plain copy of an item stack
#[derive(Debug, Clone, PartialEq)]
pub struct ItemState {
    pub kind: String,
    pub count: u32,
    pub x: f32,
    pub y: f32,
    pub id: Option<String>,
}

/// Plain copy of a labelled moving entity
#[derive(Debug, Clone, PartialEq)]
pub struct BodyState {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub grounded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorState {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub collected: u32,
    pub by_kind: BTreeMap<String, u32>,
}

/// Read-only view of the world taken after every tick and action.
/// Predicates only ever see this.
#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub items: Vec<ItemState>,
    pub bodies: HashMap<String, BodyState>,
    pub collectors: HashMap<String, CollectorState>,
    pub signals: BTreeMap<i32, u8>,
}

impl WorldSnapshot {
    /// Total items, optionally of one kind
    pub fn items_count(&self, kind: Option<&str>) -> u64 {
        self.items
            .iter()
            .filter(|item| kind.is_none_or(|k| item.kind == k))
            .map(|item| item.count as u64)
            .sum()
    }

    /// Items within `radius` of (x, y), optionally of one kind
    pub fn items_within(&self, x: f32, y: f32, radius: f32, kind: Option<&str>) -> u64 {
        self.items
            .iter()
            .filter(|item| kind.is_none_or(|k| item.kind == k))
            .filter(|item| {
                let dx = item.x - x;
                let dy = item.y - y;
                (dx * dx + dy * dy).sqrt() <= radius
            })
            .map(|item| item.count as u64)
            .sum()
    }

    pub fn body(&self, id: &str) -> Option<&BodyState> {
        self.bodies.get(id)
    }

    pub fn collector(&self, id: &str) -> Option<&CollectorState> {
        self.collectors.get(id)
    }

    pub fn signal_level(&self, cell: i32) -> u8 {
        self.signals.get(&cell).copied().unwrap_or(0)
    }
}

/// The sandbox simulation
pub struct SandboxWorld {
    app: App,
    snapshot: WorldSnapshot,
}

impl SandboxWorld {
    pub fn new(physics: SandboxPhysics, seed: u64) -> Self {
        let mut app = App::new();

        app.insert_resource(physics);
        app.insert_resource(SandboxRng::seeded(seed));
        app.init_resource::<SignalGrid>();
        app.init_resource::<SandboxTick>();

        app.add_systems(
            Update,
            (
                count_tick,
                apply_gravity,
                apply_velocity,
                floor_collision,
                collect_items,
                propagate_signal,
            )
                .chain(),
        );

        let mut world = Self {
            app,
            snapshot: WorldSnapshot::default(),
        };
        world.refresh();
        world
    }

    pub fn snapshot(&self) -> &WorldSnapshot {
        &self.snapshot
    }

    pub fn tick(&self) -> u64 {
        self.snapshot.tick
    }

    pub fn physics(&self) -> SandboxPhysics {
        *self.app.world().resource::<SandboxPhysics>()
    }

    pub fn spawn_item(
        &mut self,
        kind: &str,
        count: u32,
        position: Position,
        velocity: Velocity,
        id: Option<&str>,
    ) -> Entity {
        let mut entity = self.app.world_mut().spawn((
            position,
            velocity,
            Grounded(false),
            Item {
                kind: kind.to_string(),
                count,
            },
        ));
        if let Some(id) = id {
            entity.insert(TestEntityId(id.to_string()));
        }
        let entity = entity.id();
        self.refresh();
        entity
    }

    /// Labelled body affected by physics but never collected
    pub fn spawn_body(&mut self, id: &str, position: Position, velocity: Velocity) -> Entity {
        let entity = self
            .app
            .world_mut()
            .spawn((
                position,
                velocity,
                Grounded(false),
                TestEntityId(id.to_string()),
            ))
            .id();
        self.refresh();
        entity
    }

    pub fn spawn_collector(&mut self, id: &str, position: Position, radius: f32) -> Entity {
        let entity = self
            .app
            .world_mut()
            .spawn((position, Collector::new(radius), TestEntityId(id.to_string())))
            .id();
        self.refresh();
        entity
    }

    /// Signal source at `cell`; `ticks = None` keeps it powered
    pub fn add_source(&mut self, cell: i32, level: u8, ticks: Option<u32>, id: Option<&str>) -> Entity {
        let mut entity = self
            .app
            .world_mut()
            .spawn(SignalSource::new(cell, level, ticks));
        if let Some(id) = id {
            entity.insert(TestEntityId(id.to_string()));
        }
        let entity = entity.id();
        self.refresh();
        entity
    }

    /// Remove every source at `cell`, returning how many were removed
    pub fn remove_sources(&mut self, cell: i32) -> usize {
        let world = self.app.world_mut();
        let doomed: Vec<Entity> = world
            .query::<(Entity, &SignalSource)>()
            .iter(world)
            .filter(|(_, source)| source.cell == cell)
            .map(|(entity, _)| entity)
            .collect();
        for entity in &doomed {
            world.despawn(*entity);
        }
        self.refresh();
        doomed.len()
    }

    pub fn add_wire(&mut self, cells: impl IntoIterator<Item = i32>) {
        self.app
            .world_mut()
            .resource_mut::<SignalGrid>()
            .wire
            .extend(cells);
    }

    pub fn find(&mut self, id: &str) -> Option<Entity> {
        let world = self.app.world_mut();
        world
            .query::<(Entity, &TestEntityId)>()
            .iter(world)
            .find(|(_, test_id)| test_id.0 == id)
            .map(|(entity, _)| entity)
    }

    pub fn despawn(&mut self, id: &str) -> Result<(), String> {
        let entity = self
            .find(id)
            .ok_or_else(|| format!("Entity '{}' not found", id))?;
        self.app.world_mut().despawn(entity);
        self.refresh();
        Ok(())
    }

    pub fn set_velocity(&mut self, id: &str, x: f32, y: f32) -> Result<(), String> {
        let entity = self
            .find(id)
            .ok_or_else(|| format!("Entity '{}' not found", id))?;
        let world = self.app.world_mut();
        let mut velocity = world
            .get_mut::<Velocity>(entity)
            .ok_or_else(|| format!("Entity '{}' cannot move", id))?;
        velocity.x = x;
        velocity.y = y;
        if y > 0.0 {
            if let Some(mut grounded) = world.get_mut::<Grounded>(entity) {
                grounded.0 = false;
            }
        }
        self.refresh();
        Ok(())
    }

    /// Re-extract the snapshot predicates read
    fn refresh(&mut self) {
        self.snapshot = extract_snapshot(self.app.world_mut());
    }
}

impl Simulation for SandboxWorld {
    fn advance_tick(&mut self) {
        self.app.update();
        self.refresh();
    }
}

/// Copy world state into a [`WorldSnapshot`]
fn extract_snapshot(world: &mut World) -> WorldSnapshot {
    let tick = world.resource::<SandboxTick>().0;
    let signals = world.resource::<SignalGrid>().levels.clone();

    let mut item_query = world.query::<(&Position, &Item, Option<&TestEntityId>)>();
    let items = item_query
        .iter(world)
        .map(|(position, item, id)| ItemState {
            kind: item.kind.clone(),
            count: item.count,
            x: position.x,
            y: position.y,
            id: id.map(|id| id.0.clone()),
        })
        .collect();

    let mut body_query = world.query::<(&Position, &Velocity, &Grounded, &TestEntityId)>();
    let bodies = body_query
        .iter(world)
        .map(|(position, velocity, grounded, id)| {
            (
                id.0.clone(),
                BodyState {
                    x: position.x,
                    y: position.y,
                    velocity_x: velocity.x,
                    velocity_y: velocity.y,
                    grounded: grounded.0,
                },
            )
        })
        .collect();

    let mut collector_query = world.query::<(&Position, &Collector, &TestEntityId)>();
    let collectors = collector_query
        .iter(world)
        .map(|(position, collector, id)| {
            (
                id.0.clone(),
                CollectorState {
                    x: position.x,
                    y: position.y,
                    radius: collector.radius,
                    collected: collector.collected,
                    by_kind: collector.by_kind.clone(),
                },
            )
        })
        .collect();

    WorldSnapshot {
        tick,
        items,
        bodies,
        collectors,
        signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> SandboxWorld {
        SandboxWorld::new(SandboxPhysics::default(), 0)
    }

    fn at(x: f32, y: f32) -> Position {
        Position { x, y }
    }

    #[test]
    fn test_item_falls_and_settles() {
        let mut world = world();
        world.spawn_item("apple", 1, at(3.0, 4.0), Velocity::default(), Some("apple"));

        // 0.5, 1.0, 1.5, 2.0 per tick: y goes 3.5, 2.5, 1.0, -1.0 -> floor
        for _ in 0..3 {
            world.advance_tick();
        }
        let body = world.snapshot().body("apple").unwrap();
        assert_eq!(body.y, 1.0);
        assert!(!body.grounded);

        world.advance_tick();
        let body = world.snapshot().body("apple").unwrap();
        assert_eq!(body.y, 0.0);
        assert!(body.grounded);
        assert_eq!(world.tick(), 4);
    }

    #[test]
    fn test_collector_swallows_items_in_range() {
        let mut world = world();
        world.spawn_collector("hopper", at(0.0, 0.0), 1.5);
        world.spawn_item("apple", 2, at(0.0, 4.0), Velocity::default(), None);
        world.spawn_item("stone", 1, at(10.0, 0.0), Velocity::default(), None);
        assert_eq!(world.snapshot().items_count(None), 3);

        for _ in 0..3 {
            world.advance_tick();
        }
        let hopper = world.snapshot().collector("hopper").unwrap();
        assert_eq!(hopper.collected, 2);
        assert_eq!(hopper.by_kind.get("apple"), Some(&2));
        assert_eq!(world.snapshot().items_count(Some("apple")), 0);
        assert_eq!(world.snapshot().items_within(10.0, 0.0, 1.0, None), 1);
    }

    #[test]
    fn test_pulse_travels_and_expires() {
        let mut world = world();
        world.add_wire(0..=5);
        world.add_source(0, 15, Some(3), None);

        world.advance_tick();
        assert_eq!(world.snapshot().signal_level(0), 15);
        assert_eq!(world.snapshot().signal_level(1), 0);

        world.advance_tick();
        world.advance_tick();
        assert_eq!(world.snapshot().signal_level(2), 13);

        world.advance_tick();
        assert_eq!(world.snapshot().signal_level(0), 0);
        assert_eq!(world.snapshot().signal_level(2), 0);
    }

    #[test]
    fn test_remove_and_despawn() {
        let mut world = world();
        world.add_source(2, 10, None, Some("lever"));
        assert_eq!(world.remove_sources(2), 1);
        assert_eq!(world.remove_sources(2), 0);

        world.spawn_body("crate", at(0.0, 0.0), Velocity::default());
        assert!(world.despawn("crate").is_ok());
        assert!(world.despawn("crate").is_err());
        assert!(world.set_velocity("crate", 1.0, 0.0).is_err());
    }

    #[test]
    fn test_set_velocity_launches_body() {
        let mut world = world();
        world.spawn_body("ball", at(0.0, 0.0), Velocity::default());
        world.advance_tick();
        assert!(world.snapshot().body("ball").unwrap().grounded);

        // Gravity applies on the launch tick: 2.0 - 0.5
        world.set_velocity("ball", 0.0, 2.0).unwrap();
        world.advance_tick();
        let ball = world.snapshot().body("ball").unwrap();
        assert_eq!(ball.y, 1.5);
        assert!(!ball.grounded);
    }
}
