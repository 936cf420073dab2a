//! Per-tick sandbox systems, run in order once per `App::update`

use std::collections::BTreeMap;

use bevy::prelude::*;
use rand::Rng;

use super::components::*;

/// Count simulated ticks
pub fn count_tick(mut tick: ResMut<SandboxTick>) {
    tick.0 += 1;
}

/// Pull airborne bodies down, nudging them sideways when the fixture jitters
pub fn apply_gravity(
    physics: Res<SandboxPhysics>,
    mut rng: ResMut<SandboxRng>,
    mut bodies: Query<(&mut Velocity, &Grounded)>,
) {
    for (mut velocity, grounded) in &mut bodies {
        if grounded.0 {
            continue;
        }
        velocity.y -= physics.gravity;
        if physics.jitter > 0.0 {
            velocity.x += rng.0.gen_range(-physics.jitter..=physics.jitter);
        }
    }
}

pub fn apply_velocity(mut bodies: Query<(&mut Position, &Velocity)>) {
    for (mut position, velocity) in &mut bodies {
        position.x += velocity.x;
        position.y += velocity.y;
    }
}

/// Snap bodies to the floor and bleed horizontal speed while on it
pub fn floor_collision(
    physics: Res<SandboxPhysics>,
    mut bodies: Query<(&mut Position, &mut Velocity, &mut Grounded)>,
) {
    for (mut position, mut velocity, mut grounded) in &mut bodies {
        if position.y > physics.floor_y {
            grounded.0 = false;
            continue;
        }
        position.y = physics.floor_y;
        velocity.y = velocity.y.max(0.0);
        velocity.x *= physics.friction;
        if velocity.x.abs() < 0.01 {
            velocity.x = 0.0;
        }
        grounded.0 = velocity.y <= 0.0;
    }
}

/// Collectors swallow any item inside their radius
pub fn collect_items(
    mut commands: Commands,
    items: Query<(Entity, &Position, &Item)>,
    mut collectors: Query<(&Position, &mut Collector)>,
) {
    for (entity, item_pos, item) in &items {
        for (collector_pos, mut collector) in &mut collectors {
            let dx = item_pos.x - collector_pos.x;
            let dy = item_pos.y - collector_pos.y;
            if (dx * dx + dy * dy).sqrt() > collector.radius {
                continue;
            }
            collector.collected += item.count;
            *collector.by_kind.entry(item.kind.clone()).or_default() += item.count;
            commands.entity(entity).despawn();
            break;
        }
    }
}

/// Recompute signal levels from active sources.
///
/// A source reaches one more wire cell per tick it has been active, losing
/// one level per cell. Expired sources are removed after emitting.
pub fn propagate_signal(
    mut commands: Commands,
    mut grid: ResMut<SignalGrid>,
    mut sources: Query<(Entity, &mut SignalSource)>,
) {
    let mut levels: BTreeMap<i32, u8> = BTreeMap::new();

    for (entity, mut source) in &mut sources {
        source.age += 1;
        emit(&grid, &source, &mut levels);

        if let Some(remaining) = source.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                commands.entity(entity).despawn();
            }
        }
    }

    grid.levels = levels;
}

fn emit(grid: &SignalGrid, source: &SignalSource, levels: &mut BTreeMap<i32, u8>) {
    raise(levels, source.cell, source.level);

    for direction in [-1, 1] {
        let mut distance: u32 = 1;
        while distance < source.age {
            let level = source.level.saturating_sub(distance.min(u8::MAX as u32) as u8);
            let cell = source.cell + direction * distance as i32;
            if level == 0 || !grid.wire.contains(&cell) {
                break;
            }
            raise(levels, cell, level);
            distance += 1;
        }
    }
}

fn raise(levels: &mut BTreeMap<i32, u8>, cell: i32, level: u8) {
    if level == 0 {
        return;
    }
    let entry = levels.entry(cell).or_insert(0);
    *entry = (*entry).max(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(wire: impl IntoIterator<Item = i32>) -> SignalGrid {
        SignalGrid {
            wire: wire.into_iter().collect(),
            levels: BTreeMap::new(),
        }
    }

    #[test]
    fn test_emit_front_grows_with_age() {
        let grid = grid(0..10);
        let mut source = SignalSource::new(0, 15, None);

        source.age = 1;
        let mut levels = BTreeMap::new();
        emit(&grid, &source, &mut levels);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[&0], 15);

        source.age = 4;
        let mut levels = BTreeMap::new();
        emit(&grid, &source, &mut levels);
        assert_eq!(levels[&3], 12);
        assert!(!levels.contains_key(&4));
    }

    #[test]
    fn test_emit_stops_at_wire_gap_and_decay() {
        let grid = grid([1, 2, 4]);
        let mut source = SignalSource::new(0, 2, None);
        source.age = 10;
        let mut levels = BTreeMap::new();
        emit(&grid, &source, &mut levels);
        assert_eq!(levels.get(&1), Some(&1));
        // Level hits zero before cell 2, and cell 3 is not wire anyway
        assert_eq!(levels.get(&2), None);
        assert_eq!(levels.get(&4), None);
        assert_eq!(levels.get(&-1), None);
    }
}
