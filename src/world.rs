//! Simulation resources and snapshot types.
//!
//! The `Snapshot` struct is a serializable, read-only view of hearts and
//! puppets for hosts that render or inspect the simulation.

use crate::blocks::{BlockGrid, BlockPos, HeartState};
use crate::components::*;
use crate::config::SimConfig;
use crate::effects::EffectBuffer;
use crate::environment::Environment;
use crate::index::{BlockEntities, EntityIndex};
use crate::random::SimRng;
use crate::spatial::ViewerGrid;
use crate::weak_ref::WeakRef;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of fixed updates run so far.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 += 1;
    }
}

/// Install every resource the systems read.
pub fn init_resources(world: &mut World, config: &SimConfig) {
    world.insert_resource(SimTick::default());
    world.insert_resource(SimRng::seeded(config.seed));
    world.insert_resource(Environment {
        day_time: config.start_day_time,
        ..Default::default()
    });
    world.insert_resource(BlockGrid::new());
    world.insert_resource(BlockEntities::default());
    world.insert_resource(EntityIndex::default());
    world.insert_resource(ViewerGrid::default());
    world.insert_resource(EffectBuffer::default());
    world.insert_resource(config.creaking.clone());
    world.insert_resource(config.clone());
}

/// State of a single heart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartSnapshot {
    pub pos: BlockPos,
    /// `None` if the block at `pos` is no longer a heart.
    pub state: Option<HeartState>,
    pub puppet: Option<Uuid>,
    pub comparator: u8,
    pub trail_timer: u32,
}

/// State of a single puppet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuppetSnapshot {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub health: f32,
    pub home: Option<BlockPos>,
    pub rooted: bool,
    pub active: bool,
    pub crumbling: bool,
    pub glowing_eyes: bool,
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub day_time: u64,
    pub hearts: Vec<HeartSnapshot>,
    pub puppets: Vec<PuppetSnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64) -> Self {
        let day_time = world
            .get_resource::<Environment>()
            .map(|env| env.day_time)
            .unwrap_or(0);

        let hearts = {
            let index = world.resource::<BlockEntities>();
            let grid = world.resource::<BlockGrid>();
            index
                .positions()
                .into_iter()
                .filter_map(|pos| world.get::<Heart>(index.get(pos)?))
                .map(|heart| HeartSnapshot {
                    pos: heart.pos,
                    state: grid.get(heart.pos).heart_state(),
                    puppet: heart.puppet.as_ref().and_then(WeakRef::id),
                    comparator: heart.comparator,
                    trail_timer: heart.trail_timer,
                })
                .collect()
        };

        let mut query = world.query::<(&EntityUuid, &Puppet, &Position, &Health)>();
        let mut puppets: Vec<PuppetSnapshot> = query
            .iter(world)
            .map(|(id, puppet, pos, health)| PuppetSnapshot {
                id: id.0,
                x: pos.x,
                y: pos.y,
                z: pos.z,
                health: health.current,
                home: puppet.home,
                rooted: puppet.rooted,
                active: puppet.active,
                crumbling: puppet.crumbling,
                glowing_eyes: puppet.glowing_eyes,
            })
            .collect();
        puppets.sort_by_key(|p| p.id);

        Self {
            tick,
            day_time,
            hearts,
            puppets,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::serialization::{snapshot_from_json_string, snapshot_to_json};

    #[test]
    fn test_init_resources_uses_config() {
        let mut world = World::new();
        let config = SimConfig {
            start_day_time: 13_000,
            ..Default::default()
        };
        init_resources(&mut world, &config);
        assert!(world.resource::<Environment>().is_creaking_active());
        assert_eq!(world.resource::<SimTick>().0, 0);
        assert!(world.resource::<EffectBuffer>().is_empty());
    }

    #[test]
    fn test_snapshot_lists_puppets() {
        let mut world = World::new();
        init_resources(&mut world, &SimConfig::default());
        let mut bundle = PuppetBundle::new(Uuid::from_u128(4), Position::new(1.0, 2.0, 3.0), 1.0);
        bundle.puppet.rooted = true;
        world.spawn(bundle);

        let snapshot = Snapshot::from_world(&mut world, 9);
        assert_eq!(snapshot.tick, 9);
        assert_eq!(snapshot.puppets.len(), 1);
        assert!(snapshot.puppets[0].rooted);

        let bytes = snapshot_to_json(&snapshot).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let back = snapshot_from_json_string(&text).unwrap();
        assert_eq!(back.puppets[0].id, Uuid::from_u128(4));
    }
}
