//! Persistence documents and serialization utilities.
//!
//! A heart persists only the identifier of its puppet (`creaking`), a puppet
//! only the position of its heart (`home_pos`). Either side can be loaded
//! first; the heart's weak reference bridges the gap.

use crate::blocks::{BlockGrid, BlockPos, Material};
use crate::components::*;
use crate::environment::Environment;
use crate::index::{BlockEntities, EntityIndex};
use crate::weak_ref::WeakRef;
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifiers stored as four big-endian `i32` words.
pub mod int_uuid {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use uuid::Uuid;

    pub fn to_ints(id: Uuid) -> [i32; 4] {
        let (msb, lsb) = id.as_u64_pair();
        [(msb >> 32) as i32, msb as i32, (lsb >> 32) as i32, lsb as i32]
    }

    pub fn from_ints(ints: [i32; 4]) -> Uuid {
        let word = |hi: i32, lo: i32| ((hi as u32 as u64) << 32) | lo as u32 as u64;
        Uuid::from_u64_pair(word(ints[0], ints[1]), word(ints[2], ints[3]))
    }

    pub fn serialize<S: Serializer>(id: &Uuid, serializer: S) -> Result<S::Ok, S::Error> {
        to_ints(*id).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Uuid, D::Error> {
        <[i32; 4]>::deserialize(deserializer).map(from_ints)
    }

    pub mod option {
        use super::{from_ints, to_ints};
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use uuid::Uuid;

        pub fn serialize<S: Serializer>(id: &Option<Uuid>, serializer: S) -> Result<S::Ok, S::Error> {
            id.map(to_ints).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Uuid>, D::Error> {
            Ok(Option::<[i32; 4]>::deserialize(deserializer)?.map(from_ints))
        }
    }
}

/// Persisted form of a heart block entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartDocument {
    pub pos: BlockPos,
    /// Bound puppet; absent when none is bound or the binding was forgotten.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "int_uuid::option")]
    pub creaking: Option<Uuid>,
}

/// Persisted form of a puppet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuppetDocument {
    #[serde(rename = "UUID", with = "int_uuid")]
    pub uuid: Uuid,
    pub pos: Position,
    pub health: f32,
    /// Owning heart; absent for a free creaking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_pos: Option<BlockPos>,
    #[serde(default)]
    pub persistent: bool,
}

/// Everything needed to rebuild a world.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSave {
    pub tick: u64,
    pub environment: Option<Environment>,
    pub blocks: Vec<(BlockPos, Material)>,
    pub hearts: Vec<HeartDocument>,
    pub puppets: Vec<PuppetDocument>,
}

pub fn save_heart(world: &World, entity: Entity) -> Option<HeartDocument> {
    let heart = world.get::<Heart>(entity)?;
    Some(HeartDocument {
        pos: heart.pos,
        creaking: heart.puppet.as_ref().and_then(WeakRef::id),
    })
}

/// Spawn a heart block entity from its document. The binding starts
/// unresolved and is looked up by identifier on the next tick.
pub fn load_heart(world: &mut World, doc: &HeartDocument, grace: u32) -> Entity {
    let mut heart = Heart::new(doc.pos);
    heart.puppet = doc.creaking.map(|id| WeakRef::from_id(id).with_grace(grace));
    let entity = world.spawn(heart).id();
    world.resource_mut::<BlockEntities>().insert(doc.pos, entity);
    entity
}

pub fn save_puppet(world: &World, entity: Entity) -> Option<PuppetDocument> {
    let puppet = world.get::<Puppet>(entity)?;
    Some(PuppetDocument {
        uuid: world.get::<EntityUuid>(entity)?.0,
        pos: *world.get::<Position>(entity)?,
        health: world.get::<Health>(entity)?.current,
        home_pos: puppet.home,
        persistent: world.get::<Persistent>(entity).is_some(),
    })
}

pub fn load_puppet(world: &mut World, doc: &PuppetDocument, max_health: f32) -> Entity {
    let mut bundle = PuppetBundle::new(doc.uuid, doc.pos, max_health);
    bundle.health.current = doc.health.clamp(0.0, max_health);
    let entity = world.spawn(bundle).id();
    if doc.persistent {
        world.entity_mut(entity).insert(Persistent);
    }
    if let Some(home) = doc.home_pos {
        super::puppet::init_home(world, entity, home);
    }
    world.resource_mut::<EntityIndex>().insert(doc.uuid, entity);
    entity
}

/// Capture blocks, environment, hearts and puppets.
pub fn capture_world(world: &mut World, tick: u64) -> WorldSave {
    let mut blocks: Vec<_> = world.resource::<BlockGrid>().iter().collect();
    blocks.sort_by_key(|(pos, _)| (pos.x, pos.y, pos.z));

    let hearts = {
        let index = world.resource::<BlockEntities>();
        index
            .positions()
            .into_iter()
            .filter_map(|pos| index.get(pos))
            .filter_map(|entity| save_heart(world, entity))
            .collect()
    };

    let mut query = world.query_filtered::<Entity, With<Puppet>>();
    let entities: Vec<Entity> = query.iter(world).collect();
    let mut puppets: Vec<PuppetDocument> = entities
        .into_iter()
        .filter_map(|entity| save_puppet(world, entity))
        .collect();
    puppets.sort_by_key(|doc| doc.uuid);

    WorldSave {
        tick,
        environment: world.get_resource::<Environment>().cloned(),
        blocks,
        hearts,
        puppets,
    }
}

/// Load a save into a world that already has its resources installed.
pub fn restore_world(world: &mut World, save: &WorldSave, grace: u32, max_health: f32) {
    {
        let mut grid = world.resource_mut::<BlockGrid>();
        for (pos, material) in &save.blocks {
            grid.set(*pos, *material);
        }
    }
    if let Some(env) = &save.environment {
        world.insert_resource(env.clone());
    }
    for doc in &save.hearts {
        load_heart(world, doc, grace);
    }
    for doc in &save.puppets {
        load_puppet(world, doc, max_health);
    }
}

/// Serialize a snapshot to JSON bytes.
pub fn snapshot_to_json(snapshot: &Snapshot) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(snapshot)
}

/// Deserialize a snapshot from a JSON string.
pub fn snapshot_from_json_string(data: &str) -> Result<Snapshot, serde_json::Error> {
    serde_json::from_str(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::world::init_resources;

    #[test]
    fn test_uuid_int_words() {
        let id = Uuid::from_u128(0x0123_4567_89ab_cdef_fedc_ba98_7654_3210);
        let ints = int_uuid::to_ints(id);
        assert_eq!(ints[0], 0x0123_4567);
        assert_eq!(ints[1], 0x89ab_cdef_u32 as i32);
        assert_eq!(int_uuid::from_ints(ints), id);
    }

    #[test]
    fn test_heart_document_keys() {
        let bound = HeartDocument {
            pos: BlockPos::new(1, 2, 3),
            creaking: Some(Uuid::from_u128(1)),
        };
        let json = serde_json::to_value(&bound).unwrap();
        assert_eq!(json["creaking"], serde_json::json!([0, 0, 0, 1]));

        let unbound = HeartDocument {
            pos: BlockPos::new(1, 2, 3),
            creaking: None,
        };
        let json = serde_json::to_string(&unbound).unwrap();
        assert!(!json.contains("creaking"));
        let back: HeartDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unbound);
    }

    #[test]
    fn test_puppet_document_home_pos() {
        let doc: PuppetDocument = serde_json::from_str(
            r#"{ "UUID": [0, 0, 0, 7], "pos": { "x": 1.0, "y": 2.0, "z": 3.0 },
                 "health": 1.0, "home_pos": [4, 5, 6] }"#,
        )
        .unwrap();
        assert_eq!(doc.uuid, Uuid::from_u128(7));
        assert_eq!(doc.home_pos, Some(BlockPos::new(4, 5, 6)));
        assert!(!doc.persistent);
    }

    #[test]
    fn test_cleared_binding_is_not_saved() {
        let mut world = World::new();
        init_resources(&mut world, &SimConfig::default());
        let doc = HeartDocument {
            pos: BlockPos::new(0, 1, 0),
            creaking: Some(Uuid::from_u128(3)),
        };
        let entity = load_heart(&mut world, &doc, 1);
        assert_eq!(save_heart(&world, entity), Some(doc.clone()));

        // Grace of one: the first failed lookup forgets the puppet.
        let mut heart = world.get::<Heart>(entity).unwrap().clone();
        assert_eq!(super::super::heart::resolve_puppet(&world, &mut heart), None);
        *world.get_mut::<Heart>(entity).unwrap() = heart;
        assert_eq!(save_heart(&world, entity).unwrap().creaking, None);
    }

    #[test]
    fn test_loaded_puppet_is_indexed_and_homed() {
        let mut world = World::new();
        init_resources(&mut world, &SimConfig::default());
        let doc = PuppetDocument {
            uuid: Uuid::from_u128(8),
            pos: Position::new(0.5, 0.0, 0.5),
            health: 1.0,
            home_pos: Some(BlockPos::new(0, 1, 0)),
            persistent: true,
        };
        let entity = load_puppet(&mut world, &doc, 1.0);
        assert_eq!(world.resource::<EntityIndex>().get(doc.uuid), Some(entity));
        assert_eq!(world.get::<Puppet>(entity).unwrap().home, doc.home_pos);
        assert_eq!(save_puppet(&world, entity), Some(doc));
    }
}
