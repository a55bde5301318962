//! Identifier and position indices over loaded entities.

use crate::blocks::BlockPos;
use bevy_ecs::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

/// Persistent identifier -> loaded entity.
#[derive(Resource, Debug, Default)]
pub struct EntityIndex {
    by_id: HashMap<Uuid, Entity>,
}

impl EntityIndex {
    pub fn insert(&mut self, id: Uuid, entity: Entity) -> Option<Entity> {
        self.by_id.insert(id, entity)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Entity> {
        self.by_id.remove(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<Entity> {
        self.by_id.get(&id).copied()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Block position -> loaded block entity (hearts).
#[derive(Resource, Debug, Default)]
pub struct BlockEntities {
    by_pos: HashMap<BlockPos, Entity>,
}

impl BlockEntities {
    pub fn insert(&mut self, pos: BlockPos, entity: Entity) -> Option<Entity> {
        self.by_pos.insert(pos, entity)
    }

    pub fn remove(&mut self, pos: BlockPos) -> Option<Entity> {
        self.by_pos.remove(&pos)
    }

    pub fn get(&self, pos: BlockPos) -> Option<Entity> {
        self.by_pos.get(&pos).copied()
    }

    /// Loaded positions in a stable order.
    pub fn positions(&self) -> Vec<BlockPos> {
        let mut positions: Vec<_> = self.by_pos.keys().copied().collect();
        positions.sort_by_key(|p| (p.x, p.y, p.z));
        positions
    }

    pub fn len(&self) -> usize {
        self.by_pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pos.is_empty()
    }
}
