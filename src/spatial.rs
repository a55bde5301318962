//! Spatial partitioning for viewer queries.
//!
//! Viewers are bucketed on the horizontal plane; queries use full 3D distance.
//! The grid is rebuilt at the start of every tick, so systems that run later in
//! the same tick see positions as of that tick's start.

use crate::components::{Health, Player, Position};
use bevy_ecs::prelude::*;
use glam::Vec3;
use std::collections::HashMap;

/// Grid of viewer positions.
#[derive(Resource, Debug)]
pub struct ViewerGrid {
    /// Cell size in blocks.
    pub cell_size: f32,
    cells: HashMap<(i32, i32), Vec<ViewerEntry>>,
    count: usize,
}

/// Entry in a grid cell.
#[derive(Debug, Clone, Copy)]
pub struct ViewerEntry {
    pub entity: Entity,
    pub pos: Vec3,
}

impl Default for ViewerGrid {
    fn default() -> Self {
        Self::new(16.0)
    }
}

impl ViewerGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            count: 0,
        }
    }

    #[inline]
    pub fn world_to_cell(&self, x: f32, z: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (z / self.cell_size).floor() as i32,
        )
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.count = 0;
    }

    pub fn insert(&mut self, entity: Entity, pos: Vec3) {
        let cell = self.world_to_cell(pos.x, pos.z);
        self.cells.entry(cell).or_default().push(ViewerEntry { entity, pos });
        self.count += 1;
    }

    /// Viewers within `radius` of `center`, closest first.
    pub fn query_radius(&self, center: Vec3, radius: f32) -> Vec<ViewerEntry> {
        let radius_sq = radius * radius;
        let reach = (radius / self.cell_size).ceil() as i32 + 1;
        let (cx, cz) = self.world_to_cell(center.x, center.z);

        let mut results: Vec<ViewerEntry> = Vec::new();
        for dx in -reach..=reach {
            for dz in -reach..=reach {
                if let Some(entries) = self.cells.get(&(cx + dx, cz + dz)) {
                    results.extend(
                        entries
                            .iter()
                            .filter(|e| e.pos.distance_squared(center) <= radius_sq),
                    );
                }
            }
        }

        results.sort_by(|a, b| {
            a.pos
                .distance_squared(center)
                .total_cmp(&b.pos.distance_squared(center))
                .then_with(|| a.entity.cmp(&b.entity))
        });
        results
    }

    /// Whether any viewer is within `radius` of `center`.
    pub fn any_within(&self, center: Vec3, radius: f32) -> bool {
        !self.query_radius(center, radius).is_empty()
    }

    pub fn total_count(&self) -> usize {
        self.count
    }
}

/// Rebuilds the viewer grid from living, non-spectator players.
pub fn viewer_grid_update_system(
    mut grid: ResMut<ViewerGrid>,
    query: Query<(Entity, &Position, &Player, &Health)>,
) {
    grid.clear();

    for (entity, pos, player, health) in query.iter() {
        if player.is_spectator() || !health.is_alive() {
            continue;
        }
        grid.insert(entity, pos.as_vec3());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_radius_sorted_by_distance() {
        let mut grid = ViewerGrid::new(10.0);
        let near = Entity::from_raw(1);
        let far = Entity::from_raw(2);
        let outside = Entity::from_raw(3);

        grid.insert(far, Vec3::new(20.0, 0.0, 0.0));
        grid.insert(near, Vec3::new(3.0, 0.0, 0.0));
        grid.insert(outside, Vec3::new(100.0, 0.0, 100.0));

        let found = grid.query_radius(Vec3::ZERO, 25.0);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].entity, near);
        assert_eq!(found[1].entity, far);
    }

    #[test]
    fn test_vertical_distance_counts() {
        let mut grid = ViewerGrid::new(10.0);
        grid.insert(Entity::from_raw(1), Vec3::new(0.0, 40.0, 0.0));
        assert!(!grid.any_within(Vec3::ZERO, 32.0));
        assert!(grid.any_within(Vec3::ZERO, 40.0));
    }

    #[test]
    fn test_update_system_skips_spectators() {
        use crate::components::GameMode;

        let mut world = World::new();
        world.insert_resource(ViewerGrid::default());
        world.spawn((Position::new(0.0, 0.0, 0.0), Player::default(), Health::new(20.0)));
        let mut spectator = Player::default();
        spectator.mode = GameMode::Spectator;
        world.spawn((Position::new(1.0, 0.0, 0.0), spectator, Health::new(20.0)));

        let mut schedule = Schedule::default();
        schedule.add_systems(viewer_grid_update_system);
        schedule.run(&mut world);

        assert_eq!(world.resource::<ViewerGrid>().total_count(), 1);
    }
}
