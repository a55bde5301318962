//! Block world - a sparse voxel grid with the materials the heart cares about.
//!
//! Hearts are embedded between logs, puppets spawn on sturdy floors, regrowth
//! markers attach to log faces and viewers need clear sight lines. Everything
//! else in the world is treated as `Solid` or `Air`.

use bevy_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Integer block coordinate, persisted as `[x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block containing a world-space point.
    pub fn containing(point: Vec3) -> Self {
        Self::new(
            point.x.floor() as i32,
            point.y.floor() as i32,
            point.z.floor() as i32,
        )
    }

    pub fn offset(self, dir: Direction) -> Self {
        let (dx, dy, dz) = dir.vector();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn up(self, n: i32) -> Self {
        Self::new(self.x, self.y + n, self.z)
    }

    /// Center of the block.
    pub fn center(self) -> Vec3 {
        Vec3::new(self.x as f32 + 0.5, self.y as f32 + 0.5, self.z as f32 + 0.5)
    }

    /// Center of the block's bottom face.
    pub fn bottom_center(self) -> Vec3 {
        Vec3::new(self.x as f32 + 0.5, self.y as f32, self.z as f32 + 0.5)
    }

    /// Minimum corner of the block.
    pub fn corner(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

impl From<[i32; 3]> for BlockPos {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<BlockPos> for [i32; 3] {
    fn from(pos: BlockPos) -> Self {
        [pos.x, pos.y, pos.z]
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six block faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    pub fn vector(self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }

    /// Bit used for this face in a resin clump's face mask.
    pub fn face_bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Orientation of logs and hearts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Axis {
    X,
    #[default]
    Y,
    Z,
}

impl Axis {
    /// The two faces pointing along this axis.
    pub fn directions(self) -> [Direction; 2] {
        match self {
            Axis::X => [Direction::West, Direction::East],
            Axis::Y => [Direction::Down, Direction::Up],
            Axis::Z => [Direction::North, Direction::South],
        }
    }
}

/// Activity state carried by a heart block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HeartState {
    #[default]
    Uprooted,
    Dormant,
    Awake,
}

/// What occupies a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Material {
    #[default]
    Air,
    Water {
        still: bool,
    },
    /// Any opaque, collidable block without special behavior.
    Solid,
    /// Pale oak log: the anchor for hearts and regrowth.
    Log {
        axis: Axis,
    },
    /// Regrowth marker; one bit per face it is attached to.
    ResinClump {
        faces: u8,
        waterlogged: bool,
    },
    Heart {
        axis: Axis,
        state: HeartState,
    },
}

impl Material {
    pub fn is_air(&self) -> bool {
        matches!(self, Material::Air)
    }

    pub fn is_log(&self) -> bool {
        matches!(self, Material::Log { .. })
    }

    /// Whether the material stops a sight line.
    pub fn blocks_sight(&self) -> bool {
        matches!(
            self,
            Material::Solid | Material::Log { .. } | Material::Heart { .. }
        )
    }

    /// Whether a mob's body can occupy this block.
    pub fn is_passable(&self) -> bool {
        matches!(self, Material::Air | Material::ResinClump { .. })
    }

    /// Whether a mob can stand on top of this block.
    pub fn is_sturdy_floor(&self) -> bool {
        matches!(
            self,
            Material::Solid | Material::Log { .. } | Material::Heart { .. }
        )
    }

    pub fn heart_state(&self) -> Option<HeartState> {
        match self {
            Material::Heart { state, .. } => Some(*state),
            _ => None,
        }
    }
}

/// Sparse block storage. Unset positions read as `Air`.
#[derive(Resource, Debug, Clone, Default)]
pub struct BlockGrid {
    blocks: HashMap<BlockPos, Material>,
}

impl BlockGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pos: BlockPos) -> Material {
        self.blocks.get(&pos).copied().unwrap_or_default()
    }

    /// Set a block, returning the previous material.
    pub fn set(&mut self, pos: BlockPos, material: Material) -> Material {
        let previous = if material.is_air() {
            self.blocks.remove(&pos)
        } else {
            self.blocks.insert(pos, material)
        };
        previous.unwrap_or_default()
    }

    /// Fill an inclusive box with one material.
    pub fn fill(&mut self, min: BlockPos, max: BlockPos, material: Material) {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    self.set(BlockPos::new(x, y, z), material);
                }
            }
        }
    }

    /// Number of non-air blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate non-air blocks.
    pub fn iter(&self) -> impl Iterator<Item = (BlockPos, Material)> + '_ {
        self.blocks.iter().map(|(pos, material)| (*pos, *material))
    }

    pub fn is_anchor(&self, pos: BlockPos) -> bool {
        self.get(pos).is_log()
    }

    /// A heart is embedded when both neighbours along its axis are logs
    /// sharing that axis.
    pub fn heart_is_embedded(&self, pos: BlockPos) -> bool {
        let Material::Heart { axis, .. } = self.get(pos) else {
            return false;
        };
        axis.directions().iter().all(|dir| {
            matches!(self.get(pos.offset(*dir)), Material::Log { axis: log_axis } if log_axis == axis)
        })
    }

    /// Walk the voxels between two points (Amanatides-Woo) and report whether
    /// none of them blocks sight.
    pub fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        let delta = to - from;
        let length = delta.length();
        let mut cell = BlockPos::containing(from);
        let end = BlockPos::containing(to);
        if length < 1.0e-6 {
            return !self.get(cell).blocks_sight();
        }
        let dir = delta / length;

        let step = |d: f32| -> i32 {
            if d > 0.0 {
                1
            } else if d < 0.0 {
                -1
            } else {
                0
            }
        };
        let (sx, sy, sz) = (step(dir.x), step(dir.y), step(dir.z));

        let boundary = |c: i32, s: i32| -> f32 {
            if s > 0 {
                (c + 1) as f32
            } else {
                c as f32
            }
        };
        let t_max_axis = |origin: f32, d: f32, c: i32, s: i32| -> f32 {
            if s == 0 {
                f32::INFINITY
            } else {
                (boundary(c, s) - origin) / d
            }
        };
        let t_delta_axis = |d: f32| -> f32 {
            if d == 0.0 {
                f32::INFINITY
            } else {
                (1.0 / d).abs()
            }
        };

        let mut t_max_x = t_max_axis(from.x, dir.x, cell.x, sx);
        let mut t_max_y = t_max_axis(from.y, dir.y, cell.y, sy);
        let mut t_max_z = t_max_axis(from.z, dir.z, cell.z, sz);
        let (t_dx, t_dy, t_dz) = (t_delta_axis(dir.x), t_delta_axis(dir.y), t_delta_axis(dir.z));

        loop {
            if self.get(cell).blocks_sight() {
                return false;
            }
            if cell == end {
                return true;
            }
            if t_max_x < t_max_y && t_max_x < t_max_z {
                if t_max_x > length {
                    return true;
                }
                cell.x += sx;
                t_max_x += t_dx;
            } else if t_max_y < t_max_z {
                if t_max_y > length {
                    return true;
                }
                cell.y += sy;
                t_max_y += t_dy;
            } else {
                if t_max_z > length {
                    return true;
                }
                cell.z += sz;
                t_max_z += t_dz;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_blocks_are_air() {
        let grid = BlockGrid::new();
        assert!(grid.get(BlockPos::new(3, -7, 12)).is_air());
        assert!(grid.is_empty());
    }

    #[test]
    fn test_setting_air_removes_entry() {
        let mut grid = BlockGrid::new();
        let pos = BlockPos::new(0, 0, 0);
        grid.set(pos, Material::Solid);
        assert_eq!(grid.len(), 1);
        let previous = grid.set(pos, Material::Air);
        assert_eq!(previous, Material::Solid);
        assert!(grid.is_empty());
    }

    #[test]
    fn test_heart_embedding_requires_matching_logs() {
        let mut grid = BlockGrid::new();
        let heart = BlockPos::new(0, 5, 0);
        grid.set(heart, Material::Heart { axis: Axis::Y, state: HeartState::Uprooted });
        grid.set(heart.offset(Direction::Down), Material::Log { axis: Axis::Y });
        assert!(!grid.heart_is_embedded(heart));

        grid.set(heart.offset(Direction::Up), Material::Log { axis: Axis::X });
        assert!(!grid.heart_is_embedded(heart), "log axis must match");

        grid.set(heart.offset(Direction::Up), Material::Log { axis: Axis::Y });
        assert!(grid.heart_is_embedded(heart));
    }

    #[test]
    fn test_line_of_sight_blocked_by_wall() {
        let mut grid = BlockGrid::new();
        let from = Vec3::new(0.5, 1.5, 0.5);
        let to = Vec3::new(6.5, 1.5, 0.5);
        assert!(grid.line_of_sight(from, to));

        grid.set(BlockPos::new(3, 1, 0), Material::Solid);
        assert!(!grid.line_of_sight(from, to));
    }

    #[test]
    fn test_line_of_sight_through_water_and_resin() {
        let mut grid = BlockGrid::new();
        grid.set(BlockPos::new(2, 1, 0), Material::Water { still: true });
        grid.set(BlockPos::new(4, 1, 0), Material::ResinClump { faces: 1, waterlogged: false });
        assert!(grid.line_of_sight(Vec3::new(0.5, 1.5, 0.5), Vec3::new(6.5, 1.5, 0.5)));
    }

    #[test]
    fn test_diagonal_sight_line() {
        let mut grid = BlockGrid::new();
        let from = Vec3::new(0.5, 0.5, 0.5);
        let to = Vec3::new(4.5, 4.5, 4.5);
        assert!(grid.line_of_sight(from, to));
        grid.set(BlockPos::new(2, 2, 2), Material::Solid);
        assert!(!grid.line_of_sight(from, to));
    }

    #[test]
    fn test_block_pos_serializes_as_array() {
        let json = serde_json::to_string(&BlockPos::new(1, -2, 3)).unwrap();
        assert_eq!(json, "[1,-2,3]");
        let back: BlockPos = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BlockPos::new(1, -2, 3));
    }
}
