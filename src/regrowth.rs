//! Bounded regrowth search.
//!
//! Starting at a heart, walk outward through connected logs and find a face
//! where a resin clump can be placed or extended. The traversal is
//! breadth-first, visits every position at most once and gives up after a
//! fixed number of accepted visits.

use crate::blocks::{BlockGrid, BlockPos, Direction, Material};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashSet, VecDeque};
use tracing::trace;

/// What a visit callback wants the traversal to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Count the position and expand its neighbours.
    Accept,
    /// Ignore the position; it does not count against the budget.
    Skip,
    /// Halt the traversal.
    Stop,
}

/// Depth and visit budget of a search.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_depth: u32,
    pub max_visits: usize,
}

/// A marker placement found by [`find_regrowth_spot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegrowthSpot {
    pub pos: BlockPos,
    /// Material to write at `pos`.
    pub material: Material,
}

/// Breadth-first traversal from `origin`.
///
/// `expand` lists the neighbours to enqueue for an accepted position; it is
/// only called below `max_depth`. Returns the number of accepted visits.
pub fn bounded_search<R: Rng + ?Sized>(
    origin: BlockPos,
    limits: SearchLimits,
    rng: &mut R,
    mut expand: impl FnMut(BlockPos, &mut R) -> Vec<BlockPos>,
    mut visit: impl FnMut(BlockPos, &mut R) -> Visit,
) -> usize {
    let mut queue = VecDeque::from([(origin, 0u32)]);
    let mut visited = HashSet::new();
    let mut accepted = 0;

    while let Some((pos, depth)) = queue.pop_front() {
        if !visited.insert(pos) {
            continue;
        }
        match visit(pos, &mut *rng) {
            Visit::Skip => continue,
            Visit::Stop => break,
            Visit::Accept => {}
        }
        accepted += 1;
        if accepted >= limits.max_visits {
            return accepted;
        }
        if depth < limits.max_depth {
            queue.extend(expand(pos, &mut *rng).into_iter().map(|next| (next, depth + 1)));
        }
    }
    accepted
}

fn shuffled_directions<R: Rng + ?Sized>(rng: &mut R) -> [Direction; 6] {
    let mut dirs = Direction::ALL;
    dirs.shuffle(rng);
    dirs
}

/// Marker that would result from attaching a clump face to `toward_anchor`
/// at a block currently holding `current`, if that is legal.
pub fn marker_for(current: Material, toward_anchor: Direction) -> Option<Material> {
    let base = match current {
        Material::Air => Material::ResinClump {
            faces: 0,
            waterlogged: false,
        },
        Material::Water { still: true } => Material::ResinClump {
            faces: 0,
            waterlogged: true,
        },
        other => other,
    };
    match base {
        Material::ResinClump { faces, waterlogged } if faces & toward_anchor.face_bit() == 0 => {
            Some(Material::ResinClump {
                faces: faces | toward_anchor.face_bit(),
                waterlogged,
            })
        }
        _ => None,
    }
}

/// Search the logs around `origin` for a face that can take a resin clump.
/// Returns `None` when the budget runs out; the grid is not modified.
pub fn find_regrowth_spot<R: Rng + ?Sized>(
    grid: &BlockGrid,
    origin: BlockPos,
    limits: SearchLimits,
    rng: &mut R,
) -> Option<RegrowthSpot> {
    let mut found = None;

    bounded_search(
        origin,
        limits,
        rng,
        |pos, rng| {
            shuffled_directions(rng)
                .into_iter()
                .map(|dir| pos.offset(dir))
                .filter(|next| grid.is_anchor(*next))
                .collect()
        },
        |pos, rng| {
            if !grid.is_anchor(pos) {
                return Visit::Accept;
            }
            for dir in shuffled_directions(rng) {
                let target = pos.offset(dir);
                if let Some(material) = marker_for(grid.get(target), dir.opposite()) {
                    found = Some(RegrowthSpot {
                        pos: target,
                        material,
                    });
                    return Visit::Stop;
                }
            }
            Visit::Accept
        },
    );

    found
}

/// Find a spot and place the marker. Returns where it was placed.
pub fn grow_resin<R: Rng + ?Sized>(
    grid: &mut BlockGrid,
    origin: BlockPos,
    limits: SearchLimits,
    rng: &mut R,
) -> Option<BlockPos> {
    let spot = find_regrowth_spot(grid, origin, limits, rng)?;
    grid.set(spot.pos, spot.material);
    trace!(pos = %spot.pos, "resin placed");
    Some(spot.pos)
}
