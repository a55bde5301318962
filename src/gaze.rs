//! Gaze detection: is a viewer looking straight at a target.

use crate::blocks::BlockGrid;
use glam::Vec3;

/// Parameters of a gaze test.
#[derive(Debug, Clone, Copy)]
pub struct GazeCheck {
    /// The look/direction dot product must exceed `1 - tolerance`.
    pub tolerance: f32,
    /// Divide the tolerance by the distance, tightening the cone far away.
    pub scale_by_distance: bool,
    /// Require an unobstructed voxel sight line.
    pub require_line_of_sight: bool,
}

impl GazeCheck {
    pub fn new(tolerance: f32) -> Self {
        Self {
            tolerance,
            scale_by_distance: false,
            require_line_of_sight: true,
        }
    }
}

/// Candidate heights on the target: eyes, just above the feet, and midway.
pub fn sample_heights(feet_y: f32, eye_y: f32) -> [f32; 3] {
    [eye_y, feet_y + 0.5, (eye_y + feet_y) / 2.0]
}

/// Whether the viewer at `viewer_eye`, looking along `look`, gazes at any of
/// the sample `heights` on the vertical line through `target`.
pub fn is_gazing(
    grid: &BlockGrid,
    viewer_eye: Vec3,
    look: Vec3,
    target: Vec3,
    heights: &[f32],
    check: GazeCheck,
) -> bool {
    let look = look.normalize_or_zero();
    heights.iter().any(|&h| {
        let point = Vec3::new(target.x, h, target.z);
        let to_point = point - viewer_eye;
        let distance = to_point.length();
        if distance < 1.0e-6 {
            return false;
        }
        let threshold = if check.scale_by_distance {
            1.0 - check.tolerance / distance
        } else {
            1.0 - check.tolerance
        };
        look.dot(to_point / distance) > threshold
            && (!check.require_line_of_sight || grid.line_of_sight(viewer_eye, point))
    })
}
