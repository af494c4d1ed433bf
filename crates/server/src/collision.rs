//! Collision checks between cells.
//!
//! The world finds candidate pairs through its quadtree; the functions here
//! decide whether a candidate overlaps enough to be eaten.

use glam::Vec2;

/// Player must be 15% larger to eat.
pub const PLAYER_EAT_MULT: f32 = 1.15;
/// Mass = size² / 100.
pub const MASS_CONVERSION: f32 = 100.0;

/// Result of checking collision between two cells.
#[derive(Debug)]
pub struct CollisionResult {
    /// Combined radius of both cells.
    pub r: f32,
    /// Distance X component.
    pub dx: f32,
    /// Distance Y component.
    pub dy: f32,
    /// Actual distance.
    pub d: f32,
}

impl CollisionResult {
    /// Check if cells are actually colliding.
    pub fn is_colliding(&self) -> bool {
        self.d < self.r
    }
}

/// Check collision between two circles.
#[inline]
pub fn check_cell_collision(cell_pos: Vec2, cell_size: f32, check_pos: Vec2, check_size: f32) -> CollisionResult {
    let dx = check_pos.x - cell_pos.x;
    let dy = check_pos.y - cell_pos.y;
    CollisionResult {
        r: cell_size + check_size,
        dx,
        dy,
        d: (dx * dx + dy * dy).sqrt(),
    }
}

/// Whether an eater of `eater_size` may swallow a cell of `target_size`:
/// it must be large enough and cover the target's center by a third of the
/// target's radius.
#[inline]
pub fn can_eat(eater_pos: Vec2, eater_size: f32, target_pos: Vec2, target_size: f32) -> bool {
    if eater_size < target_size * PLAYER_EAT_MULT {
        return false;
    }
    let collision = check_cell_collision(eater_pos, eater_size, target_pos, target_size);
    collision.d < eater_size - target_size / 3.0
}

/// Calculate mass from size.
#[inline]
pub fn size_to_mass(size: f32) -> f32 {
    (size * size) / MASS_CONVERSION
}
