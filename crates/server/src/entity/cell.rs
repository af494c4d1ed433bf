//! Cell type and common functionality.

use crate::collision::size_to_mass;
use crate::spatial::Bounds;
use glam::Vec2;
use rand::Rng;

/// RGB color used for cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Generate a random, reasonably bright color.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self::new(
            rng.random_range(50..=255),
            rng.random_range(50..=255),
            rng.random_range(50..=255),
        )
    }
}

/// Cell type enum matching the wire cellType values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellType {
    /// Player cell (cellType = 0)
    #[default]
    Player = 0,
    /// Food pellet (cellType = 1)
    Food = 1,
}

/// Boost movement data.
#[derive(Debug, Clone, Copy)]
pub struct Boost {
    /// Remaining distance to travel.
    pub distance: f32,
    /// Direction vector (normalized).
    pub direction: Vec2,
}

/// An entity placed in a world.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Unique id within the owning world.
    pub id: u32,
    /// Owning player id (None for food).
    pub owner: Option<u32>,
    pub cell_type: CellType,
    /// Position in world coordinates.
    pub position: Vec2,
    /// Cell radius.
    pub size: f32,
    pub color: Color,
    /// Name shown on player cells.
    pub name: Option<String>,
    /// Tick when the cell was born.
    pub tick_of_birth: u64,
    pub boost: Option<Boost>,
}

impl Cell {
    /// Create a cell owned by a player.
    pub fn player(id: u32, owner: u32, position: Vec2, size: f32, color: Color, name: &str, tick: u64) -> Self {
        Self {
            id,
            owner: Some(owner),
            cell_type: CellType::Player,
            position,
            size,
            color,
            name: Some(name.to_string()),
            tick_of_birth: tick,
            boost: None,
        }
    }

    /// Create a food pellet.
    pub fn food(id: u32, position: Vec2, size: f32, color: Color, tick: u64) -> Self {
        Self {
            id,
            owner: None,
            cell_type: CellType::Food,
            position,
            size,
            color,
            name: None,
            tick_of_birth: tick,
            boost: None,
        }
    }

    /// Size squared; what growth adds up.
    #[inline]
    pub fn square_size(&self) -> f32 {
        self.size * self.size
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        size_to_mass(self.size)
    }

    /// Footprint in the spatial index.
    #[inline]
    pub fn bounds(&self) -> Bounds {
        Bounds::from_center(self.position.x, self.position.y, self.size)
    }

    /// Grow by the square size of an eaten cell.
    pub fn on_eat(&mut self, other_square_size: f32) {
        self.size = (self.square_size() + other_square_size).sqrt();
    }

    /// Set boost with a pre-computed direction vector (used for splitting).
    #[inline]
    pub fn set_boost(&mut self, distance: f32, direction: Vec2) {
        self.boost = Some(Boost { distance, direction });
    }

    /// Clamp position so the cell stays inside the border. A cell wider than
    /// the border on an axis is pinned to the border center on that axis.
    #[inline]
    pub fn check_border(&mut self, min: Vec2, max: Vec2) {
        let half_size = self.size / 2.0;
        self.position.x = clamp_axis(self.position.x, min.x + half_size, max.x - half_size);
        self.position.y = clamp_axis(self.position.y, min.y + half_size, max.y - half_size);
    }

    /// Advance boost movement by one tick: move 1/10 of the remaining
    /// distance. Returns true if the cell is still boosting.
    pub fn update_boost(&mut self, border_min: Vec2, border_max: Vec2) -> bool {
        let Some(boost) = self.boost.as_mut() else {
            return false;
        };
        if boost.distance < 1.0 {
            self.boost = None;
            return false;
        }
        let move_dist = boost.distance / 10.0;
        boost.distance -= move_dist;
        self.position += boost.direction * move_dist;
        self.check_border(border_min, border_max);
        true
    }

    /// Per-tick movement speed toward the mouse.
    #[inline]
    pub fn move_speed(&self, speed_mult: f32) -> f32 {
        2.2 * self.size.powf(-0.439) * 40.0 * speed_mult
    }
}

#[inline]
fn clamp_axis(value: f32, low: f32, high: f32) -> f32 {
    if low > high {
        (low + high) / 2.0
    } else {
        value.clamp(low, high)
    }
}
