//! Axis-aligned box predicates used by the quadtree.
//!
//! A [`Bounds`] is stored as a center point plus half extents, the same shape
//! cells use for their footprint (`x ± size`, `y ± size`). Every predicate
//! treats edges as closed: two boxes that only touch still intersect.

/// Axis-aligned bounding box described by its center and half extents.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    /// Center X.
    pub x: f32,
    /// Center Y.
    pub y: f32,
    /// Half width.
    pub w: f32,
    /// Half height.
    pub h: f32,
}

impl Bounds {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Create a square box around a circle of radius `size`.
    #[inline]
    pub fn from_center(cx: f32, cy: f32, size: f32) -> Self {
        Self {
            x: cx,
            y: cy,
            w: size,
            h: size,
        }
    }

    #[inline]
    pub fn min_x(&self) -> f32 {
        self.x - self.w
    }

    #[inline]
    pub fn max_x(&self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn min_y(&self) -> f32 {
        self.y - self.h
    }

    #[inline]
    pub fn max_y(&self) -> f32 {
        self.y + self.h
    }

    /// Check if two boxes overlap on both axes.
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x() <= other.max_x()
            && self.max_x() >= other.min_x()
            && self.min_y() <= other.max_y()
            && self.max_y() >= other.min_y()
    }

    /// Check if `inner` lies entirely within this box.
    #[inline]
    pub fn contains(&self, inner: &Bounds) -> bool {
        self.min_x() <= inner.min_x()
            && self.max_x() >= inner.max_x()
            && self.min_y() <= inner.min_y()
            && self.max_y() >= inner.max_y()
    }

    /// Which quadrants of `node` this box touches.
    ///
    /// Touching a split line counts for both sides, so a search never prunes
    /// a quadrant holding an item that only meets the query on that line.
    #[inline]
    pub fn quadrants_touched(&self, node: &Bounds) -> QuadrantMask {
        QuadrantMask {
            top: self.min_y() <= node.y,
            bottom: self.max_y() >= node.y,
            left: self.min_x() <= node.x,
            right: self.max_x() >= node.x,
        }
    }

    /// The single quadrant of `node` that strictly contains this box, or
    /// `None` when the box straddles one of the split lines.
    #[inline]
    pub fn quadrant_in(&self, node: &Bounds) -> Option<Quadrant> {
        let top = self.max_y() < node.y;
        let bottom = self.min_y() > node.y;
        let left = self.max_x() < node.x;
        let right = self.min_x() > node.x;
        match (top, bottom, left, right) {
            (true, _, true, _) => Some(Quadrant::NorthWest),
            (true, _, _, true) => Some(Quadrant::NorthEast),
            (_, true, true, _) => Some(Quadrant::SouthWest),
            (_, true, _, true) => Some(Quadrant::SouthEast),
            _ => None,
        }
    }

    /// The range covered by one quadrant of this box.
    #[inline]
    pub fn quadrant(&self, quadrant: Quadrant) -> Bounds {
        let hw = self.w / 2.0;
        let hh = self.h / 2.0;
        match quadrant {
            Quadrant::NorthWest => Bounds::new(self.x - hw, self.y - hh, hw, hh),
            Quadrant::NorthEast => Bounds::new(self.x + hw, self.y - hh, hw, hh),
            Quadrant::SouthWest => Bounds::new(self.x - hw, self.y + hh, hw, hh),
            Quadrant::SouthEast => Bounds::new(self.x + hw, self.y + hh, hw, hh),
        }
    }
}

/// One of the four equal partitions of a node. North is toward negative Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    NorthWest = 0,
    NorthEast = 1,
    SouthWest = 2,
    SouthEast = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Sides of a node's split lines that a box reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadrantMask {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl QuadrantMask {
    #[inline]
    pub fn touches(&self, quadrant: Quadrant) -> bool {
        match quadrant {
            Quadrant::NorthWest => self.top && self.left,
            Quadrant::NorthEast => self.top && self.right,
            Quadrant::SouthWest => self.bottom && self.left,
            Quadrant::SouthEast => self.bottom && self.right,
        }
    }
}
