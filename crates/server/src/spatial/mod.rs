//! Spatial indexing utilities.
//!
//! Adaptive quadtree over cell bounding boxes plus the box predicates it is
//! built on.

mod bounds;
mod quadtree;

pub use bounds::{Bounds, Quadrant, QuadrantMask};
pub use quadtree::{ItemHandle, QuadTree};
