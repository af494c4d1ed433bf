//! Game entities: cells and the players that own them.

mod cell;
mod player;

pub use cell::{Boost, Cell, CellType, Color};
pub use player::{Player, PlayerInput, PlayerState, Router, RouterKind};
