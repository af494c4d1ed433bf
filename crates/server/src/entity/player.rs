//! Players and the input sources driving them.

use super::cell::Color;
use glam::Vec2;

/// Lifecycle state of a player.
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Not in a world, or in a world with nothing to do.
    #[default]
    Idle = -1,
    /// Owns at least one cell.
    Alive = 0,
    /// Watching the world's top player.
    Spectating = 1,
    /// Free camera with no one to follow.
    Roaming = 2,
}

/// What drives a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterKind {
    /// A human connection.
    Connection,
    /// A standalone bot.
    Bot,
    /// A bot that follows another player.
    Minion { following: u32 },
}

/// Per-tick input. Humans and bots produce the same shape.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInput {
    /// Target the player's cells move toward.
    pub mouse: Vec2,
    /// One-shot split request, consumed by the next world update.
    pub split: bool,
    /// Spectate instead of roaming while not alive.
    pub spectate: bool,
}

/// Input source bound to a player.
#[derive(Debug, Clone)]
pub struct Router {
    pub kind: RouterKind,
    pub input: PlayerInput,
}

impl Router {
    pub fn connection() -> Self {
        Self {
            kind: RouterKind::Connection,
            input: PlayerInput::default(),
        }
    }

    pub fn bot() -> Self {
        Self {
            kind: RouterKind::Bot,
            input: PlayerInput::default(),
        }
    }

    pub fn minion(following: u32) -> Self {
        Self {
            kind: RouterKind::Minion { following },
            input: PlayerInput::default(),
        }
    }

    #[inline]
    pub fn is_minion(&self) -> bool {
        matches!(self.kind, RouterKind::Minion { .. })
    }
}

/// A player: an input source plus the cells it controls.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub state: PlayerState,
    pub router: Router,
    /// Cell ids this player owns in its world.
    pub owned_cells: Vec<u32>,
    /// Name given at the last spawn.
    pub name: String,
    /// Color given at the last spawn.
    pub color: Color,
    /// Team index, assigned by team gamemodes.
    pub team: Option<usize>,
    /// Total mass of owned cells; None while not alive.
    pub score: Option<f32>,
    /// Cleared once the player is removed from the server.
    pub exists: bool,
    /// Set only by `World::add_player` / `World::remove_player`.
    pub(crate) world: Option<u32>,
}

impl Player {
    pub fn new(id: u32, router: Router) -> Self {
        Self {
            id,
            state: PlayerState::Idle,
            router,
            owned_cells: Vec::new(),
            name: String::new(),
            color: Color::default(),
            team: None,
            score: None,
            exists: true,
            world: None,
        }
    }

    /// Id of the world this player is in.
    #[inline]
    pub fn world(&self) -> Option<u32> {
        self.world
    }

    #[inline]
    pub fn has_world(&self) -> bool {
        self.world.is_some()
    }

    /// Recompute the lifecycle state from world membership and owned cells.
    pub fn update_state(&mut self, has_spectate_target: bool) {
        self.state = if self.world.is_none() {
            PlayerState::Idle
        } else if !self.owned_cells.is_empty() {
            PlayerState::Alive
        } else if self.router.input.spectate {
            if has_spectate_target {
                PlayerState::Spectating
            } else {
                PlayerState::Roaming
            }
        } else {
            PlayerState::Idle
        };
    }
}
