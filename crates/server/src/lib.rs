//! Native Ogar game server library.

pub mod collision;
pub mod config;
pub mod entity;
pub mod gamemodes;
pub mod server;
pub mod spatial;
pub mod world;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use entity::{Player, PlayerInput, PlayerState, Router, RouterKind};
pub use gamemodes::{get_gamemode, GameMode, LeaderboardEntry, LeaderboardUpdate};
pub use server::{Connection, HeadlessListener, Listener, ServerHandle, ServerStats, WorldStats};
pub use spatial::{Bounds, ItemHandle, QuadTree};
pub use world::{Leaderboard, World};
