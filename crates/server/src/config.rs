//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub border: BorderConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub food: FoodConfig,
}

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tick interval must be at least 1ms")]
    InvalidTickInterval,

    #[error("border must be positive, got {0}x{1}")]
    InvalidBorder(f64, f64),

    #[error("quadtree needs max_level >= 1 and max_items >= 1")]
    InvalidFinderLimits,

    #[error("unknown gamemode id {0}")]
    UnknownGamemode(u32),

    #[error("spawn size {0} does not fit inside a {1}x{2} border")]
    SpawnExceedsBorder(f64, f64, f64),
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Load configuration from `path`, writing the defaults there if the file
    /// does not exist yet.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&contents)?
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            default_config
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidTickInterval);
        }
        if !(self.border.width > 0.0 && self.border.height > 0.0) {
            return Err(ConfigError::InvalidBorder(self.border.width, self.border.height));
        }
        if self.world.finder_max_level == 0 || self.world.finder_max_items == 0 {
            return Err(ConfigError::InvalidFinderLimits);
        }
        let spawn_size = self.player.spawn_size.max(self.player.minion_spawn_size);
        if spawn_size > self.border.width.min(self.border.height) {
            return Err(ConfigError::SpawnExceedsBorder(
                spawn_size,
                self.border.width,
                self.border.height,
            ));
        }
        if self.server.gamemode > 1 {
            return Err(ConfigError::UnknownGamemode(self.server.gamemode));
        }
        Ok(())
    }
}

/// Server loop and general settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Game mode (0=FFA, 1=Teams).
    #[serde(default)]
    pub gamemode: u32,
    /// Number of bots to spawn on start.
    #[serde(default)]
    pub bots: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            tick_interval_ms: default_tick_interval(),
            gamemode: 0,
            bots: 0,
        }
    }
}

fn default_name() -> String {
    "Native Ogar".to_string()
}
fn default_tick_interval() -> u64 {
    40
}

/// World border configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BorderConfig {
    #[serde(default = "default_border_size")]
    pub width: f64,
    #[serde(default = "default_border_size")]
    pub height: f64,
}

impl Default for BorderConfig {
    fn default() -> Self {
        Self {
            width: default_border_size(),
            height: default_border_size(),
        }
    }
}

fn default_border_size() -> f64 {
    14142.0
}

/// Per-world spatial index and spawn placement.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    /// Deepest level a quadtree node may split to.
    #[serde(default = "default_finder_max_level")]
    pub finder_max_level: u32,
    /// Items a quadtree node holds before it splits.
    #[serde(default = "default_finder_max_items")]
    pub finder_max_items: usize,
    /// Attempts at finding an unoccupied spawn position.
    #[serde(default = "default_safe_spawn_tries")]
    pub safe_spawn_tries: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            finder_max_level: default_finder_max_level(),
            finder_max_items: default_finder_max_items(),
            safe_spawn_tries: default_safe_spawn_tries(),
        }
    }
}

fn default_finder_max_level() -> u32 {
    16
}
fn default_finder_max_items() -> usize {
    16
}
fn default_safe_spawn_tries() -> usize {
    64
}

/// Player configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_spawn_size")]
    pub spawn_size: f64,
    /// Spawn size for minions following another player.
    #[serde(default = "default_minion_spawn_size")]
    pub minion_spawn_size: f64,
    #[serde(default = "default_player_max_cells")]
    pub max_cells: usize,
    #[serde(default = "default_player_min_split")]
    pub min_split_size: f64,
    /// Movement speed multiplier.
    #[serde(default = "default_player_speed")]
    pub speed: f64,
    /// Boost distance given to a freshly split cell.
    #[serde(default = "default_player_split_boost")]
    pub split_boost: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            spawn_size: default_player_spawn_size(),
            minion_spawn_size: default_minion_spawn_size(),
            max_cells: default_player_max_cells(),
            min_split_size: default_player_min_split(),
            speed: default_player_speed(),
            split_boost: default_player_split_boost(),
        }
    }
}

fn default_player_spawn_size() -> f64 {
    32.0
}
fn default_minion_spawn_size() -> f64 {
    32.0
}
fn default_player_max_cells() -> usize {
    16
}
fn default_player_min_split() -> f64 {
    60.0
}
fn default_player_speed() -> f64 {
    1.0
}
fn default_player_split_boost() -> f64 {
    780.0
}

/// Food configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FoodConfig {
    #[serde(default = "default_food_min_size")]
    pub min_size: f64,
    #[serde(default = "default_food_max_size")]
    pub max_size: f64,
    #[serde(default = "default_food_min_amount")]
    pub min_amount: usize,
    /// Pellets added per tick while below `min_amount`.
    #[serde(default = "default_food_spawn_amount")]
    pub spawn_amount: usize,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            min_size: default_food_min_size(),
            max_size: default_food_max_size(),
            min_amount: default_food_min_amount(),
            spawn_amount: default_food_spawn_amount(),
        }
    }
}

fn default_food_min_size() -> f64 {
    10.0
}
fn default_food_max_size() -> f64 {
    20.0
}
fn default_food_min_amount() -> usize {
    1000
}
fn default_food_spawn_amount() -> usize {
    30
}
