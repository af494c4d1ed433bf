//! Simulation root.
//!
//! [`ServerHandle`] owns every world and player, the active gamemode, the
//! external listener and the ticker that drives them all.

mod listener;
mod ticker;

pub use listener::{Connection, HeadlessListener, Listener};
pub use ticker::{TickCallback, Ticker, TickerOwner};

use crate::config::Config;
use crate::entity::{Player, PlayerInput, PlayerState, Router, RouterKind};
use crate::gamemodes::{get_gamemode, GameMode};
use crate::world::World;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Ticks between periodic statistics logs.
const STATS_INTERVAL: u64 = 400;

/// Per-world counters for administrative tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldStats {
    pub id: u32,
    pub players: usize,
    pub cells: usize,
    pub food: usize,
    pub frozen: bool,
}

/// Snapshot of the root's run state.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStats {
    pub running: bool,
    pub tick: u64,
    /// Smoothed tick duration in milliseconds.
    pub average_tick_time: f64,
    pub tick_interval_ms: u64,
    pub uptime: Option<Duration>,
    pub players: usize,
    pub worlds: Vec<WorldStats>,
}

pub struct ServerHandle {
    config: Config,
    gamemode: Box<dyn GameMode>,
    listener: Box<dyn Listener>,
    ticker: Ticker<ServerHandle>,

    worlds: BTreeMap<u32, World>,
    players: BTreeMap<u32, Player>,

    running: bool,
    start_time: Option<Instant>,
    tick: u64,
    /// Average tick duration in milliseconds (exponential moving average).
    average_tick_time: f64,
}

impl TickerOwner for ServerHandle {
    fn ticker_mut(&mut self) -> &mut Ticker<Self> {
        &mut self.ticker
    }
}

/// Smallest positive id not present in `map`.
fn first_free_id<V>(map: &BTreeMap<u32, V>) -> u32 {
    let mut id = 1;
    while map.contains_key(&id) {
        id += 1;
    }
    id
}

impl ServerHandle {
    /// Create a handle using the gamemode selected in the config.
    pub fn new(config: Config, listener: Box<dyn Listener>) -> Self {
        let gamemode = get_gamemode(config.server.gamemode);
        Self::with_gamemode(config, listener, gamemode)
    }

    pub fn with_gamemode(config: Config, listener: Box<dyn Listener>, gamemode: Box<dyn GameMode>) -> Self {
        let mut ticker = Ticker::new(config.server.tick_interval_ms);
        ticker.add(Self::on_tick);
        Self {
            config,
            gamemode,
            listener,
            ticker,
            worlds: BTreeMap::new(),
            players: BTreeMap::new(),
            running: false,
            start_time: None,
            tick: 0,
            average_tick_time: 0.0,
        }
    }

    /// Open the listener, arm the ticker and create the first world.
    /// Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        info!("starting");

        self.start_time = Some(Instant::now());
        self.tick = 0;
        self.average_tick_time = 0.0;
        self.running = true;

        if !self.listener.open() {
            warn!("listener failed to open, running without connections");
        }
        self.ticker.start();
        self.gamemode.on_handle_start();

        info!("ticker begin");
        self.create_world();
        true
    }

    /// Disarm the ticker, tear down every world and close the listener.
    /// Returns false if not running.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        info!("stopping");

        self.ticker.stop();
        let ids: Vec<u32> = self.worlds.keys().copied().collect();
        for id in ids {
            self.remove_world(id);
        }
        self.gamemode.on_handle_stop();
        self.listener.close();

        self.start_time = None;
        self.tick = 0;
        self.average_tick_time = 0.0;
        self.running = false;

        info!("ticker stop");
        true
    }

    /// Stop firing ticks without tearing anything down.
    pub fn pause(&mut self) -> bool {
        self.running && self.ticker.stop()
    }

    pub fn resume(&mut self) -> bool {
        self.running && self.ticker.start()
    }

    /// Fire ticks until the ticker is stopped or paused.
    pub async fn run(&mut self) {
        Ticker::run(self).await;
    }

    pub fn create_world(&mut self) -> u32 {
        let id = first_free_id(&self.worlds);
        let mut world = World::new(id, &self.config);
        self.gamemode.on_new_world(&mut world);
        self.worlds.insert(id, world);
        debug!("added a world with id {}", id);
        id
    }

    /// Remove a world, moving its players out first. Returns false for an
    /// unknown id.
    pub fn remove_world(&mut self, id: u32) -> bool {
        let Some(mut world) = self.worlds.remove(&id) else {
            return false;
        };
        self.gamemode.on_world_destroy(&mut world);
        for player_id in world.players.clone() {
            if let Some(player) = self.players.get_mut(&player_id) {
                self.gamemode.on_player_leave_world(player, &mut world);
                world.remove_player(player);
            }
        }
        world.destroy();
        debug!("removed world with id {}", id);
        true
    }

    pub fn create_player(&mut self, router: Router) -> u32 {
        let id = first_free_id(&self.players);
        let mut player = Player::new(id, router);
        self.gamemode.on_new_player(&mut player);
        self.players.insert(id, player);
        debug!("added a player with id {}", id);
        id
    }

    /// Remove a player, leaving its world first. Returns false for an
    /// unknown id.
    pub fn remove_player(&mut self, id: u32) -> bool {
        let Some(mut player) = self.players.remove(&id) else {
            return false;
        };
        self.gamemode.on_player_destroy(&mut player);
        if let Some(world) = player.world().and_then(|world_id| self.worlds.get_mut(&world_id)) {
            self.gamemode.on_player_leave_world(&mut player, world);
            world.remove_player(&mut player);
        }
        player.exists = false;
        debug!("removed player with id {}", id);
        true
    }

    /// Put a player into a world, if the gamemode admits it.
    pub fn join_world(&mut self, player_id: u32, world_id: u32) -> bool {
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        let Some(world) = self.worlds.get_mut(&world_id) else {
            return false;
        };
        if player.has_world() || !self.gamemode.can_join_world(world) {
            return false;
        }
        world.add_player(player);
        self.gamemode.on_player_join_world(player, world);
        true
    }

    pub fn leave_world(&mut self, player_id: u32) -> bool {
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        let Some(world) = player.world().and_then(|id| self.worlds.get_mut(&id)) else {
            return false;
        };
        self.gamemode.on_player_leave_world(player, world);
        world.remove_player(player);
        true
    }

    /// Ask the gamemode to spawn a player. Returns false if it was ignored.
    pub fn request_spawn(&mut self, player_id: u32, name: &str) -> bool {
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        let world = player.world().and_then(|id| self.worlds.get_mut(&id));
        self.gamemode.on_player_spawn_request(player, world, name)
    }

    /// Replace a player's input for the next world update.
    pub fn set_input(&mut self, player_id: u32, input: PlayerInput) -> bool {
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        player.router.input = input;
        true
    }

    pub fn set_frozen(&mut self, world_id: u32, frozen: bool) -> bool {
        let Some(world) = self.worlds.get_mut(&world_id) else {
            return false;
        };
        world.frozen = frozen;
        true
    }

    pub fn send_leaderboard(&self, connection: &mut dyn Connection) -> bool {
        self.gamemode.send_leaderboard(connection, &self.players, &self.worlds)
    }

    /// One tick: update worlds, flush the listener, then the gamemode hook.
    pub fn on_tick(&mut self) {
        let tick_start = Instant::now();
        self.tick += 1;

        for world in self.worlds.values_mut() {
            if world.frozen {
                continue;
            }
            world.update(&mut self.players);
            self.gamemode.compile_leaderboard(world, &self.players);
        }
        self.listener.update();
        self.update_routers();
        self.gamemode.on_handle_tick();

        let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
        self.average_tick_time = self.average_tick_time * 0.5 + tick_ms * 0.5;

        let tick_budget = self.ticker.interval_ms() as f64 * 0.9;
        if tick_ms > tick_budget {
            warn!(
                "Slow tick #{}: {:.3}ms (budget: {:.1}ms) - {} worlds, {} players",
                self.tick,
                tick_ms,
                tick_budget,
                self.worlds.len(),
                self.players.len()
            );
        }
        if self.tick % STATS_INTERVAL == 0 {
            debug!(
                "tick {}: avg {:.3}ms, {} worlds, {} players",
                self.tick,
                self.average_tick_time,
                self.worlds.len(),
                self.players.len()
            );
        }
    }

    /// Drive internal routers: minions follow their leader's mouse and close
    /// once the leader is gone or elsewhere; idle bots respawn.
    fn update_routers(&mut self) {
        let mut closing = Vec::new();
        let mut respawning = Vec::new();

        let ids: Vec<u32> = self.players.keys().copied().collect();
        for id in ids {
            let Some(player) = self.players.get(&id) else {
                continue;
            };
            let world = player.world();
            let kind = player.router.kind;
            match kind {
                RouterKind::Connection => continue,
                RouterKind::Bot => {}
                RouterKind::Minion { following } => {
                    let Some(leader) = self.players.get(&following) else {
                        closing.push(id);
                        continue;
                    };
                    if world.is_none() || leader.world() != world {
                        closing.push(id);
                        continue;
                    }
                    let mouse = leader.router.input.mouse;
                    if let Some(minion) = self.players.get_mut(&id) {
                        minion.router.input.mouse = mouse;
                    }
                }
            }
            if world.is_some() && self.players.get(&id).is_some_and(|p| p.state == PlayerState::Idle) {
                respawning.push(id);
            }
        }

        for id in closing {
            self.remove_player(id);
        }
        for id in respawning {
            let name = self.players.get(&id).map(|p| p.name.clone()).unwrap_or_default();
            self.request_spawn(id, &name);
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn gamemode(&self) -> &dyn GameMode {
        self.gamemode.as_ref()
    }

    #[inline]
    pub fn worlds(&self) -> &BTreeMap<u32, World> {
        &self.worlds
    }

    #[inline]
    pub fn players(&self) -> &BTreeMap<u32, Player> {
        &self.players
    }

    #[inline]
    pub fn world(&self, id: u32) -> Option<&World> {
        self.worlds.get(&id)
    }

    #[inline]
    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn average_tick_time(&self) -> f64 {
        self.average_tick_time
    }

    #[inline]
    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether ticks are firing; false while stopped or paused.
    #[inline]
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_running()
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            running: self.running,
            tick: self.tick,
            average_tick_time: self.average_tick_time,
            tick_interval_ms: self.ticker.interval_ms(),
            uptime: self.start_time.map(|start| start.elapsed()),
            players: self.players.len(),
            worlds: self
                .worlds
                .values()
                .map(|world| WorldStats {
                    id: world.id,
                    players: world.players.len(),
                    cells: world.cell_count(),
                    food: world.food_count(),
                    frozen: world.frozen,
                })
                .collect(),
        }
    }
}
