//! Boundary to the network layer.

use crate::gamemodes::LeaderboardUpdate;
use tracing::{debug, info};

/// Accepts connections and flushes their pending output once per tick.
pub trait Listener: Send {
    /// Start accepting. Returns false if the listener could not open.
    fn open(&mut self) -> bool;
    fn close(&mut self);
    /// Flush after every world has updated. Must not block the tick.
    fn update(&mut self);
}

/// A single client connection as seen by the simulation.
pub trait Connection {
    /// The player this connection controls, if any.
    fn player_id(&self) -> Option<u32>;
    fn send_leaderboard(&mut self, update: LeaderboardUpdate);
}

/// Listener with no sockets, used when running the simulation alone.
#[derive(Debug, Default)]
pub struct HeadlessListener {
    open: bool,
    flushes: u64,
}

impl HeadlessListener {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[inline]
    pub fn flushes(&self) -> u64 {
        self.flushes
    }
}

impl Listener for HeadlessListener {
    fn open(&mut self) -> bool {
        self.open = true;
        info!("Listening headless, no sockets bound");
        true
    }

    fn close(&mut self) {
        self.open = false;
        debug!("Headless listener closed after {} flushes", self.flushes);
    }

    fn update(&mut self) {
        if self.open {
            self.flushes += 1;
        }
    }
}
