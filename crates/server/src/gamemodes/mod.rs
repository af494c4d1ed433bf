use crate::entity::{Player, PlayerState};
use crate::server::Connection;
use crate::world::World;
use std::collections::BTreeMap;

pub mod ffa;
pub mod teams;

/// One row of a ranking leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub player_id: u32,
    pub name: String,
    /// Set on the row belonging to the requesting player.
    pub highlighted: bool,
    pub cell_id: Option<u32>,
    /// 1-based rank.
    pub position: usize,
}

/// Leaderboard as delivered to one connection.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaderboardUpdate {
    Ffa {
        entries: Vec<LeaderboardEntry>,
        self_entry: Option<LeaderboardEntry>,
    },
    Pie(Vec<f32>),
}

pub trait GameMode: Send + Sync {
    fn name(&self) -> &str;
    fn id(&self) -> u32;

    fn on_handle_start(&mut self) {}
    fn on_handle_stop(&mut self) {}
    fn on_handle_tick(&mut self) {}

    /// Whether a player may join `world`.
    fn can_join_world(&self, world: &World) -> bool {
        !world.frozen
    }

    fn on_new_world(&mut self, _world: &mut World) {}
    fn on_world_destroy(&mut self, _world: &mut World) {}
    fn on_new_player(&mut self, _player: &mut Player) {}
    fn on_player_destroy(&mut self, _player: &mut Player) {}
    fn on_player_join_world(&mut self, _player: &mut Player, _world: &mut World) {}
    fn on_player_leave_world(&mut self, _player: &mut Player, _world: &mut World) {}

    /// Spawn the player's first cell. Returns false if the request was ignored.
    fn on_player_spawn_request(&mut self, player: &mut Player, world: Option<&mut World>, name: &str) -> bool;

    /// Recompute `world.leaderboard` from post-update state.
    fn compile_leaderboard(&self, world: &mut World, players: &BTreeMap<u32, Player>);

    /// Render the world's current snapshot for `player`.
    fn leaderboard_for(&self, player: &Player, world: &World, players: &BTreeMap<u32, Player>) -> LeaderboardUpdate;

    /// Deliver the leaderboard to one connection. No-op without a player, a
    /// world, or while the world is frozen.
    fn send_leaderboard(
        &self,
        connection: &mut dyn Connection,
        players: &BTreeMap<u32, Player>,
        worlds: &BTreeMap<u32, World>,
    ) -> bool {
        let Some(player) = connection.player_id().and_then(|id| players.get(&id)) else {
            return false;
        };
        let Some(world) = player.world().and_then(|id| worlds.get(&id)) else {
            return false;
        };
        if world.frozen {
            return false;
        }
        connection.send_leaderboard(self.leaderboard_for(player, world, players));
        true
    }
}

/// Resolve the world a spawn request applies to, or None if it is ignored.
fn spawn_target<'w>(player: &Player, world: Option<&'w mut World>) -> Option<&'w mut World> {
    if player.state == PlayerState::Alive {
        return None;
    }
    world.filter(|world| player.world() == Some(world.id))
}

pub fn get_gamemode(id: u32) -> Box<dyn GameMode> {
    match id {
        1 => Box::new(teams::Teams::new()),
        _ => Box::new(ffa::Ffa::new()),
    }
}
