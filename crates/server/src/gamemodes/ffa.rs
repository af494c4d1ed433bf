use super::{spawn_target, GameMode, LeaderboardEntry, LeaderboardUpdate};
use crate::entity::{Color, Player};
use crate::world::{Leaderboard, World};
use std::collections::BTreeMap;

/// Rows shown above the requester's own entry.
const LEADERBOARD_SIZE: usize = 10;

pub struct Ffa;

impl Ffa {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Ffa {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_for(player: &Player, requesting: &Player, index: usize) -> LeaderboardEntry {
    LeaderboardEntry {
        player_id: player.id,
        name: if player.name.is_empty() {
            "An unnamed cell".to_string()
        } else {
            player.name.clone()
        },
        highlighted: player.id == requesting.id,
        cell_id: player.owned_cells.first().copied(),
        position: index + 1,
    }
}

impl GameMode for Ffa {
    fn name(&self) -> &str {
        "FFA"
    }
    fn id(&self) -> u32 {
        0
    }

    fn on_player_spawn_request(&mut self, player: &mut Player, world: Option<&mut World>, name: &str) -> bool {
        let Some(world) = spawn_target(player, world) else {
            return false;
        };
        let config = &world.config().player;
        let size = (if player.router.is_minion() {
            config.minion_spawn_size
        } else {
            config.spawn_size
        }) as f32;
        let spawn = world.get_player_spawn(size);
        let color = spawn.color.unwrap_or_else(Color::random);
        world.spawn_player(player, color, spawn.position, size, name);
        true
    }

    fn compile_leaderboard(&self, world: &mut World, players: &BTreeMap<u32, Player>) {
        let mut scored: Vec<(u32, f32)> = world
            .players
            .iter()
            .filter_map(|id| players.get(id))
            .filter_map(|player| player.score.map(|score| (player.id, score)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        world.leaderboard = Leaderboard::Ranking(scored.into_iter().map(|(id, _)| id).collect());
    }

    fn leaderboard_for(&self, player: &Player, world: &World, players: &BTreeMap<u32, Player>) -> LeaderboardUpdate {
        let ranking: &[u32] = match &world.leaderboard {
            Leaderboard::Ranking(ranking) => ranking,
            Leaderboard::Distribution(_) => &[],
        };
        let entries = ranking
            .iter()
            .take(LEADERBOARD_SIZE)
            .enumerate()
            .filter_map(|(index, id)| players.get(id).map(|ranked| entry_for(ranked, player, index)))
            .collect();
        let self_entry = player
            .score
            .and(ranking.iter().position(|&id| id == player.id))
            .map(|index| entry_for(player, player, index));
        LeaderboardUpdate::Ffa { entries, self_entry }
    }
}
