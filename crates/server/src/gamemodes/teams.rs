use super::{spawn_target, GameMode, LeaderboardUpdate};
use crate::entity::{Color, Player};
use crate::world::{Leaderboard, World};
use rand::Rng;
use std::collections::BTreeMap;

pub const TEAM_COUNT: usize = 3;

/// Base colors: red, green, blue.
const TEAM_COLORS: [Color; TEAM_COUNT] = [
    Color::new(204, 51, 51),
    Color::new(51, 204, 51),
    Color::new(51, 51, 204),
];

pub struct Teams;

impl Teams {
    pub fn new() -> Self {
        Self
    }

    /// Team color with the dominant channel pushed up and the others down by
    /// the same random amount.
    pub fn team_color(team: usize) -> Color {
        let base = TEAM_COLORS[team % TEAM_COUNT];
        let random: u8 = rand::rng().random_range(0..52);
        let highlight = 204 + random;
        let lowlight = 51 - random;
        let channel = |value: u8| if value == 204 { highlight } else { lowlight };
        Color::new(channel(base.r), channel(base.g), channel(base.b))
    }
}

impl Default for Teams {
    fn default() -> Self {
        Self::new()
    }
}

impl GameMode for Teams {
    fn name(&self) -> &str {
        "Teams"
    }
    fn id(&self) -> u32 {
        1
    }

    fn on_new_world(&mut self, world: &mut World) {
        world.teams = vec![Vec::new(); TEAM_COUNT];
    }

    fn on_world_destroy(&mut self, world: &mut World) {
        world.teams.clear();
    }

    fn on_player_join_world(&mut self, player: &mut Player, world: &mut World) {
        if world.teams.len() < TEAM_COUNT {
            world.teams.resize(TEAM_COUNT, Vec::new());
        }
        let team = (0..TEAM_COUNT)
            .min_by_key(|&team| world.teams[team].len())
            .unwrap_or(0);
        world.teams[team].push(player.id);
        player.team = Some(team);
    }

    fn on_player_leave_world(&mut self, player: &mut Player, world: &mut World) {
        if let Some(team) = player.team.take() {
            if let Some(roster) = world.teams.get_mut(team) {
                roster.retain(|&id| id != player.id);
            }
        }
    }

    fn on_player_spawn_request(&mut self, player: &mut Player, world: Option<&mut World>, name: &str) -> bool {
        let Some(world) = spawn_target(player, world) else {
            return false;
        };
        let size = world.config().player.spawn_size as f32;
        let color = player.team.map(Self::team_color).unwrap_or_else(Color::random);
        let position = world.get_safe_spawn_pos(size);
        world.spawn_player(player, color, position, size, name);
        true
    }

    fn compile_leaderboard(&self, world: &mut World, players: &BTreeMap<u32, Player>) {
        let mut team_sizes = [0.0f32; TEAM_COUNT];
        for (team, roster) in world.teams.iter().enumerate().take(TEAM_COUNT) {
            team_sizes[team] = roster
                .iter()
                .filter_map(|id| players.get(id))
                .flat_map(|player| player.owned_cells.iter())
                .filter_map(|&cell_id| world.get_cell(cell_id))
                .map(|cell| cell.square_size())
                .sum();
        }
        let total: f32 = team_sizes.iter().sum();
        let distribution = if total > 0.0 {
            team_sizes.iter().map(|size| size / total).collect()
        } else {
            vec![0.0; TEAM_COUNT]
        };
        world.leaderboard = Leaderboard::Distribution(distribution);
    }

    fn leaderboard_for(&self, _player: &Player, world: &World, _players: &BTreeMap<u32, Player>) -> LeaderboardUpdate {
        match &world.leaderboard {
            Leaderboard::Distribution(distribution) => LeaderboardUpdate::Pie(distribution.clone()),
            Leaderboard::Ranking(_) => LeaderboardUpdate::Pie(vec![0.0; TEAM_COUNT]),
        }
    }
}
