//! World state management.
//!
//! A world owns its quadtree and every cell placed in it. Players are listed
//! by id only; their data lives in the server's player table and is passed in
//! whenever the world needs it.

use crate::collision;
use crate::config::Config;
use crate::entity::{Cell, CellType, Color, Player};
use crate::spatial::{Bounds, ItemHandle, QuadTree};
use fixedbitset::FixedBitSet;
use glam::Vec2;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::f32::consts::SQRT_2;
use tracing::debug;

/// A cell together with its place in the quadtree.
#[derive(Debug)]
pub struct CellEntry {
    pub cell: Cell,
    handle: ItemHandle,
}

/// World border bounds.
#[derive(Debug, Clone, Copy)]
pub struct WorldBorder {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
    pub width: f32,
    pub height: f32,
}

impl WorldBorder {
    pub fn new(width: f32, height: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Self {
            min_x: -half_w,
            min_y: -half_h,
            max_x: half_w,
            max_y: half_h,
            width,
            height,
        }
    }

    #[inline]
    pub fn min(&self) -> Vec2 {
        Vec2::new(self.min_x, self.min_y)
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        Vec2::new(self.max_x, self.max_y)
    }

    /// The whole map as a quadtree range.
    #[inline]
    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
            self.width / 2.0,
            self.height / 2.0,
        )
    }

    /// Get a random position within the border.
    #[inline]
    pub fn random_position(&self) -> Vec2 {
        let mut rng = rand::rng();
        Vec2::new(
            rng.random_range(self.min_x..self.max_x),
            rng.random_range(self.min_y..self.max_y),
        )
    }
}

/// Where a player should spawn, and with which color if the world picks one.
#[derive(Debug, Clone, Copy)]
pub struct SpawnInfo {
    pub position: Vec2,
    pub color: Option<Color>,
}

/// Ranking snapshot compiled by the gamemode.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaderboard {
    /// Player ids, best first.
    Ranking(Vec<u32>),
    /// Share of total mass per team.
    Distribution(Vec<f32>),
}

impl Default for Leaderboard {
    fn default() -> Self {
        Leaderboard::Ranking(Vec::new())
    }
}

/// One simulation instance.
#[derive(Debug)]
pub struct World {
    pub id: u32,
    pub border: WorldBorder,
    /// Frozen worlds skip updates and leaderboard delivery.
    pub frozen: bool,
    /// Ids of the players in this world.
    pub players: Vec<u32>,
    pub leaderboard: Leaderboard,
    /// Team rosters (player ids), populated by team gamemodes.
    pub teams: Vec<Vec<u32>>,

    config: Config,
    tick: u64,
    next_cell_id: u32,
    finder: QuadTree<u32>,
    cells: HashMap<u32, CellEntry>,
    food_count: usize,

    /// Reusable buffer for cells eaten during an update.
    eaten: FixedBitSet,
}

impl World {
    /// Create an empty world sized from the border config.
    pub fn new(id: u32, config: &Config) -> Self {
        let border = WorldBorder::new(config.border.width as f32, config.border.height as f32);
        let finder = QuadTree::new(
            border.bounds(),
            config.world.finder_max_level,
            config.world.finder_max_items,
        );
        Self {
            id,
            border,
            frozen: false,
            players: Vec::new(),
            leaderboard: Leaderboard::default(),
            teams: Vec::new(),
            config: config.clone(),
            tick: 0,
            next_cell_id: 1,
            finder,
            cells: HashMap::with_capacity(2048),
            food_count: 0,
            eaten: FixedBitSet::with_capacity(4096),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Updates this world has run.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Read access to the spatial index.
    #[inline]
    pub fn finder(&self) -> &QuadTree<u32> {
        &self.finder
    }

    /// Get the next cell ID. Ids still held by live cells are skipped once the
    /// counter wraps.
    pub fn next_id(&mut self) -> u32 {
        loop {
            let id = self.next_cell_id;
            self.next_cell_id = self.next_cell_id.wrapping_add(1);
            if self.next_cell_id == 0 {
                self.next_cell_id = 1;
            }
            if !self.cells.contains_key(&id) {
                return id;
            }
        }
    }

    #[inline]
    pub fn get_cell(&self, id: u32) -> Option<&Cell> {
        self.cells.get(&id).map(|entry| &entry.cell)
    }

    #[inline]
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values().map(|entry| &entry.cell)
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn food_count(&self) -> usize {
        self.food_count
    }

    /// Place a cell in the world and index it.
    pub fn add_cell(&mut self, cell: Cell) -> u32 {
        let id = cell.id;
        let handle = self.finder.insert(id, cell.bounds());
        if cell.cell_type == CellType::Food {
            self.food_count += 1;
        }
        self.cells.insert(id, CellEntry { cell, handle });
        id
    }

    /// Remove a cell from the world and the index.
    ///
    /// The owning player's cell list is left to the caller.
    pub fn remove_cell(&mut self, id: u32) -> Option<Cell> {
        let entry = self.cells.remove(&id)?;
        self.finder.remove(entry.handle);
        if entry.cell.cell_type == CellType::Food {
            self.food_count -= 1;
        }
        Some(entry.cell)
    }

    /// Move a cell and update its place in the index.
    pub fn move_cell(&mut self, id: u32, position: Vec2) -> bool {
        let Some(entry) = self.cells.get_mut(&id) else {
            return false;
        };
        entry.cell.position = position;
        self.finder.relocate(&entry.handle, entry.cell.bounds());
        true
    }

    /// Ids of all cells whose bounds intersect `range`.
    pub fn find_cells(&self, range: &Bounds) -> Vec<u32> {
        let mut found = Vec::new();
        self.finder.search(range, |id, _| found.push(id));
        found
    }

    /// Random position where a cell of `size` overlaps nothing, falling back
    /// to any random position after the configured number of tries.
    pub fn get_safe_spawn_pos(&self, size: f32) -> Vec2 {
        for _ in 0..self.config.world.safe_spawn_tries {
            let position = self.border.random_position();
            if !self.finder.any_in(&Bounds::from_center(position.x, position.y, size)) {
                return position;
            }
        }
        self.border.random_position()
    }

    /// Spawn placement for a new player cell.
    pub fn get_player_spawn(&self, size: f32) -> SpawnInfo {
        SpawnInfo {
            position: self.get_safe_spawn_pos(size),
            color: None,
        }
    }

    /// Materialize a player's first cell.
    pub fn spawn_player(&mut self, player: &mut Player, color: Color, position: Vec2, size: f32, name: &str) -> u32 {
        let id = self.next_id();
        let mut cell = Cell::player(id, player.id, position, size, color, name, self.tick);
        cell.check_border(self.border.min(), self.border.max());
        self.add_cell(cell);

        player.owned_cells.push(id);
        player.name = name.to_string();
        player.color = color;
        player.update_state(false);
        debug!("world {} spawned cell {} for player {}", self.id, id, player.id);
        id
    }

    /// Bind a player to this world.
    pub fn add_player(&mut self, player: &mut Player) {
        self.players.push(player.id);
        player.world = Some(self.id);
        player.update_state(false);
        debug!("player {} joined world {}", player.id, self.id);
    }

    /// Unbind a player from this world, removing the cells it owns here.
    pub fn remove_player(&mut self, player: &mut Player) {
        for cell_id in std::mem::take(&mut player.owned_cells) {
            self.remove_cell(cell_id);
        }
        self.players.retain(|&id| id != player.id);
        player.world = None;
        player.score = None;
        player.update_state(false);
        debug!("player {} left world {}", player.id, self.id);
    }

    /// Remove every remaining cell. Players must have left already.
    pub fn destroy(&mut self) {
        let ids: Vec<u32> = self.cells.keys().copied().collect();
        for id in ids {
            self.remove_cell(id);
        }
        debug!("world {} destroyed", self.id);
    }

    /// Advance the world by one tick.
    pub fn update(&mut self, players: &mut BTreeMap<u32, Player>) {
        if self.frozen {
            return;
        }
        self.tick += 1;
        self.spawn_food();
        self.update_player_movement(players);
        self.update_moving_cells();
        self.process_eating(players);
        self.update_players(players);
    }

    /// Spawn food toward the configured minimum amount.
    fn spawn_food(&mut self) {
        let min_amount = self.config.food.min_amount;
        if self.food_count >= min_amount {
            return;
        }
        let count = self.config.food.spawn_amount.min(min_amount - self.food_count);
        let min_size = self.config.food.min_size as f32;
        let max_size = self.config.food.max_size as f32;

        let mut rng = rand::rng();
        for _ in 0..count {
            let position = self.border.random_position();
            let size = if max_size > min_size {
                rng.random_range(min_size..max_size)
            } else {
                min_size
            };
            let id = self.next_id();
            self.add_cell(Cell::food(id, position, size, Color::random(), self.tick));
        }
    }

    fn update_player_movement(&mut self, players: &mut BTreeMap<u32, Player>) {
        let ids = self.players.clone();
        for player_id in ids {
            let Some(player) = players.get_mut(&player_id) else {
                continue;
            };
            let input = player.router.input;
            player.router.input.split = false;
            if input.split {
                self.split_player(player);
            }
            for &cell_id in &player.owned_cells {
                self.move_toward(cell_id, input.mouse);
            }
        }
    }

    fn move_toward(&mut self, cell_id: u32, target: Vec2) {
        let speed_mult = self.config.player.speed as f32;
        let (min, max) = (self.border.min(), self.border.max());
        let Some(entry) = self.cells.get_mut(&cell_id) else {
            return;
        };
        let cell = &mut entry.cell;
        let delta = target - cell.position;
        let distance = delta.length();
        if distance < 1.0 {
            return;
        }
        let step = cell.move_speed(speed_mult).min(distance);
        cell.position += delta / distance * step;
        cell.check_border(min, max);
        self.finder.relocate(&entry.handle, cell.bounds());
    }

    /// Halve every large enough cell of `player`, boosting the new piece toward
    /// the mouse.
    fn split_player(&mut self, player: &mut Player) {
        let max_cells = self.config.player.max_cells;
        let min_split_size = self.config.player.min_split_size as f32;
        let boost = self.config.player.split_boost as f32;
        let mouse = player.router.input.mouse;

        for cell_id in player.owned_cells.clone() {
            if player.owned_cells.len() >= max_cells {
                break;
            }
            let Some(entry) = self.cells.get_mut(&cell_id) else {
                continue;
            };
            if entry.cell.size < min_split_size {
                continue;
            }
            let size = entry.cell.size / SQRT_2;
            entry.cell.size = size;
            self.finder.relocate(&entry.handle, entry.cell.bounds());

            let position = entry.cell.position;
            let color = entry.cell.color;
            let name = entry.cell.name.clone().unwrap_or_default();
            let mut direction = (mouse - position).normalize_or_zero();
            if direction == Vec2::ZERO {
                direction = Vec2::X;
            }

            let id = self.next_id();
            let mut piece = Cell::player(id, player.id, position, size, color, &name, self.tick);
            piece.set_boost(boost, direction);
            self.add_cell(piece);
            player.owned_cells.push(id);
        }
    }

    fn update_moving_cells(&mut self) {
        let (min, max) = (self.border.min(), self.border.max());
        for entry in self.cells.values_mut() {
            if entry.cell.update_boost(min, max) {
                self.finder.relocate(&entry.handle, entry.cell.bounds());
            }
        }
    }

    /// Let player cells eat whatever they cover, using the quadtree to find
    /// candidates.
    fn process_eating(&mut self, players: &mut BTreeMap<u32, Player>) {
        self.eaten.clear();
        let mut eaters: Vec<u32> = self
            .cells
            .values()
            .filter(|entry| entry.cell.cell_type == CellType::Player)
            .map(|entry| entry.cell.id)
            .collect();
        eaters.sort_unstable();

        let mut candidates = Vec::with_capacity(32);
        for eater_id in eaters {
            if self.eaten.contains(eater_id as usize) {
                continue;
            }
            let Some((position, size, owner)) = self
                .cells
                .get(&eater_id)
                .map(|entry| (entry.cell.position, entry.cell.size, entry.cell.owner))
            else {
                continue;
            };

            candidates.clear();
            self.finder
                .search(&Bounds::from_center(position.x, position.y, size), |id, _| candidates.push(id));

            let mut gained = 0.0;
            for &target_id in &candidates {
                if target_id == eater_id || self.eaten.contains(target_id as usize) {
                    continue;
                }
                let Some(target) = self.cells.get(&target_id).map(|entry| &entry.cell) else {
                    continue;
                };
                if target.owner.is_some() && target.owner == owner {
                    continue;
                }
                if !collision::can_eat(position, size, target.position, target.size) {
                    continue;
                }
                gained += target.square_size();
                self.eaten.grow(target_id as usize + 1);
                self.eaten.insert(target_id as usize);
            }

            if gained > 0.0 {
                if let Some(entry) = self.cells.get_mut(&eater_id) {
                    entry.cell.on_eat(gained);
                    self.finder.relocate(&entry.handle, entry.cell.bounds());
                }
            }
        }

        let eaten: Vec<u32> = self.eaten.ones().map(|id| id as u32).collect();
        for id in eaten {
            let Some(cell) = self.remove_cell(id) else {
                continue;
            };
            if let Some(owner) = cell.owner.and_then(|owner| players.get_mut(&owner)) {
                owner.owned_cells.retain(|&c| c != id);
            }
        }
    }

    /// Refresh scores and lifecycle states of this world's players.
    fn update_players(&mut self, players: &mut BTreeMap<u32, Player>) {
        let has_spectate_target = self
            .players
            .iter()
            .any(|id| players.get(id).is_some_and(|p| !p.owned_cells.is_empty()));
        for id in &self.players {
            let Some(player) = players.get_mut(id) else {
                continue;
            };
            player.score = if player.owned_cells.is_empty() {
                None
            } else {
                Some(
                    player
                        .owned_cells
                        .iter()
                        .filter_map(|cell_id| self.cells.get(cell_id))
                        .map(|entry| entry.cell.mass())
                        .sum(),
                )
            };
            player.update_state(has_spectate_target);
        }
    }
}
