//! Authoritative arena state (owned by the session task)

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::util::time::secs_to_ticks;

use super::entity::{Bomb, EntityId, Explosion, PlayerState, PowerUp, PowerUpKind};
use super::grid::{spawn_cells, Cell, Grid};

/// Fixed gameplay timings, in ticks
#[derive(Debug, Clone, PartialEq)]
pub struct Rules {
    /// Bomb fuse length
    pub fuse_ticks: u32,
    /// How long an explosion stays on the board
    pub explosion_ticks: u32,
    /// Minimum spacing between two placements by one player
    pub bomb_cooldown_ticks: u32,
    /// Chance that a destroyed block leaves a power-up
    pub power_up_chance: f64,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            fuse_ticks: secs_to_ticks(2.0),
            explosion_ticks: secs_to_ticks(0.5),
            bomb_cooldown_ticks: secs_to_ticks(0.25),
            power_up_chance: 0.3,
        }
    }
}

/// Grid plus every live entity of one session
pub struct ArenaState {
    pub tick: u64,
    pub grid: Grid,
    pub players: BTreeMap<Uuid, PlayerState>,
    pub bombs: BTreeMap<EntityId, Bomb>,
    pub explosions: BTreeMap<EntityId, Explosion>,
    pub power_ups: BTreeMap<EntityId, PowerUp>,
    /// Cells turned Destructible -> Empty so far, in destruction order
    pub destroyed_cells: Vec<Cell>,
    pub rules: Rules,
    rng: ChaCha8Rng,
    next_entity_id: u32,
}

impl ArenaState {
    /// Fresh arena with a generated map and both players on their spawns
    pub fn new(seed: u64, width: i32, height: i32, players: [Uuid; 2], rules: Rules) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let spawns = spawn_cells(width, height);
        let grid = Grid::generate(width, height, &spawns, &mut rng);

        let mut state = Self::with_grid(grid, rules, rng);
        for (slot, (user_id, spawn)) in players.into_iter().zip(spawns).enumerate() {
            state.players.insert(user_id, PlayerState::new(user_id, slot, spawn));
        }
        state
    }

    /// Arena on a prepared grid with no players yet
    pub fn with_grid(grid: Grid, rules: Rules, rng: ChaCha8Rng) -> Self {
        Self {
            tick: 0,
            grid,
            players: BTreeMap::new(),
            bombs: BTreeMap::new(),
            explosions: BTreeMap::new(),
            power_ups: BTreeMap::new(),
            destroyed_cells: Vec::new(),
            rules,
            rng,
            next_entity_id: 1,
        }
    }

    /// Put a player on a specific cell (scenario setup)
    pub fn place_player(&mut self, user_id: Uuid, slot: usize, cell: Cell) {
        self.players.insert(user_id, PlayerState::new(user_id, slot, cell));
    }

    pub fn alloc_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    pub fn bomb_at(&self, cell: Cell) -> Option<&Bomb> {
        self.bombs.values().find(|b| b.cell == cell)
    }

    /// Live player standing on `cell`, other than `except`
    pub fn live_player_at(&self, cell: Cell, except: Option<Uuid>) -> Option<&PlayerState> {
        self.players
            .values()
            .find(|p| p.alive && Some(p.user_id) != except && p.cell() == cell)
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values().filter(|p| p.alive)
    }

    /// Player ids in slot order
    pub fn slot_order(&self) -> Vec<Uuid> {
        let mut players: Vec<&PlayerState> = self.players.values().collect();
        players.sort_by_key(|p| p.slot);
        players.into_iter().map(|p| p.user_id).collect()
    }

    /// Place a bomb for `user_id` on its current cell at the current tick
    pub fn spawn_bomb(&mut self, user_id: Uuid) -> Option<EntityId> {
        let player = self.players.get(&user_id)?;
        let cell = player.cell();
        let radius = player.blast_radius;
        let id = self.alloc_id();
        let bomb = Bomb::new(id, user_id, cell, self.tick, self.rules.fuse_ticks, radius);
        self.bombs.insert(id, bomb);
        Some(id)
    }

    /// Roll for a power-up drop and spawn it on `cell`
    pub fn maybe_drop_power_up(&mut self, cell: Cell) -> Option<EntityId> {
        if !self.rng.gen_bool(self.rules.power_up_chance.clamp(0.0, 1.0)) {
            return None;
        }
        let kind = PowerUpKind::ALL[self.rng.gen_range(0..PowerUpKind::ALL.len())];
        let id = self.alloc_id();
        self.power_ups.insert(id, PowerUp { id, cell, kind });
        Some(id)
    }
}
