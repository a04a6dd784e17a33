//! Entity records owned by a session.
//!
//! Entities never hold references to each other. Bombs name their owner by
//! user id, explosions name the bomb they came from by entity id, and every
//! lookup goes through the session's collections.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::grid::{Cell, Direction};

/// Session-local identity for bombs, explosions and power-ups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Starting player stats
pub const BASE_BOMB_LIMIT: u32 = 1;
pub const BASE_BLAST_RADIUS: u32 = 1;
pub const BASE_SPEED: f32 = 4.0; // tiles per second
pub const MAX_SPEED: f32 = 8.0;
pub const SPEED_STEP: f32 = 1.0;
pub const MAX_BOMB_LIMIT: u32 = 8;
pub const MAX_BLAST_RADIUS: u32 = 10;

/// Player state in a session (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub user_id: Uuid,
    /// Slot index (0 or 1), also picks the spawn corner
    pub slot: usize,

    // Position in tile units; the occupied cell is the floor of each axis
    pub x: f32,
    pub y: f32,
    pub facing: Direction,
    /// Held movement intent, applied every tick until changed
    pub moving: Option<Direction>,
    /// Placement requested since the last tick
    pub bomb_requested: bool,

    pub alive: bool,
    pub died_at_tick: Option<u64>,

    // Bomb stats
    pub bomb_cooldown: u32,
    pub active_bombs: u32,
    pub bomb_limit: u32,
    pub blast_radius: u32,
    pub speed: f32,

    // Summary counters
    pub bombs_placed: u32,
    pub kills: u32,
}

impl PlayerState {
    pub fn new(user_id: Uuid, slot: usize, spawn: Cell) -> Self {
        let (x, y) = spawn.center();
        Self {
            user_id,
            slot,
            x,
            y,
            facing: Direction::default(),
            moving: None,
            bomb_requested: false,
            alive: true,
            died_at_tick: None,
            bomb_cooldown: 0,
            active_bombs: 0,
            bomb_limit: BASE_BOMB_LIMIT,
            blast_radius: BASE_BLAST_RADIUS,
            speed: BASE_SPEED,
            bombs_placed: 0,
            kills: 0,
        }
    }

    /// Discrete cell derived from the continuous position
    pub fn cell(&self) -> Cell {
        Cell::new(self.x.floor() as i32, self.y.floor() as i32)
    }

    pub fn can_place_bomb(&self) -> bool {
        self.alive && self.bomb_cooldown == 0 && self.active_bombs < self.bomb_limit
    }

    /// Mark dead; returns false if the player was already dead
    pub fn kill(&mut self, tick: u64) -> bool {
        if !self.alive {
            return false;
        }
        self.alive = false;
        self.moving = None;
        self.bomb_requested = false;
        self.died_at_tick = Some(tick);
        true
    }

    pub fn apply_power_up(&mut self, kind: PowerUpKind) {
        match kind {
            PowerUpKind::ExtraBomb => {
                self.bomb_limit = (self.bomb_limit + 1).min(MAX_BOMB_LIMIT);
            }
            PowerUpKind::BlastRadius => {
                self.blast_radius = (self.blast_radius + 1).min(MAX_BLAST_RADIUS);
            }
            PowerUpKind::Speed => {
                self.speed = (self.speed + SPEED_STEP).min(MAX_SPEED);
            }
        }
    }
}

/// A placed bomb
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bomb {
    pub id: EntityId,
    pub owner: Uuid,
    pub cell: Cell,
    pub placed_at_tick: u64,
    pub fuse_ticks: u32,
    pub fuse_remaining: u32,
    /// Radius copied from the owner's stat at placement time
    pub radius: u32,
    /// Cleared the moment the bomb is scheduled to detonate, so it can
    /// never be triggered twice
    pub armed: bool,
}

impl Bomb {
    pub fn new(id: EntityId, owner: Uuid, cell: Cell, tick: u64, fuse_ticks: u32, radius: u32) -> Self {
        Self {
            id,
            owner,
            cell,
            placed_at_tick: tick,
            fuse_ticks,
            fuse_remaining: fuse_ticks,
            radius,
            armed: true,
        }
    }

    /// Count the fuse down one tick; true once it has burnt out
    pub fn tick_fuse(&mut self) -> bool {
        self.fuse_remaining = self.fuse_remaining.saturating_sub(1);
        self.fuse_remaining == 0
    }
}

/// Live blast area. Lethal to players and bombs on its cells until it fades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explosion {
    pub id: EntityId,
    /// Bomb this explosion replaced
    pub source: EntityId,
    pub owner: Uuid,
    pub origin: Cell,
    pub cells: Vec<Cell>,
    pub spawned_at_tick: u64,
    pub remaining_ticks: u32,
}

impl Explosion {
    pub fn covers(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    ExtraBomb,
    BlastRadius,
    Speed,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 3] = [
        PowerUpKind::ExtraBomb,
        PowerUpKind::BlastRadius,
        PowerUpKind::Speed,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerUp {
    pub id: EntityId,
    pub cell: Cell,
    pub kind: PowerUpKind,
}
