//! Versioned entity snapshots and per-baseline diffs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::game::entity::{EntityId, PowerUpKind};
use crate::game::grid::{Cell, CellKind, Direction};
use crate::game::state::ArenaState;

use super::diff::StateDiff;

/// Stable identity of anything a client tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKey {
    Player(Uuid),
    Bomb(EntityId),
    Explosion(EntityId),
    PowerUp(EntityId),
    /// Map cell whose kind differs from the initial layout
    Tile(Cell),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub user_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub facing: Direction,
    pub alive: bool,
    pub active_bombs: u32,
    pub bomb_limit: u32,
    pub blast_radius: u32,
    pub speed: f32,
    pub kills: u32,
}

/// Clients derive the remaining fuse from `placed_at_tick + fuse_ticks`,
/// so the record only changes on placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BombView {
    pub id: EntityId,
    pub owner: Uuid,
    pub cell: Cell,
    pub placed_at_tick: u64,
    pub fuse_ticks: u32,
    pub radius: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplosionView {
    pub id: EntityId,
    pub origin: Cell,
    pub cells: Vec<Cell>,
    pub spawned_at_tick: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUpView {
    pub id: EntityId,
    pub cell: Cell,
    pub kind: PowerUpKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileView {
    pub cell: Cell,
    pub kind: CellKind,
}

/// Full record of one entity as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Player(PlayerView),
    Bomb(BombView),
    Explosion(ExplosionView),
    PowerUp(PowerUpView),
    Tile(TileView),
}

impl EntityState {
    pub fn key(&self) -> EntityKey {
        match self {
            EntityState::Player(p) => EntityKey::Player(p.user_id),
            EntityState::Bomb(b) => EntityKey::Bomb(b.id),
            EntityState::Explosion(e) => EntityKey::Explosion(e.id),
            EntityState::PowerUp(p) => EntityKey::PowerUp(p.id),
            EntityState::Tile(t) => EntityKey::Tile(t.cell),
        }
    }
}

/// Client-visible view of the arena after a tick
pub fn capture(state: &ArenaState) -> BTreeMap<EntityKey, EntityState> {
    let players = state.players.values().map(|p| {
        EntityState::Player(PlayerView {
            user_id: p.user_id,
            x: p.x,
            y: p.y,
            facing: p.facing,
            alive: p.alive,
            active_bombs: p.active_bombs,
            bomb_limit: p.bomb_limit,
            blast_radius: p.blast_radius,
            speed: p.speed,
            kills: p.kills,
        })
    });
    let bombs = state.bombs.values().map(|b| {
        EntityState::Bomb(BombView {
            id: b.id,
            owner: b.owner,
            cell: b.cell,
            placed_at_tick: b.placed_at_tick,
            fuse_ticks: b.fuse_ticks,
            radius: b.radius,
        })
    });
    let explosions = state.explosions.values().map(|e| {
        EntityState::Explosion(ExplosionView {
            id: e.id,
            origin: e.origin,
            cells: e.cells.clone(),
            spawned_at_tick: e.spawned_at_tick,
        })
    });
    let power_ups = state.power_ups.values().map(|p| {
        EntityState::PowerUp(PowerUpView {
            id: p.id,
            cell: p.cell,
            kind: p.kind,
        })
    });
    let tiles = state.destroyed_cells.iter().map(|&cell| {
        EntityState::Tile(TileView {
            cell,
            kind: CellKind::Empty,
        })
    });

    players
        .chain(bombs)
        .chain(explosions)
        .chain(power_ups)
        .chain(tiles)
        .map(|entity| (entity.key(), entity))
        .collect()
}

#[derive(Debug, Clone)]
struct Tracked {
    state: EntityState,
    /// Version at which this record last changed
    changed_at: u64,
}

/// Latest entity set plus enough history to diff against any
/// acknowledged version.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    version: u64,
    tick: u64,
    entities: BTreeMap<EntityKey, Tracked>,
    /// Removed entities and the version that removed them
    tombstones: BTreeMap<EntityKey, u64>,
    /// Tombstones at or below this version have been discarded
    pruned_through: u64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Record the post-tick entity set. The version only moves when
    /// something changed; returns whether it did.
    pub fn commit(&mut self, tick: u64, current: BTreeMap<EntityKey, EntityState>) -> bool {
        self.tick = tick;
        let next = self.version + 1;
        let mut changed = false;

        let removed: Vec<EntityKey> = self
            .entities
            .keys()
            .filter(|key| !current.contains_key(key))
            .copied()
            .collect();
        for key in removed {
            self.entities.remove(&key);
            self.tombstones.insert(key, next);
            changed = true;
        }

        for (key, state) in current {
            match self.entities.get_mut(&key) {
                Some(tracked) if tracked.state == state => {}
                Some(tracked) => {
                    tracked.state = state;
                    tracked.changed_at = next;
                    changed = true;
                }
                None => {
                    self.tombstones.remove(&key);
                    self.entities.insert(
                        key,
                        Tracked {
                            state,
                            changed_at: next,
                        },
                    );
                    changed = true;
                }
            }
        }

        if changed {
            self.version = next;
        }
        changed
    }

    /// Diff from `baseline` to the current version.
    ///
    /// Baseline 0, a baseline older than the retained tombstones, or one
    /// the store never produced all yield a full snapshot (baseline 0).
    pub fn diff_since(&self, baseline: u64) -> StateDiff {
        if baseline == 0 || baseline < self.pruned_through || baseline > self.version {
            return self.full();
        }

        StateDiff {
            version: self.version,
            baseline_version: baseline,
            tick: self.tick,
            entities_changed: self
                .entities
                .values()
                .filter(|t| t.changed_at > baseline)
                .map(|t| t.state.clone())
                .collect(),
            entities_removed: self
                .tombstones
                .iter()
                .filter(|(_, removed_at)| **removed_at > baseline)
                .map(|(key, _)| *key)
                .collect(),
        }
    }

    pub fn full(&self) -> StateDiff {
        StateDiff {
            version: self.version,
            baseline_version: 0,
            tick: self.tick,
            entities_changed: self.entities.values().map(|t| t.state.clone()).collect(),
            entities_removed: Vec::new(),
        }
    }

    /// Drop tombstones every client has already seen
    pub fn prune(&mut self, min_acked: u64) {
        if min_acked <= self.pruned_through {
            return;
        }
        self.tombstones.retain(|_, removed_at| *removed_at > min_acked);
        self.pruned_through = min_acked;
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(x: i32) -> EntityState {
        EntityState::Tile(TileView {
            cell: Cell::new(x, 0),
            kind: CellKind::Empty,
        })
    }

    fn power_up(id: u32, x: i32) -> EntityState {
        EntityState::PowerUp(PowerUpView {
            id: EntityId(id),
            cell: Cell::new(x, 0),
            kind: PowerUpKind::Speed,
        })
    }

    fn set(entities: &[EntityState]) -> BTreeMap<EntityKey, EntityState> {
        entities.iter().map(|e| (e.key(), e.clone())).collect()
    }

    #[test]
    fn test_version_only_moves_on_change() {
        let mut store = SnapshotStore::new();
        assert!(store.commit(1, set(&[tile(1)])));
        assert!(!store.commit(2, set(&[tile(1)])));
        assert_eq!(store.version(), 1);
        assert_eq!(store.tick(), 2);
    }

    #[test]
    fn test_diff_contains_only_changes_after_baseline() {
        let mut store = SnapshotStore::new();
        let mut entities = vec![power_up(100, 0)];
        // Versions 1..=10, one new tile each
        for x in 1..=10 {
            entities.push(tile(x));
            store.commit(x as u64, set(&entities));
        }
        assert_eq!(store.version(), 10);

        entities.push(tile(11));
        store.commit(11, set(&entities));
        entities.retain(|e| e.key() != EntityKey::PowerUp(EntityId(100)));
        store.commit(12, set(&entities));
        assert_eq!(store.version(), 12);

        let diff = store.diff_since(10);
        assert_eq!(diff.baseline_version, 10);
        assert_eq!(diff.version, 12);
        assert_eq!(diff.entities_changed, vec![tile(11)]);
        assert_eq!(diff.entities_removed, vec![EntityKey::PowerUp(EntityId(100))]);
    }

    #[test]
    fn test_unknown_baseline_gets_full_snapshot() {
        let mut store = SnapshotStore::new();
        store.commit(1, set(&[tile(1)]));
        store.commit(2, set(&[tile(1), tile(2)]));

        let diff = store.diff_since(9);
        assert!(diff.is_full());
        assert_eq!(diff.entities_changed.len(), 2);
    }

    #[test]
    fn test_pruned_baseline_gets_full_snapshot() {
        let mut store = SnapshotStore::new();
        store.commit(1, set(&[tile(1), tile(2)]));
        store.commit(2, set(&[tile(1)]));
        store.commit(3, set(&[tile(1), tile(3)]));
        store.prune(3);

        assert!(store.diff_since(1).is_full());
        assert!(!store.diff_since(3).is_full());
        assert!(store.diff_since(3).is_empty());
    }

    #[test]
    fn test_recreated_entity_clears_tombstone() {
        let mut store = SnapshotStore::new();
        store.commit(1, set(&[tile(1)]));
        store.commit(2, set(&[]));
        store.commit(3, set(&[tile(1)]));

        let diff = store.diff_since(1);
        assert!(diff.entities_removed.is_empty());
        assert_eq!(diff.entities_changed, vec![tile(1)]);
    }
}
