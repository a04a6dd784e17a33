//! Blast propagation, destruction and chain reactions

use std::collections::BTreeSet;
use uuid::Uuid;

use super::entity::{EntityId, Explosion};
use super::grid::{Cell, CellKind, Direction, Grid};
use super::state::ArenaState;

/// Cells reached by one blast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlastArea {
    /// Every affected cell, origin first
    pub cells: Vec<Cell>,
    /// Subset of `cells` that held a destructible block
    pub destroyed: Vec<Cell>,
}

/// Walk the four rays out from `origin`.
///
/// A ray stops before an indestructible cell or the map edge, and stops
/// after the first destructible cell it reaches.
pub fn blast_area(grid: &Grid, origin: Cell, radius: u32) -> BlastArea {
    let mut area = BlastArea {
        cells: vec![origin],
        destroyed: Vec::new(),
    };
    if grid.cell_at(origin) == Ok(CellKind::Destructible) {
        area.destroyed.push(origin);
    }

    for direction in Direction::ALL {
        for step in 1..=radius as i32 {
            let cell = origin.offset(direction, step);
            match grid.cell_at(cell) {
                Err(_) | Ok(CellKind::Indestructible) => break,
                Ok(CellKind::Destructible) => {
                    area.cells.push(cell);
                    area.destroyed.push(cell);
                    break;
                }
                Ok(CellKind::Empty) | Ok(CellKind::Decoration) => area.cells.push(cell),
            }
        }
    }
    area
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kill {
    pub victim: Uuid,
    /// Owner of the bomb whose blast hit the victim
    pub killer: Uuid,
}

/// Everything one resolution pass changed
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Detonation {
    /// New explosion records, in detonation order
    pub explosions: Vec<EntityId>,
    pub kills: Vec<Kill>,
    /// Cells turned Destructible -> Empty
    pub destroyed: Vec<Cell>,
    /// Bombs set off by another blast rather than by their own fuse
    pub chained: Vec<EntityId>,
    /// Power-ups consumed by the blast
    pub burned: Vec<EntityId>,
    /// Power-ups revealed under destroyed blocks
    pub dropped: Vec<EntityId>,
}

impl Detonation {
    pub fn is_empty(&self) -> bool {
        self.explosions.is_empty()
    }
}

/// Detonate `trigger` and every bomb its blast reaches, depth-first.
///
/// A bomb is disarmed the moment it is scheduled, so no bomb can go off
/// twice however the chain loops back on itself. Unknown or already
/// disarmed bombs resolve to an empty result.
pub fn resolve(state: &mut ArenaState, trigger: EntityId) -> Detonation {
    let mut result = Detonation::default();

    match state.bombs.get_mut(&trigger) {
        Some(bomb) if bomb.armed => bomb.armed = false,
        _ => return result,
    }

    let mut pending = vec![trigger];
    while let Some(bomb_id) = pending.pop() {
        let Some(bomb) = state.bombs.remove(&bomb_id) else {
            continue;
        };

        if let Some(owner) = state.players.get_mut(&bomb.owner) {
            owner.active_bombs = owner.active_bombs.saturating_sub(1);
        }

        let area = blast_area(&state.grid, bomb.cell, bomb.radius);
        let covered: BTreeSet<Cell> = area.cells.iter().copied().collect();

        for &cell in &area.destroyed {
            if let Ok(true) = state.grid.destroy(cell) {
                state.destroyed_cells.push(cell);
                result.destroyed.push(cell);
            }
        }

        let burned: Vec<EntityId> = state
            .power_ups
            .values()
            .filter(|p| covered.contains(&p.cell))
            .map(|p| p.id)
            .collect();
        for id in burned {
            state.power_ups.remove(&id);
            result.burned.push(id);
        }

        let victims: Vec<Uuid> = state
            .players
            .values()
            .filter(|p| p.alive && covered.contains(&p.cell()))
            .map(|p| p.user_id)
            .collect();
        for victim in victims {
            kill_player(state, victim, bomb.owner, &mut result);
        }

        for other in state.bombs.values_mut() {
            if other.armed && covered.contains(&other.cell) {
                other.armed = false;
                pending.push(other.id);
                result.chained.push(other.id);
            }
        }

        let id = state.alloc_id();
        state.explosions.insert(
            id,
            Explosion {
                id,
                source: bomb.id,
                owner: bomb.owner,
                origin: bomb.cell,
                cells: area.cells,
                spawned_at_tick: state.tick,
                remaining_ticks: state.rules.explosion_ticks,
            },
        );
        result.explosions.push(id);
    }

    // Drops appear once the whole chain has burnt out
    for cell in result.destroyed.clone() {
        if let Some(id) = state.maybe_drop_power_up(cell) {
            result.dropped.push(id);
        }
    }

    result
}

/// Mark `victim` dead and credit the kill; self-kills earn nothing
pub fn kill_player(state: &mut ArenaState, victim: Uuid, killer: Uuid, result: &mut Detonation) {
    let tick = state.tick;
    let Some(player) = state.players.get_mut(&victim) else {
        return;
    };
    if !player.kill(tick) {
        return;
    }
    if killer != victim {
        if let Some(credited) = state.players.get_mut(&killer) {
            credited.kills += 1;
        }
    }
    result.kills.push(Kill { victim, killer });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::Bomb;
    use crate::game::state::Rules;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn no_drops() -> Rules {
        Rules {
            power_up_chance: 0.0,
            ..Rules::default()
        }
    }

    fn arena(grid: Grid) -> ArenaState {
        ArenaState::with_grid(grid, no_drops(), ChaCha8Rng::seed_from_u64(3))
    }

    fn drop_bomb(state: &mut ArenaState, owner: Uuid, cell: Cell, radius: u32) -> EntityId {
        let id = state.alloc_id();
        state
            .bombs
            .insert(id, Bomb::new(id, owner, cell, state.tick, 60, radius));
        id
    }

    fn sorted(mut cells: Vec<Cell>) -> Vec<Cell> {
        cells.sort();
        cells
    }

    #[test]
    fn test_radius_one_on_destructible_grid() {
        let mut state = arena(Grid::filled(11, 11, CellKind::Destructible));
        let bomb = drop_bomb(&mut state, Uuid::new_v4(), Cell::new(5, 5), 1);

        let result = resolve(&mut state, bomb);

        let expected = sorted(vec![
            Cell::new(5, 5),
            Cell::new(4, 5),
            Cell::new(6, 5),
            Cell::new(5, 4),
            Cell::new(5, 6),
        ]);
        let explosion = &state.explosions[&result.explosions[0]];
        assert_eq!(sorted(explosion.cells.clone()), expected);
        assert_eq!(sorted(result.destroyed.clone()), expected);
        for cell in expected {
            assert_eq!(state.grid.cell_at(cell), Ok(CellKind::Empty));
        }
        assert_eq!(state.grid.cell_at(Cell::new(7, 5)), Ok(CellKind::Destructible));
        assert!(state.bombs.is_empty());
    }

    #[test]
    fn test_wall_blocks_ray() {
        let grid = Grid::from_rows(&[
            "...........",
            "...........",
            "...........",
            "...........",
            "...........",
            "......#....",
            "...........",
        ]);
        let area = blast_area(&grid, Cell::new(5, 5), 3);

        assert!(!area.cells.iter().any(|c| c.x > 5 && c.y == 5));
        assert!(area.cells.contains(&Cell::new(5, 5)));
        assert!(area.cells.contains(&Cell::new(2, 5)));
        assert!(area.destroyed.is_empty());
        assert_eq!(grid.cell_at(Cell::new(6, 5)), Ok(CellKind::Indestructible));
    }

    #[test]
    fn test_player_in_blast_dies_and_credits_owner() {
        let mut state = arena(Grid::filled(11, 11, CellKind::Destructible));
        let bomber = Uuid::new_v4();
        let victim = Uuid::new_v4();
        state.place_player(bomber, 0, Cell::new(9, 9));
        state.place_player(victim, 1, Cell::new(5, 6));
        state.players.get_mut(&bomber).unwrap().active_bombs = 1;

        let bomb = drop_bomb(&mut state, bomber, Cell::new(5, 5), 1);
        let result = resolve(&mut state, bomb);

        assert!(!state.players[&victim].alive);
        assert_eq!(state.players[&bomber].kills, 1);
        assert_eq!(state.players[&bomber].active_bombs, 0);
        assert_eq!(result.kills, vec![Kill { victim, killer: bomber }]);
    }

    #[test]
    fn test_self_kill_earns_no_credit() {
        let mut state = arena(Grid::filled(7, 7, CellKind::Empty));
        let bomber = Uuid::new_v4();
        state.place_player(bomber, 0, Cell::new(3, 3));

        let bomb = drop_bomb(&mut state, bomber, Cell::new(3, 3), 2);
        let result = resolve(&mut state, bomb);

        assert!(!state.players[&bomber].alive);
        assert_eq!(state.players[&bomber].kills, 0);
        assert_eq!(result.kills.len(), 1);
    }

    #[test]
    fn test_chain_reaction() {
        let mut state = arena(Grid::filled(9, 3, CellKind::Empty));
        let owner = Uuid::new_v4();
        let first = drop_bomb(&mut state, owner, Cell::new(1, 1), 2);
        let second = drop_bomb(&mut state, owner, Cell::new(3, 1), 2);
        let third = drop_bomb(&mut state, owner, Cell::new(5, 1), 2);
        let far = drop_bomb(&mut state, owner, Cell::new(8, 1), 1);

        let result = resolve(&mut state, first);

        assert_eq!(result.chained, vec![second, third]);
        assert_eq!(result.explosions.len(), 3);
        assert_eq!(state.bombs.keys().copied().collect::<Vec<_>>(), vec![far]);
    }

    #[test]
    fn test_blast_burns_power_ups() {
        let mut state = arena(Grid::filled(7, 7, CellKind::Empty));
        state.rules.power_up_chance = 1.0;
        let dropped = state.maybe_drop_power_up(Cell::new(3, 4)).unwrap();
        state.rules.power_up_chance = 0.0;

        let bomb = drop_bomb(&mut state, Uuid::new_v4(), Cell::new(3, 3), 1);
        let result = resolve(&mut state, bomb);

        assert_eq!(result.burned, vec![dropped]);
        assert!(state.power_ups.is_empty());
    }

    #[test]
    fn test_disarmed_bomb_does_nothing() {
        let mut state = arena(Grid::filled(5, 5, CellKind::Empty));
        let bomb = drop_bomb(&mut state, Uuid::new_v4(), Cell::new(2, 2), 1);
        state.bombs.get_mut(&bomb).unwrap().armed = false;

        assert!(resolve(&mut state, bomb).is_empty());
        assert!(resolve(&mut state, EntityId(999)).is_empty());
    }

    proptest! {
        #[test]
        fn prop_destruction_absorbs_ray(k in 1i32..6, extra in 0u32..6) {
            let mut row: Vec<char> = vec!['.'; 12];
            row[k as usize] = '+';
            let row: String = row.into_iter().collect();
            let grid = Grid::from_rows(&[row.as_str()]);

            let area = blast_area(&grid, Cell::new(0, 0), k as u32 + extra);
            let furthest = area.cells.iter().map(|c| c.x).max().unwrap();

            prop_assert_eq!(furthest, k);
            prop_assert_eq!(area.destroyed, vec![Cell::new(k, 0)]);
        }

        #[test]
        fn prop_chain_detonates_each_bomb_once(
            spots in proptest::collection::btree_set((0i32..7, 0i32..7), 1..20),
            radius in 1u32..5,
        ) {
            let mut state = arena(Grid::filled(7, 7, CellKind::Empty));
            let owner = Uuid::new_v4();
            let ids: Vec<EntityId> = spots
                .iter()
                .map(|&(x, y)| drop_bomb(&mut state, owner, Cell::new(x, y), radius))
                .collect();

            let result = resolve(&mut state, ids[0]);

            let sources: BTreeSet<EntityId> = state.explosions.values().map(|e| e.source).collect();
            prop_assert_eq!(sources.len(), result.explosions.len());
            prop_assert_eq!(result.explosions.len(), result.chained.len() + 1);
            prop_assert_eq!(state.bombs.len() + result.explosions.len(), ids.len());
            prop_assert!(state.bombs.values().all(|b| b.armed));
        }
    }
}
