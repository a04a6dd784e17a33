//! Grid-cell collision for player movement

use super::entity::PlayerState;
use super::grid::{Cell, Direction, Grid};

/// Half the side of a player's bounding box, in tiles
pub const HALF_EXTENT: f32 = 0.49;

/// Advance `player` along `direction` for `dt` seconds.
///
/// Players travel along lane centres: the axis perpendicular to the move is
/// snapped to the middle of the current cell. The move is rejected, leaving
/// the position untouched, when the leading edge would enter a cell that is
/// not walkable, lies off the map, or is held by one of `blockers`.
/// Returns whether the player moved.
pub fn step_player(
    grid: &Grid,
    blockers: &[Cell],
    player: &mut PlayerState,
    direction: Direction,
    dt: f32,
) -> bool {
    if !player.alive {
        return false;
    }
    player.facing = direction;

    let current = player.cell();
    let (center_x, center_y) = current.center();
    let (dx, dy) = direction.delta();
    let distance = player.speed * dt;

    let (new_x, new_y) = if direction.is_horizontal() {
        (player.x + dx as f32 * distance, center_y)
    } else {
        (center_x, player.y + dy as f32 * distance)
    };

    let lead = Cell::new(
        (new_x + dx as f32 * HALF_EXTENT).floor() as i32,
        (new_y + dy as f32 * HALF_EXTENT).floor() as i32,
    );
    if lead != current {
        let open = grid.is_walkable(lead).unwrap_or(false);
        if !open || blockers.contains(&lead) {
            return false;
        }
    }

    player.x = new_x;
    player.y = new_y;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::CellKind;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn player_at(cell: Cell) -> PlayerState {
        PlayerState::new(Uuid::new_v4(), 0, cell)
    }

    #[test]
    fn test_moves_through_open_cells() {
        let grid = Grid::filled(5, 5, CellKind::Empty);
        let mut player = player_at(Cell::new(1, 1));

        for _ in 0..10 {
            assert!(step_player(&grid, &[], &mut player, Direction::Right, 1.0 / 30.0));
        }
        assert_eq!(player.cell(), Cell::new(2, 1));
        assert_eq!(player.facing, Direction::Right);
    }

    #[test]
    fn test_wall_rejects_move() {
        let grid = Grid::from_rows(&["#####", "#.+.#", "#####"]);
        let mut player = player_at(Cell::new(1, 1));

        assert!(!step_player(&grid, &[], &mut player, Direction::Right, 0.1));
        assert!(!step_player(&grid, &[], &mut player, Direction::Up, 0.1));
        assert_eq!((player.x, player.y), (1.5, 1.5));
        assert_eq!(player.facing, Direction::Up);
    }

    #[test]
    fn test_other_player_blocks() {
        let grid = Grid::filled(5, 5, CellKind::Empty);
        let mut player = player_at(Cell::new(1, 1));

        assert!(!step_player(&grid, &[Cell::new(1, 2)], &mut player, Direction::Down, 0.1));
        assert!(step_player(&grid, &[Cell::new(1, 2)], &mut player, Direction::Up, 0.1));
    }

    #[test]
    fn test_dead_player_cannot_move() {
        let grid = Grid::filled(5, 5, CellKind::Empty);
        let mut player = player_at(Cell::new(2, 2));
        player.kill(1);

        assert!(!step_player(&grid, &[], &mut player, Direction::Left, 0.1));
        assert_eq!(player.cell(), Cell::new(2, 2));
    }

    #[test]
    fn test_map_edge_rejects_move() {
        let grid = Grid::filled(3, 3, CellKind::Empty);
        let mut player = player_at(Cell::new(0, 0));

        assert!(!step_player(&grid, &[], &mut player, Direction::Left, 0.1));
        assert!(!step_player(&grid, &[], &mut player, Direction::Up, 0.1));
    }

    fn arb_kind() -> impl Strategy<Value = CellKind> {
        prop_oneof![
            3 => Just(CellKind::Empty),
            1 => Just(CellKind::Indestructible),
            1 => Just(CellKind::Destructible),
            1 => Just(CellKind::Decoration),
        ]
    }

    fn arb_direction() -> impl Strategy<Value = Direction> {
        prop_oneof![
            Just(Direction::Up),
            Just(Direction::Down),
            Just(Direction::Left),
            Just(Direction::Right),
        ]
    }

    proptest! {
        #[test]
        fn prop_never_enters_blocked_cell(
            kinds in proptest::collection::vec(arb_kind(), 36),
            moves in proptest::collection::vec(arb_direction(), 1..60),
            speed in 1.0f32..8.0,
        ) {
            let rows: Vec<String> = kinds
                .chunks(6)
                .map(|row| {
                    row.iter()
                        .map(|k| match k {
                            CellKind::Empty => '.',
                            CellKind::Indestructible => '#',
                            CellKind::Destructible => '+',
                            CellKind::Decoration => '~',
                        })
                        .collect()
                })
                .collect();
            let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
            let mut grid = Grid::from_rows(&rows);
            // Start on a guaranteed open cell
            grid.destroy(Cell::new(2, 2)).unwrap();
            prop_assume!(grid.is_walkable(Cell::new(2, 2)).unwrap());

            let mut player = player_at(Cell::new(2, 2));
            player.speed = speed;

            for direction in moves {
                let before = (player.x, player.y);
                let moved = step_player(&grid, &[], &mut player, direction, 1.0 / 30.0);
                if !moved {
                    prop_assert_eq!((player.x, player.y), before);
                }
                prop_assert_eq!(grid.is_walkable(player.cell()), Ok(true));
            }
        }
    }
}
