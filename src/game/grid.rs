//! Tile grid: fixed dimensions, mutable contents

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Default map size
pub const DEFAULT_WIDTH: i32 = 13;
pub const DEFAULT_HEIGHT: i32 = 11;

/// Chance that a free cell starts as a destructible block
const DESTRUCTIBLE_CHANCE: f64 = 0.4;
/// Chance that a cell left empty gets a walkable decoration
const DECORATION_CHANCE: f64 = 0.05;

/// What occupies a single tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Empty,
    /// Permanent wall; blocks movement and blasts
    Indestructible,
    /// Block that a blast turns into `Empty`
    Destructible,
    /// Walkable cosmetic tile
    Decoration,
}

impl CellKind {
    pub fn is_walkable(self) -> bool {
        matches!(self, CellKind::Empty | CellKind::Decoration)
    }
}

/// Integer tile coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbouring cell `steps` tiles away in `direction`
    pub fn offset(self, direction: Direction, steps: i32) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x + dx * steps,
            y: self.y + dy * steps,
        }
    }

    /// World-space centre of the tile
    pub fn center(self) -> (f32, f32) {
        (self.x as f32 + 0.5, self.y as f32 + 0.5)
    }
}

/// Axis direction for movement and blast rays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit step in grid space (y grows downwards)
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::Down
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("cell ({x}, {y}) is out of bounds")]
    OutOfBounds { x: i32, y: i32 },
}

/// W×H matrix of cell kinds. Dimensions never change after construction,
/// and the only content transition is Destructible -> Empty via `destroy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<CellKind>,
}

impl Grid {
    /// Grid with every cell set to `fill`
    pub fn filled(width: i32, height: i32, fill: CellKind) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![fill; (width * height) as usize],
        }
    }

    /// Parse a layout drawn as text rows:
    /// `.` empty, `#` indestructible, `+` destructible, `~` decoration.
    /// Unknown characters are treated as empty.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as i32;
        let mut grid = Self::filled(width, height, CellKind::Empty);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let kind = match ch {
                    '#' => CellKind::Indestructible,
                    '+' => CellKind::Destructible,
                    '~' => CellKind::Decoration,
                    _ => CellKind::Empty,
                };
                let idx = y * width as usize + x;
                grid.cells[idx] = kind;
            }
        }
        grid
    }

    /// Generate an arena: indestructible border and pillars on even/even
    /// interior cells, destructible blocks scattered elsewhere. Spawn
    /// corners are kept clear even where a pillar would fall.
    pub fn generate(width: i32, height: i32, spawns: &[Cell], rng: &mut ChaCha8Rng) -> Self {
        let mut grid = Self::filled(width, height, CellKind::Empty);
        let clear: Vec<Cell> = spawns
            .iter()
            .flat_map(|&spawn| spawn_clearance(spawn, grid.width, grid.height))
            .collect();

        for y in 0..grid.height {
            for x in 0..grid.width {
                let cell = Cell::new(x, y);
                let border = x == 0 || y == 0 || x == grid.width - 1 || y == grid.height - 1;
                let kind = if border {
                    CellKind::Indestructible
                } else if clear.contains(&cell) {
                    CellKind::Empty
                } else if x % 2 == 0 && y % 2 == 0 {
                    CellKind::Indestructible
                } else if rng.gen_bool(DESTRUCTIBLE_CHANCE) {
                    CellKind::Destructible
                } else if rng.gen_bool(DECORATION_CHANCE) {
                    CellKind::Decoration
                } else {
                    CellKind::Empty
                };
                let idx = grid.index_unchecked(cell);
                grid.cells[idx] = kind;
            }
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    pub fn cell_at(&self, cell: Cell) -> Result<CellKind, GridError> {
        self.index(cell).map(|idx| self.cells[idx])
    }

    /// Empty and Decoration cells can be walked on
    pub fn is_walkable(&self, cell: Cell) -> Result<bool, GridError> {
        self.cell_at(cell).map(CellKind::is_walkable)
    }

    /// Turn a Destructible cell into Empty. Returns whether anything changed;
    /// any other kind is left untouched.
    pub fn destroy(&mut self, cell: Cell) -> Result<bool, GridError> {
        let idx = self.index(cell)?;
        if self.cells[idx] == CellKind::Destructible {
            self.cells[idx] = CellKind::Empty;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Row-major copy of all cells, for the initial layout sent to clients
    pub fn cells(&self) -> &[CellKind] {
        &self.cells
    }

    fn index(&self, cell: Cell) -> Result<usize, GridError> {
        if self.in_bounds(cell) {
            Ok(self.index_unchecked(cell))
        } else {
            Err(GridError::OutOfBounds {
                x: cell.x,
                y: cell.y,
            })
        }
    }

    fn index_unchecked(&self, cell: Cell) -> usize {
        (cell.y * self.width + cell.x) as usize
    }
}

/// Spawn cell plus its neighbours toward the interior
fn spawn_clearance(spawn: Cell, width: i32, height: i32) -> Vec<Cell> {
    let step_x = if spawn.x < width / 2 { 1 } else { -1 };
    let step_y = if spawn.y < height / 2 { 1 } else { -1 };
    vec![
        spawn,
        Cell::new(spawn.x + step_x, spawn.y),
        Cell::new(spawn.x, spawn.y + step_y),
    ]
}

/// Spawn cells for the two player slots
pub fn spawn_cells(width: i32, height: i32) -> [Cell; 2] {
    [Cell::new(1, 1), Cell::new(width - 2, height - 2)]
}
