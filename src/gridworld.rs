pub mod cell;
pub mod grid;
pub mod model;

use std::fmt;

pub use cell::{Cell, CellKind, Rewards};
pub use grid::{Grid, GridConfig};
pub use model::TransitionModel;

/// A position on the grid. `x` is the column and `y` the row, with `(0, 0)`
/// in the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Coord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The four moves available on the grid.
///
/// The declaration order `Up, Down, Left, Right` is the iteration order of
/// every action-keyed map in the crate, and therefore the order in which ties
/// are broken during policy improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    /// Arrow used by the textual policy dump.
    pub fn symbol(self) -> char {
        match self {
            Action::Up => '↑',
            Action::Down => '↓',
            Action::Left => '←',
            Action::Right => '→',
        }
    }

    /// The coordinate reached by moving one step from `from`, or `None` when
    /// the step leaves a `size`×`size` grid.
    pub fn step(self, from: Coord, size: usize) -> Option<Coord> {
        let Coord { x, y } = from;
        match self {
            Action::Up if y > 0 => Some(Coord::new(x, y - 1)),
            Action::Down if y + 1 < size => Some(Coord::new(x, y + 1)),
            Action::Left if x > 0 => Some(Coord::new(x - 1, y)),
            Action::Right if x + 1 < size => Some(Coord::new(x + 1, y)),
            _ => None,
        }
    }
}
