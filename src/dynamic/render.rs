//! Read-only snapshots of a solver for display layers: grid-shaped value and
//! arrow tables, plus plain-text dumps of both.

use ndarray::Array2;

use crate::dynamic::policy_algorithm::SolverCore;
use crate::gridworld::{Action, Coord};

/// One entry of [`SolverCore::value_grid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueCell {
    Value(f64),
    /// The end state.
    Terminal,
    /// An obstacle, or a state whose value has sunk below `-size²`.
    Unreachable,
}

/// One entry of [`SolverCore::arrow_grid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowCell {
    /// The policy's action; `hazard` marks traps.
    Move { action: Action, hazard: bool },
    /// The policy has not committed to an action yet.
    Undecided { hazard: bool },
    Terminal,
    Unreachable,
}

impl SolverCore<'_> {
    fn unreachable(&self, state: Coord) -> bool {
        let floor = -((self.grid().size() * self.grid().size()) as f64);
        self.value_function
            .get(&state)
            .map_or(true, |&value| value < floor)
    }

    /// Value snapshot indexed `[[y, x]]`.
    pub fn value_grid(&self) -> Array2<ValueCell> {
        let size = self.grid().size();
        Array2::from_shape_fn((size, size), |(y, x)| {
            let state = Coord::new(x, y);
            if state == self.grid().end() && self.value_function.contains_key(&state) {
                ValueCell::Terminal
            } else if self.unreachable(state) {
                ValueCell::Unreachable
            } else {
                ValueCell::Value(self.value_function[&state])
            }
        })
    }

    /// Arrow snapshot indexed `[[y, x]]`.
    pub fn arrow_grid(&self) -> Array2<ArrowCell> {
        let size = self.grid().size();
        Array2::from_shape_fn((size, size), |(y, x)| {
            let state = Coord::new(x, y);
            if state == self.grid().end() && self.value_function.contains_key(&state) {
                return ArrowCell::Terminal;
            }
            if self.unreachable(state) {
                return ArrowCell::Unreachable;
            }
            let hazard = self.grid()[state].is_trap();
            match self.greedy_action(state) {
                Some(action) => ArrowCell::Move { action, hazard },
                None => ArrowCell::Undecided { hazard },
            }
        })
    }

    /// Value table with `X` for unreachable states and `E` for the end.
    pub fn render_values(&self) -> String {
        self.render(&self.value_grid(), |cell| match *cell {
            ValueCell::Value(value) => value.to_string(),
            ValueCell::Terminal => "E".to_string(),
            ValueCell::Unreachable => "X".to_string(),
        })
    }

    /// Arrow table; traps get a trailing `*`.
    pub fn render_policy(&self) -> String {
        self.render(&self.arrow_grid(), |cell| match *cell {
            ArrowCell::Move { action, hazard } => {
                let mut symbol = action.symbol().to_string();
                if hazard {
                    symbol.push('*');
                }
                symbol
            }
            ArrowCell::Undecided { hazard: true } => "?*".to_string(),
            ArrowCell::Undecided { hazard: false } => "?".to_string(),
            ArrowCell::Terminal => "E".to_string(),
            ArrowCell::Unreachable => "X".to_string(),
        })
    }

    fn render<T>(&self, table: &Array2<T>, label: impl Fn(&T) -> String) -> String {
        let mut out = format!("{:^6}", "\\");
        for x in 0..self.grid().size() {
            out.push_str(&format!("{x:^6}"));
        }
        out.push('\n');
        for (y, row) in table.rows().into_iter().enumerate() {
            out.push_str(&format!("{y:^6}"));
            for cell in row {
                out.push_str(&format!("{:^6}", label(cell)));
            }
            out.push('\n');
        }
        out
    }
}
