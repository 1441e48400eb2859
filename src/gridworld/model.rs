//! Transition model over a grid: for each state and intended action, the
//! probability of each action actually being carried out.

use std::collections::BTreeMap;

use log::debug;

use crate::error::{Error, Result};
use crate::gridworld::{Action, Coord, Grid};

/// Outcome distribution of one `(state, intended action)` pair.
pub type OutcomeRow = BTreeMap<Action, f64>;

/// A known MDP transition table built from a grid's neighbor graph.
///
/// In deterministic mode the intended action always fires. In stochastic mode
/// the intended action fires with probability `1 - epsilon` and the remaining
/// mass is split evenly over the other actions available in that state. End
/// and obstacle states have no rows.
#[derive(Debug, Clone)]
pub struct TransitionModel<'a> {
    grid: &'a Grid,
    deterministic: bool,
    epsilon: f64,
    transitions: BTreeMap<(Coord, Action), OutcomeRow>,
}

impl<'a> TransitionModel<'a> {
    /// Builds a model where every intended action fires with probability 1.
    pub fn deterministic(grid: &'a Grid) -> Self {
        let transitions = grid
            .coords()
            .filter(|&state| !grid[state].is_end())
            .flat_map(move |state| {
                grid[state]
                    .actions()
                    .map(move |action| ((state, action), OutcomeRow::from([(action, 1.0)])))
            })
            .collect();
        Self {
            grid,
            deterministic: true,
            epsilon: 0.0,
            transitions,
        }
    }

    /// Builds an epsilon-noisy model.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] unless `0 <= epsilon <= 1`.
    pub fn stochastic(grid: &'a Grid, epsilon: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(Error::InvalidArgument(format!(
                "epsilon must lie in [0, 1], got {epsilon}"
            )));
        }
        let mut transitions = BTreeMap::new();
        for state in grid.coords() {
            let cell = &grid[state];
            if cell.is_end() || cell.is_obstacle() {
                continue;
            }
            let available: Vec<Action> = cell.actions().collect();
            for &intended in &available {
                let others = available.len() - 1;
                let row = if others == 0 {
                    OutcomeRow::from([(intended, 1.0)])
                } else {
                    let slip = epsilon / others as f64;
                    available
                        .iter()
                        .map(|&actual| {
                            let p = if actual == intended { 1.0 - epsilon } else { slip };
                            (actual, p)
                        })
                        .collect()
                };
                transitions.insert((state, intended), row);
            }
        }
        debug!(
            "stochastic model with epsilon {epsilon}: {} state-action rows",
            transitions.len()
        );
        Ok(Self {
            grid,
            deterministic: false,
            epsilon,
            transitions,
        })
    }

    /// Builds either kind of model; `epsilon` is ignored when `deterministic`.
    pub fn new(grid: &'a Grid, deterministic: bool, epsilon: f64) -> Result<Self> {
        if deterministic {
            Ok(Self::deterministic(grid))
        } else {
            Self::stochastic(grid, epsilon)
        }
    }

    pub fn grid(&self) -> &'a Grid {
        self.grid
    }

    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The outcome distribution for `intended` in `state`.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for end or obstacle states and for actions
    /// not available in `state`.
    pub fn outcomes(&self, state: Coord, intended: Action) -> Result<&OutcomeRow> {
        self.transitions.get(&(state, intended)).ok_or_else(|| {
            Error::NotFound(format!("no transitions for {intended:?} in state {state}"))
        })
    }

    /// P(actual | state, intended).
    pub fn conditional_probability(
        &self,
        state: Coord,
        intended: Action,
        actual: Action,
    ) -> Result<f64> {
        self.outcomes(state, intended)?
            .get(&actual)
            .copied()
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "{actual:?} is not an outcome of {intended:?} in state {state}"
                ))
            })
    }

    /// Whether `state` has any outgoing transitions.
    pub fn has_transitions(&self, state: Coord) -> bool {
        Action::ALL
            .iter()
            .any(|&action| self.transitions.contains_key(&(state, action)))
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridworld::{GridConfig, Rewards};
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn open_grid() -> Grid {
        Grid::from_layout(&["S.O", "...", "O.E"], Rewards::default()).unwrap()
    }

    #[test]
    fn test_deterministic_rows() {
        let grid = open_grid();
        let model = TransitionModel::deterministic(&grid);
        let center = Coord::new(1, 1);
        for action in Action::ALL {
            assert_eq!(model.conditional_probability(center, action, action), Ok(1.0));
        }
        assert_eq!(model.outcomes(center, Action::Up).unwrap().len(), 1);
        assert!(model.is_deterministic());
    }

    #[test]
    fn test_no_rows_for_end() {
        let grid = open_grid();
        let model = TransitionModel::deterministic(&grid);
        assert!(!model.has_transitions(grid.end()));
        assert!(matches!(
            model.conditional_probability(grid.end(), Action::Up, Action::Up),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_unlisted_outcome_not_found() {
        let grid = open_grid();
        let model = TransitionModel::deterministic(&grid);
        let start = grid.start();
        assert!(matches!(
            model.conditional_probability(start, Action::Up, Action::Up),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            model.conditional_probability(start, Action::Down, Action::Right),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_stochastic_rows_sum_to_one() {
        let epsilon = 0.2;
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let grid = Grid::generate(&GridConfig::default(), &mut rng).unwrap();
            let model = TransitionModel::stochastic(&grid, epsilon).unwrap();
            for state in grid.coords() {
                let cell = &grid[state];
                if cell.is_end() || cell.is_obstacle() {
                    assert!(!model.has_transitions(state));
                    continue;
                }
                for intended in cell.actions() {
                    let row = model.outcomes(state, intended).unwrap();
                    let total: f64 = row.values().sum();
                    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
                    if cell.neighbors.len() >= 2 {
                        assert_abs_diff_eq!(row[&intended], 1.0 - epsilon, epsilon = 1e-12);
                    } else {
                        assert_eq!(row[&intended], 1.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_slip_mass_is_split_evenly() {
        let grid = open_grid();
        let model = TransitionModel::stochastic(&grid, 0.3).unwrap();
        let center = Coord::new(1, 1);
        let p = model
            .conditional_probability(center, Action::Up, Action::Left)
            .unwrap();
        assert_abs_diff_eq!(p, 0.1, epsilon = 1e-12);

        // The start corner only has Down and Right.
        let p = model
            .conditional_probability(grid.start(), Action::Down, Action::Right)
            .unwrap();
        assert_abs_diff_eq!(p, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_single_action_state_has_no_noise() {
        let grid = Grid::from_layout(&["S#O", ".#.", "O#E"], Rewards::default()).unwrap();
        let model = TransitionModel::stochastic(&grid, 0.5).unwrap();
        assert_eq!(
            model.conditional_probability(grid.start(), Action::Down, Action::Down),
            Ok(1.0)
        );
        let corridor = Coord::new(2, 1);
        assert_eq!(
            model.conditional_probability(corridor, Action::Up, Action::Down),
            Ok(0.5)
        );
        let top = grid.portal_top();
        assert_eq!(
            model.conditional_probability(top, Action::Down, Action::Down),
            Ok(1.0)
        );
    }

    #[test]
    fn test_epsilon_out_of_range() {
        let grid = open_grid();
        assert!(TransitionModel::stochastic(&grid, 1.5).is_err());
        assert!(TransitionModel::new(&grid, false, -0.1).is_err());
        assert!(TransitionModel::new(&grid, true, -0.1).is_ok());
    }
}
