//! Value iteration: applies the Bellman optimality update directly each sweep
//! and extracts a greedy policy once the loop is done.

use crate::dynamic::policy_algorithm::{PolicyAlgorithm, SolverConfig, SolverCore, ValueFunction};
use crate::error::Result;
use crate::gridworld::{Coord, TransitionModel};

/// Rounds to three decimal places, the precision kept between sweeps.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone)]
pub struct ValueIteration<'a> {
    core: SolverCore<'a>,
    synchronous: bool,
}

impl<'a> ValueIteration<'a> {
    /// Starts from an all-zero policy, which is only filled in after
    /// [`PolicyAlgorithm::derive_policy`] has run at least one sweep.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridworld_dp::dynamic::{PolicyAlgorithm, SolverConfig, ValueIteration};
    /// use gridworld_dp::gridworld::{Action, Grid, Rewards, TransitionModel};
    ///
    /// let grid = Grid::from_layout(&["S.O", "...", "O.E"], Rewards::default()).unwrap();
    /// let model = TransitionModel::deterministic(&grid);
    /// let mut solver = ValueIteration::new(&model, SolverConfig::default(), true);
    ///
    /// solver.derive_policy().unwrap();
    /// assert_eq!(solver.core().greedy_action(grid.start()), Some(Action::Down));
    /// ```
    pub fn new(model: &'a TransitionModel<'a>, config: SolverConfig, synchronous: bool) -> Self {
        Self {
            core: SolverCore::new(model, config, true),
            synchronous,
        }
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    /// `max_a [reward + sum_o P(o | state, a) * V(neighbor(state, o))]`,
    /// rounded to three decimals.
    fn bellman_update(&self, state: Coord, values: &ValueFunction) -> Result<f64> {
        let core = &self.core;
        let cell = &core.grid()[state];
        let mut best_val = f64::NEG_INFINITY;
        for action in cell.actions() {
            let q_sa = cell.reward + core.q_value(state, action, values)?;
            if q_sa > best_val {
                best_val = q_sa;
            }
        }
        Ok(round3(best_val))
    }

    /// Computes every new value from the values before the sweep.
    pub fn value_iter_sync(&mut self) -> Result<()> {
        let frozen = self.core.value_function.clone();
        let mut updated = frozen.clone();
        for state in self.core.sweep_states() {
            updated.insert(state, self.bellman_update(state, &frozen)?);
        }
        SolverCore::settle(self.core.grid(), &mut updated);
        self.core.value_function = updated;
        Ok(())
    }

    /// Commits each new value immediately.
    pub fn value_iter_async(&mut self) -> Result<()> {
        for state in self.core.sweep_states() {
            let value = self.bellman_update(state, &self.core.value_function)?;
            self.core.value_function.insert(state, value);
        }
        SolverCore::settle(self.core.grid(), &mut self.core.value_function);
        Ok(())
    }
}

impl<'a> PolicyAlgorithm<'a> for ValueIteration<'a> {
    fn core(&self) -> &SolverCore<'a> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SolverCore<'a> {
        &mut self.core
    }

    fn process(&mut self) -> Result<()> {
        if self.synchronous {
            self.value_iter_sync()
        } else {
            self.value_iter_async()
        }
    }

    fn tracks_policy(&self) -> bool {
        false
    }

    fn finish(&mut self, epochs: usize) -> Result<()> {
        if epochs > 0 {
            self.core.policy = self.core.policy_improvement()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridworld::{Grid, Rewards};

    #[test]
    fn test_round3() {
        assert_eq!(round3(-2.66666), -2.667);
        assert_eq!(round3(1.0004), 1.0);
        assert_eq!(round3(0.0125), 0.013);
    }

    #[test]
    fn test_sync_sweeps_on_open_grid() {
        let grid = Grid::from_layout(&["S.O", "...", "O.E"], Rewards::default()).unwrap();
        let model = TransitionModel::deterministic(&grid);
        let mut solver = ValueIteration::new(&model, SolverConfig::default(), true);

        solver.value_iter_sync().unwrap();
        assert_eq!(solver.core().value_function()[&grid.start()], -5.0);
        assert_eq!(solver.core().value_function()[&Coord::new(2, 1)], -1.0);

        solver.value_iter_sync().unwrap();
        assert_eq!(solver.core().value_function()[&grid.start()], -6.0);
        assert_eq!(solver.core().value_function()[&Coord::new(1, 1)], -2.0);
        assert_eq!(solver.core().value_function()[&Coord::new(2, 1)], -1.0);
    }

    #[test]
    fn test_values_kept_to_three_decimals() {
        let grid = Grid::from_layout(&["S.O", ".T.", "O.E"], Rewards::default()).unwrap();
        let model = TransitionModel::stochastic(&grid, 0.3).unwrap();
        let mut solver = ValueIteration::new(&model, SolverConfig::default(), true);
        for _ in 0..10 {
            solver.value_iter_sync().unwrap();
            for &value in solver.core().value_function().values() {
                let scaled = value * 1000.0;
                assert!((scaled - scaled.round()).abs() < 1e-6, "{value}");
            }
        }
    }

    #[test]
    fn test_policy_untouched_until_finish() {
        let grid = Grid::from_layout(&["S.O", "...", "O.E"], Rewards::default()).unwrap();
        let model = TransitionModel::deterministic(&grid);
        let mut solver = ValueIteration::new(&model, SolverConfig::default(), false);
        solver.process().unwrap();
        assert!(solver
            .core()
            .policy()
            .values()
            .all(|row| row.values().all(|&p| p == 0.0)));
        solver.finish(1).unwrap();
        assert!(solver
            .core()
            .policy()
            .values()
            .all(|row| row.values().sum::<f64>() == 1.0));
    }
}
