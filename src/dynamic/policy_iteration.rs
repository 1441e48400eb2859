//! Policy iteration: one evaluation sweep under the current policy followed
//! by greedy improvement, repeated until the policy and values settle.

use crate::dynamic::policy_algorithm::{PolicyAlgorithm, SolverConfig, SolverCore, ValueFunction};
use crate::error::Result;
use crate::gridworld::{Coord, TransitionModel};

#[derive(Debug, Clone)]
pub struct PolicyIteration<'a> {
    core: SolverCore<'a>,
    synchronous: bool,
}

impl<'a> PolicyIteration<'a> {
    /// Starts from a uniform policy. `synchronous` selects whether each sweep
    /// reads a frozen copy of the values or updates them in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridworld_dp::dynamic::{PolicyAlgorithm, PolicyIteration, SolverConfig, Termination};
    /// use gridworld_dp::gridworld::{Grid, Rewards, TransitionModel};
    ///
    /// let grid = Grid::from_layout(&["S.O", "...", "O.E"], Rewards::default()).unwrap();
    /// let model = TransitionModel::deterministic(&grid);
    /// let mut solver = PolicyIteration::new(&model, SolverConfig::default(), true);
    ///
    /// let report = solver.derive_policy().unwrap();
    /// assert_eq!(report.termination, Termination::Converged);
    /// assert_eq!(solver.core().value_function()[&grid.start()], -8.0);
    /// ```
    pub fn new(model: &'a TransitionModel<'a>, config: SolverConfig, synchronous: bool) -> Self {
        Self {
            core: SolverCore::new(model, config, false),
            synchronous,
        }
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    fn expected_value(&self, state: Coord, values: &ValueFunction) -> Result<f64> {
        let core = &self.core;
        let mut value = core.grid()[state].reward;
        if let Some(row) = core.policy.get(&state) {
            for (&action, &p) in row {
                if p != 0.0 {
                    value += p * core.q_value(state, action, values)?;
                }
            }
        }
        Ok(value)
    }

    /// Evaluates every state against the values from before the sweep.
    pub fn policy_eval_sync(&mut self) -> Result<()> {
        let frozen = self.core.value_function.clone();
        let mut updated = frozen.clone();
        for state in self.core.sweep_states() {
            updated.insert(state, self.expected_value(state, &frozen)?);
        }
        SolverCore::settle(self.core.grid(), &mut updated);
        self.core.value_function = updated;
        Ok(())
    }

    /// Evaluates states in place, so later states see earlier updates.
    pub fn policy_eval_async(&mut self) -> Result<()> {
        for state in self.core.sweep_states() {
            let value = self.expected_value(state, &self.core.value_function)?;
            self.core.value_function.insert(state, value);
        }
        SolverCore::settle(self.core.grid(), &mut self.core.value_function);
        Ok(())
    }
}

impl<'a> PolicyAlgorithm<'a> for PolicyIteration<'a> {
    fn core(&self) -> &SolverCore<'a> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SolverCore<'a> {
        &mut self.core
    }

    fn process(&mut self) -> Result<()> {
        if self.synchronous {
            self.policy_eval_sync()?;
        } else {
            self.policy_eval_async()?;
        }
        self.core.policy = self.core.policy_improvement()?;
        Ok(())
    }
}
