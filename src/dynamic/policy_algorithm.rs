//! State and fixed-point loop shared by policy iteration and value iteration.
//!
//! Both algorithms are undiscounted: a state's value is the reward for
//! standing on it plus the expected value of where the agent moves next.
//! `End` is absorbing and pinned at 0. Portals teleport rather than move, so
//! after every sweep the two portal values are exchanged.

use std::collections::BTreeMap;

use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::gridworld::{Action, Coord, Grid, TransitionModel};

/// Action distribution per state.
pub type Policy = BTreeMap<Coord, BTreeMap<Action, f64>>;

/// Scalar value per state.
pub type ValueFunction = BTreeMap<Coord, f64>;

/// Configuration for the iterative solvers.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Maximum number of sweeps
    pub epochs: usize,
    /// Convergence tolerance on the value delta
    pub tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epochs: 1000,
            tolerance: 0.01,
        }
    }
}

/// Why the solver loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The delta fell below tolerance (and, for policy iteration, the policy
    /// stopped changing).
    Converged,
    /// The last `size` deltas stayed within tolerance of each other without
    /// dropping below it.
    AlternatingPolicies,
    /// The epoch cap ran out first.
    EpochCap,
}

/// Diagnostics of one solver run.
#[derive(Debug, Clone, PartialEq)]
pub struct Convergence {
    /// L2 norm of the value change, one entry per sweep
    pub deltas: Vec<f64>,
    /// Number of sweeps performed
    pub epochs: usize,
    pub termination: Termination,
}

/// Policy, value function and model shared by every solver.
#[derive(Debug, Clone)]
pub struct SolverCore<'a> {
    model: &'a TransitionModel<'a>,
    config: SolverConfig,
    pub(crate) policy: Policy,
    pub(crate) value_function: ValueFunction,
}

impl<'a> SolverCore<'a> {
    /// Starts from a uniform policy over each state's actions, or an all-zero
    /// one when `zeros` is set, and a value function of 0 everywhere.
    pub fn new(model: &'a TransitionModel<'a>, config: SolverConfig, zeros: bool) -> Self {
        let grid = model.grid();
        Self {
            model,
            config,
            policy: Self::empty_policy(grid, zeros),
            value_function: Self::empty_value_function(grid),
        }
    }

    fn empty_policy(grid: &Grid, zeros: bool) -> Policy {
        grid.coords()
            .filter(|&state| !grid[state].is_end() && !grid[state].is_obstacle())
            .map(|state| {
                let cell = &grid[state];
                let p = if zeros {
                    0.0
                } else {
                    1.0 / cell.neighbors.len() as f64
                };
                (state, cell.actions().map(|action| (action, p)).collect())
            })
            .collect()
    }

    fn empty_value_function(grid: &Grid) -> ValueFunction {
        grid.coords()
            .filter(|&state| !grid[state].is_obstacle())
            .map(|state| (state, 0.0))
            .collect()
    }

    pub fn model(&self) -> &'a TransitionModel<'a> {
        self.model
    }

    pub fn grid(&self) -> &'a Grid {
        self.model.grid()
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn value_function(&self) -> &ValueFunction {
        &self.value_function
    }

    /// States updated by a sweep: everything with a value except `End`.
    pub(crate) fn sweep_states(&self) -> Vec<Coord> {
        let end = self.grid().end();
        self.value_function
            .keys()
            .copied()
            .filter(|&state| state != end)
            .collect()
    }

    /// Expected next-state value of `intended` in `state`:
    /// `sum_o P(o | state, intended) * V(neighbor(state, o))`.
    pub fn q_value(&self, state: Coord, intended: Action, values: &ValueFunction) -> Result<f64> {
        let cell = &self.grid()[state];
        let mut q = 0.0;
        for (&actual, &prob) in self.model.outcomes(state, intended)? {
            let next = cell.neighbors.get(&actual).ok_or_else(|| {
                Error::NotFound(format!("{state} has no neighbor towards {actual:?}"))
            })?;
            let value = values
                .get(next)
                .ok_or_else(|| Error::NotFound(format!("no value for state {next}")))?;
            q += prob * value;
        }
        Ok(q)
    }

    /// Greedy policy with respect to the current value function.
    ///
    /// Actions are scanned in `Action` order and only a strictly larger value
    /// replaces the current best, so ties go to the earliest action.
    pub fn policy_improvement(&self) -> Result<Policy> {
        let mut improved = Policy::new();
        for (&state, row) in &self.policy {
            let mut best_value = f64::NEG_INFINITY;
            let mut best_action = None;
            for &action in row.keys() {
                let q = self.q_value(state, action, &self.value_function)?;
                if q > best_value {
                    best_value = q;
                    best_action = Some(action);
                }
            }
            let greedy = row
                .keys()
                .map(|&action| {
                    let p = if Some(action) == best_action { 1.0 } else { 0.0 };
                    (action, p)
                })
                .collect();
            improved.insert(state, greedy);
        }
        Ok(improved)
    }

    pub fn policy_convergence(&self, old_policy: &Policy) -> bool {
        self.policy == *old_policy
    }

    /// L2 norm of the difference between the current value function and
    /// `old_value_function`.
    ///
    /// # Errors
    /// Returns [`Error::SizeMismatch`] when the two cover a different number
    /// of states.
    pub fn value_function_convergence(&self, old_value_function: &ValueFunction) -> Result<f64> {
        if old_value_function.len() != self.value_function.len() {
            return Err(Error::SizeMismatch {
                expected: self.value_function.len(),
                found: old_value_function.len(),
            });
        }
        let mut total = 0.0;
        for (state, value) in &self.value_function {
            let old = old_value_function
                .get(state)
                .ok_or_else(|| Error::NotFound(format!("no previous value for state {state}")))?;
            total += (value - old).powi(2);
        }
        Ok(total.sqrt())
    }

    /// Pins `End` to 0 and exchanges the two portal values.
    pub(crate) fn settle(grid: &Grid, values: &mut ValueFunction) {
        if let Some(end) = values.get_mut(&grid.end()) {
            *end = 0.0;
        }
        let (top, bottom) = (grid.portal_top(), grid.portal_bottom());
        if let (Some(&a), Some(&b)) = (values.get(&top), values.get(&bottom)) {
            values.insert(top, b);
            values.insert(bottom, a);
        }
    }

    /// The action the current policy takes with certainty in `state`.
    pub fn greedy_action(&self, state: Coord) -> Option<Action> {
        self.policy
            .get(&state)?
            .iter()
            .find(|(_, &p)| p == 1.0)
            .map(|(&action, _)| action)
    }
}

/// A dynamic-programming solver driven by the shared [`derive_policy`] loop.
///
/// [`derive_policy`]: PolicyAlgorithm::derive_policy
pub trait PolicyAlgorithm<'a> {
    fn core(&self) -> &SolverCore<'a>;

    fn core_mut(&mut self) -> &mut SolverCore<'a>;

    /// Runs one iteration step.
    fn process(&mut self) -> Result<()>;

    /// Whether an unchanged policy is required for convergence.
    fn tracks_policy(&self) -> bool {
        true
    }

    /// Called once after the loop with the number of sweeps performed.
    fn finish(&mut self, _epochs: usize) -> Result<()> {
        Ok(())
    }

    /// Iterates until convergence, alternating policies or the epoch cap.
    fn derive_policy(&mut self) -> Result<Convergence> {
        let SolverConfig { epochs, tolerance } = *self.core().config();
        let window = self.core().grid().size();
        let mut deltas = Vec::new();
        let mut termination = Termination::EpochCap;

        for epoch in 0..epochs {
            let old_policy = self.tracks_policy().then(|| self.core().policy.clone());
            let old_values = self.core().value_function.clone();

            self.process()?;

            let delta = self.core().value_function_convergence(&old_values)?;
            deltas.push(delta);
            trace!("epoch {epoch}: delta {delta}");

            let stable = old_policy
                .as_ref()
                .map_or(true, |old| self.core().policy_convergence(old));
            if stable && delta < tolerance {
                termination = Termination::Converged;
                break;
            }
            if alternating(&deltas, window, tolerance) {
                termination = Termination::AlternatingPolicies;
                break;
            }
        }

        let report = Convergence {
            epochs: deltas.len(),
            deltas,
            termination,
        };
        if termination == Termination::EpochCap && epochs > 0 {
            warn!("no convergence after {epochs} epochs");
        }
        debug!("stopped after {} epochs: {:?}", report.epochs, termination);
        self.finish(report.epochs)?;
        Ok(report)
    }
}

/// The last `window` deltas are all at or above `tolerance` yet within
/// `tolerance` of one another.
pub(crate) fn alternating(deltas: &[f64], window: usize, tolerance: f64) -> bool {
    if window == 0 || deltas.len() < window {
        return false;
    }
    let recent = &deltas[deltas.len() - window..];
    if recent.iter().any(|&delta| delta < tolerance) {
        return false;
    }
    let lo = recent.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = recent.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    hi - lo < tolerance
}
