//! Randomized grid-world Markov Decision Processes solved with policy
//! iteration and value iteration.
//!
//! A [`Grid`] is generated once from a seeded random source, a
//! [`TransitionModel`] is derived from its neighbor graph, and a solver built
//! on both iterates until its value function settles.
//!
//! ```
//! use gridworld_dp::{Grid, GridConfig, PolicyAlgorithm, SolverConfig, TransitionModel, ValueIteration};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(11);
//! let config = GridConfig { size: 6, ..GridConfig::default() };
//! let grid = Grid::generate(&config, &mut rng).unwrap();
//! let model = TransitionModel::stochastic(&grid, 0.1).unwrap();
//!
//! let mut solver = ValueIteration::new(&model, SolverConfig::default(), true);
//! let report = solver.derive_policy().unwrap();
//! assert_eq!(report.deltas.len(), report.epochs);
//! ```

pub mod dynamic;
pub mod error;
pub mod gridworld;

pub use dynamic::{
    ArrowCell, Convergence, PolicyAlgorithm, PolicyIteration, SolverConfig, Termination,
    ValueCell, ValueIteration,
};
pub use error::{Error, Result};
pub use gridworld::{Action, Cell, CellKind, Coord, Grid, GridConfig, Rewards, TransitionModel};
