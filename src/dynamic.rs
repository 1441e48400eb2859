pub mod policy_algorithm;
pub mod policy_iteration;
pub mod render;
pub mod value_iteration;

#[cfg(test)]
mod tests;

pub use policy_algorithm::{
    Convergence, Policy, PolicyAlgorithm, SolverConfig, SolverCore, Termination, ValueFunction,
};
pub use policy_iteration::PolicyIteration;
pub use render::{ArrowCell, ValueCell};
pub use value_iteration::{round3, ValueIteration};
