//! # hl-optimizer
//!
//! Search strategies for Hyperlab experiments.
//!
//! Provides the [`Optimizer`] capability, random and local search strategies,
//! and the [`OptimizerFactory`] that resolves configured strategy names into
//! blueprints the generation worker can instantiate on demand.

mod factory;
mod local;
mod optimizer;
mod random;

pub use factory::{OptimizerArguments, OptimizerBlueprint, OptimizerConstructor, OptimizerFactory};
pub use local::LocalSearch;
pub use optimizer::Optimizer;
pub use random::RandomSearch;
