//! # hl-engine
//!
//! Experiment coordination for Hyperlab.
//!
//! An [`ExperimentAssistant`] owns one experiment and serializes every request
//! against it through a single coordinating task, while a background
//! generation worker keeps a bounded queue of fresh candidates filled. The
//! [`Registry`] maps experiment ids to their assistants.

pub mod assistant;
pub mod config;
pub mod generation;
pub mod logging;
pub mod registry;

pub use assistant::ExperimentAssistant;
pub use config::{ExperimentConfig, GenerationConfig, OptimizerConfig};
pub use generation::{GenerationState, GenerationStatus};
pub use logging::{init_logging, LogFormat};
pub use registry::{ExperimentId, Registry};
