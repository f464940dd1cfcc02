//! The optimizer capability shared by all search strategies.

use hl_types::{Candidate, Experiment, HlResult};

/// A strategy that proposes new candidates for an experiment.
///
/// Instances are owned by a single generation worker and may be discarded at
/// any time; a replacement is built from the same blueprint and fed the
/// latest experiment snapshot. Implementations must therefore derive all of
/// their knowledge from the snapshot passed to [`Optimizer::propose`].
pub trait Optimizer: Send {
    /// Propose up to `count` new candidates. Every returned candidate must
    /// satisfy `experiment.is_valid`.
    fn propose(&mut self, experiment: &Experiment, count: usize) -> HlResult<Vec<Candidate>>;

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}
