//! Independent random sampling across the parameter space.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use hl_types::{Candidate, Experiment, HlResult, ParameterPoint, ParameterSpace};

use crate::factory::OptimizerArguments;
use crate::optimizer::Optimizer;

const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Build the generator for one optimizer instance. A seeded instance is
/// offset by the number of finished candidates, so a worker rebuilt after a
/// finished trial does not replay the previous cycle's proposals.
pub(crate) fn instance_rng(random_state: Option<u64>, experiment: &Experiment) -> StdRng {
    match random_state {
        Some(seed) => {
            let offset = (experiment.finished().len() as u64).wrapping_mul(SEED_STRIDE);
            StdRng::seed_from_u64(seed.wrapping_add(offset))
        }
        None => StdRng::from_os_rng(),
    }
}

/// Draw one point: a uniform choice among the listed values of categorical
/// parameters, `warp_out` of a uniform draw for everything else.
pub(crate) fn sample_point<R: Rng>(space: &ParameterSpace, rng: &mut R) -> ParameterPoint {
    space
        .iter()
        .map(|(name, definition)| {
            let value = match definition.values() {
                Some(values) if definition.is_categorical() => {
                    values[rng.random_range(0..values.len())].clone()
                }
                _ => definition.warp_out(rng.random::<f64>()),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Random search. With a `random_state` the proposals are reproducible for a
/// given experiment history.
#[derive(Debug)]
pub struct RandomSearch {
    random_state: Option<u64>,
    rng: Option<StdRng>,
}

impl RandomSearch {
    pub fn new() -> Self {
        Self {
            random_state: None,
            rng: None,
        }
    }

    pub fn with_seed(random_state: u64) -> Self {
        Self {
            random_state: Some(random_state),
            rng: None,
        }
    }

    /// Recognized arguments: `random_state` (non-negative integer).
    pub fn from_arguments(arguments: &OptimizerArguments) -> HlResult<Self> {
        Ok(match arguments.get_u64("random_state")? {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        })
    }

    pub fn random_state(&self) -> Option<u64> {
        self.random_state
    }
}

impl Default for RandomSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer for RandomSearch {
    fn propose(&mut self, experiment: &Experiment, count: usize) -> HlResult<Vec<Candidate>> {
        let random_state = self.random_state;
        let rng = self
            .rng
            .get_or_insert_with(|| instance_rng(random_state, experiment));
        let space = experiment.parameter_space();
        let candidates: Vec<Candidate> = (0..count)
            .map(|_| Candidate::new(sample_point(space, rng)))
            .collect();
        debug!(
            experiment = experiment.name(),
            count = candidates.len(),
            "random search proposed candidates"
        );
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "random_search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl_types::{ParameterDefinition, ParameterValue};

    fn mixed_experiment() -> Experiment {
        let space = ParameterSpace::new()
            .add_min_max("x", -5.0, 10.0)
            .unwrap()
            .add_nominal("kernel", ["linear", "rbf", "poly"])
            .unwrap()
            .add("rate", ParameterDefinition::asymptotic(1.0, 0.0).unwrap())
            .add("layers", ParameterDefinition::fixed_value(vec![1.0, 2.0, 4.0]).unwrap())
            .add("size", ParameterDefinition::ordinal(["s", "m", "l"]).unwrap());
        Experiment::new("mixed", space, true)
    }

    #[test]
    fn proposals_are_valid() {
        let experiment = mixed_experiment();
        let mut search = RandomSearch::new();
        let candidates = search.propose(&experiment, 50).unwrap();
        assert_eq!(candidates.len(), 50);
        for candidate in &candidates {
            assert!(experiment.is_valid(candidate), "{candidate}");
            assert!(!candidate.is_evaluated());
        }
    }

    #[test]
    fn proposals_have_distinct_ids() {
        let experiment = mixed_experiment();
        let candidates = RandomSearch::with_seed(7).propose(&experiment, 10).unwrap();
        let mut ids: Vec<_> = candidates.iter().map(|c| c.id().clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn seeded_search_is_reproducible() {
        let experiment = mixed_experiment();
        let first = RandomSearch::with_seed(42).propose(&experiment, 5).unwrap();
        let second = RandomSearch::with_seed(42).propose(&experiment, 5).unwrap();
        let params = |cs: &[Candidate]| cs.iter().map(|c| c.params.clone()).collect::<Vec<_>>();
        assert_eq!(params(&first), params(&second));
    }

    #[test]
    fn seeded_search_moves_on_after_finished_trials() {
        let mut experiment = mixed_experiment();
        let before = RandomSearch::with_seed(42).propose(&experiment, 3).unwrap();

        let finished = before[0].clone().with_result(1.0);
        experiment.add_finished(finished).unwrap();
        let after = RandomSearch::with_seed(42).propose(&experiment, 3).unwrap();

        assert_ne!(before[0].params, after[0].params);
    }

    #[test]
    fn categorical_draws_cover_values() {
        let experiment = mixed_experiment();
        let candidates = RandomSearch::with_seed(3).propose(&experiment, 200).unwrap();
        for kernel in ["linear", "rbf", "poly"] {
            let expected = ParameterValue::from(kernel);
            assert!(candidates.iter().any(|c| c.params["kernel"] == expected));
        }
    }

    #[test]
    fn from_arguments_reads_random_state() {
        let arguments = OptimizerArguments::new().with("random_state", 11);
        assert_eq!(
            RandomSearch::from_arguments(&arguments).unwrap().random_state(),
            Some(11)
        );
        assert_eq!(
            RandomSearch::from_arguments(&OptimizerArguments::new())
                .unwrap()
                .random_state(),
            None
        );

        let bad = OptimizerArguments::new().with("random_state", "eleven");
        assert!(RandomSearch::from_arguments(&bad).is_err());
    }
}
