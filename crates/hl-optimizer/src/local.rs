//! Local search around the best finished candidate.

use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

use hl_types::{config_error, Candidate, Experiment, HlResult, ParameterPoint};

use crate::factory::OptimizerArguments;
use crate::optimizer::Optimizer;
use crate::random::{instance_rng, sample_point};

/// Explore/exploit search without a surrogate model.
///
/// Until `initial_random_runs` trials have a result, every proposal is
/// random. Afterwards each proposal is random with probability
/// `exploration_weight`; otherwise it perturbs the best finished candidate by
/// a uniform jitter of half-width `perturbation` in warped space. Categorical
/// parameters keep the best value, except that with probability
/// `perturbation` they are redrawn.
#[derive(Debug)]
pub struct LocalSearch {
    initial_random_runs: usize,
    exploration_weight: f64,
    perturbation: f64,
    random_state: Option<u64>,
    rng: Option<StdRng>,
}

impl LocalSearch {
    pub const DEFAULT_INITIAL_RANDOM_RUNS: usize = 10;
    pub const DEFAULT_EXPLORATION_WEIGHT: f64 = 0.2;
    pub const DEFAULT_PERTURBATION: f64 = 0.1;

    pub fn new() -> Self {
        Self {
            initial_random_runs: Self::DEFAULT_INITIAL_RANDOM_RUNS,
            exploration_weight: Self::DEFAULT_EXPLORATION_WEIGHT,
            perturbation: Self::DEFAULT_PERTURBATION,
            random_state: None,
            rng: None,
        }
    }

    pub fn with_initial_random_runs(mut self, runs: usize) -> Self {
        self.initial_random_runs = runs;
        self
    }

    pub fn with_exploration_weight(mut self, weight: f64) -> HlResult<Self> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(config_error!(
                "exploration_weight must lie in [0, 1], got {weight}"
            ));
        }
        self.exploration_weight = weight;
        Ok(self)
    }

    pub fn with_perturbation(mut self, perturbation: f64) -> HlResult<Self> {
        if !(perturbation > 0.0 && perturbation <= 1.0) {
            return Err(config_error!(
                "perturbation must lie in (0, 1], got {perturbation}"
            ));
        }
        self.perturbation = perturbation;
        Ok(self)
    }

    pub fn with_seed(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Recognized arguments: `initial_random_runs`, `exploration_weight`,
    /// `perturbation`, `random_state`.
    pub fn from_arguments(arguments: &OptimizerArguments) -> HlResult<Self> {
        let mut search = Self::new();
        if let Some(runs) = arguments.get_usize("initial_random_runs")? {
            search = search.with_initial_random_runs(runs);
        }
        if let Some(weight) = arguments.get_f64("exploration_weight")? {
            search = search.with_exploration_weight(weight)?;
        }
        if let Some(perturbation) = arguments.get_f64("perturbation")? {
            search = search.with_perturbation(perturbation)?;
        }
        if let Some(seed) = arguments.get_u64("random_state")? {
            search = search.with_seed(seed);
        }
        Ok(search)
    }

    fn perturb(
        &self,
        experiment: &Experiment,
        best: &Candidate,
        rng: &mut StdRng,
    ) -> HlResult<ParameterPoint> {
        let space = experiment.parameter_space();
        let warped = space.warp_point_in(&best.params)?;
        let mut point = ParameterPoint::with_capacity(warped.len());
        let mut jittered = BTreeMap::new();

        for (name, definition) in space.iter() {
            match definition.values() {
                Some(values) if definition.is_categorical() => {
                    let value = if rng.random::<f64>() < self.perturbation {
                        values[rng.random_range(0..values.len())].clone()
                    } else {
                        best.params[name].clone()
                    };
                    point.insert(name.clone(), value);
                }
                _ => {
                    let u = warped[name]
                        + rng.random_range(-self.perturbation..=self.perturbation);
                    jittered.insert(name.clone(), u.clamp(0.0, 1.0));
                }
            }
        }

        point.extend(space.warp_point_out(&jittered)?);
        Ok(point)
    }
}

impl Default for LocalSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer for LocalSearch {
    fn propose(&mut self, experiment: &Experiment, count: usize) -> HlResult<Vec<Candidate>> {
        let random_state = self.random_state;
        let mut rng = self
            .rng
            .take()
            .unwrap_or_else(|| instance_rng(random_state, experiment));

        let evaluated = experiment
            .finished()
            .iter()
            .filter(|c| c.is_evaluated())
            .count();
        let best = experiment
            .best_candidate()
            .filter(|_| evaluated >= self.initial_random_runs);

        let mut candidates = Vec::with_capacity(count);
        let mut exploited = 0usize;
        for _ in 0..count {
            let params = match best {
                Some(best) if rng.random::<f64>() >= self.exploration_weight => {
                    exploited += 1;
                    self.perturb(experiment, best, &mut rng)?
                }
                _ => sample_point(experiment.parameter_space(), &mut rng),
            };
            candidates.push(Candidate::new(params));
        }
        self.rng = Some(rng);

        debug!(
            experiment = experiment.name(),
            evaluated,
            exploited,
            explored = candidates.len() - exploited,
            "local search proposed candidates"
        );
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "local_search"
    }
}
