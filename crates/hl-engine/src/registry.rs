//! Registry of running experiments.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

use hl_optimizer::OptimizerFactory;
use hl_types::{invalid_argument, Candidate, CandidateSets, CandidateStatus, HlError, HlResult};

use crate::assistant::ExperimentAssistant;
use crate::config::ExperimentConfig;
use crate::generation::GenerationStatus;

/// Registry-assigned experiment identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(String);

impl ExperimentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ExperimentId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ExperimentId {
    type Err = HlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(invalid_argument!("experiment id must not be empty"));
        }
        Ok(Self(s.to_string()))
    }
}

impl std::fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps experiment ids to their assistants and forwards requests by id.
#[derive(Debug)]
pub struct Registry {
    assistants: DashMap<ExperimentId, ExperimentAssistant>,
    factory: OptimizerFactory,
}

impl Registry {
    pub fn new(factory: OptimizerFactory) -> Self {
        Self {
            assistants: DashMap::new(),
            factory,
        }
    }

    /// Start an assistant for `config`. A fresh id is assigned unless `id`
    /// is given; an id already in use fails with `DuplicateExperiment`.
    pub fn create_experiment(
        &self,
        config: ExperimentConfig,
        id: Option<ExperimentId>,
    ) -> HlResult<ExperimentId> {
        let id = id.unwrap_or_default();
        match self.assistants.entry(id.clone()) {
            Entry::Occupied(_) => Err(HlError::DuplicateExperiment {
                experiment_id: id.to_string(),
            }),
            Entry::Vacant(slot) => {
                let assistant = ExperimentAssistant::start(config, &self.factory)?;
                info!(experiment_id = %id, name = assistant.name(), "experiment created");
                slot.insert(assistant);
                Ok(id)
            }
        }
    }

    pub fn contains(&self, id: &ExperimentId) -> bool {
        self.assistants.contains_key(id)
    }

    pub fn experiment_ids(&self) -> Vec<ExperimentId> {
        let mut ids: Vec<ExperimentId> = self.assistants.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.assistants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assistants.is_empty()
    }

    /// The assistant for `id`. The map guard is released before returning,
    /// so callers may hold the handle across awaits.
    pub fn assistant(&self, id: &ExperimentId) -> HlResult<ExperimentAssistant> {
        self.assistants
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| HlError::NotFound {
                experiment_id: id.to_string(),
            })
    }

    pub async fn next_candidate(&self, id: &ExperimentId) -> HlResult<Option<Candidate>> {
        self.assistant(id)?.get_next_candidate().await
    }

    pub async fn report_status(
        &self,
        id: &ExperimentId,
        candidate: Candidate,
        status: CandidateStatus,
    ) -> HlResult<()> {
        self.assistant(id)?.update(candidate, status).await
    }

    /// Untyped form of [`Registry::report_status`], as received from a wire
    /// interface: the status string and candidate object are checked before
    /// anything is forwarded.
    pub async fn report_status_value(
        &self,
        id: &ExperimentId,
        candidate: serde_json::Value,
        status: &str,
    ) -> HlResult<()> {
        let assistant = self.assistant(id)?;
        let status: CandidateStatus = status.parse()?;
        let candidate = Candidate::from_value(candidate)?;
        assistant.update(candidate, status).await
    }

    pub async fn best_candidate(&self, id: &ExperimentId) -> HlResult<Option<Candidate>> {
        self.assistant(id)?.get_best_candidate().await
    }

    pub async fn candidates(&self, id: &ExperimentId) -> HlResult<CandidateSets> {
        self.assistant(id)?.get_all_candidates().await
    }

    pub async fn generation_status(&self, id: &ExperimentId) -> HlResult<GenerationStatus> {
        self.assistant(id)?.generation_status().await
    }

    /// Stop one experiment and forget it.
    pub async fn exit_experiment(&self, id: &ExperimentId) -> HlResult<()> {
        let (_, assistant) = self
            .assistants
            .remove(id)
            .ok_or_else(|| HlError::NotFound {
                experiment_id: id.to_string(),
            })?;
        assistant.exit().await?;
        info!(experiment_id = %id, "experiment exited");
        Ok(())
    }

    /// Stop every experiment.
    pub async fn exit(&self) {
        for id in self.experiment_ids() {
            let Some((_, assistant)) = self.assistants.remove(&id) else {
                continue;
            };
            if let Err(e) = assistant.exit().await {
                warn!(experiment_id = %id, error = %e, "experiment already closed");
            }
        }
        info!("registry exited");
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(OptimizerFactory::with_defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl_types::ParameterSpace;

    fn config(name: &str) -> ExperimentConfig {
        let space = ParameterSpace::new().add_min_max("x", 0.0, 1.0).unwrap();
        ExperimentConfig::new(name, space)
    }

    #[test]
    fn experiment_ids() {
        let id: ExperimentId = "exp-1".parse().unwrap();
        assert_eq!(id.as_str(), "exp-1");
        assert_eq!(id.to_string(), "exp-1");
        assert!("  ".parse::<ExperimentId>().is_err());
        assert_ne!(ExperimentId::new(), ExperimentId::new());
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("exp-1"));
    }

    #[tokio::test]
    async fn create_list_and_exit() {
        let registry = Registry::default();
        let explicit: ExperimentId = "branin".parse().unwrap();
        let a = registry.create_experiment(config("a"), Some(explicit.clone())).unwrap();
        let b = registry.create_experiment(config("b"), None).unwrap();
        assert_eq!(a, explicit);
        assert_eq!(registry.len(), 2);

        let mut expected = vec![a.clone(), b.clone()];
        expected.sort();
        assert_eq!(registry.experiment_ids(), expected);

        registry.exit_experiment(&a).await.unwrap();
        assert!(!registry.contains(&a));
        assert!(registry.contains(&b));

        registry.exit().await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn failed_creation_leaves_no_entry() {
        let registry = Registry::default();
        let id: ExperimentId = "broken".parse().unwrap();
        let bad = config("broken").with_optimizer(crate::config::OptimizerConfig::new("nope"));
        assert!(registry.create_experiment(bad, Some(id.clone())).is_err());
        assert!(!registry.contains(&id));
    }
}
