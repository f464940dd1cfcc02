//! Experiment configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use hl_optimizer::OptimizerArguments;
use hl_types::{config_error, Experiment, HlResult, ParameterSpace};

/// Which optimizer to use and how to build it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub name: String,
    #[serde(default)]
    pub arguments: OptimizerArguments,
}

impl OptimizerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: OptimizerArguments::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments = self.arguments.with(key, value);
        self
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::new("random_search")
    }
}

/// Sizing of the generation worker and the request channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Candidates the worker may queue ahead of demand.
    pub queue_capacity: usize,
    /// Candidates requested from the optimizer per proposal step.
    pub batch_size: usize,
    /// Requests that may wait for the coordinator before callers back off.
    pub request_buffer: usize,
}

impl GenerationConfig {
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_request_buffer(mut self, request_buffer: usize) -> Self {
        self.request_buffer = request_buffer;
        self
    }

    pub fn validate(&self) -> HlResult<()> {
        for (field, value) in [
            ("queue_capacity", self.queue_capacity),
            ("batch_size", self.batch_size),
            ("request_buffer", self.request_buffer),
        ] {
            if value == 0 {
                return Err(config_error!("generation.{field} must be at least 1"));
            }
        }
        Ok(())
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            batch_size: 1,
            request_buffer: 256,
        }
    }
}

fn default_minimization() -> bool {
    true
}

/// Everything needed to start an experiment assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    pub parameter_definitions: ParameterSpace,
    #[serde(default = "default_minimization")]
    pub minimization: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl ExperimentConfig {
    pub fn new(name: impl Into<String>, parameter_definitions: ParameterSpace) -> Self {
        Self {
            name: name.into(),
            parameter_definitions,
            minimization: default_minimization(),
            notes: None,
            optimizer: OptimizerConfig::default(),
            generation: GenerationConfig::default(),
        }
    }

    pub fn with_minimization(mut self, minimization: bool) -> Self {
        self.minimization = minimization;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn from_json_str(json: &str) -> HlResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> HlResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Structural checks that do not need the optimizer factory.
    pub fn validate(&self) -> HlResult<()> {
        if self.name.trim().is_empty() {
            return Err(config_error!("experiment name must not be empty"));
        }
        if self.parameter_definitions.is_empty() {
            return Err(config_error!("experiment {} defines no parameters", self.name));
        }
        self.parameter_definitions.validate()?;
        self.generation.validate()
    }

    pub fn build_experiment(&self) -> Experiment {
        let experiment = Experiment::new(
            self.name.clone(),
            self.parameter_definitions.clone(),
            self.minimization,
        );
        match &self.notes {
            Some(notes) => experiment.with_notes(notes.clone()),
            None => experiment,
        }
    }
}
