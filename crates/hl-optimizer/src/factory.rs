//! Explicit name → constructor map for optimizers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use hl_types::{config_error, HlError, HlResult};

use crate::local::LocalSearch;
use crate::optimizer::Optimizer;
use crate::random::RandomSearch;

/// Free-form optimizer arguments as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptimizerArguments(Map<String, Value>);

impl OptimizerArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> HlResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(config_error!(
                "optimizer arguments must be an object, got {other}"
            )),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn get_u64(&self, key: &str) -> HlResult<Option<u64>> {
        self.get(key)
            .map(|v| {
                v.as_u64().ok_or_else(|| {
                    config_error!("argument {key} must be a non-negative integer, got {v}")
                })
            })
            .transpose()
    }

    pub fn get_usize(&self, key: &str) -> HlResult<Option<usize>> {
        self.get_u64(key)?
            .map(|v| usize::try_from(v).map_err(|_| config_error!("argument {key} is too large: {v}")))
            .transpose()
    }

    pub fn get_f64(&self, key: &str) -> HlResult<Option<f64>> {
        self.get(key)
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| config_error!("argument {key} must be a number, got {v}"))
            })
            .transpose()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds one optimizer instance from its arguments.
pub type OptimizerConstructor =
    Arc<dyn Fn(&OptimizerArguments) -> HlResult<Box<dyn Optimizer>> + Send + Sync>;

/// Registry of optimizer constructors, built once at startup and handed to
/// whoever creates experiments.
#[derive(Clone, Default)]
pub struct OptimizerFactory {
    constructors: HashMap<String, OptimizerConstructor>,
}

impl OptimizerFactory {
    /// A factory with no registered optimizers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with `random_search` and `local_search` registered.
    pub fn with_defaults() -> Self {
        Self::new()
            .register("random_search", |arguments| {
                Ok(Box::new(RandomSearch::from_arguments(arguments)?))
            })
            .register("local_search", |arguments| {
                Ok(Box::new(LocalSearch::from_arguments(arguments)?))
            })
    }

    pub fn register<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&OptimizerArguments) -> HlResult<Box<dyn Optimizer>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up `name` and check that `arguments` actually build an instance.
    /// Fails with `UnknownOptimizer` or `Config` before anything is started.
    pub fn resolve(&self, name: &str, arguments: OptimizerArguments) -> HlResult<OptimizerBlueprint> {
        let constructor = self
            .constructors
            .get(name)
            .cloned()
            .ok_or_else(|| HlError::UnknownOptimizer {
                name: name.to_string(),
            })?;

        let blueprint = OptimizerBlueprint {
            name: name.to_string(),
            arguments,
            constructor,
        };
        blueprint.build().map_err(|e| match e {
            HlError::Config(_) => e,
            other => config_error!("optimizer {name} rejected its arguments: {other}"),
        })?;

        debug!(optimizer = name, "resolved optimizer");
        Ok(blueprint)
    }
}

impl fmt::Debug for OptimizerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizerFactory")
            .field("optimizers", &self.names())
            .finish()
    }
}

/// A resolved optimizer: its name, validated arguments and constructor.
/// Cheap to clone; every `build` yields a fresh instance.
#[derive(Clone)]
pub struct OptimizerBlueprint {
    name: String,
    arguments: OptimizerArguments,
    constructor: OptimizerConstructor,
}

impl OptimizerBlueprint {
    pub fn build(&self) -> HlResult<Box<dyn Optimizer>> {
        (self.constructor)(&self.arguments)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &OptimizerArguments {
        &self.arguments
    }
}

impl fmt::Debug for OptimizerBlueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizerBlueprint")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish()
    }
}
