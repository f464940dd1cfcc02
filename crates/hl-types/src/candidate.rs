//! Candidates: single proposed or evaluated points of an experiment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{HlError, HlResult};
use crate::invalid_argument;
use crate::parameter::{ParameterPoint, ParameterValue};

/// Opaque candidate identity. Generated once at creation and never derived
/// from the candidate's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an id read back from storage or the wire.
    pub fn from_existing(id: impl Into<String>) -> HlResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(invalid_argument!("candidate id must not be empty"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CandidateId {
    type Error = HlError;

    fn try_from(id: String) -> HlResult<Self> {
        Self::from_existing(id)
    }
}

impl From<CandidateId> for String {
    fn from(id: CandidateId) -> Self {
        id.0
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status transitions a worker may report for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    /// Evaluation completed; the candidate carries its result.
    Finished,
    /// A worker is evaluating the candidate.
    Working,
    /// Evaluation was suspended and may be resumed by any worker.
    Pausing,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Working => "working",
            Self::Pausing => "pausing",
        }
    }
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = HlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "finished" => Ok(Self::Finished),
            "working" => Ok(Self::Working),
            "pausing" => Ok(Self::Pausing),
            other => Err(HlError::InvalidStatus {
                status: other.to_string(),
            }),
        }
    }
}

/// A single parameter point, together with the outcome of evaluating it.
///
/// Equality and hashing only consider the id: two candidates with identical
/// parameters are distinct, and a candidate restored from storage is the same
/// candidate even if its result changed in the meantime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    id: CandidateId,
    pub params: ParameterPoint,
    #[serde(default)]
    pub result: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
    /// Worker-owned payload (e.g. a checkpoint path for resuming). Never
    /// interpreted here.
    #[serde(default)]
    pub worker_information: Option<serde_json::Value>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default = "Utc::now")]
    pub last_update_time: DateTime<Utc>,
}

impl Candidate {
    /// Create an unevaluated candidate with a fresh id.
    pub fn new(params: ParameterPoint) -> Self {
        Self::restore(CandidateId::new(), params)
    }

    /// Rebuild a candidate that already has an identity.
    pub fn restore(id: CandidateId, params: ParameterPoint) -> Self {
        Self {
            id,
            params,
            result: None,
            cost: None,
            worker_information: None,
            failed: false,
            last_update_time: Utc::now(),
        }
    }

    /// Create a fresh candidate from an untyped parameter mapping.
    pub fn from_params_value(params: serde_json::Value) -> HlResult<Self> {
        let entries = match params {
            serde_json::Value::Object(entries) => entries,
            other => {
                return Err(invalid_argument!(
                    "candidate params must be a name to value mapping, got {other}"
                ))
            }
        };
        let params = entries
            .into_iter()
            .map(|(name, value)| -> HlResult<(String, ParameterValue)> {
                let value = serde_json::from_value(value)
                    .map_err(|e| invalid_argument!("parameter {name}: {e}"))?;
                Ok((name, value))
            })
            .collect::<HlResult<ParameterPoint>>()?;
        Ok(Self::new(params))
    }

    /// Restore a candidate from its serialized form.
    pub fn from_value(value: serde_json::Value) -> HlResult<Self> {
        if !value.is_object() {
            return Err(invalid_argument!("expected a candidate object, got {value}"));
        }
        if !value.get("params").is_some_and(serde_json::Value::is_object) {
            return Err(invalid_argument!(
                "candidate params must be a name to value mapping"
            ));
        }
        serde_json::from_value(value).map_err(|e| invalid_argument!("malformed candidate: {e}"))
    }

    pub fn to_value(&self) -> HlResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn id(&self) -> &CandidateId {
        &self.id
    }

    pub fn is_evaluated(&self) -> bool {
        self.result.is_some()
    }

    pub fn set_result(&mut self, result: f64) {
        self.result = Some(result);
        self.touch();
    }

    pub fn set_cost(&mut self, cost: f64) {
        self.cost = Some(cost);
        self.touch();
    }

    pub fn set_worker_information(&mut self, information: serde_json::Value) {
        self.worker_information = Some(information);
        self.touch();
    }

    pub fn mark_failed(&mut self) {
        self.failed = true;
        self.touch();
    }

    pub fn with_result(mut self, result: f64) -> Self {
        self.set_result(result);
        self
    }

    pub fn touch(&mut self) {
        self.last_update_time = Utc::now();
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Candidate {}

impl Hash for Candidate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.params.keys().collect();
        names.sort();
        write!(f, "Candidate {} {{", self.id)?;
        for (i, name) in names.into_iter().enumerate() {
            let separator = if i == 0 { " " } else { ", " };
            write!(f, "{separator}{name}: {}", self.params[name])?;
        }
        match self.result {
            Some(result) => write!(f, " }} result={result}"),
            None => write!(f, " }} unevaluated"),
        }
    }
}
