//! Experiment state: the parameter space plus the pending, working and
//! finished candidate sets.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::candidate::{Candidate, CandidateId, CandidateStatus};
use crate::errors::HlResult;
use crate::invalid_candidate;
use crate::parameter::{ParameterPoint, ParameterSpace};

/// Snapshot of every candidate of an experiment, grouped by state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSets {
    pub finished: Vec<Candidate>,
    pub pending: Vec<Candidate>,
    pub working: Vec<Candidate>,
}

impl CandidateSets {
    pub fn len(&self) -> usize {
        self.finished.len() + self.pending.len() + self.working.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a candidate currently lives inside an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateState {
    Pending,
    Working,
    Finished,
}

/// A search job: a parameter space and the candidates evaluated on it.
///
/// A candidate is a member of at most one of the three sets at any time.
/// The sets keep insertion order, so `pending` is served first-in first-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    name: String,
    parameter_space: ParameterSpace,
    minimization: bool,
    notes: Option<String>,
    pending: Vec<Candidate>,
    working: Vec<Candidate>,
    finished: Vec<Candidate>,
    best_candidate: Option<Candidate>,
}

impl Experiment {
    pub fn new(name: impl Into<String>, parameter_space: ParameterSpace, minimization: bool) -> Self {
        Self {
            name: name.into(),
            parameter_space,
            minimization,
            notes: None,
            pending: Vec::new(),
            working: Vec::new(),
            finished: Vec::new(),
            best_candidate: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    // -- set transitions ----------------------------------------------------

    /// Queue a candidate for evaluation.
    pub fn add_pending(&mut self, candidate: Candidate) -> HlResult<()> {
        self.transition(candidate, CandidateState::Pending)
    }

    /// Record that a worker started evaluating the candidate.
    pub fn add_working(&mut self, candidate: Candidate) -> HlResult<()> {
        self.transition(candidate, CandidateState::Working)
    }

    /// Record that evaluation was suspended. The candidate re-enters the
    /// pending queue behind everything already waiting there.
    pub fn add_pausing(&mut self, candidate: Candidate) -> HlResult<()> {
        self.transition(candidate, CandidateState::Pending)
    }

    /// Record a completed evaluation and refresh the best candidate.
    pub fn add_finished(&mut self, candidate: Candidate) -> HlResult<()> {
        self.transition(candidate, CandidateState::Finished)
    }

    /// Apply a worker-reported status.
    pub fn apply_status(&mut self, candidate: Candidate, status: CandidateStatus) -> HlResult<()> {
        match status {
            CandidateStatus::Finished => self.add_finished(candidate),
            CandidateStatus::Working => self.add_working(candidate),
            CandidateStatus::Pausing => self.add_pausing(candidate),
        }
    }

    /// Remove and return the earliest-queued pending candidate.
    pub fn take_next_pending(&mut self) -> Option<Candidate> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    fn transition(&mut self, candidate: Candidate, target: CandidateState) -> HlResult<()> {
        self.validate(&candidate)?;
        self.remove(candidate.id());
        match target {
            CandidateState::Pending => self.pending.push(candidate),
            CandidateState::Working => self.working.push(candidate),
            CandidateState::Finished => self.finished.push(candidate),
        }
        self.update_best();
        Ok(())
    }

    fn remove(&mut self, id: &CandidateId) -> Option<(CandidateState, Candidate)> {
        for (state, set) in [
            (CandidateState::Pending, &mut self.pending),
            (CandidateState::Working, &mut self.working),
            (CandidateState::Finished, &mut self.finished),
        ] {
            if let Some(index) = set.iter().position(|c| c.id() == id) {
                return Some((state, set.remove(index)));
            }
        }
        None
    }

    fn update_best(&mut self) {
        let mut best: Option<&Candidate> = None;
        for candidate in &self.finished {
            if self.better(Some(candidate), best) {
                best = Some(candidate);
            }
        }
        self.best_candidate = best.cloned();
    }

    // -- queries ------------------------------------------------------------

    /// Whether `a` beats `b` for this experiment's objective direction.
    ///
    /// A missing candidate or a missing result never wins; anything with a
    /// result beats a missing candidate or a missing result. A NaN result
    /// counts as missing.
    pub fn better(&self, a: Option<&Candidate>, b: Option<&Candidate>) -> bool {
        let Some(a_result) = comparable_result(a) else {
            return false;
        };
        let Some(b_result) = comparable_result(b) else {
            return true;
        };
        let ordering = a_result.total_cmp(&b_result);
        if self.minimization {
            ordering == Ordering::Less
        } else {
            ordering == Ordering::Greater
        }
    }

    /// Reject candidates whose parameter names differ from the space or whose
    /// values fall outside their domains.
    pub fn validate(&self, candidate: &Candidate) -> HlResult<()> {
        self.parameter_space
            .check_point(&candidate.params)
            .map_err(|e| invalid_candidate!("candidate {}: {e}", candidate.id()))
    }

    pub fn is_valid(&self, candidate: &Candidate) -> bool {
        self.validate(candidate).is_ok()
    }

    pub fn is_valid_params(&self, params: &ParameterPoint) -> bool {
        self.parameter_space.is_valid(params)
    }

    pub fn status_of(&self, id: &CandidateId) -> Option<CandidateState> {
        if self.pending.iter().any(|c| c.id() == id) {
            Some(CandidateState::Pending)
        } else if self.working.iter().any(|c| c.id() == id) {
            Some(CandidateState::Working)
        } else if self.finished.iter().any(|c| c.id() == id) {
            Some(CandidateState::Finished)
        } else {
            None
        }
    }

    pub fn candidate_count(&self) -> usize {
        self.pending.len() + self.working.len() + self.finished.len()
    }

    pub fn candidate_sets(&self) -> CandidateSets {
        CandidateSets {
            finished: self.finished.clone(),
            pending: self.pending.clone(),
            working: self.working.clone(),
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_space(&self) -> &ParameterSpace {
        &self.parameter_space
    }

    pub fn minimization(&self) -> bool {
        self.minimization
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn pending(&self) -> &[Candidate] {
        &self.pending
    }

    pub fn working(&self) -> &[Candidate] {
        &self.working
    }

    pub fn finished(&self) -> &[Candidate] {
        &self.finished
    }

    pub fn best_candidate(&self) -> Option<&Candidate> {
        self.best_candidate.as_ref()
    }
}

fn comparable_result(candidate: Option<&Candidate>) -> Option<f64> {
    candidate.and_then(|c| c.result).filter(|r| !r.is_nan())
}
