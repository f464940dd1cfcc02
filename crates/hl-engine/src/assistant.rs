//! The experiment assistant: a serializing coordinator around one experiment.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use hl_optimizer::{OptimizerBlueprint, OptimizerFactory};
use hl_types::{
    config_error, Candidate, CandidateSets, CandidateState, CandidateStatus, Experiment, HlError,
    HlResult,
};

use crate::config::{ExperimentConfig, GenerationConfig};
use crate::generation::{GenerationHandle, GenerationStatus};

enum Request {
    NextCandidate {
        reply: oneshot::Sender<Option<Candidate>>,
    },
    Update {
        candidate: Candidate,
        status: CandidateStatus,
        reply: oneshot::Sender<HlResult<()>>,
    },
    BestCandidate {
        reply: oneshot::Sender<Option<Candidate>>,
    },
    AllCandidates {
        reply: oneshot::Sender<CandidateSets>,
    },
    GenerationStatus {
        reply: oneshot::Sender<GenerationStatus>,
    },
    Exit {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running experiment coordinator.
///
/// Handles are cheap to clone and may be used from any number of tasks; every
/// request is queued and handled in arrival order by a single coordinating
/// task, which is the only code that touches the experiment. Once `exit` has
/// been processed, or every handle has been dropped, the coordinator stops
/// and further calls fail with [`HlError::AssistantClosed`].
#[derive(Debug, Clone)]
pub struct ExperimentAssistant {
    name: Arc<str>,
    requests: mpsc::Sender<Request>,
}

impl ExperimentAssistant {
    /// Resolve the configured optimizer and start the coordinator. Must be
    /// called from within a tokio runtime.
    pub fn start(config: ExperimentConfig, factory: &OptimizerFactory) -> HlResult<Self> {
        config.validate()?;
        let blueprint = factory.resolve(&config.optimizer.name, config.optimizer.arguments.clone())?;
        Self::with_experiment(config.build_experiment(), blueprint, config.generation)
    }

    /// Start a coordinator for an existing experiment, e.g. one restored with
    /// candidates already in its sets. The parameter space is re-validated.
    pub fn with_experiment(
        experiment: Experiment,
        blueprint: OptimizerBlueprint,
        generation: GenerationConfig,
    ) -> HlResult<Self> {
        experiment.parameter_space().validate()?;
        generation.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| config_error!("experiment assistant needs a tokio runtime: {e}"))?;

        let (requests, receiver) = mpsc::channel(generation.request_buffer);
        let name: Arc<str> = Arc::from(experiment.name());
        let worker = GenerationHandle::spawn(0, experiment.clone(), blueprint.clone(), &generation);
        let coordinator = Coordinator {
            experiment,
            blueprint,
            generation,
            worker,
            requests: receiver,
        };
        runtime.spawn(coordinator.run());

        Ok(Self { name, requests })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the coordinator has stopped accepting requests.
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    /// The next candidate to evaluate: the oldest pending candidate if there
    /// is one, otherwise a freshly generated candidate if one is ready.
    /// `Ok(None)` means nothing is available right now; it never waits for
    /// the generation worker.
    pub async fn get_next_candidate(&self) -> HlResult<Option<Candidate>> {
        self.call(|reply| Request::NextCandidate { reply }).await
    }

    /// Record a status change reported by a worker. A finished candidate
    /// restarts candidate generation with the updated experiment.
    pub async fn update(&self, candidate: Candidate, status: CandidateStatus) -> HlResult<()> {
        self.call(|reply| Request::Update {
            candidate,
            status,
            reply,
        })
        .await?
    }

    /// String-status form of [`ExperimentAssistant::update`]. Unknown
    /// statuses are rejected before anything is queued.
    pub async fn update_with_status(&self, candidate: Candidate, status: &str) -> HlResult<()> {
        let status: CandidateStatus = status.parse()?;
        self.update(candidate, status).await
    }

    pub async fn get_best_candidate(&self) -> HlResult<Option<Candidate>> {
        self.call(|reply| Request::BestCandidate { reply }).await
    }

    pub async fn get_all_candidates(&self) -> HlResult<CandidateSets> {
        self.call(|reply| Request::AllCandidates { reply }).await
    }

    pub async fn generation_status(&self) -> HlResult<GenerationStatus> {
        self.call(|reply| Request::GenerationStatus { reply }).await
    }

    /// Stop generation and stop accepting requests. Requests queued before
    /// the exit are still answered.
    pub async fn exit(&self) -> HlResult<()> {
        self.call(|reply| Request::Exit { reply }).await
    }

    async fn call<T>(&self, request: impl FnOnce(oneshot::Sender<T>) -> Request) -> HlResult<T> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(request(reply))
            .await
            .map_err(|_| self.closed())?;
        response.await.map_err(|_| self.closed())
    }

    fn closed(&self) -> HlError {
        HlError::AssistantClosed {
            experiment: self.name.to_string(),
        }
    }
}

struct Coordinator {
    experiment: Experiment,
    blueprint: OptimizerBlueprint,
    generation: GenerationConfig,
    worker: GenerationHandle,
    requests: mpsc::Receiver<Request>,
}

impl Coordinator {
    async fn run(mut self) {
        info!(
            experiment = self.experiment.name(),
            optimizer = self.blueprint.name(),
            minimization = self.experiment.minimization(),
            "experiment assistant started"
        );
        self.serve().await;
    }

    /// Answer requests until an exit request arrives or every handle is gone.
    async fn serve(&mut self) {
        while let Some(request) = self.requests.recv().await {
            if let Request::Exit { reply } = request {
                self.requests.close();
                self.worker.terminate();
                let discarded = self.worker.drain();
                info!(
                    experiment = self.experiment.name(),
                    discarded,
                    finished = self.experiment.finished().len(),
                    "experiment assistant exiting"
                );
                let _ = reply.send(());
                // Answer whatever was queued ahead of the close.
                while let Ok(request) = self.requests.try_recv() {
                    self.handle(request);
                }
                return;
            }
            self.handle(request);
        }

        self.worker.terminate();
        debug!(
            experiment = self.experiment.name(),
            "all assistant handles dropped, coordinator stopped"
        );
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::NextCandidate { reply } => {
                let _ = reply.send(self.next_candidate());
            }
            Request::Update {
                candidate,
                status,
                reply,
            } => {
                let _ = reply.send(self.update(candidate, status));
            }
            Request::BestCandidate { reply } => {
                let _ = reply.send(self.experiment.best_candidate().cloned());
            }
            Request::AllCandidates { reply } => {
                let _ = reply.send(self.experiment.candidate_sets());
            }
            Request::GenerationStatus { reply } => {
                let _ = reply.send(self.worker.status());
            }
            Request::Exit { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn next_candidate(&mut self) -> Option<Candidate> {
        if let Some(candidate) = self.experiment.take_next_pending() {
            debug!(
                experiment = self.experiment.name(),
                candidate = %candidate.id(),
                "handing out pending candidate"
            );
            return Some(candidate);
        }
        let candidate = self.worker.try_next();
        debug!(
            experiment = self.experiment.name(),
            candidate = ?candidate.as_ref().map(|c| c.id().to_string()),
            "handing out generated candidate"
        );
        candidate
    }

    fn update(&mut self, candidate: Candidate, status: CandidateStatus) -> HlResult<()> {
        let id = candidate.id().clone();
        let previous = self.experiment.status_of(&id);
        self.experiment.apply_status(candidate, status)?;

        debug!(
            experiment = self.experiment.name(),
            candidate = %id,
            status = %status,
            "candidate updated"
        );
        if previous == Some(CandidateState::Finished) && status != CandidateStatus::Finished {
            warn!(
                experiment = self.experiment.name(),
                candidate = %id,
                status = %status,
                "finished candidate moved back out of the finished set"
            );
        }
        if status == CandidateStatus::Finished {
            self.restart_generation();
        }
        Ok(())
    }

    fn restart_generation(&mut self) {
        self.worker.terminate();
        let discarded = self.worker.drain();
        let cycle = self.worker.cycle() + 1;
        self.worker = GenerationHandle::spawn(
            cycle,
            self.experiment.clone(),
            self.blueprint.clone(),
            &self.generation,
        );
        info!(
            experiment = self.experiment.name(),
            cycle,
            discarded,
            finished = self.experiment.finished().len(),
            best = ?self.experiment.best_candidate().and_then(|c| c.result),
            "restarted candidate generation"
        );
    }
}
