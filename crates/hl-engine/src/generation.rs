//! Background candidate generation.
//!
//! One generation worker runs per generation cycle on a dedicated thread. It
//! builds a fresh optimizer from the experiment's blueprint, proposes
//! candidates against an experiment snapshot and pushes them into a bounded
//! queue. The coordinator only ever polls that queue, so a slow or stuck
//! optimizer never stalls request handling.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hl_optimizer::OptimizerBlueprint;
use hl_types::{Candidate, Experiment, HlError, HlResult};

use crate::config::GenerationConfig;

/// Lifecycle of a generation worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    Running,
    Terminating,
    Stopped,
}

/// Snapshot of the current generation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStatus {
    /// Number of restarts since the assistant started.
    pub cycle: u64,
    pub state: GenerationState,
    pub optimizer: String,
    /// Candidates waiting in the queue.
    pub queued: usize,
    /// Candidates pushed into the queue during this cycle.
    pub proposed: u64,
    /// Why the worker stopped early, if it did.
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct WorkerShared {
    state: GenerationState,
    proposed: u64,
    last_error: Option<String>,
}

impl WorkerShared {
    fn stop(&mut self, error: Option<String>) {
        self.state = GenerationState::Stopped;
        if error.is_some() {
            self.last_error = error;
        }
    }
}

/// Coordinator-side handle to one generation worker.
///
/// Dropping the handle terminates the worker.
#[derive(Debug)]
pub(crate) struct GenerationHandle {
    cycle: u64,
    optimizer: String,
    queue: Receiver<Candidate>,
    stop: Option<Sender<()>>,
    token: CancellationToken,
    shared: Arc<RwLock<WorkerShared>>,
}

struct Worker {
    experiment: Experiment,
    blueprint: OptimizerBlueprint,
    batch_size: usize,
    queue: Sender<Candidate>,
    backlog: Receiver<Candidate>,
    stop: Receiver<()>,
    token: CancellationToken,
    shared: Arc<RwLock<WorkerShared>>,
}

impl GenerationHandle {
    /// Start a worker for `cycle` on a snapshot of the experiment. Failing to
    /// spawn the thread is logged and leaves a stopped handle behind.
    pub(crate) fn spawn(
        cycle: u64,
        experiment: Experiment,
        blueprint: OptimizerBlueprint,
        config: &GenerationConfig,
    ) -> Self {
        let (queue_tx, queue_rx) = bounded(config.queue_capacity);
        let (stop_tx, stop_rx) = bounded(1);
        let token = CancellationToken::new();
        let shared = Arc::new(RwLock::new(WorkerShared {
            state: GenerationState::Running,
            proposed: 0,
            last_error: None,
        }));

        let experiment_name = experiment.name().to_string();
        let optimizer = blueprint.name().to_string();
        let worker = Worker {
            experiment,
            blueprint,
            batch_size: config.batch_size,
            queue: queue_tx,
            backlog: queue_rx.clone(),
            stop: stop_rx,
            token: token.clone(),
            shared: Arc::clone(&shared),
        };

        let spawned = thread::Builder::new()
            .name(format!("hl-generation-{cycle}"))
            .spawn(move || worker.run());
        match spawned {
            Ok(_) => debug!(
                experiment = %experiment_name,
                cycle,
                optimizer = %optimizer,
                "generation worker started"
            ),
            Err(e) => {
                warn!(
                    experiment = %experiment_name,
                    cycle,
                    error = %e,
                    "failed to spawn generation worker"
                );
                shared
                    .write()
                    .stop(Some(format!("failed to spawn worker thread: {e}")));
            }
        }

        Self {
            cycle,
            optimizer,
            queue: queue_rx,
            stop: Some(stop_tx),
            token,
            shared,
        }
    }

    /// Take one queued candidate without waiting.
    pub(crate) fn try_next(&self) -> Option<Candidate> {
        self.queue.try_recv().ok()
    }

    /// Ask the worker to stop. Returns immediately; the worker observes the
    /// request between proposal steps or while blocked on a full queue, and
    /// empties the queue before reporting `Stopped`.
    pub(crate) fn terminate(&mut self) {
        self.token.cancel();
        // Disconnecting the stop channel wakes a worker blocked in `select!`.
        self.stop.take();
        let mut shared = self.shared.write();
        if shared.state == GenerationState::Running {
            shared.state = GenerationState::Terminating;
        }
    }

    /// Discard every queued candidate, returning how many were dropped.
    pub(crate) fn drain(&self) -> usize {
        self.queue.try_iter().count()
    }

    pub(crate) fn status(&self) -> GenerationStatus {
        let shared = self.shared.read();
        GenerationStatus {
            cycle: self.cycle,
            state: shared.state,
            optimizer: self.optimizer.clone(),
            queued: self.queue.len(),
            proposed: shared.proposed,
            last_error: shared.last_error.clone(),
        }
    }

    pub(crate) fn cycle(&self) -> u64 {
        self.cycle
    }
}

impl Drop for GenerationHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl Worker {
    fn run(self) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.generate()));
        let error = match outcome {
            Ok(Ok(())) => {
                debug!(experiment = self.experiment.name(), "generation worker finished");
                None
            }
            Ok(Err(e)) => {
                warn!(
                    experiment = self.experiment.name(),
                    optimizer = self.blueprint.name(),
                    error = %e,
                    "generation worker failed"
                );
                Some(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    experiment = self.experiment.name(),
                    optimizer = self.blueprint.name(),
                    panic = %message,
                    "generation worker panicked"
                );
                Some(format!("optimizer panicked: {message}"))
            }
        };
        if self.token.is_cancelled() {
            // A send may have raced the coordinator's drain.
            let discarded = self.backlog.try_iter().count();
            if discarded > 0 {
                debug!(experiment = self.experiment.name(), discarded, "cleared cancelled queue");
            }
        }
        self.shared.write().stop(error);
    }

    fn generate(&self) -> HlResult<()> {
        let mut optimizer = self.blueprint.build()?;
        loop {
            if self.token.is_cancelled() {
                return Ok(());
            }
            let batch = optimizer.propose(&self.experiment, self.batch_size)?;
            if batch.is_empty() {
                info!(
                    experiment = self.experiment.name(),
                    optimizer = optimizer.name(),
                    "optimizer has no further proposals"
                );
                return Ok(());
            }
            for candidate in batch {
                if let Err(e) = self.experiment.validate(&candidate) {
                    return Err(HlError::Optimizer(format!(
                        "{} proposed an invalid candidate: {e}",
                        optimizer.name()
                    )));
                }
                if self.token.is_cancelled() {
                    return Ok(());
                }
                select! {
                    send(self.queue, candidate) -> sent => {
                        if sent.is_err() {
                            return Ok(());
                        }
                    }
                    recv(self.stop) -> _ => return Ok(()),
                }
                self.shared.write().proposed += 1;
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
