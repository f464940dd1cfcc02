use anyhow::Context;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use hl_engine::{init_logging, ExperimentConfig, ExperimentId, LogFormat, OptimizerConfig, Registry};
use hl_types::{CandidateStatus, ParameterSpace};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{key} has an invalid value: {value}")),
        Err(_) => Ok(default),
    }
}

fn branin(x: f64, y: f64) -> f64 {
    let a = 1.0;
    let b = 5.1 / (4.0 * PI * PI);
    let c = 5.0 / PI;
    let r = 6.0;
    let s = 10.0;
    let t = 1.0 / (8.0 * PI);
    a * (y - b * x * x + c * x - r).powi(2) + s * (1.0 - t) * x.cos() + s
}

async fn evaluate(registry: Arc<Registry>, id: ExperimentId, worker: usize, budget: Arc<AtomicUsize>) -> anyhow::Result<usize> {
    let mut evaluated = 0;
    while budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
    {
        let mut candidate = loop {
            match registry.next_candidate(&id).await? {
                Some(candidate) => break candidate,
                None => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        };
        registry
            .report_status(&id, candidate.clone(), CandidateStatus::Working)
            .await?;

        let x = candidate.params["x"].as_f64().context("x is not numeric")?;
        let y = candidate.params["y"].as_f64().context("y is not numeric")?;
        candidate.set_result(branin(x, y));
        candidate.set_cost(1.0);
        registry
            .report_status(&id, candidate, CandidateStatus::Finished)
            .await?;
        evaluated += 1;
    }
    info!(worker, evaluated, "worker done");
    Ok(evaluated)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let format: LogFormat = env_or("HYPERLAB_LOG_FORMAT", LogFormat::Pretty)?;
    init_logging("info", format)?;

    let workers: usize = env_or("HYPERLAB_WORKERS", 4)?;
    let trials: usize = env_or("HYPERLAB_TRIALS", 60)?;
    let optimizer: String = env_or("HYPERLAB_OPTIMIZER", "local_search".to_string())?;

    let space = ParameterSpace::new()
        .add_min_max("x", -5.0, 10.0)?
        .add_min_max("y", 0.0, 15.0)?;
    let config = ExperimentConfig::new("branin", space)
        .with_notes("Branin-Hoo benchmark, global minimum 0.397887")
        .with_optimizer(OptimizerConfig::new(optimizer).with_argument("initial_random_runs", 10));

    let registry = Arc::new(Registry::default());
    let id = registry.create_experiment(config, None)?;
    info!(experiment_id = %id, workers, trials, "starting branin run");

    let budget = Arc::new(AtomicUsize::new(trials));
    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            tokio::spawn(evaluate(
                Arc::clone(&registry),
                id.clone(),
                worker,
                Arc::clone(&budget),
            ))
        })
        .collect();

    let mut evaluated = 0;
    for handle in handles {
        evaluated += handle.await??;
    }

    let best = registry
        .best_candidate(&id)
        .await?
        .context("no candidate finished with a result")?;
    let status = registry.generation_status(&id).await?;
    println!("evaluated {evaluated} candidates over {} generation cycles", status.cycle);
    println!("best: {best}");

    registry.exit().await;
    Ok(())
}
