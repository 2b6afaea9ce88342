//! Running several crawl jobs at once
//!
//! Jobs share nothing mutable: each writes its own directory and appends
//! its own index batch. A semaphore bounds how many run at the same time.

use crate::crawler::coordinator::{CrawlJob, Coordinator};
use crate::output::JobSummary;
use crate::{HarvestError, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Cores left free for the rest of the system when sizing the pool
const RESERVED_CORES: usize = 2;

/// The result of one job in a parallel run
#[derive(Debug)]
pub struct JobOutcome {
    pub name: String,
    pub result: Result<JobSummary>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(summary) if summary.state.is_success())
    }
}

/// Default pool size: available cores minus two, at least one
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(RESERVED_CORES)
        .max(1)
}

/// Runs every job on its own task, at most `workers` at a time
///
/// Outcomes are returned in the order jobs were given, whatever order they
/// finished in. A job whose task panics is reported as a worker error.
pub async fn run_parallel(coordinator: Arc<Coordinator>, jobs: Vec<CrawlJob>, workers: usize) -> Vec<JobOutcome> {
    let workers = workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let names: Vec<String> = jobs.iter().map(|j| j.name.clone()).collect();

    tracing::info!("Running {} jobs on {} workers", jobs.len(), workers);

    let mut set = JoinSet::new();
    for (position, job) in jobs.into_iter().enumerate() {
        let coordinator = Arc::clone(&coordinator);
        let semaphore = Arc::clone(&semaphore);

        set.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => coordinator.run(&job).await,
                Err(e) => Err(HarvestError::Worker(e.to_string())),
            };
            (position, result)
        });
    }

    let mut results: Vec<Option<Result<JobSummary>>> = names.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((position, result)) => results[position] = Some(result),
            Err(e) => tracing::error!("Job task failed: {}", e),
        }
    }

    names
        .into_iter()
        .zip(results)
        .map(|(name, result)| JobOutcome {
            result: result.unwrap_or_else(|| Err(HarvestError::Worker(format!("job {} did not finish", name)))),
            name,
        })
        .collect()
}
