//! Crawler module for walking paginated listings
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with User-Agent rotation and retry
//! - Page-count parsing and page URL expansion
//! - Per-job coordination from listing to index
//! - Running jobs in parallel

mod coordinator;
mod fetcher;
mod paginator;
mod pool;

pub use coordinator::{Coordinator, CrawlJob, OutputDestination};
pub use fetcher::{
    build_http_client, decode_html, declared_encodings, random_user_agent, FetchError, FetchSettings, Fetcher,
    USER_AGENTS,
};
pub use paginator::{expand_pages, parse_page_count, resolve_page_count, CrawlTarget, PageMarker, PaginationError};
pub use pool::{default_workers, run_parallel, JobOutcome};

use crate::Result;

/// Runs jobs one after another
///
/// A failed job is logged and the next one still runs.
pub async fn run_sequential(coordinator: &Coordinator, jobs: &[CrawlJob]) -> Vec<JobOutcome> {
    let mut outcomes = Vec::with_capacity(jobs.len());
    for job in jobs {
        let result: Result<_> = coordinator.run(job).await;
        if let Err(e) = &result {
            tracing::error!("Job {} failed: {}", job.name, e);
        }
        outcomes.push(JobOutcome {
            name: job.name.clone(),
            result,
        });
    }
    outcomes
}
