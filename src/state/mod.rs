//! State module for tracking crawl job progress
//!
//! A crawl job moves through a small, fixed lifecycle:
//! `Created → PaginationResolving → (Failed | PageIterating) → (Failed | Completed)`.
//! Page- and item-level failures never move a job to `Failed`; only losing
//! the ability to paginate or to write the job's output does.

mod job_state;

pub use job_state::JobState;
