//! Per-job counters and their console report

use crate::state::JobState;
use chrono::{DateTime, Utc};

/// What one crawl job did
#[derive(Debug, Clone)]
pub struct JobSummary {
    /// Job name from the configuration
    pub job: String,

    /// Sheet the job's rows were appended to
    pub sheet: String,

    /// Final state of the job
    pub state: JobState,

    pub pages_total: usize,
    pub pages_skipped: usize,

    pub items_seen: usize,

    /// Items whose listing entry carried no URL
    pub items_blank: usize,

    /// Items whose page could not be fetched
    pub items_fetch_failed: usize,

    /// Items the record builder declined
    pub items_declined: usize,

    /// Records discarded because the body was empty
    pub records_empty: usize,

    pub records_written: usize,
    pub persist_failures: usize,

    pub attachments_downloaded: usize,
    pub attachments_skipped: usize,
    pub attachments_failed: usize,

    pub index_rows_appended: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobSummary {
    /// Creates an empty summary stamped with the current time
    pub fn new(job: &str, sheet: &str) -> Self {
        Self {
            job: job.to_string(),
            sheet: sheet.to_string(),
            state: JobState::Created,
            pages_total: 0,
            pages_skipped: 0,
            items_seen: 0,
            items_blank: 0,
            items_fetch_failed: 0,
            items_declined: 0,
            records_empty: 0,
            records_written: 0,
            persist_failures: 0,
            attachments_downloaded: 0,
            attachments_skipped: 0,
            attachments_failed: 0,
            index_rows_appended: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Items that did not become a written record
    pub fn items_skipped(&self) -> usize {
        self.items_blank + self.items_fetch_failed + self.items_declined
    }

    /// Wall-clock duration, once the job has finished
    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at.map(|f| (f - self.started_at).num_seconds())
    }

    /// Percentage of seen items that were written
    pub fn success_rate(&self) -> f64 {
        if self.items_seen == 0 {
            0.0
        } else {
            (self.records_written as f64 / self.items_seen as f64) * 100.0
        }
    }

    /// Marks the job finished in `state`
    pub fn finish(&mut self, state: JobState) {
        debug_assert!(state.is_terminal(), "job finished in non-terminal state {}", state);
        self.state = state;
        self.finished_at = Some(Utc::now());
    }
}

/// Prints a job summary to stdout
pub fn print_summary(summary: &JobSummary) {
    println!("=== {} ({}) ===", summary.job, summary.state);
    println!("  Sheet: {}", summary.sheet);
    println!(
        "  Pages: {} total, {} skipped",
        summary.pages_total, summary.pages_skipped
    );
    println!(
        "  Items: {} seen, {} skipped ({} blank, {} unreachable, {} declined)",
        summary.items_seen,
        summary.items_skipped(),
        summary.items_blank,
        summary.items_fetch_failed,
        summary.items_declined
    );
    println!(
        "  Records: {} written, {} empty, {} failed to persist ({:.1}%)",
        summary.records_written,
        summary.records_empty,
        summary.persist_failures,
        summary.success_rate()
    );

    let attachments =
        summary.attachments_downloaded + summary.attachments_skipped + summary.attachments_failed;
    if attachments > 0 {
        println!(
            "  Attachments: {} downloaded, {} skipped, {} failed",
            summary.attachments_downloaded, summary.attachments_skipped, summary.attachments_failed
        );
    }

    println!("  Index rows appended: {}", summary.index_rows_appended);
    if let Some(duration) = summary.duration_seconds() {
        println!("  Duration: {}s", duration);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_summary() {
        let summary = JobSummary::new("policy", "政策解读");
        assert_eq!(summary.state, JobState::Created);
        assert_eq!(summary.items_skipped(), 0);
        assert_eq!(summary.success_rate(), 0.0);
        assert!(summary.duration_seconds().is_none());
    }

    #[test]
    fn test_items_skipped_sums_reasons() {
        let mut summary = JobSummary::new("j", "s");
        summary.items_blank = 1;
        summary.items_fetch_failed = 2;
        summary.items_declined = 3;
        assert_eq!(summary.items_skipped(), 6);
    }

    #[test]
    fn test_success_rate() {
        let mut summary = JobSummary::new("j", "s");
        summary.items_seen = 4;
        summary.records_written = 3;
        assert_eq!(summary.success_rate(), 75.0);
    }

    #[test]
    fn test_finish() {
        let mut summary = JobSummary::new("j", "s");
        summary.finish(JobState::Completed);
        assert_eq!(summary.state, JobState::Completed);
        assert!(summary.duration_seconds().unwrap() >= 0);
    }
}
