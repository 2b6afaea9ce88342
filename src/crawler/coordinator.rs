//! Crawler coordinator - one job from listing to index
//!
//! A job walks through:
//! - Resolving how many listing pages the target has
//! - Fetching each listing page and extracting item references
//! - Fetching each item and building its record
//! - Persisting records as documents plus attachments
//! - Appending every written record to the index in one batch
//!
//! Everything inside a job runs sequentially. Page, item and record failures
//! are logged and skipped; only pagination and index failures end the job.

use crate::config::{JobEntry, OutputConfig};
use crate::crawler::paginator::{expand_pages, resolve_page_count, CrawlTarget};
use crate::crawler::Fetcher;
use crate::output::{persist_record, url_stem, JobSummary, Sink};
use crate::sites::{BuildContext, BulletinIssue, SchemaError, SiteProfile};
use crate::state::JobState;
use crate::{HarvestError, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Where a job's output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDestination {
    /// Directory documents are written into
    pub save_dir: PathBuf,

    /// Index database file
    pub index: PathBuf,

    /// Index sheet the job appends to
    pub sheet: String,
}

/// One unit of crawl work
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub name: String,
    pub target: CrawlTarget,
    pub profile: SiteProfile,
    pub output: OutputDestination,

    /// Bulletin issue label, recorded as the leading index column
    pub issue: Option<String>,
}

impl CrawlJob {
    /// Builds a job from its configuration entry
    pub fn from_entry(entry: &JobEntry, output: &OutputConfig) -> std::result::Result<Self, SchemaError> {
        let target = match &entry.page_marker {
            Some(marker) => CrawlTarget::paginated(&entry.url, marker.clone()),
            None => CrawlTarget::single_page(&entry.url),
        };

        Ok(Self {
            name: entry.name.clone(),
            target,
            profile: entry.site.profile()?,
            output: OutputDestination {
                save_dir: entry.output_dir(&output.root),
                index: output.index_path(),
                sheet: entry.sheet_name(),
            },
            issue: None,
        })
    }

    /// Builds the job for one bulletin issue
    ///
    /// Issues share the entry's sheet; each gets its own subdirectory named
    /// after the issue.
    pub fn for_issue(
        entry: &JobEntry,
        output: &OutputConfig,
        issue: &BulletinIssue,
    ) -> std::result::Result<Self, SchemaError> {
        let mut job = Self::from_entry(entry, output)?;
        job.name = format!("{}/{}", entry.name, issue.title);
        job.target = CrawlTarget::single_page(&issue.url);
        job.output.save_dir = job
            .output
            .save_dir
            .join(crate::output::filename::sanitize_filename(&issue.title));
        job.issue = Some(issue.title.clone());
        Ok(job)
    }
}

/// Runs crawl jobs against a fetcher and a sink
pub struct Coordinator {
    fetcher: Arc<Fetcher>,
    sink: Arc<dyn Sink>,
    skip_suffixes: Vec<String>,
}

impl Coordinator {
    /// Creates a new coordinator
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Shared HTTP fetcher
    /// * `sink` - Where documents, attachments and index rows go
    /// * `skip_suffixes` - Attachment suffixes that are never downloaded
    pub fn new(fetcher: Arc<Fetcher>, sink: Arc<dyn Sink>, skip_suffixes: Vec<String>) -> Self {
        Self {
            fetcher,
            sink,
            skip_suffixes,
        }
    }

    /// Runs one job to completion
    ///
    /// # Returns
    ///
    /// * `Ok(JobSummary)` - The job completed; individual pages or items may
    ///   still have been skipped, see the summary counters
    /// * `Err(HarvestError)` - Pagination or the index append failed
    pub async fn run(&self, job: &CrawlJob) -> Result<JobSummary> {
        let mut summary = JobSummary::new(&job.name, &job.output.sheet);
        let mut state = JobState::Created;

        advance(&mut state, JobState::PaginationResolving)?;
        let page_count = match resolve_page_count(&self.fetcher, &job.target).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!("Job {} failed to resolve pagination: {}", job.name, e);
                advance(&mut state, JobState::Failed)?;
                return Err(e);
            }
        };

        advance(&mut state, JobState::PageIterating)?;
        let pages = expand_pages(&job.target.base_url, page_count);
        summary.pages_total = pages.len();
        tracing::info!("Job {}: {} pages from {}", job.name, pages.len(), job.target.base_url);

        if let Err(e) = self.sink.ensure_dir(&job.output.save_dir) {
            tracing::error!("Job {} cannot create {}: {}", job.name, job.output.save_dir.display(), e);
            advance(&mut state, JobState::Failed)?;
            return Err(e.into());
        }

        let mut rows = Vec::new();
        for page_url in &pages {
            let page_text = match self.fetcher.fetch_text(page_url).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Skipping listing page: {}", e);
                    summary.pages_skipped += 1;
                    continue;
                }
            };

            let items = job.profile.extractor.extract(page_url, &page_text);
            tracing::debug!("{} items on {}", items.len(), page_url);

            for item in &items {
                summary.items_seen += 1;
                tracing::info!("Get information from {}", item.url);

                if item.is_sentinel() {
                    summary.items_blank += 1;
                    continue;
                }

                let item_text = match self.fetcher.fetch_text(&item.url).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Skipping item: {}", e);
                        summary.items_fetch_failed += 1;
                        continue;
                    }
                };

                let ctx = BuildContext {
                    item,
                    issue: job.issue.as_deref(),
                };
                let Some(record) = job.profile.builder.build(ctx, &item_text) else {
                    tracing::debug!("No record built for {}", item.url);
                    summary.items_declined += 1;
                    continue;
                };

                if !record.has_content() {
                    tracing::debug!("Discarding {}: empty body", item.url);
                    summary.records_empty += 1;
                    continue;
                }

                match persist_record(
                    self.sink.as_ref(),
                    &job.profile.layout,
                    &job.output.save_dir,
                    &record,
                    &url_stem(&item.url),
                    &self.skip_suffixes,
                )
                .await
                {
                    Ok(outcome) => {
                        summary.attachments_downloaded += outcome.attachments_downloaded;
                        summary.attachments_skipped += outcome.attachments_skipped;
                        summary.attachments_failed += outcome.attachments_failed;
                        summary.records_written += 1;
                        rows.push(record.values());
                    }
                    Err(e) => {
                        tracing::error!("Failed to persist {}: {}", item.url, e);
                        summary.persist_failures += 1;
                    }
                }
            }
        }

        if !rows.is_empty() {
            let columns = job.profile.columns();
            match self
                .sink
                .append_index_rows(&job.output.index, &job.output.sheet, &columns, &rows)
            {
                Ok(written) => {
                    summary.index_rows_appended = written;
                    tracing::info!("Write {} finished", job.output.sheet);
                }
                Err(e) => {
                    tracing::error!("Job {} failed to append to sheet {}: {}", job.name, job.output.sheet, e);
                    advance(&mut state, JobState::Failed)?;
                    return Err(e.into());
                }
            }
        }

        advance(&mut state, JobState::Completed)?;
        summary.finish(state);
        Ok(summary)
    }
}

/// Moves `state` to `to`, rejecting transitions the lifecycle does not allow
fn advance(state: &mut JobState, to: JobState) -> Result<()> {
    if !state.can_transition_to(to) {
        return Err(HarvestError::InvalidTransition { from: *state, to });
    }
    tracing::trace!("Job state {} -> {}", state, to);
    *state = to;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::SiteKind;

    fn entry(site: &str, marker: bool) -> JobEntry {
        let marker = if marker {
            r#"page-marker = { prefix = "createPageHTML(", suffix = ");", delimiter = "," }"#
        } else {
            ""
        };
        let config: crate::Config = toml::from_str(&format!(
            r#"
[[job]]
name = "j"
site = "{}"
url = "http://www.sz.gov.cn/zfgb/2019/gb1099_181240/"
save-dir = "政府公报"
{}
"#,
            site, marker
        ))
        .unwrap();
        config.jobs[0].clone()
    }

    #[test]
    fn test_job_from_entry() {
        let job = CrawlJob::from_entry(&entry("government-files", true), &OutputConfig::default()).unwrap();

        assert_eq!(job.name, "j");
        assert!(job.target.page_marker.is_some());
        assert_eq!(job.output.save_dir, PathBuf::from("data/政府公报"));
        assert_eq!(job.output.index, PathBuf::from("data/深圳市.db"));
        assert_eq!(job.output.sheet, "政府公报");
        assert!(job.issue.is_none());
    }

    #[test]
    fn test_job_for_issue() {
        let issue = BulletinIssue {
            title: "2019年第9期".to_string(),
            url: "http://www.sz.gov.cn/zfgb/2019/gb1098_181000/".to_string(),
        };
        let job = CrawlJob::for_issue(&entry("bulletin", false), &OutputConfig::default(), &issue).unwrap();

        assert_eq!(job.name, "j/2019年第9期");
        assert_eq!(job.target, CrawlTarget::single_page(&issue.url));
        assert_eq!(job.output.save_dir, PathBuf::from("data/政府公报/2019年第9期"));
        assert_eq!(job.output.sheet, "政府公报");
        assert_eq!(job.issue.as_deref(), Some("2019年第9期"));
        assert_eq!(job.profile.columns().len(), SiteKind::Bulletin.profile().unwrap().columns().len());
    }

    #[test]
    fn test_advance_follows_lifecycle() {
        let mut state = JobState::Created;
        advance(&mut state, JobState::PaginationResolving).unwrap();
        advance(&mut state, JobState::PageIterating).unwrap();
        advance(&mut state, JobState::Completed).unwrap();
        assert_eq!(state, JobState::Completed);
    }

    #[test]
    fn test_advance_rejects_skipping_pagination() {
        let mut state = JobState::Created;
        let err = advance(&mut state, JobState::PageIterating).unwrap_err();
        assert!(matches!(
            err,
            HarvestError::InvalidTransition {
                from: JobState::Created,
                to: JobState::PageIterating
            }
        ));
        assert_eq!(state, JobState::Created);
    }
}
