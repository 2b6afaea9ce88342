//! Output module for persisting crawled records
//!
//! This module handles:
//! - Writing one Markdown document per record
//! - Downloading record attachments next to their document
//! - Appending record rows to the SQLite index
//! - Reporting per-job statistics

pub mod document;
pub mod filename;
pub mod index;
pub mod persist;
pub mod stats;
mod traits;

pub use persist::{persist_record, url_stem, DocumentLayout, PersistOutcome, DEFAULT_GROUP};
pub use stats::{print_summary, JobSummary};
pub use traits::{OutputError, OutputResult, Sink};

use crate::crawler::Fetcher;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sink writing to the local filesystem
///
/// Documents are Markdown files, attachments are fetched with the crawler's
/// fetcher (same timeout and retry policy as pages), and the index is a
/// SQLite database.
#[derive(Debug, Clone)]
pub struct FileSink {
    fetcher: Arc<Fetcher>,
}

impl FileSink {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Sink for FileSink {
    fn document_extension(&self) -> &str {
        "md"
    }

    fn ensure_dir(&self, dir: &Path) -> OutputResult<()> {
        std::fs::create_dir_all(dir)?;
        Ok(())
    }

    fn write_document(
        &self,
        dir: &Path,
        file_stem: &str,
        heading: &str,
        paragraphs: &[String],
    ) -> OutputResult<PathBuf> {
        let path = dir.join(format!("{}.{}", file_stem, self.document_extension()));
        document::write_markdown_document(&path, heading, paragraphs)?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }

    async fn download_attachment(&self, url: &str, dest: &Path) -> bool {
        let bytes = match self.fetcher.fetch_bytes(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Attachment download failed: {}", e);
                return false;
            }
        };

        match tokio::fs::write(dest, &bytes).await {
            Ok(()) => {
                tracing::debug!("Saved attachment {} ({} bytes)", dest.display(), bytes.len());
                true
            }
            Err(e) => {
                tracing::warn!("Cannot write attachment {}: {}", dest.display(), e);
                false
            }
        }
    }

    fn append_index_rows(
        &self,
        index: &Path,
        sheet: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> OutputResult<usize> {
        index::append_rows(index, sheet, columns, rows)
    }
}
