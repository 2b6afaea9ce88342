//! Sink trait and output errors
//!
//! A sink is the narrow persistence contract the crawler writes through:
//! document files, attachment downloads, and the tabular index.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index database error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("Invalid sheet name: '{0}'")]
    InvalidSheet(String),

    #[error("Sheet '{sheet}' has columns {existing:?}, batch has {batch:?}")]
    ColumnMismatch {
        sheet: String,
        existing: Vec<String>,
        batch: Vec<String>,
    },

    #[error("Row {row} has {actual} values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Durable persistence for crawled records
///
/// Implementations must be shareable across parallel jobs; each job writes
/// to its own directory, so no cross-job coordination is expected.
#[async_trait]
pub trait Sink: Send + Sync {
    /// File extension (without the dot) of documents this sink writes
    fn document_extension(&self) -> &str;

    /// Creates a directory if it does not exist yet
    ///
    /// An already existing directory is success.
    fn ensure_dir(&self, dir: &Path) -> OutputResult<()>;

    /// Writes one document and returns its path
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory to write into (must exist)
    /// * `file_stem` - Already sanitized file name without extension
    /// * `heading` - Document heading
    /// * `paragraphs` - Body paragraphs in order
    fn write_document(
        &self,
        dir: &Path,
        file_stem: &str,
        heading: &str,
        paragraphs: &[String],
    ) -> OutputResult<PathBuf>;

    /// Downloads an attachment to `dest`, returning whether it succeeded
    async fn download_attachment(&self, url: &str, dest: &Path) -> bool;

    /// Appends a batch of rows to a sheet of the index
    ///
    /// Creates the index and the sheet when absent; rows are only ever
    /// appended, never updated. Returns the number of rows written.
    fn append_index_rows(
        &self,
        index: &Path,
        sheet: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> OutputResult<usize>;
}
