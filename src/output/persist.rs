//! Turning one record into files on disk
//!
//! A record becomes a document named after its title. When the record has
//! attachments, a directory named after the title is created next to where
//! the document would go; the attachments and the document both land in it.

use crate::output::filename::{
    attachment_file_name, document_path, fit_name_bytes, is_skipped_suffix, sanitize_filename, MAX_NAME_BYTES,
};
use crate::output::traits::{OutputResult, Sink};
use crate::sites::Record;
use std::path::{Path, PathBuf};

/// Directory used when a record's grouping field is blank
pub const DEFAULT_GROUP: &str = "其他";

/// Where and under what name a site's records are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLayout {
    /// Attribute holding the document title
    pub title_field: String,

    /// Attribute whose value names a subdirectory per record
    pub group_field: Option<String>,

    /// Date attribute whose year (text before the first `-`) prefixes the title
    pub year_prefix_field: Option<String>,
}

impl DocumentLayout {
    /// Documents named by title, written straight into the job directory
    pub fn titled(title_field: &str) -> Self {
        Self {
            title_field: title_field.to_string(),
            group_field: None,
            year_prefix_field: None,
        }
    }

    pub fn grouped_by(mut self, field: &str) -> Self {
        self.group_field = Some(field.to_string());
        self
    }

    pub fn year_prefixed_by(mut self, field: &str) -> Self {
        self.year_prefix_field = Some(field.to_string());
        self
    }

    /// Sanitized document title, or `fallback` when the title is blank
    pub fn document_title(&self, record: &Record, fallback: &str) -> String {
        let title = record
            .present_attribute(&self.title_field)
            .map(str::trim)
            .unwrap_or("");

        let year = self
            .year_prefix_field
            .as_deref()
            .and_then(|field| record.present_attribute(field))
            .and_then(|date| date.trim().split('-').next())
            .filter(|year| !year.is_empty())
            .unwrap_or("");

        let name = sanitize_filename(&format!("{}{}", year, title));
        if name.is_empty() {
            sanitize_filename(fallback)
        } else {
            name
        }
    }

    /// Directory a record's files go under, before any attachment subdirectory
    pub fn record_dir(&self, job_dir: &Path, record: &Record) -> PathBuf {
        match &self.group_field {
            Some(field) => {
                let group = record
                    .present_attribute(field)
                    .map(sanitize_filename)
                    .filter(|g| !g.is_empty())
                    .unwrap_or_else(|| DEFAULT_GROUP.to_string());
                job_dir.join(group)
            }
            None => job_dir.to_path_buf(),
        }
    }
}

/// What persisting one record did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub document: PathBuf,
    pub attachments_downloaded: usize,
    pub attachments_skipped: usize,
    pub attachments_failed: usize,
}

/// Writes a record's attachments and document through the sink
///
/// Attachments whose URL ends in one of `skip_suffixes` are never handed to
/// the sink. A failed attachment download is counted, not fatal.
///
/// # Arguments
///
/// * `sink` - Where files are written
/// * `layout` - Naming and grouping rules for the site
/// * `job_dir` - The job's save directory
/// * `record` - The record to persist
/// * `fallback_title` - Used when the record has no usable title
/// * `skip_suffixes` - Attachment suffixes that are never downloaded
pub async fn persist_record(
    sink: &dyn Sink,
    layout: &DocumentLayout,
    job_dir: &Path,
    record: &Record,
    fallback_title: &str,
    skip_suffixes: &[String],
) -> OutputResult<PersistOutcome> {
    let title = layout.document_title(record, fallback_title);
    let mut dir = layout.record_dir(job_dir, record);
    sink.ensure_dir(&dir)?;

    let mut outcome = PersistOutcome::default();

    if !record.attachments.is_empty() {
        dir = dir.join(fit_name_bytes(&title, MAX_NAME_BYTES));
        sink.ensure_dir(&dir)?;

        for attachment in &record.attachments {
            if is_skipped_suffix(&attachment.url, skip_suffixes) {
                tracing::debug!("Skipping video attachment {}", attachment.url);
                outcome.attachments_skipped += 1;
                continue;
            }

            let dest = dir.join(attachment_file_name(&attachment.name, &attachment.url));
            if sink.download_attachment(&attachment.url, &dest).await {
                outcome.attachments_downloaded += 1;
            } else {
                tracing::warn!("Failed to download attachment {}", attachment.url);
                outcome.attachments_failed += 1;
            }
        }
    }

    let path = document_path(&dir, &title, sink.document_extension());
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| title.clone());

    let paragraphs: Vec<String> = record.body.lines().map(str::to_string).collect();
    outcome.document = sink.write_document(&dir, &stem, &title, &paragraphs)?;

    Ok(outcome)
}

/// Last path segment of a URL without its extension
///
/// Used as the document name when a record has no title.
pub fn url_stem(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url).trim_end_matches('/');
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => segment.to_string(),
    }
}
