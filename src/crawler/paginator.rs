//! Pagination derivation
//!
//! Listing pages on the portal embed their total page count in a script call
//! such as `createPageHTML(50, 0, "index","htm",849);`. A [`PageMarker`]
//! describes how to cut that literal out of the markup; the page URLs are
//! then derived from the base URL alone.

use crate::crawler::fetcher::Fetcher;
use crate::HarvestError;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while reading the embedded page count
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page marker prefix '{0}' not found")]
    MissingPrefix(String),

    #[error("page marker suffix '{0}' not found after prefix")]
    MissingSuffix(String),

    #[error("page marker delimiter '{0}' not found between prefix and suffix")]
    MissingDelimiter(String),

    #[error("page count '{0}' is not a number")]
    InvalidCount(String),
}

/// Locates the page-count literal inside a listing page's markup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageMarker {
    /// Text immediately preceding the argument list
    pub prefix: String,

    /// Text closing the argument list
    pub suffix: String,

    /// Separator between arguments; the count is the first argument
    pub delimiter: String,
}

impl PageMarker {
    /// Creates a marker from its three parts
    pub fn new(prefix: &str, suffix: &str, delimiter: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            delimiter: delimiter.to_string(),
        }
    }

    /// The `createPageHTML(…);` call used across the portal's listing templates
    pub fn create_page_html() -> Self {
        Self::new("createPageHTML(", ");", ",")
    }
}

/// The root of one crawl job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    /// First listing page
    pub base_url: String,

    /// How to read the page count; `None` means the listing is one page
    pub page_marker: Option<PageMarker>,
}

impl CrawlTarget {
    /// Target whose page count is read through `marker`
    pub fn paginated(base_url: &str, marker: PageMarker) -> Self {
        Self {
            base_url: base_url.to_string(),
            page_marker: Some(marker),
        }
    }

    /// Target consisting of the base page only
    pub fn single_page(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            page_marker: None,
        }
    }
}

/// Parses the page count out of listing markup
///
/// Takes the text after the first `prefix`, cuts it at the first following
/// `suffix`, splits on `delimiter` and parses the first token.
///
/// # Example
///
/// ```
/// use portal_harvest::crawler::{parse_page_count, PageMarker};
///
/// let html = r#"<script>createPageHTML(50, 0, "index","htm",849);</script>"#;
/// let marker = PageMarker::new("createPageHTML(", ");</script>", ",");
/// assert_eq!(parse_page_count(html, &marker), Ok(50));
/// ```
pub fn parse_page_count(markup: &str, marker: &PageMarker) -> Result<usize, PaginationError> {
    let (_, after_prefix) = markup
        .split_once(marker.prefix.as_str())
        .ok_or_else(|| PaginationError::MissingPrefix(marker.prefix.clone()))?;

    let (arguments, _) = after_prefix
        .split_once(marker.suffix.as_str())
        .ok_or_else(|| PaginationError::MissingSuffix(marker.suffix.clone()))?;

    let (first, _) = arguments
        .split_once(marker.delimiter.as_str())
        .ok_or_else(|| PaginationError::MissingDelimiter(marker.delimiter.clone()))?;

    let token = first.trim();
    token
        .parse::<usize>()
        .map_err(|_| PaginationError::InvalidCount(token.to_string()))
}

/// Fetches the base page and resolves the target's page count
///
/// Targets without a marker have exactly one page. A count of zero is read
/// as one, since the base page has just been fetched. Any failure here is
/// fatal for the job.
pub async fn resolve_page_count(fetcher: &Fetcher, target: &CrawlTarget) -> Result<usize, HarvestError> {
    let Some(marker) = &target.page_marker else {
        return Ok(1);
    };

    let markup = fetcher.fetch_text(&target.base_url).await?;
    let count = parse_page_count(&markup, marker).map_err(|source| HarvestError::Pagination {
        url: target.base_url.clone(),
        source,
    })?;

    tracing::debug!("{} has {} pages", target.base_url, count);
    Ok(count.max(1))
}

/// Expands a base URL into the ordered list of page URLs
///
/// Page 0 is the base URL itself; page `i` inserts `_i` before the extension
/// of the last path segment (`index.htm` → `index_1.htm`). If the last
/// segment has no extension, `_i` is appended.
///
/// # Example
///
/// ```
/// use portal_harvest::crawler::expand_pages;
///
/// let pages = expand_pages("http://x/index.htm", 3);
/// assert_eq!(pages, vec!["http://x/index.htm", "http://x/index_1.htm", "http://x/index_2.htm"]);
/// ```
pub fn expand_pages(base_url: &str, count: usize) -> Vec<String> {
    let segment_start = base_url.rfind('/').map(|i| i + 1).unwrap_or(0);
    let (stem, ext) = match base_url[segment_start..].rfind('.') {
        Some(dot) => base_url.split_at(segment_start + dot),
        None => (base_url, ""),
    };

    (0..count)
        .map(|i| {
            if i == 0 {
                base_url.to_string()
            } else {
                format!("{}_{}{}", stem, i, ext)
            }
        })
        .collect()
}
