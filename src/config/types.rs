use crate::crawler::PageMarker;
use crate::sites::SiteKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure for Portal-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub proxy: Option<ProxyConfig>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(rename = "job", default)]
    pub jobs: Vec<JobEntry>,
}

impl Config {
    /// Looks a job up by name
    pub fn job(&self, name: &str) -> Option<&JobEntry> {
        self.jobs.iter().find(|j| j.name == name)
    }
}

/// Request timeout and retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause between attempts (seconds)
    #[serde(rename = "retry-delay-secs", default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Retries after the first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Attachment suffixes that are never downloaded
    #[serde(rename = "skip-suffixes", default = "default_skip_suffixes")]
    pub skip_suffixes: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            max_retries: default_max_retries(),
            skip_suffixes: default_skip_suffixes(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_skip_suffixes() -> Vec<String> {
    ["mp4", "flv", "m3u8", "wmv", "rmvb"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Optional proxies, keyed by scheme
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory every job's save directory is relative to
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Index database file, relative to `root` unless absolute
    #[serde(default = "default_index")]
    pub index: PathBuf,

    /// Concurrent jobs in parallel mode (0 = derive from CPU count)
    #[serde(rename = "parallel-workers", default)]
    pub parallel_workers: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            index: default_index(),
            parallel_workers: 0,
        }
    }
}

impl OutputConfig {
    /// Full path of the index database
    pub fn index_path(&self) -> PathBuf {
        self.root.join(&self.index)
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_index() -> PathBuf {
    PathBuf::from("深圳市.db")
}

/// One listing to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct JobEntry {
    /// Unique job name, used with `--job`
    pub name: String,

    /// Listing template
    pub site: SiteKind,

    /// First listing page (or bulletin page)
    pub url: String,

    /// Directory under the output root for this job's documents
    #[serde(rename = "save-dir")]
    pub save_dir: PathBuf,

    /// Index sheet; derived from `save-dir` when absent
    #[serde(default)]
    pub sheet: Option<String>,

    /// How the page count is written into the listing
    #[serde(rename = "page-marker", default)]
    pub page_marker: Option<PageMarker>,
}

impl JobEntry {
    /// The sheet rows are appended to
    ///
    /// Without an explicit sheet, the save directory with `/` replaced by `_`.
    pub fn sheet_name(&self) -> String {
        match &self.sheet {
            Some(sheet) => sheet.clone(),
            None => derive_sheet_name(&self.save_dir),
        }
    }

    /// Save directory under the output root
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.save_dir)
    }
}

/// Sheet name for a save directory: components joined with `_`
pub fn derive_sheet_name(save_dir: &Path) -> String {
    save_dir
        .components()
        .filter(|c| matches!(c, std::path::Component::Normal(_)))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("_")
}
