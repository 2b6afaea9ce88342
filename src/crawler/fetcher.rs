//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with timeout and optional proxies
//! - Rotating the User-Agent header on every request
//! - Retry logic for transient failures
//! - Error classification
//! - Decoding legacy-encoded markup (GBK unless the page declares otherwise)

use crate::config::{FetchConfig, ProxyConfig};
use encoding_rs::{Encoding, GBK};
use rand::seq::IndexedRandom;
use regex::Regex;
use reqwest::{header::USER_AGENT, Client, Proxy};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

/// Browser User-Agent strings picked from at random for every request
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows; U; Windows NT 5.1; en-US; rv:1.8.1.2pre) Gecko/20070215 K-Ninja/2.1.1",
    "Mozilla/4.0 (compatible; MSIE 7.0b; Windows NT 5.2; .NET CLR 1.1.4322; .NET CLR 2.0.50727; InfoPath.2; .NET CLR 3.0.04506.30)",
    "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.1 (KHTML, like Gecko) Chrome/21.0.1180.71 Safari/537.1 LBBROWSER",
    "Mozilla/5.0 (Windows; U; Windows NT 5.1; zh-CN; rv:1.9) Gecko/20080705 Firefox/3.0 Kapiko/3.0",
    "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/535.11 (KHTML, like Gecko) Chrome/17.0.963.56 Safari/535.11",
    "Mozilla/4.0 (compatible; MSIE 6.0; Windows NT 5.1; SV1; AcooBrowser; .NET CLR 1.1.4322; .NET CLR 2.0.50727)",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_7_3) AppleWebKit/535.20 (KHTML, like Gecko) Chrome/19.0.1036.7 Safari/535.20",
    "Opera/9.80 (Macintosh; Intel Mac OS X 10.6.8; U; fr) Presto/2.9.168 Version/11.52",
    "Mozilla/5.0 (Windows NT 6.1; Win64; x64; rv:2.0b13pre) Gecko/20110307 Firefox/4.0b13pre",
    "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/536.11 (KHTML, like Gecko) Chrome/20.0.1132.11 TaoBrowser/2.0 Safari/536.11",
    "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/535.11 (KHTML, like Gecko) Chrome/17.0.963.84 Safari/535.11 LBBROWSER",
    "Mozilla/4.0 (compatible; MSIE 6.0; Windows NT 5.1; SV1; QQDownload 732; .NET4.0C; .NET4.0E)",
    "Mozilla/4.0 (compatible; MSIE 7.0; Windows NT 5.1; Trident/4.0; SV1; QQDownload 732; .NET4.0C; .NET4.0E; 360SE)",
    "Mozilla/4.0 (compatible; MSIE 7.0; AOL 9.5; AOLBuild 4337.35; Windows NT 5.1; .NET CLR 1.1.4322; .NET CLR 2.0.50727)",
    "Mozilla/4.0 (compatible; MSIE 6.0; Windows NT 5.1; SV1; QQDownload 732; .NET4.0C; .NET4.0E)",
    "Mozilla/5.0 (Windows NT 5.1) AppleWebKit/537.1 (KHTML, like Gecko) Chrome/21.0.1180.89 Safari/537.1",
    "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.1 (KHTML, like Gecko) Chrome/21.0.1180.89 Safari/537.1",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:16.0) Gecko/20100101 Firefox/16.0",
    "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.11 (KHTML, like Gecko) Chrome/23.0.1271.64 Safari/537.11",
    "Mozilla/5.0 (X11; U; Linux x86_64; zh-CN; rv:1.9.2.10) Gecko/20100922 Ubuntu/10.10 (maverick) Firefox/3.6.10",
];

static META_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta.*?charset=["']*(.+?)["'>]"#).expect("valid regex"));

static META_PRAGMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta.*?content=["']*;?charset=(.+?)["'>]"#).expect("valid regex")
});

static XML_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^<\?xml.*?encoding=["']*(.+?)["'>]"#).expect("valid regex")
});

/// Errors surfaced by the fetcher once its retry policy is spent
#[derive(Debug, Error)]
pub enum FetchError {
    /// Host unreachable or connection refused; never retried
    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    /// Every attempt hit a transient failure
    #[error("Gave up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    /// Server answered with a non-retryable status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The request could not be built (malformed URL, bad header)
    #[error("Invalid request for {url}: {message}")]
    Client { url: String, message: String },
}

/// Timeout and retry policy for the fetcher
#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    /// Per-request timeout
    pub timeout: Duration,

    /// Fixed sleep between attempts
    pub retry_delay: Duration,

    /// Retries after the first attempt
    pub max_retries: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

impl From<&FetchConfig> for FetchSettings {
    fn from(config: &FetchConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            max_retries: config.max_retries,
        }
    }
}

/// How a single attempt went wrong
enum AttemptFailure {
    Connect(String),
    Client(String),
    Transient(String),
    Status(u16),
}

/// HTTP fetcher with User-Agent rotation and bounded retry
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    settings: FetchSettings,
}

impl Fetcher {
    /// Builds a fetcher with the given policy and optional proxies
    ///
    /// # Arguments
    ///
    /// * `settings` - Timeout and retry policy
    /// * `proxy` - Optional `http`/`https` proxy URLs
    ///
    /// # Returns
    ///
    /// * `Ok(Fetcher)` - Successfully built HTTP client
    /// * `Err(reqwest::Error)` - A proxy URL was rejected or TLS setup failed
    pub fn new(settings: FetchSettings, proxy: Option<&ProxyConfig>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(&settings, proxy)?,
            settings,
        })
    }

    /// Returns the policy this fetcher was built with
    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Fetches a page and decodes it to text
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.fetch_text_with_params(url, &[]).await
    }

    /// Fetches a page with query parameters and decodes it to text
    ///
    /// The text encoding is taken from the first charset the markup
    /// declares; pages without a declaration are decoded as GBK.
    pub async fn fetch_text_with_params(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        let bytes = self.fetch_with_retry(url, params).await?;
        Ok(decode_html(&bytes))
    }

    /// Fetches raw bytes (attachments) under the same retry policy
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_with_retry(url, &[]).await
    }

    /// Runs attempts until one succeeds, a non-transient failure occurs,
    /// or the retry budget is spent
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Connection refused / unreachable | Immediate → `Connect` |
    /// | HTTP 4xx | Immediate → `Status` |
    /// | Malformed request | Immediate → `Client` |
    /// | HTTP 5xx | Retry after fixed delay |
    /// | Timeout / protocol error | Retry after fixed delay |
    async fn fetch_with_retry(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<u8>, FetchError> {
        let mut retries_left = self.settings.max_retries;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let failure = match self.attempt(url, params).await {
                Ok(bytes) => return Ok(bytes),
                Err(failure) => failure,
            };

            let last = match failure {
                AttemptFailure::Connect(message) => {
                    tracing::warn!("Connection error: {}", url);
                    return Err(FetchError::Connect {
                        url: url.to_string(),
                        message,
                    });
                }
                AttemptFailure::Client(message) => {
                    return Err(FetchError::Client {
                        url: url.to_string(),
                        message,
                    });
                }
                AttemptFailure::Status(status) if !(500..600).contains(&status) => {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status,
                    });
                }
                AttemptFailure::Status(status) => format!("HTTP {}", status),
                AttemptFailure::Transient(message) => message,
            };

            if retries_left == 0 {
                return Err(FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts,
                    last,
                });
            }

            retries_left -= 1;
            tracing::debug!(
                "Attempt {} for {} failed ({}), retrying in {:?}",
                attempts,
                url,
                last,
                self.settings.retry_delay
            );
            tokio::time::sleep(self.settings.retry_delay).await;
        }
    }

    /// Performs exactly one GET request
    async fn attempt(&self, url: &str, params: &[(&str, &str)]) -> Result<Vec<u8>, AttemptFailure> {
        let mut request = self.client.get(url).header(USER_AGENT, random_user_agent());
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request.send().await.map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::Status(status.as_u16()));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| AttemptFailure::Transient(e.to_string()))
    }
}

/// Sorts a reqwest error into connect-level vs. transient
fn classify_error(e: reqwest::Error) -> AttemptFailure {
    if e.is_connect() {
        AttemptFailure::Connect(e.to_string())
    } else if e.is_builder() {
        AttemptFailure::Client(e.to_string())
    } else if e.is_timeout() {
        AttemptFailure::Transient("Request timeout".to_string())
    } else {
        AttemptFailure::Transient(e.to_string())
    }
}

/// Builds an HTTP client with the fetch timeout and optional proxies
///
/// No default User-Agent is set; every request picks its own from
/// [`USER_AGENTS`].
pub fn build_http_client(
    settings: &FetchSettings,
    proxy: Option<&ProxyConfig>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder().timeout(settings.timeout).gzip(true).brotli(true);

    if let Some(proxy) = proxy {
        if let Some(http) = &proxy.http {
            builder = builder.proxy(Proxy::http(http)?);
        }
        if let Some(https) = &proxy.https {
            builder = builder.proxy(Proxy::https(https)?);
        }
    }

    builder.build()
}

/// Picks one User-Agent uniformly at random
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Returns every encoding label declared in the markup, in match order
///
/// `<meta charset>` declarations come first, then `http-equiv` content
/// declarations, then an XML prolog.
pub fn declared_encodings(markup: &str) -> Vec<String> {
    META_CHARSET
        .captures_iter(markup)
        .chain(META_PRAGMA.captures_iter(markup))
        .chain(XML_DECLARATION.captures_iter(markup))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Decodes a response body using the first declared encoding, or GBK
pub fn decode_html(bytes: &[u8]) -> String {
    // Declarations are ASCII, so a lossy view is enough to find them
    let sniffed = String::from_utf8_lossy(bytes);
    let encoding = declared_encodings(&sniffed)
        .first()
        .and_then(|label| {
            let found = Encoding::for_label(label.as_bytes());
            if found.is_none() {
                tracing::debug!("Unknown charset label '{}', falling back to GBK", label);
            }
            found
        })
        .unwrap_or(GBK);

    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}
