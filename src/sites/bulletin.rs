//! Bulletin issue discovery
//!
//! The bulletin page shows one issue and a `select[name=select3]` drop-down
//! of earlier issues. Issues from the current year live under the year
//! directory (`/zfgb/2019/…`); older ones are addressed from the bulletin
//! root (`/zfgb/…`).

use crate::crawler::Fetcher;
use crate::sites::html::selector;
use crate::Result;
use scraper::Html;
use std::collections::HashSet;
use url::Url;

/// One bulletin issue to crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulletinIssue {
    /// Issue label as shown in the drop-down, e.g. `2019年第10期`
    pub title: String,
    pub url: String,
}

/// Fetches the bulletin page and lists its issues, current issue first
///
/// A fetch failure is fatal: without the page there is nothing to crawl.
pub async fn discover_issues(fetcher: &Fetcher, url: &str) -> Result<Vec<BulletinIssue>> {
    let page_text = fetcher.fetch_text(url).await?;
    let issues = parse_issue_options(url, &page_text)?;
    tracing::info!("Found {} bulletin issues on {}", issues.len(), url);
    Ok(issues)
}

/// Lists the issues declared by the drop-down on a bulletin page
///
/// The first entry is always `target_url`, labelled by its own drop-down
/// option when one points at it, otherwise by its last path segment.
/// Placeholder options (empty, `#` or script values) are ignored and
/// duplicate URLs are dropped.
pub fn parse_issue_options(target_url: &str, page_text: &str) -> Result<Vec<BulletinIssue>> {
    let target = Url::parse(target_url)?;
    let year_dir = year_directory(&target);

    let document = Html::parse_document(page_text);
    let options = selector("select[name=\"select3\"] option");

    let mut current_title = None;
    let mut older = Vec::new();

    for option in document.select(&options) {
        let title = option.text().collect::<String>().trim().to_string();
        let value = option.value().attr("value").unwrap_or("").trim();

        if title.is_empty() || is_placeholder(value) {
            continue;
        }

        let Some(url) = resolve_issue(value, &title, &target, year_dir.as_ref()) else {
            tracing::debug!("Cannot resolve bulletin issue '{}' ({})", title, value);
            continue;
        };

        if same_issue(&url, target.as_str()) {
            current_title.get_or_insert(title);
        } else {
            older.push(BulletinIssue { title, url });
        }
    }

    let current_title = current_title.unwrap_or_else(|| last_segment(&target));

    let mut seen = HashSet::new();
    seen.insert(normalize(target.as_str()));

    let mut issues = vec![BulletinIssue {
        title: current_title,
        url: target.to_string(),
    }];
    issues.extend(older.into_iter().filter(|issue| seen.insert(normalize(&issue.url))));

    Ok(issues)
}

/// Bulletin root and year of the target, from its four-digit path segment
///
/// For `http://x/zfgb/2019/gb1099/` this is (`http://x/zfgb/`, `2019`).
fn year_directory(target: &Url) -> Option<(Url, String)> {
    let segments: Vec<&str> = target.path_segments()?.collect();
    let pos = segments
        .iter()
        .position(|s| s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()))?;

    let mut root = target.clone();
    root.set_query(None);
    root.set_fragment(None);
    root.set_path(&format!("/{}/", segments[..pos].join("/")).replace("//", "/"));

    Some((root, segments[pos].to_string()))
}

fn resolve_issue(value: &str, title: &str, target: &Url, year_dir: Option<&(Url, String)>) -> Option<String> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Url::parse(value).ok().map(|u| u.to_string());
    }

    let Some((root, year)) = year_dir else {
        return target.join(value).ok().map(|u| u.to_string());
    };

    let relative = value.rsplit("./").next().unwrap_or(value).trim_start_matches('/');
    let issue_year = title.split('年').next().unwrap_or("").trim();

    let base = if issue_year == year {
        root.join(&format!("{}/", year)).ok()?
    } else {
        root.clone()
    };
    base.join(relative).ok().map(|u| u.to_string())
}

fn is_placeholder(value: &str) -> bool {
    value.is_empty() || value == "#" || value.to_ascii_lowercase().starts_with("javascript")
}

fn same_issue(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// URL compared without a trailing slash or index page
fn normalize(url: &str) -> String {
    url.trim_end_matches("index.htm")
        .trim_end_matches("index.html")
        .trim_end_matches('/')
        .to_string()
}

fn last_segment(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("current")
        .to_string()
}
