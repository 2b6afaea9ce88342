//! Listing-page extractors
//!
//! Each portal listing template puts its item links in a slightly different
//! place: plain anchors, anchors inside a title span, or URLs embedded in
//! inline scripts. The extractors here are data-driven so a new template is
//! usually a new constructor, not a new type.

use crate::sites::html::{between, element_text, resolve_link, resolve_site_root_link, selector};
use crate::sites::traits::{Extractor, ItemReference};
use scraper::Html;
use url::Url;

/// How relative hrefs on a listing are turned into absolute URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStyle {
    /// Resolved against the listing page URL
    Relative,

    /// Site origin plus the path after the last `..`
    SiteRoot,
}

/// Extracts anchors matched by a CSS selector
#[derive(Debug, Clone)]
pub struct LinkListExtractor {
    css: String,
    with_titles: bool,
    style: LinkStyle,
}

impl LinkListExtractor {
    pub fn new(css: &str, with_titles: bool, style: LinkStyle) -> Self {
        Self {
            css: css.to_string(),
            with_titles,
            style,
        }
    }

    /// Government file listings (`szfl`, `szfwj`, … sections)
    pub fn government_files() -> Self {
        Self::new("div.zx_ml_list > ul > li > div > a", false, LinkStyle::SiteRoot)
    }

    /// Press releases, interview notices, media coverage
    pub fn news() -> Self {
        Self::new("div.zx_ml_list > ul > li > span.tit > a", true, LinkStyle::Relative)
    }

    /// Government work updates
    pub fn work_updates() -> Self {
        Self::new("div.zx_ml_list > ul > li > span > a", true, LinkStyle::Relative)
    }

    /// Yearly government work reports
    pub fn work_reports() -> Self {
        Self::new(
            "#top_bg > div > div:nth-of-type(4) > div:nth-of-type(7) > ul > li > a",
            false,
            LinkStyle::Relative,
        )
    }
}

impl Extractor for LinkListExtractor {
    fn extract(&self, page_url: &str, page_text: &str) -> Vec<ItemReference> {
        let base = match Url::parse(page_url) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!("Cannot resolve links on {}: {}", page_url, e);
                return Vec::new();
            }
        };

        let document = Html::parse_document(page_text);
        let anchors = selector(&self.css);

        document
            .select(&anchors)
            .map(|anchor| {
                let href = anchor.value().attr("href").unwrap_or("");
                let url = match self.style {
                    LinkStyle::Relative => resolve_link(href, &base),
                    LinkStyle::SiteRoot => resolve_site_root_link(href, &base),
                }
                .unwrap_or_default();

                if self.with_titles {
                    ItemReference::with_title(url, element_text(&anchor))
                } else {
                    ItemReference::new(url)
                }
            })
            .collect()
    }
}

/// Extracts item URLs written into `var _url = './…';` inline scripts
///
/// The policy-interpretation listing renders its links from script so the
/// anchors are not in the markup.
#[derive(Debug, Clone)]
pub struct ScriptUrlExtractor {
    css: String,
}

impl ScriptUrlExtractor {
    pub fn policy_interpretation() -> Self {
        Self {
            css: "div.zx_ml_list > ul > li > div > script".to_string(),
        }
    }
}

impl Extractor for ScriptUrlExtractor {
    fn extract(&self, page_url: &str, page_text: &str) -> Vec<ItemReference> {
        let Ok(base) = Url::parse(page_url) else {
            return Vec::new();
        };

        let document = Html::parse_document(page_text);
        let scripts = selector(&self.css);

        document
            .select(&scripts)
            .map(|script| {
                let source = script.text().collect::<String>();
                between(&source, "var _url = '", "';")
                    .and_then(|path| resolve_link(path, &base))
                    .map(ItemReference::new)
                    .unwrap_or_else(ItemReference::skipped)
            })
            .collect()
    }
}

/// Extracts article links from a bulletin issue page
///
/// The issue table of contents is a script of `opath.push("./…")` calls.
#[derive(Debug, Clone, Default)]
pub struct BulletinExtractor;

impl Extractor for BulletinExtractor {
    fn extract(&self, page_url: &str, page_text: &str) -> Vec<ItemReference> {
        let Ok(base) = Url::parse(page_url) else {
            return Vec::new();
        };

        let document = Html::parse_document(page_text);
        let scripts = selector("div.zx_zwgb_left script");
        let Some(script) = document.select(&scripts).next() else {
            tracing::debug!("No bulletin contents script on {}", page_url);
            return Vec::new();
        };

        let source = script.text().collect::<String>();
        source
            .split("opath.push(\"./")
            .skip(1)
            .map(|chunk| {
                let path = chunk.split("\")").next().unwrap_or("");
                resolve_link(path, &base)
                    .map(ItemReference::new)
                    .unwrap_or_else(ItemReference::skipped)
            })
            .collect()
    }
}
