//! HTML helpers shared by the site strategies
//!
//! Thin wrappers over `scraper` for the handful of things the portal
//! templates need: paragraph text, direct text nodes, script literals and
//! link resolution.

use scraper::{ElementRef, Selector};
use url::Url;

/// Parses a CSS selector that is known at compile time
///
/// Selectors in this crate are literals; a parse failure is a programming
/// error and yields a selector matching nothing.
pub fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|_| {
        tracing::error!("Invalid CSS selector: {}", css);
        Selector::parse("nothing-matches-this-selector").expect("fallback selector parses")
    })
}

/// Full text of an element (all descendants), trimmed
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// First non-blank text node that is a direct child of the element
pub fn own_text(element: &ElementRef<'_>) -> Option<String> {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

/// Direct children of `element` with the given tag name, in order
pub fn child_elements<'a>(element: &ElementRef<'a>, tag: &str) -> Vec<ElementRef<'a>> {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == tag)
        .collect()
}

/// Text between the first `start` and the next `end`
pub fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let (_, rest) = text.split_once(start)?;
    let (inner, _) = rest.split_once(end)?;
    Some(inner)
}

/// Resolves a link href against the page it appeared on
///
/// Returns None if the link should be excluded:
/// - empty hrefs and fragment-only anchors
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Resolves a link the way the portal's file listings expect
///
/// Those listings climb out of the listing directory with `../../`; the
/// target is always the site root plus whatever follows the last `..`.
/// Absolute links and links without `..` fall back to [`resolve_link`].
pub fn resolve_site_root_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.contains("http") {
        return Some(href.to_string());
    }

    match href.rsplit_once("..") {
        Some((_, tail)) if tail.starts_with('/') => {
            let origin = base_url.origin().ascii_serialization();
            Some(format!("{}{}", origin, tail))
        }
        _ => resolve_link(href, base_url),
    }
}
