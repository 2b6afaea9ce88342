//! File name derivation for documents and attachments
//!
//! Titles on the portal routinely contain slashes, quotes and angle
//! brackets; these rules turn them into names every filesystem accepts.

use std::path::{Path, PathBuf};

/// Longest full document path, in characters, before the title is shortened
pub const MAX_PATH_CHARS: usize = 180;

/// Title characters kept when a path is too long
pub const TRUNCATED_TITLE_CHARS: usize = 50;

/// Marker placed before a shortened title
pub const ELLIPSIS: &str = "...";

/// Longest single file or directory name, in bytes
pub const MAX_NAME_BYTES: usize = 255;

/// Replaces characters that are unsafe in file names
///
/// `/` and `\` become `-`, spaces are removed, `<` `>` become `(` `)`, and
/// `"` becomes `-`. Applying it twice gives the same result as once.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| *c != ' ')
        .map(|c| match c {
            '/' | '\\' | '"' => '-',
            '<' => '(',
            '>' => ')',
            other => other,
        })
        .collect()
}

/// Builds the path of a document, shortening the title if needed
///
/// If `dir/title.ext` is longer than [`MAX_PATH_CHARS`] characters, or the
/// file name alone is over [`MAX_NAME_BYTES`] bytes, the file name becomes
/// `...` followed by the last [`TRUNCATED_TITLE_CHARS`] characters of the
/// title.
pub fn document_path(dir: &Path, title: &str, extension: &str) -> PathBuf {
    let file_name = format!("{}.{}", title, extension);
    let full = dir.join(&file_name);
    if full.to_string_lossy().chars().count() <= MAX_PATH_CHARS && file_name.len() <= MAX_NAME_BYTES {
        return full;
    }

    let char_count = title.chars().count();
    let tail: String = title
        .chars()
        .skip(char_count.saturating_sub(TRUNCATED_TITLE_CHARS))
        .collect();
    dir.join(format!("{}{}.{}", ELLIPSIS, tail, extension))
}

/// Shortens `name` to at most `max_bytes` bytes, keeping its end
///
/// A shortened name starts with [`ELLIPSIS`]; the cut falls on a character
/// boundary.
pub fn fit_name_bytes(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }

    let mut start = name.len() - max_bytes.saturating_sub(ELLIPSIS.len());
    while !name.is_char_boundary(start) {
        start += 1;
    }
    format!("{}{}", ELLIPSIS, &name[start..])
}

/// The text after the last `.` of a URL's path, lowercased
pub fn url_suffix(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    segment
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// File name for a downloaded attachment
///
/// The sanitized attachment name, with the URL's suffix appended unless the
/// name already contains it. Overlong names keep their end and the suffix.
pub fn attachment_file_name(name: &str, url: &str) -> String {
    let name = sanitize_filename(name);
    match url_suffix(url) {
        Some(suffix) if !name.to_ascii_lowercase().contains(&suffix) => {
            let budget = MAX_NAME_BYTES.saturating_sub(suffix.len() + 1);
            format!("{}.{}", fit_name_bytes(&name, budget), suffix)
        }
        _ => fit_name_bytes(&name, MAX_NAME_BYTES),
    }
}

/// Returns true if the URL points at one of the skipped video formats
pub fn is_skipped_suffix(url: &str, skip_suffixes: &[String]) -> bool {
    url_suffix(url)
        .map(|suffix| skip_suffixes.iter().any(|s| s.eq_ignore_ascii_case(&suffix)))
        .unwrap_or(false)
}
