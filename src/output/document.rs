//! Markdown document generation
//!
//! Each crawled record is written as one Markdown file: the title as a level
//! one heading followed by the body paragraphs.

use crate::output::traits::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a document to `path`, replacing any existing file
///
/// # Arguments
///
/// * `path` - Full path of the document file
/// * `heading` - Document heading
/// * `paragraphs` - Body paragraphs in order
pub fn write_markdown_document(path: &Path, heading: &str, paragraphs: &[String]) -> OutputResult<()> {
    let markdown = format_markdown_document(heading, paragraphs);

    let mut file = File::create(path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a heading and paragraphs as Markdown
///
/// Blank paragraphs are dropped; each remaining one is separated by an empty
/// line so renderers keep them apart.
pub fn format_markdown_document(heading: &str, paragraphs: &[String]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", heading.trim()));

    for paragraph in paragraphs.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        md.push_str(paragraph);
        md.push_str("\n\n");
    }

    md
}
