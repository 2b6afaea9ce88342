//! Site strategy traits and the record types they produce
//!
//! The crawl orchestrator is generic; everything that depends on a listing
//! template's markup lives behind [`Extractor`] and [`RecordBuilder`].

use std::collections::HashSet;
use thiserror::Error;

/// Placeholder kept for attributes missing from the source page, so index
/// columns stay aligned
pub const MISSING_VALUE: &str = " ";

/// Errors raised when a field schema does not match its template
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("field schema has no fields")]
    Empty,

    #[error("duplicate field name '{0}'")]
    DuplicateField(String),

    #[error("expected {expected} fields, schema has {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("required field '{0}' is missing from the schema")]
    MissingField(String),

    #[error("metadata slot {0} is out of range")]
    InvalidSlot(usize),
}

/// A link to one document page discovered on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReference {
    /// Absolute item URL; empty means "skip this entry"
    pub url: String,

    /// Title shown on the listing page, when the template has one
    pub title: Option<String>,
}

impl ItemReference {
    /// Reference without a listing title
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }

    /// Reference with a listing title
    pub fn with_title(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: Some(title.into()),
        }
    }

    /// Sentinel for a listing entry whose URL could not be read
    pub fn skipped() -> Self {
        Self::new(String::new())
    }

    /// Returns true if this reference should be skipped
    pub fn is_sentinel(&self) -> bool {
        self.url.trim().is_empty()
    }
}

/// A downloadable file referenced by a document page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// The structured result of parsing one document page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Named attributes in schema order
    pub attributes: Vec<(String, String)>,

    /// Body paragraphs joined with newlines
    pub body: String,

    /// Attachments in page order
    pub attachments: Vec<Attachment>,
}

impl Record {
    /// Returns the value of a named attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the value of a named attribute unless it is the placeholder
    pub fn present_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name).filter(|v| !v.trim().is_empty())
    }

    /// Attribute values in schema order, one per index column
    pub fn values(&self) -> Vec<String> {
        self.attributes.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Returns true if the body carries any text after trimming
    pub fn has_content(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

/// Where a schema field takes its value from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// 1-based metadata slot on the item page
    Slot(usize),

    /// Fixed value for every record of the template
    Constant(String),

    /// Label of the issue the job crawls (bulletins)
    IssueLabel,

    /// Title taken from the listing page
    ItemTitle,

    /// The item URL itself
    ItemUrl,
}

/// One named column of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub source: FieldSource,
}

impl FieldSpec {
    pub fn new(name: &str, source: FieldSource) -> Self {
        Self {
            name: name.to_string(),
            source,
        }
    }
}

/// Ordered, named field layout of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

impl FieldSchema {
    /// Builds a schema, rejecting empty or duplicate field lists
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
            if field.source == FieldSource::Slot(0) {
                return Err(SchemaError::InvalidSlot(0));
            }
        }

        Ok(Self { fields })
    }

    /// Checks the schema has exactly `expected` fields
    pub fn expect_len(&self, expected: usize) -> Result<(), SchemaError> {
        if self.fields.len() != expected {
            return Err(SchemaError::FieldCount {
                expected,
                actual: self.fields.len(),
            });
        }
        Ok(())
    }

    /// Checks a named field is present
    pub fn require(&self, name: &str) -> Result<(), SchemaError> {
        if self.fields.iter().any(|f| f.name == name) {
            Ok(())
        } else {
            Err(SchemaError::MissingField(name.to_string()))
        }
    }

    /// Checks every metadata slot lies within `1..=max_slot`
    pub fn check_slots(&self, max_slot: usize) -> Result<(), SchemaError> {
        for field in &self.fields {
            if let FieldSource::Slot(n) = field.source {
                if n == 0 || n > max_slot {
                    return Err(SchemaError::InvalidSlot(n));
                }
            }
        }
        Ok(())
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Column names in order
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// What a record builder knows about the item it is parsing
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub item: &'a ItemReference,

    /// Issue label of the job, for bulletin issues
    pub issue: Option<&'a str>,
}

/// Turns a listing page into item references
pub trait Extractor: Send + Sync {
    /// Returns item references in page order
    ///
    /// Entries whose URL cannot be read are returned as sentinels rather
    /// than dropped, so progress logs line up with the listing.
    fn extract(&self, page_url: &str, page_text: &str) -> Vec<ItemReference>;
}

/// Turns a fetched item page into a record
pub trait RecordBuilder: Send + Sync {
    /// The columns every record from this builder carries
    fn schema(&self) -> &FieldSchema;

    /// Parses an item page; `None` means the page is not a document
    fn build(&self, ctx: BuildContext<'_>, page_text: &str) -> Option<Record>;
}
