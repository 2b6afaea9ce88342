//! Portal-specific page strategies
//!
//! This module handles:
//! - Extracting item links from listing pages
//! - Building records from item pages
//! - Bundling both with a document layout per listing template
//! - Discovering bulletin issues

pub mod article;
pub mod bulletin;
pub mod html;
pub mod listing;
pub mod notice;
mod profile;
mod traits;

pub use article::ArticleBuilder;
pub use bulletin::{discover_issues, parse_issue_options, BulletinIssue};
pub use listing::{BulletinExtractor, LinkListExtractor, LinkStyle, ScriptUrlExtractor};
pub use notice::NoticeBuilder;
pub use profile::{SiteKind, SiteProfile};
pub use traits::{
    Attachment, BuildContext, Extractor, FieldSchema, FieldSource, FieldSpec, ItemReference, Record,
    RecordBuilder, SchemaError, MISSING_VALUE,
};
