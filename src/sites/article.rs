//! Record builder for news-style article pages
//!
//! Press releases and work updates carry no metadata block; their title comes
//! from the listing and their body from the `TRS_Editor` container.

use crate::sites::html::{element_text, selector};
use crate::sites::notice::TITLE_FIELD;
use crate::sites::traits::{
    BuildContext, FieldSchema, FieldSource, FieldSpec, Record, RecordBuilder, SchemaError, MISSING_VALUE,
};
use scraper::Html;

/// Column holding the article URL
pub const LINK_FIELD: &str = "链接";

#[derive(Debug, Clone)]
pub struct ArticleBuilder {
    schema: FieldSchema,
}

impl ArticleBuilder {
    pub fn new() -> Result<Self, SchemaError> {
        let schema = FieldSchema::new(vec![
            FieldSpec::new(TITLE_FIELD, FieldSource::ItemTitle),
            FieldSpec::new(LINK_FIELD, FieldSource::ItemUrl),
        ])?;
        schema.expect_len(2)?;
        Ok(Self { schema })
    }
}

impl RecordBuilder for ArticleBuilder {
    fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    fn build(&self, ctx: BuildContext<'_>, page_text: &str) -> Option<Record> {
        let document = Html::parse_document(page_text);
        let paragraphs = selector("div.TRS_Editor p");
        let body = document
            .select(&paragraphs)
            .map(|p| element_text(&p))
            .collect::<Vec<_>>()
            .join("\n");

        let title = ctx
            .item
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(MISSING_VALUE)
            .to_string();

        Some(Record {
            attributes: vec![
                (TITLE_FIELD.to_string(), title),
                (LINK_FIELD.to_string(), ctx.item.url.clone()),
            ],
            body,
            attachments: Vec::new(),
        })
    }
}
