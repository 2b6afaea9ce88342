//! Record builder for the portal's notice page template
//!
//! Notice pages (government files, policy interpretations, bulletins, work
//! reports) share one layout:
//!
//! - `div.xx_con` holds seven `<p>` metadata slots: index number, category,
//!   issuing body, date, title, document number, keywords
//! - `div.news_cont_d_wrap` holds the body paragraphs
//! - `div.fjdown` holds a script declaring attachment names and paths

use crate::sites::html::{between, child_elements, element_text, own_text, selector};
use crate::sites::traits::{
    Attachment, BuildContext, FieldSchema, FieldSource, FieldSpec, Record, RecordBuilder, SchemaError,
    MISSING_VALUE,
};
use scraper::Html;
use url::Url;

/// Number of metadata slots in the notice template
pub const METADATA_SLOTS: usize = 7;

/// Column holding the document title
pub const TITLE_FIELD: &str = "标题";

/// Column holding the category, used to group bulletin documents
pub const CATEGORY_FIELD: &str = "文件类型";

/// Column holding the publication date
pub const DATE_FIELD: &str = "发布日期";

/// Column holding the bulletin issue label
pub const ISSUE_FIELD: &str = "期数";

/// Builds records from notice pages
#[derive(Debug, Clone)]
pub struct NoticeBuilder {
    schema: FieldSchema,
}

impl NoticeBuilder {
    /// Builder for the nine-column government document schema
    pub fn documents() -> Result<Self, SchemaError> {
        let schema = FieldSchema::new(document_fields())?;
        schema.expect_len(9)?;
        Self::with_schema(schema)
    }

    /// Builder for bulletin articles: the document schema led by the issue
    pub fn bulletin() -> Result<Self, SchemaError> {
        let mut fields = vec![FieldSpec::new(ISSUE_FIELD, FieldSource::IssueLabel)];
        fields.extend(document_fields());

        let schema = FieldSchema::new(fields)?;
        schema.expect_len(10)?;
        Self::with_schema(schema)
    }

    /// Builder over an arbitrary schema, validated against the template
    pub fn with_schema(schema: FieldSchema) -> Result<Self, SchemaError> {
        schema.check_slots(METADATA_SLOTS)?;
        schema.require(TITLE_FIELD)?;
        Ok(Self { schema })
    }
}

/// The government document columns in index order
fn document_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("索引号", FieldSource::Slot(1)),
        FieldSpec::new("省份", FieldSource::Constant("广东省".to_string())),
        FieldSpec::new("城市", FieldSource::Constant("深圳市".to_string())),
        FieldSpec::new(CATEGORY_FIELD, FieldSource::Slot(2)),
        FieldSpec::new("文号", FieldSource::Slot(6)),
        FieldSpec::new("发布机构", FieldSource::Slot(3)),
        FieldSpec::new(DATE_FIELD, FieldSource::Slot(4)),
        FieldSpec::new(TITLE_FIELD, FieldSource::Slot(5)),
        FieldSpec::new("主题词", FieldSource::Slot(7)),
    ]
}

impl RecordBuilder for NoticeBuilder {
    fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    fn build(&self, ctx: BuildContext<'_>, page_text: &str) -> Option<Record> {
        let document = Html::parse_document(page_text);
        let slots = metadata_slots(&document);

        let attributes = self
            .schema
            .fields()
            .iter()
            .map(|field| {
                let value = match &field.source {
                    FieldSource::Slot(n) => slots.get(n - 1).cloned().flatten(),
                    FieldSource::Constant(v) => Some(v.clone()),
                    FieldSource::IssueLabel => ctx.issue.map(str::to_string),
                    FieldSource::ItemTitle => ctx.item.title.clone(),
                    FieldSource::ItemUrl => Some(ctx.item.url.clone()),
                };
                (field.name.clone(), value.unwrap_or_else(|| MISSING_VALUE.to_string()))
            })
            .collect();

        Some(Record {
            attributes,
            body: body_text(&document),
            attachments: attachments(&document, &ctx.item.url),
        })
    }
}

/// Direct text of each `div.xx_con > p`, in slot order
fn metadata_slots(document: &Html) -> Vec<Option<String>> {
    let containers = selector("div.xx_con");
    document
        .select(&containers)
        .next()
        .map(|container| {
            child_elements(&container, "p")
                .iter()
                .map(own_text)
                .collect()
        })
        .unwrap_or_default()
}

/// Body paragraphs joined by newlines
///
/// Some older pages put the body in nested `<div>`s instead of `<p>`s.
fn body_text(document: &Html) -> String {
    let paragraphs = selector("div.news_cont_d_wrap p");
    let lines: Vec<String> = document.select(&paragraphs).map(|p| element_text(&p)).collect();
    if !lines.is_empty() {
        return lines.join("\n");
    }

    let divs = selector("div.news_cont_d_wrap div");
    document
        .select(&divs)
        .filter_map(|div| own_text(&div))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Attachments declared by the `div.fjdown` script
///
/// The script declares `var linkdesc="a;b";` and `var linkurl="./a.pdf;./b.doc";`.
/// An empty `linkdesc` means the notice has no attachments.
fn attachments(document: &Html, item_url: &str) -> Vec<Attachment> {
    let scripts = selector("div.fjdown script");
    let Some(script) = document.select(&scripts).next() else {
        return Vec::new();
    };
    let source = script.text().collect::<String>();

    if source.contains("var linkdesc=\"\";") {
        return Vec::new();
    }

    let (Some(names), Some(paths)) = (
        between(&source, "var linkdesc=\"", "\";"),
        between(&source, "var linkurl=\"", "\";"),
    ) else {
        return Vec::new();
    };

    let Ok(base) = Url::parse(item_url) else {
        return Vec::new();
    };

    let names: Vec<&str> = names.split(';').collect();
    paths
        .split(';')
        .enumerate()
        .filter(|(_, path)| !path.trim().is_empty())
        .filter_map(|(k, path)| {
            let relative = path.rsplit("./").next().unwrap_or(path).trim();
            let url = base.join(relative).ok()?.to_string();
            let name = names
                .get(k)
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .unwrap_or(relative)
                .to_string();
            Some(Attachment { name, url })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::traits::ItemReference;

    const NOTICE: &str = r#"
        <html><body>
        <div class="xx_con">
            <p><b>索引号：</b>11440300/2019-00123</p>
            <p><b>分类：</b>综合政务</p>
            <p><b>发布机构：</b>深圳市人民政府</p>
            <p><b>发布日期：</b>2019-07-08</p>
            <p><b>名称：</b>关于印发某某办法的通知</p>
            <p><b>文号：</b></p>
            <p><b>主题词：</b>办法</p>
        </div>
        <div class="news_cont_d_wrap">
            <p>第一段。</p>
            <p>  第<span>二</span>段。 </p>
        </div>
        <div class="fjdown"><script>
            var linkdesc="附件1/名单;附件2";
            var linkurl="./P020190708_1.pdf;./P020190708_2.mp4";
        </script></div>
        </body></html>"#;

    fn item() -> ItemReference {
        ItemReference::new("http://www.sz.gov.cn/zfwj/zfwjnew/szfl_139222/201907/t20190708_1.htm")
    }

    #[test]
    fn test_document_schema() {
        let builder = NoticeBuilder::documents().unwrap();
        assert_eq!(builder.schema().len(), 9);
        assert_eq!(
            builder.schema().columns(),
            vec!["索引号", "省份", "城市", "文件类型", "文号", "发布机构", "发布日期", "标题", "主题词"]
        );
    }

    #[test]
    fn test_bulletin_schema_leads_with_issue() {
        let builder = NoticeBuilder::bulletin().unwrap();
        assert_eq!(builder.schema().len(), 10);
        assert_eq!(builder.schema().columns()[0], ISSUE_FIELD);
    }

    #[test]
    fn test_schema_without_title_rejected() {
        let schema = FieldSchema::new(vec![FieldSpec::new("索引号", FieldSource::Slot(1))]).unwrap();
        assert_eq!(
            NoticeBuilder::with_schema(schema).unwrap_err(),
            SchemaError::MissingField(TITLE_FIELD.to_string())
        );
    }

    #[test]
    fn test_build_notice() {
        let builder = NoticeBuilder::documents().unwrap();
        let item = item();
        let record = builder
            .build(BuildContext { item: &item, issue: None }, NOTICE)
            .unwrap();

        assert_eq!(record.attribute("索引号"), Some("11440300/2019-00123"));
        assert_eq!(record.attribute("省份"), Some("广东省"));
        assert_eq!(record.attribute("文件类型"), Some("综合政务"));
        assert_eq!(record.attribute("发布日期"), Some("2019-07-08"));
        assert_eq!(record.attribute(TITLE_FIELD), Some("关于印发某某办法的通知"));
        // Slot present but empty keeps the placeholder
        assert_eq!(record.attribute("文号"), Some(MISSING_VALUE));
        assert_eq!(record.body, "第一段。\n第二段。");
    }

    #[test]
    fn test_build_notice_attachments() {
        let builder = NoticeBuilder::documents().unwrap();
        let item = item();
        let record = builder
            .build(BuildContext { item: &item, issue: None }, NOTICE)
            .unwrap();

        assert_eq!(record.attachments.len(), 2);
        assert_eq!(record.attachments[0].name, "附件1/名单");
        assert_eq!(
            record.attachments[0].url,
            "http://www.sz.gov.cn/zfwj/zfwjnew/szfl_139222/201907/P020190708_1.pdf"
        );
        assert!(record.attachments[1].url.ends_with(".mp4"));
    }

    #[test]
    fn test_no_attachments_when_linkdesc_empty() {
        let html = r#"<div class="news_cont_d_wrap"><p>x</p></div>
            <div class="fjdown"><script>var linkdesc="";var linkurl="";</script></div>"#;
        let builder = NoticeBuilder::documents().unwrap();
        let item = item();
        let record = builder.build(BuildContext { item: &item, issue: None }, html).unwrap();
        assert!(record.attachments.is_empty());
    }

    #[test]
    fn test_missing_sections_use_placeholders() {
        let builder = NoticeBuilder::bulletin().unwrap();
        let item = item();
        let record = builder
            .build(
                BuildContext {
                    item: &item,
                    issue: Some("2019年第10期"),
                },
                "<html><body><p>redirect stub</p></body></html>",
            )
            .unwrap();

        assert_eq!(record.attribute(ISSUE_FIELD), Some("2019年第10期"));
        assert_eq!(record.attribute(TITLE_FIELD), Some(MISSING_VALUE));
        assert!(!record.has_content());
        assert!(record.attachments.is_empty());
    }

    #[test]
    fn test_body_falls_back_to_divs() {
        let html = r#"<div class="news_cont_d_wrap"><div>甲</div><div>乙</div></div>"#;
        let builder = NoticeBuilder::documents().unwrap();
        let item = item();
        let record = builder.build(BuildContext { item: &item, issue: None }, html).unwrap();
        assert_eq!(record.body, "甲\n乙");
    }
}
