//! Site profiles: which extractor, builder and layout a listing template uses

use crate::output::DocumentLayout;
use crate::sites::article::ArticleBuilder;
use crate::sites::listing::{BulletinExtractor, LinkListExtractor, ScriptUrlExtractor};
use crate::sites::notice::{NoticeBuilder, CATEGORY_FIELD, DATE_FIELD, TITLE_FIELD};
use crate::sites::traits::{Extractor, RecordBuilder, SchemaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The listing templates the crawler knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteKind {
    /// Government file listings (regulations, notices, circulars)
    GovernmentFiles,

    /// Policy interpretation listings, links rendered by script
    PolicyInterpretation,

    /// Press releases and media coverage
    News,

    /// Government work updates
    WorkUpdates,

    /// Yearly government work reports
    WorkReports,

    /// Government bulletin issues
    Bulletin,
}

impl SiteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GovernmentFiles => "government-files",
            Self::PolicyInterpretation => "policy-interpretation",
            Self::News => "news",
            Self::WorkUpdates => "work-updates",
            Self::WorkReports => "work-reports",
            Self::Bulletin => "bulletin",
        }
    }

    /// Bulletins are crawled issue by issue instead of page by page
    pub fn is_bulletin(&self) -> bool {
        matches!(self, Self::Bulletin)
    }

    pub fn all() -> &'static [SiteKind] {
        &[
            Self::GovernmentFiles,
            Self::PolicyInterpretation,
            Self::News,
            Self::WorkUpdates,
            Self::WorkReports,
            Self::Bulletin,
        ]
    }

    /// Builds the strategies for this template
    ///
    /// Fails only if a built-in field schema is malformed.
    pub fn profile(self) -> Result<SiteProfile, SchemaError> {
        let profile = match self {
            Self::GovernmentFiles => SiteProfile::new(
                LinkListExtractor::government_files(),
                NoticeBuilder::documents()?,
                DocumentLayout::titled(TITLE_FIELD),
            ),
            Self::PolicyInterpretation => SiteProfile::new(
                ScriptUrlExtractor::policy_interpretation(),
                NoticeBuilder::documents()?,
                DocumentLayout::titled(TITLE_FIELD),
            ),
            Self::News => SiteProfile::new(
                LinkListExtractor::news(),
                ArticleBuilder::new()?,
                DocumentLayout::titled(TITLE_FIELD),
            ),
            Self::WorkUpdates => SiteProfile::new(
                LinkListExtractor::work_updates(),
                ArticleBuilder::new()?,
                DocumentLayout::titled(TITLE_FIELD),
            ),
            Self::WorkReports => SiteProfile::new(
                LinkListExtractor::work_reports(),
                NoticeBuilder::documents()?,
                DocumentLayout::titled(TITLE_FIELD).year_prefixed_by(DATE_FIELD),
            ),
            Self::Bulletin => SiteProfile::new(
                BulletinExtractor,
                NoticeBuilder::bulletin()?,
                DocumentLayout::titled(TITLE_FIELD).grouped_by(CATEGORY_FIELD),
            ),
        };
        Ok(profile)
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extractor, record builder and document layout for one template
#[derive(Clone)]
pub struct SiteProfile {
    pub extractor: Arc<dyn Extractor>,
    pub builder: Arc<dyn RecordBuilder>,
    pub layout: DocumentLayout,
}

impl SiteProfile {
    pub fn new(
        extractor: impl Extractor + 'static,
        builder: impl RecordBuilder + 'static,
        layout: DocumentLayout,
    ) -> Self {
        Self {
            extractor: Arc::new(extractor),
            builder: Arc::new(builder),
            layout,
        }
    }

    /// Index columns, in order
    pub fn columns(&self) -> Vec<String> {
        self.builder.schema().columns()
    }
}

impl fmt::Debug for SiteProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteProfile")
            .field("columns", &self.columns())
            .field("layout", &self.layout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        site: SiteKind,
    }

    #[test]
    fn test_every_profile_builds() {
        for kind in SiteKind::all() {
            let profile = kind.profile().unwrap();
            assert!(profile.columns().contains(&TITLE_FIELD.to_string()), "{}", kind);
        }
    }

    #[test]
    fn test_profile_columns() {
        assert_eq!(SiteKind::GovernmentFiles.profile().unwrap().columns().len(), 9);
        assert_eq!(SiteKind::Bulletin.profile().unwrap().columns().len(), 10);
        assert_eq!(SiteKind::News.profile().unwrap().columns(), vec!["标题", "链接"]);
    }

    #[test]
    fn test_layouts() {
        let reports = SiteKind::WorkReports.profile().unwrap();
        assert_eq!(reports.layout.year_prefix_field.as_deref(), Some(DATE_FIELD));

        let bulletin = SiteKind::Bulletin.profile().unwrap();
        assert_eq!(bulletin.layout.group_field.as_deref(), Some(CATEGORY_FIELD));
    }

    #[test]
    fn test_deserialize_kebab_case() {
        let w: Wrapper = toml::from_str(r#"site = "policy-interpretation""#).unwrap();
        assert_eq!(w.site, SiteKind::PolicyInterpretation);

        for kind in SiteKind::all() {
            let w: Wrapper = toml::from_str(&format!("site = \"{}\"", kind)).unwrap();
            assert_eq!(w.site, *kind);
        }
    }

    #[test]
    fn test_is_bulletin() {
        assert!(SiteKind::Bulletin.is_bulletin());
        assert!(!SiteKind::News.is_bulletin());
    }
}
