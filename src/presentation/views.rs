use std::fmt;
use std::sync::Arc;

use askama::{Error as AskamaError, Template};
use serde::Serialize;
use thiserror::Error;

pub const ARCHIVE_SIMPLE: &str = "archive-simple";
pub const ARCHIVE_DETAILED: &str = "archive-detailed";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template `{name}` not found in any template source")]
    TemplateNotFound { name: String },
    #[error("template `{name}` failed to render")]
    Template {
        name: String,
        #[source]
        error: AskamaError,
    },
}

/// One post as the archive templates see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveItem {
    pub blog_id: i64,
    pub post_id: i64,
    pub title: String,
    pub permalink: String,
    pub date: Option<String>,
    pub blog_name: String,
    pub blog_url: String,
}

/// Variables handed to an archive template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveView {
    pub items: Vec<ArchiveItem>,
    pub show_date: bool,
}

#[derive(Template)]
#[template(path = "archive-simple.html")]
pub struct ArchiveSimpleTemplate<'a> {
    pub view: &'a ArchiveView,
}

#[derive(Template)]
#[template(path = "archive-detailed.html")]
pub struct ArchiveDetailedTemplate<'a> {
    pub view: &'a ArchiveView,
}

/// A place templates can be looked up in.
pub trait TemplateSource: Send + Sync {
    /// Short label used in logs.
    fn label(&self) -> &str;

    /// `None` when this source has no template called `name`.
    fn render(&self, name: &str, view: &ArchiveView) -> Option<Result<String, RenderError>>;
}

/// Templates compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl TemplateSource for BuiltinTemplates {
    fn label(&self) -> &str {
        "builtin"
    }

    fn render(&self, name: &str, view: &ArchiveView) -> Option<Result<String, RenderError>> {
        let rendered = match name {
            ARCHIVE_SIMPLE => ArchiveSimpleTemplate { view }.render(),
            ARCHIVE_DETAILED => ArchiveDetailedTemplate { view }.render(),
            _ => return None,
        };
        Some(rendered.map_err(|error| RenderError::Template {
            name: name.to_string(),
            error,
        }))
    }
}

/// Ordered template lookup: registered sources first, built-ins last.
#[derive(Clone)]
pub struct TemplateCatalog {
    sources: Vec<Arc<dyn TemplateSource>>,
    builtin: BuiltinTemplates,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            builtin: BuiltinTemplates,
        }
    }

    /// Registers `source` after the previously registered ones.
    pub fn with_source(mut self, source: Arc<dyn TemplateSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn render(&self, name: &str, view: &ArchiveView) -> Result<String, RenderError> {
        let sources = self
            .sources
            .iter()
            .map(|source| source.as_ref())
            .chain(std::iter::once(&self.builtin as &dyn TemplateSource));

        for source in sources {
            if let Some(result) = source.render(name, view) {
                tracing::debug!(template = name, source = source.label(), "Rendering template");
                return result;
            }
        }

        Err(RenderError::TemplateNotFound {
            name: name.to_string(),
        })
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TemplateCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.sources.iter().map(|source| source.label()).collect();
        f.debug_struct("TemplateCatalog")
            .field("sources", &labels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(show_date: bool) -> ArchiveView {
        ArchiveView {
            items: vec![ArchiveItem {
                blog_id: 2,
                post_id: 11,
                title: "Fish & Chips".to_string(),
                permalink: "https://two.test/?p=11".to_string(),
                date: Some("2024-05-01 09:00:00".to_string()),
                blog_name: "Two".to_string(),
                blog_url: "https://two.test".to_string(),
            }],
            show_date,
        }
    }

    struct Override;

    impl TemplateSource for Override {
        fn label(&self) -> &str {
            "override"
        }

        fn render(&self, name: &str, view: &ArchiveView) -> Option<Result<String, RenderError>> {
            (name == ARCHIVE_SIMPLE).then(|| Ok(format!("{} items", view.items.len())))
        }
    }

    #[test]
    fn builtin_simple_escapes_and_links() {
        let html = TemplateCatalog::new()
            .render(ARCHIVE_SIMPLE, &view(true))
            .expect("render");

        assert!(html.contains("href=\"https://two.test/?p=11\""));
        assert!(html.contains("Fish &amp; Chips"));
        assert!(html.contains("2024-05-01 09:00:00"));
    }

    #[test]
    fn show_date_false_hides_dates() {
        let html = TemplateCatalog::new()
            .render(ARCHIVE_DETAILED, &view(false))
            .expect("render");

        assert!(html.contains("Two"));
        assert!(!html.contains("2024-05-01"));
    }

    #[test]
    fn registered_sources_shadow_builtins() {
        let catalog = TemplateCatalog::new().with_source(Arc::new(Override));

        assert_eq!(
            catalog.render(ARCHIVE_SIMPLE, &view(true)).expect("render"),
            "1 items"
        );
        assert!(
            catalog
                .render(ARCHIVE_DETAILED, &view(true))
                .expect("builtin fallback")
                .contains("Two")
        );
    }

    #[test]
    fn unknown_template_is_reported() {
        let err = TemplateCatalog::new()
            .render("archive-missing", &view(true))
            .expect_err("missing template");
        assert!(matches!(err, RenderError::TemplateNotFound { name } if name == "archive-missing"));
    }
}
