//! Cross-blog query planning.
//!
//! A plan names one posts table per blog plus the filters, ordering and window
//! applied to their union. The SQL itself is produced by `infra::db::posts`.

use std::collections::BTreeMap;

use crate::application::ambient::AmbientQuery;
use crate::application::query::{PageWindow, PostQuery};
use crate::domain::entities::BlogRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{BlogId, OrderColumn, PostTypes, SortDirection, is_sql_identifier};

pub const DEFAULT_TABLE_PREFIX: &str = "wp_";
pub const DEFAULT_MAIN_BLOG_ID: BlogId = BlogId::new(1);

/// Table addressing across the network.
///
/// The main blog uses the bare prefix (`wp_posts`); every other blog inserts its id
/// (`wp_2_posts`). Blogs whose tables live elsewhere get an explicit prefix override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNaming {
    prefix: String,
    main_blog_id: BlogId,
    overrides: BTreeMap<BlogId, String>,
}

impl TableNaming {
    pub fn new(prefix: impl Into<String>, main_blog_id: BlogId) -> Result<Self, DomainError> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        if !main_blog_id.is_assigned() {
            return Err(DomainError::validation(format!(
                "main blog id must be positive, got {main_blog_id}"
            )));
        }
        Ok(Self {
            prefix,
            main_blog_id,
            overrides: BTreeMap::new(),
        })
    }

    pub fn with_override(
        mut self,
        blog_id: BlogId,
        prefix: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        self.overrides.insert(blog_id, prefix);
        Ok(self)
    }

    pub fn main_blog_id(&self) -> BlogId {
        self.main_blog_id
    }

    pub fn table_prefix(&self, blog_id: BlogId) -> String {
        if let Some(prefix) = self.overrides.get(&blog_id) {
            return prefix.clone();
        }
        if blog_id == self.main_blog_id {
            self.prefix.clone()
        } else {
            format!("{}{}_", self.prefix, blog_id)
        }
    }

    pub fn posts_table(&self, blog_id: BlogId) -> String {
        format!("{}posts", self.table_prefix(blog_id))
    }

    pub fn options_table(&self, blog_id: BlogId) -> String {
        format!("{}options", self.table_prefix(blog_id))
    }

    /// Network-wide directory table.
    pub fn blogs_table(&self) -> String {
        format!("{}blogs", self.prefix)
    }
}

impl Default for TableNaming {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_TABLE_PREFIX.to_string(),
            main_blog_id: DEFAULT_MAIN_BLOG_ID,
            overrides: BTreeMap::new(),
        }
    }
}

fn validate_prefix(prefix: &str) -> Result<(), DomainError> {
    if is_sql_identifier(prefix) {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "table prefix `{prefix}` must be a plain identifier"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSource {
    pub blog_id: BlogId,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub sources: Vec<MergeSource>,
    pub post_types: PostTypes,
    pub post_status: String,
    pub orderby: OrderColumn,
    pub order: SortDirection,
    pub window: PageWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Nothing to query; yields no posts and a zero total.
    Empty { window: PageWindow },
    Merge(MergePlan),
}

impl QueryPlan {
    pub fn window(&self) -> PageWindow {
        match self {
            QueryPlan::Empty { window } => *window,
            QueryPlan::Merge(plan) => plan.window,
        }
    }
}

pub fn build_plan(
    blogs: &[BlogRecord],
    query: &PostQuery,
    ambient: Option<&AmbientQuery>,
    naming: &TableNaming,
) -> QueryPlan {
    let window = query.window(ambient);
    if blogs.is_empty() {
        return QueryPlan::Empty { window };
    }

    let sources = blogs
        .iter()
        .map(|blog| MergeSource {
            blog_id: blog.blog_id,
            table: naming.posts_table(blog.blog_id),
        })
        .collect();

    QueryPlan::Merge(MergePlan {
        sources,
        post_types: query.post_type.clone(),
        post_status: query.post_status.clone(),
        orderby: query.orderby.clone(),
        order: query.order,
        window,
    })
}
