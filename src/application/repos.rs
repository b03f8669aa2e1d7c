//! Repository traits describing the network's persistence adapters.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::application::context::BlogScope;
use crate::application::plan::MergePlan;
use crate::domain::types::{BlogId, BlogIdSet};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("missing relation: {relation}")]
    MissingRelation { relation: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Include/exclude constraints applied when listing blogs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogFilter {
    pub include: Option<BlogIdSet>,
    pub exclude: Option<BlogIdSet>,
}

impl BlogFilter {
    pub fn admits(&self, blog_id: BlogId) -> bool {
        let included = self
            .include
            .as_ref()
            .is_none_or(|include| include.contains(blog_id));
        let excluded = self
            .exclude
            .as_ref()
            .is_some_and(|exclude| exclude.contains(blog_id));
        included && !excluded
    }
}

/// Directory entry for one blog, before metadata enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogRow {
    pub blog_id: BlogId,
    pub domain: String,
    pub path: String,
}

/// Descriptive metadata read from inside a blog's own context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogInfo {
    pub name: String,
    pub home_url: String,
}

/// One row of the merged result as it comes off the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub blog_id: Option<BlogId>,
    pub native: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedPosts {
    pub rows: Vec<MergedRow>,
    /// Matches across all blogs, independent of the page window.
    pub found_posts: u64,
}

#[async_trait]
pub trait BlogDirectory: Send + Sync {
    /// Blogs admitted by `filter`, ordered by id ascending. Unknown included ids are skipped.
    async fn list_blogs(&self, filter: &BlogFilter) -> Result<Vec<BlogRow>, RepoError>;

    /// Reads name and home URL of the blog `scope` currently points at.
    async fn read_blog_info(&self, scope: &BlogScope<'_>) -> Result<BlogInfo, RepoError>;
}

#[async_trait]
pub trait NetworkPostsRepo: Send + Sync {
    /// Runs the merged query once, returning the page window and the total match count.
    async fn fetch_merged(&self, plan: &MergePlan) -> Result<MergedPosts, RepoError>;
}
