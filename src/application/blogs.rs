//! Blog listing with metadata enrichment.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::context::{BlogContextStack, BlogScope};
use crate::application::error::AppError;
use crate::application::query::BlogQuery;
use crate::application::repos::{BlogDirectory, BlogInfo, BlogRow};
use crate::application::transients::TransientCache;
use crate::cache::OP_GET_BLOGS;
use crate::domain::entities::BlogRecord;

const TARGET: &str = "crossblog::blogs";

#[derive(Clone)]
pub struct BlogResolver {
    directory: Arc<dyn BlogDirectory>,
    cache: TransientCache,
    context: Arc<BlogContextStack>,
}

impl BlogResolver {
    pub fn new(
        directory: Arc<dyn BlogDirectory>,
        cache: TransientCache,
        context: Arc<BlogContextStack>,
    ) -> Self {
        Self {
            directory,
            cache,
            context,
        }
    }

    pub fn context(&self) -> &BlogContextStack {
        &self.context
    }

    /// Blogs matching `query`, ordered by id, each annotated with its name and home URL.
    #[instrument(target = "crossblog::blogs", skip_all, fields(ttl = query.transient_expires_in))]
    pub async fn get_blogs(&self, query: &BlogQuery) -> Result<Vec<BlogRecord>, AppError> {
        let ttl = query.ttl();
        let key = match ttl {
            Some(_) => Some(self.cache.key(OP_GET_BLOGS, query)?),
            None => None,
        };

        if let Some(key) = key.as_deref()
            && let Some(cached) = self.cache.read::<Vec<BlogRecord>>(OP_GET_BLOGS, key).await
        {
            return Ok(cached);
        }

        let rows = self.directory.list_blogs(&query.filter()).await?;
        let mut blogs = Vec::with_capacity(rows.len());
        for row in rows {
            blogs.push(self.enrich(row).await?);
        }

        debug!(target: TARGET, count = blogs.len(), "Resolved blogs");

        if let (Some(key), Some(ttl)) = (key.as_deref(), ttl) {
            self.cache.write(OP_GET_BLOGS, key, &blogs, ttl).await;
        }

        Ok(blogs)
    }

    /// Reads the metadata of the blog `scope` points at.
    pub async fn read_info(&self, scope: &BlogScope<'_>) -> Result<BlogInfo, AppError> {
        Ok(self.directory.read_blog_info(scope).await?)
    }

    async fn enrich(&self, row: BlogRow) -> Result<BlogRecord, AppError> {
        let info = {
            let scope = self.context.enter(row.blog_id);
            self.read_info(&scope).await?
        };

        Ok(BlogRecord {
            blog_id: row.blog_id,
            domain: row.domain,
            path: row.path,
            name: info.name,
            home_url: info.home_url,
        })
    }
}
