//! Merged post queries with transient caching.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::application::ambient::{AmbientHook, AmbientQuery, PaginationSnapshot};
use crate::application::blogs::BlogResolver;
use crate::application::error::AppError;
use crate::application::plan::{QueryPlan, TableNaming, build_plan};
use crate::application::query::{BlogQuery, PostQuery};
use crate::application::repos::{MergedPosts, NetworkPostsRepo};
use crate::application::transients::TransientCache;
use crate::cache::{METRIC_TRANSIENT_INVALIDATED, OP_GET_POSTS};
use crate::domain::entities::{BlogRecord, NetworkPost};
use crate::domain::error::DomainError;
use crate::domain::types::BlogId;

const TARGET: &str = "crossblog::posts";
pub const METRIC_MERGE_QUERY_MS: &str = "crossblog_merge_query_ms";

/// Stored form of a merged result. `numberposts` is the page size it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPosts {
    pub posts: Vec<NetworkPost>,
    pub found_posts: u64,
    pub numberposts: u32,
    #[serde(default)]
    pub blogs: Vec<BlogRecord>,
}

/// One page of merged posts with the figures needed for pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct PostsPage {
    pub posts: Vec<NetworkPost>,
    pub found_posts: u64,
    pub numberposts: NonZeroU32,
    /// Blogs the merge ran over, as resolved for this page.
    pub blogs: Vec<BlogRecord>,
}

impl PostsPage {
    pub fn pagination(&self) -> PaginationSnapshot {
        PaginationSnapshot::new(self.numberposts, self.found_posts)
    }

    pub fn max_num_pages(&self) -> u64 {
        self.pagination().max_num_pages
    }
}

/// A post viewed from inside its own blog.
#[derive(Debug, Clone, PartialEq)]
pub struct PostInContext<'a> {
    pub post: &'a NetworkPost,
    pub blog_name: String,
    pub blog_home_url: String,
}

impl PostInContext<'_> {
    pub fn permalink(&self) -> String {
        permalink(self.post, &self.blog_home_url)
    }
}

/// `guid` when the row carries one, otherwise the blog's `?p=` link.
pub fn permalink(post: &NetworkPost, home_url: &str) -> String {
    match post.guid() {
        Some(guid) => guid.to_string(),
        None => format!("{}/?p={}", home_url.trim_end_matches('/'), post.id),
    }
}

#[derive(Clone)]
pub struct NetworkPostService {
    blogs: BlogResolver,
    repo: Arc<dyn NetworkPostsRepo>,
    cache: TransientCache,
    naming: TableNaming,
    ambient_hook: Option<AmbientHook>,
}

impl NetworkPostService {
    pub fn new(
        blogs: BlogResolver,
        repo: Arc<dyn NetworkPostsRepo>,
        cache: TransientCache,
        naming: TableNaming,
    ) -> Self {
        Self {
            blogs,
            repo,
            cache,
            naming,
            ambient_hook: None,
        }
    }

    /// Runs `hook` over every snapshot before it replaces the ambient one.
    pub fn with_ambient_hook(mut self, hook: AmbientHook) -> Self {
        self.ambient_hook = Some(hook);
        self
    }

    pub fn blogs(&self) -> &BlogResolver {
        &self.blogs
    }

    pub async fn get_posts(
        &self,
        query: &PostQuery,
        ambient: Option<&AmbientQuery>,
    ) -> Result<Vec<NetworkPost>, AppError> {
        Ok(self.get_posts_page(query, ambient).await?.posts)
    }

    pub async fn get_blogs(&self, query: &BlogQuery) -> Result<Vec<BlogRecord>, AppError> {
        self.blogs.get_blogs(query).await
    }

    #[instrument(
        target = "crossblog::posts",
        skip_all,
        fields(numberposts = query.numberposts.get(), ttl = query.transient_expires_in)
    )]
    pub async fn get_posts_page(
        &self,
        query: &PostQuery,
        ambient: Option<&AmbientQuery>,
    ) -> Result<PostsPage, AppError> {
        let ttl = query.ttl();
        let key = match ttl {
            Some(_) => Some(self.cache.key(OP_GET_POSTS, &query.pinned(ambient))?),
            None => None,
        };

        let cached = match key.as_deref() {
            Some(key) => self.read_cached(key, query.numberposts).await,
            None => None,
        };

        let page = match cached {
            Some(page) => page,
            None => {
                let page = self.compute(query, ambient).await?;
                if let (Some(key), Some(ttl)) = (key.as_deref(), ttl) {
                    let entry = CachedPosts {
                        posts: page.posts.clone(),
                        found_posts: page.found_posts,
                        numberposts: page.numberposts.get(),
                        blogs: page.blogs.clone(),
                    };
                    self.cache.write(OP_GET_POSTS, key, &entry, ttl).await;
                }
                page
            }
        };

        if query.affect_wp_query {
            self.publish_pagination(&page, ambient);
        }

        Ok(page)
    }

    /// Runs `f` with `post` annotated by its blog's metadata, read from inside that blog.
    pub async fn with_post_context<T>(
        &self,
        post: &NetworkPost,
        f: impl FnOnce(&PostInContext<'_>) -> T,
    ) -> Result<T, AppError> {
        if !post.blog_id.is_assigned() {
            return Err(AppError::configuration(format!(
                "post {} carries no origin blog id",
                post.id
            )));
        }

        let scope = self.blogs.context().enter(post.blog_id);
        let info = self.blogs.read_info(&scope).await?;
        let in_context = PostInContext {
            post,
            blog_name: info.name,
            blog_home_url: info.home_url,
        };
        Ok(f(&in_context))
    }

    async fn read_cached(&self, key: &str, numberposts: NonZeroU32) -> Option<PostsPage> {
        let cached = self.cache.read::<CachedPosts>(OP_GET_POSTS, key).await?;

        if cached.numberposts != numberposts.get() {
            counter!(METRIC_TRANSIENT_INVALIDATED, "operation" => OP_GET_POSTS).increment(1);
            info!(
                target: TARGET,
                key,
                stored = cached.numberposts,
                requested = numberposts.get(),
                "Page size changed; evicting transient"
            );
            self.cache.evict(key).await;
            return None;
        }

        Some(PostsPage {
            posts: cached.posts,
            found_posts: cached.found_posts,
            numberposts,
            blogs: cached.blogs,
        })
    }

    async fn compute(
        &self,
        query: &PostQuery,
        ambient: Option<&AmbientQuery>,
    ) -> Result<PostsPage, AppError> {
        let blogs = self.blogs.get_blogs(&query.blog_query()).await?;
        let plan = build_plan(&blogs, query, ambient, &self.naming);

        let merged = match &plan {
            QueryPlan::Empty { .. } => {
                debug!(target: TARGET, "No blogs to merge");
                MergedPosts::default()
            }
            QueryPlan::Merge(merge) => {
                let started_at = Instant::now();
                let merged = self.repo.fetch_merged(merge).await?;
                histogram!(METRIC_MERGE_QUERY_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
                debug!(
                    target: TARGET,
                    blogs = merge.sources.len(),
                    rows = merged.rows.len(),
                    found_posts = merged.found_posts,
                    "Merged query executed"
                );
                merged
            }
        };

        let sources: Vec<BlogId> = match &plan {
            QueryPlan::Empty { .. } => Vec::new(),
            QueryPlan::Merge(merge) => merge.sources.iter().map(|s| s.blog_id).collect(),
        };

        let posts = merged
            .rows
            .into_iter()
            .map(|row| -> Result<NetworkPost, AppError> {
                let blog_id = row
                    .blog_id
                    .filter(|id| id.is_assigned())
                    .ok_or_else(|| AppError::configuration("merged row has no origin blog id"))?;
                if !sources.contains(&blog_id) {
                    return Err(DomainError::invariant(format!(
                        "merged row tagged with blog {blog_id}, which was not queried"
                    ))
                    .into());
                }
                Ok(NetworkPost::from_native(blog_id, row.native)?)
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(PostsPage {
            posts,
            found_posts: merged.found_posts,
            numberposts: query.numberposts,
            blogs,
        })
    }

    fn publish_pagination(&self, page: &PostsPage, ambient: Option<&AmbientQuery>) {
        let Some(ambient) = ambient else {
            debug!(target: TARGET, "affect_wp_query requested without an ambient query");
            return;
        };

        let mut snapshot = page.pagination();
        if let Some(hook) = &self.ambient_hook {
            snapshot = hook(snapshot);
        }
        ambient.replace_pagination(snapshot);
    }
}
