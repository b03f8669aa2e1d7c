//! Archive rendering on top of the merged post query.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::application::ambient::AmbientQuery;
use crate::application::error::AppError;
use crate::application::posts::{NetworkPostService, permalink};
use crate::application::query::PostQuery;
use crate::domain::entities::{BlogRecord, NetworkPost};
use crate::domain::types::BlogId;
use crate::presentation::views::{ARCHIVE_SIMPLE, ArchiveItem, ArchiveView, TemplateCatalog};

/// Caller-supplied renderer. Receives the posts and the options, returns the markup.
pub type RenderCallback = Arc<dyn Fn(&[NetworkPost], &ArchiveOptions) -> String + Send + Sync>;

#[derive(Clone)]
pub enum Renderer {
    /// Named template looked up in the catalog.
    Template(String),
    Callback(RenderCallback),
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Renderer::Template(name) => f.debug_tuple("Template").field(name).finish(),
            Renderer::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::Template(ARCHIVE_SIMPLE.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub renderer: Renderer,
    pub show_date: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            renderer: Renderer::default(),
            show_date: true,
        }
    }
}

#[derive(Clone)]
pub struct ArchiveRenderer {
    posts: NetworkPostService,
    templates: TemplateCatalog,
}

impl ArchiveRenderer {
    pub fn new(posts: NetworkPostService, templates: TemplateCatalog) -> Self {
        Self { posts, templates }
    }

    /// Runs `query` and renders the resulting posts.
    pub async fn render_post_archive_to_string(
        &self,
        query: &PostQuery,
        options: &ArchiveOptions,
        ambient: Option<&AmbientQuery>,
    ) -> Result<String, AppError> {
        let page = self.posts.get_posts_page(query, ambient).await?;

        match &options.renderer {
            Renderer::Callback(callback) => Ok(callback(&page.posts, options)),
            Renderer::Template(name) => {
                let blogs: BTreeMap<BlogId, &BlogRecord> =
                    page.blogs.iter().map(|blog| (blog.blog_id, blog)).collect();

                let mut items = Vec::with_capacity(page.posts.len());
                for post in &page.posts {
                    items.push(self.archive_item(post, blogs.get(&post.blog_id).copied()).await?);
                }

                let view = ArchiveView {
                    items,
                    show_date: options.show_date,
                };
                Ok(self.templates.render(name, &view)?)
            }
        }
    }

    async fn archive_item(
        &self,
        post: &NetworkPost,
        blog: Option<&BlogRecord>,
    ) -> Result<ArchiveItem, AppError> {
        let (blog_name, blog_url) = match blog {
            Some(blog) => (blog.name.clone(), blog.home_url.clone()),
            // Page cached without its blog list; read it from inside the post's blog.
            None => {
                self.posts
                    .with_post_context(post, |ctx| {
                        (ctx.blog_name.clone(), ctx.blog_home_url.clone())
                    })
                    .await?
            }
        };

        Ok(ArchiveItem {
            blog_id: post.blog_id.get(),
            post_id: post.id,
            title: post.title().to_string(),
            permalink: permalink(post, &blog_url),
            date: post.post_date().map(str::to_string),
            blog_name,
            blog_url,
        })
    }
}
