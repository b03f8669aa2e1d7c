//! In-memory network used by the integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crossblog::application::blogs::BlogResolver;
use crossblog::application::context::{BlogContextStack, BlogScope};
use crossblog::application::plan::{MergePlan, TableNaming};
use crossblog::application::posts::NetworkPostService;
use crossblog::application::repos::{
    BlogDirectory, BlogFilter, BlogInfo, BlogRow, MergedPosts, MergedRow, NetworkPostsRepo,
    RepoError,
};
use crossblog::application::transients::TransientCache;
use crossblog::cache::{MemoryTransientStore, TransientConfig, TransientKeys};
use crossblog::domain::types::{BlogId, SortDirection};
use serde_json::{Value, json};

pub struct StubBlog {
    pub name: String,
    pub home_url: String,
    pub posts: Vec<Value>,
}

/// Blogs keyed by id, each with its own posts table.
#[derive(Default)]
pub struct StubNetwork {
    blogs: BTreeMap<i64, StubBlog>,
    failing_info: Option<i64>,
    dropped_tables: Vec<i64>,
    merges: AtomicUsize,
    info_reads: Mutex<Vec<i64>>,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blog(mut self, id: i64, posts: Vec<Value>) -> Self {
        self.blogs.insert(
            id,
            StubBlog {
                name: format!("Blog {id}"),
                home_url: format!("https://blog{id}.test"),
                posts,
            },
        );
        self
    }

    /// Metadata reads for `id` fail.
    pub fn failing_info(mut self, id: i64) -> Self {
        self.failing_info = Some(id);
        self
    }

    /// The directory lists `id` but its posts table is gone.
    pub fn dropped_table(mut self, id: i64) -> Self {
        self.dropped_tables.push(id);
        self
    }

    pub fn merges(&self) -> usize {
        self.merges.load(Ordering::SeqCst)
    }

    pub fn info_reads(&self) -> Vec<i64> {
        self.info_reads.lock().expect("info reads lock").clone()
    }
}

#[async_trait]
impl BlogDirectory for StubNetwork {
    async fn list_blogs(&self, filter: &BlogFilter) -> Result<Vec<BlogRow>, RepoError> {
        Ok(self
            .blogs
            .keys()
            .map(|id| BlogId::new(*id))
            .filter(|id| filter.admits(*id))
            .map(|blog_id| BlogRow {
                blog_id,
                domain: format!("blog{blog_id}.test"),
                path: "/".to_string(),
            })
            .collect())
    }

    async fn read_blog_info(&self, scope: &BlogScope<'_>) -> Result<BlogInfo, RepoError> {
        let id = scope.blog_id().get();
        self.info_reads.lock().expect("info reads lock").push(id);

        if self.failing_info == Some(id) {
            return Err(RepoError::from_persistence(format!("options of blog {id} unreadable")));
        }

        let blog = self
            .blogs
            .get(&id)
            .ok_or_else(|| RepoError::from_persistence(format!("unknown blog {id}")))?;
        Ok(BlogInfo {
            name: blog.name.clone(),
            home_url: blog.home_url.clone(),
        })
    }
}

#[async_trait]
impl NetworkPostsRepo for StubNetwork {
    async fn fetch_merged(&self, plan: &MergePlan) -> Result<MergedPosts, RepoError> {
        self.merges.fetch_add(1, Ordering::SeqCst);

        let mut merged: Vec<(BlogId, Value)> = Vec::new();
        for source in &plan.sources {
            let id = source.blog_id.get();
            let blog = self
                .blogs
                .get(&id)
                .filter(|_| !self.dropped_tables.contains(&id))
                .ok_or_else(|| RepoError::MissingRelation {
                    relation: source.table.clone(),
                })?;

            merged.extend(
                blog.posts
                    .iter()
                    .filter(|post| {
                        post["post_type"]
                            .as_str()
                            .is_some_and(|post_type| plan.post_types.contains(post_type))
                            && post["post_status"].as_str() == Some(plan.post_status.as_str())
                    })
                    .map(|post| (source.blog_id, post.clone())),
            );
        }

        let column = plan.orderby.as_str();
        merged.sort_by(|(a_blog, a), (b_blog, b)| {
            let by_key = sort_key(&a[column]).cmp(&sort_key(&b[column]));
            let by_id = a["ID"].as_i64().cmp(&b["ID"].as_i64());
            let (by_key, by_id) = match plan.order {
                SortDirection::Asc => (by_key, by_id),
                SortDirection::Desc => (by_key.reverse(), by_id.reverse()),
            };
            by_key.then(a_blog.cmp(b_blog)).then(by_id)
        });

        let found_posts = merged.len() as u64;
        let rows = merged
            .into_iter()
            .skip(plan.window.offset as usize)
            .take(plan.window.limit as usize)
            .map(|(blog_id, native)| MergedRow {
                blog_id: Some(blog_id),
                native,
            })
            .collect();

        Ok(MergedPosts { rows, found_posts })
    }
}

fn sort_key(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => format!("{:020}", number.as_i64().unwrap_or_default()),
        _ => String::new(),
    }
}

pub fn post(id: i64, title: &str, date: &str) -> Value {
    json!({
        "ID": id,
        "post_title": title,
        "post_date": date,
        "post_type": "post",
        "post_status": "publish",
        "guid": "",
    })
}

/// Blog 1 holds A and B, blog 2 holds C, dated so that A < B < C.
pub fn abc_network() -> StubNetwork {
    StubNetwork::new()
        .blog(
            1,
            vec![
                post(1, "A", "2024-01-01 09:00:00"),
                post(2, "B", "2024-01-02 09:00:00"),
            ],
        )
        .blog(2, vec![post(1, "C", "2024-01-03 09:00:00")])
}

pub struct Harness {
    pub network: Arc<StubNetwork>,
    pub store: Arc<MemoryTransientStore>,
    pub context: Arc<BlogContextStack>,
    pub service: NetworkPostService,
}

pub fn harness(network: StubNetwork) -> Harness {
    let network = Arc::new(network);
    let store = Arc::new(MemoryTransientStore::new(&TransientConfig::default()));
    let context = Arc::new(BlogContextStack::new(BlogId::new(1)));

    let cache = TransientCache::new(store.clone(), TransientKeys::default());
    let blogs = BlogResolver::new(network.clone(), cache.clone(), context.clone());
    let service = NetworkPostService::new(blogs, network.clone(), cache, TableNaming::default());

    Harness {
        network,
        store,
        context,
        service,
    }
}

pub fn titles(posts: &[crossblog::domain::entities::NetworkPost]) -> Vec<String> {
    posts.iter().map(|post| post.title().to_string()).collect()
}
