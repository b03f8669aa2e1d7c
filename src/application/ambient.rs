//! Ambient request state shared with the surrounding page.
//!
//! The host page owns an [`AmbientQuery`]: it supplies the current page number
//! when a query does not pass `paged`, and receives pagination figures when a
//! query runs with `affect_wp_query`.

use std::num::NonZeroU32;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::cache::lock::{rw_read, rw_write};

const SOURCE: &str = "application::ambient";

/// Pagination figures published to the ambient query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationSnapshot {
    pub posts_per_page: u32,
    pub found_posts: u64,
    pub max_num_pages: u64,
}

impl PaginationSnapshot {
    pub fn new(posts_per_page: NonZeroU32, found_posts: u64) -> Self {
        Self {
            posts_per_page: posts_per_page.get(),
            found_posts,
            max_num_pages: found_posts.div_ceil(u64::from(posts_per_page.get())),
        }
    }
}

/// Extension point run over the snapshot before it is published.
pub type AmbientHook = Arc<dyn Fn(PaginationSnapshot) -> PaginationSnapshot + Send + Sync>;

#[derive(Debug, Default)]
pub struct AmbientQuery {
    current_page: Option<u32>,
    pagination: RwLock<Option<PaginationSnapshot>>,
}

impl AmbientQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(page: u32) -> Self {
        Self {
            current_page: Some(page),
            pagination: RwLock::new(None),
        }
    }

    pub fn current_page(&self) -> Option<u32> {
        self.current_page
    }

    pub fn pagination(&self) -> Option<PaginationSnapshot> {
        *rw_read(&self.pagination, SOURCE, "pagination")
    }

    pub fn replace_pagination(&self, snapshot: PaginationSnapshot) {
        *rw_write(&self.pagination, SOURCE, "replace_pagination") = Some(snapshot);
    }
}
