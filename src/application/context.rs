//! Current-blog context.
//!
//! Code that needs to read "from inside" a blog enters it through
//! [`BlogContextStack::enter`], which returns a [`BlogScope`]. Dropping the scope
//! removes exactly the entry it pushed, so the previous blog is restored on every
//! exit path, including `?` returns and nested switches. Scopes held by concurrent
//! requests on a shared stack never release each other's entries.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::cache::lock::mutex_lock;
use crate::domain::types::BlogId;

const SOURCE: &str = "application::context";

#[derive(Debug)]
pub struct BlogContextStack {
    home: BlogId,
    next_token: AtomicU64,
    stack: Mutex<Vec<(u64, BlogId)>>,
}

impl BlogContextStack {
    /// `home` is the blog reported when no scope is active.
    pub fn new(home: BlogId) -> Self {
        Self {
            home,
            next_token: AtomicU64::new(0),
            stack: Mutex::new(Vec::new()),
        }
    }

    pub fn home(&self) -> BlogId {
        self.home
    }

    /// Blog of the most recently entered scope still alive.
    pub fn current(&self) -> BlogId {
        mutex_lock(&self.stack, SOURCE, "current")
            .last()
            .map(|(_, blog_id)| *blog_id)
            .unwrap_or(self.home)
    }

    /// Number of active scopes.
    pub fn depth(&self) -> usize {
        mutex_lock(&self.stack, SOURCE, "depth").len()
    }

    pub fn enter(&self, blog_id: BlogId) -> BlogScope<'_> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        mutex_lock(&self.stack, SOURCE, "enter").push((token, blog_id));
        BlogScope {
            owner: self,
            blog_id,
            token,
        }
    }

    fn leave(&self, token: u64, blog_id: BlogId) {
        let mut stack = mutex_lock(&self.stack, SOURCE, "leave");
        let Some(index) = stack.iter().rposition(|(entry, _)| *entry == token) else {
            return;
        };
        if index + 1 != stack.len() {
            debug!(
                blog_id = %blog_id,
                position = index,
                depth = stack.len(),
                "Blog scope released below a newer scope"
            );
        }
        stack.remove(index);
    }
}

/// Proof that the context currently points at `blog_id`.
#[derive(Debug)]
#[must_use = "dropping the scope immediately restores the previous blog"]
pub struct BlogScope<'a> {
    owner: &'a BlogContextStack,
    blog_id: BlogId,
    token: u64,
}

impl BlogScope<'_> {
    pub fn blog_id(&self) -> BlogId {
        self.blog_id
    }
}

impl Drop for BlogScope<'_> {
    fn drop(&mut self) {
        self.owner.leave(self.token, self.blog_id);
    }
}
