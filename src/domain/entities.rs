//! Records produced by the directory and by the merged post query.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::DomainError;
use super::types::BlogId;

/// Native primary key column of the shared posts schema.
pub const POST_ID_COLUMN: &str = "ID";

/// One blog of the network, enriched with the metadata read from its own context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogRecord {
    pub blog_id: BlogId,
    pub domain: String,
    pub path: String,
    pub name: String,
    pub home_url: String,
}

/// One aggregated post.
///
/// `blog_id` is synthesized by the merge; every other field is the native row
/// carried through untouched in `columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPost {
    pub blog_id: BlogId,
    pub id: i64,
    pub columns: Map<String, Value>,
}

impl NetworkPost {
    /// Build a post from a native row object tagged with the blog it came from.
    pub fn from_native(blog_id: BlogId, native: Value) -> Result<Self, DomainError> {
        let Value::Object(columns) = native else {
            return Err(DomainError::invariant("native post row must be a JSON object"));
        };

        let id = columns
            .get(POST_ID_COLUMN)
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                DomainError::invariant(format!(
                    "native post row from blog {blog_id} has no integer `{POST_ID_COLUMN}`"
                ))
            })?;

        Ok(Self {
            blog_id,
            id,
            columns,
        })
    }

    pub fn column(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.column(name).and_then(Value::as_str)
    }

    pub fn title(&self) -> &str {
        self.text("post_title").unwrap_or_default()
    }

    pub fn post_date(&self) -> Option<&str> {
        self.text("post_date")
    }

    pub fn post_type(&self) -> Option<&str> {
        self.text("post_type")
    }

    pub fn post_status(&self) -> Option<&str> {
        self.text("post_status")
    }

    pub fn guid(&self) -> Option<&str> {
        self.text("guid").filter(|guid| !guid.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn from_native_keeps_every_column() {
        let native = json!({
            "ID": 42,
            "post_title": "Hello",
            "post_date": "2024-03-01 10:00:00",
            "post_type": "post",
            "post_status": "publish",
            "menu_order": 0,
        });

        let post = NetworkPost::from_native(BlogId::new(3), native).expect("valid row");

        assert_eq!(post.blog_id, BlogId::new(3));
        assert_eq!(post.id, 42);
        assert_eq!(post.title(), "Hello");
        assert_eq!(post.post_date(), Some("2024-03-01 10:00:00"));
        assert_eq!(post.column("menu_order"), Some(&json!(0)));
        assert_eq!(post.columns.len(), 6);
    }

    #[test]
    fn from_native_requires_an_id() {
        let err = NetworkPost::from_native(BlogId::new(1), json!({"post_title": "x"}))
            .expect_err("missing id");
        assert!(matches!(err, DomainError::Invariant { .. }));
    }

    #[test]
    fn from_native_rejects_non_objects() {
        assert!(NetworkPost::from_native(BlogId::new(1), json!([1, 2])).is_err());
    }
}
