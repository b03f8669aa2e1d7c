//! Typed request parameters for the aggregation entry points.

use std::num::NonZeroU32;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::ambient::AmbientQuery;
use crate::application::repos::BlogFilter;
use crate::cache::MAX_TRANSIENT_TTL;
use crate::domain::types::{BlogIdSet, OrderColumn, PostTypes, SortDirection};

pub const DEFAULT_NUMBERPOSTS: NonZeroU32 = NonZeroU32::MIN.saturating_add(4);
pub const DEFAULT_POST_STATUS: &str = "publish";

/// Zero disables caching; anything longer than [`MAX_TRANSIENT_TTL`] is capped to it.
fn cache_lifetime(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds).min(MAX_TRANSIENT_TTL))
}

/// Parameters of a merged post query. Every option has its default here and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostQuery {
    /// Page size.
    pub numberposts: NonZeroU32,
    /// Explicit offset into the merged set; overrides `paged`.
    pub offset: Option<u64>,
    /// 1-based page number; falls back to the ambient page, then 1.
    pub paged: Option<u32>,
    pub post_type: PostTypes,
    pub orderby: OrderColumn,
    pub order: SortDirection,
    pub post_status: String,
    pub blog_ids: Option<BlogIdSet>,
    pub exclude_blog_ids: Option<BlogIdSet>,
    /// Publish pagination figures to the ambient query.
    pub affect_wp_query: bool,
    /// Transient lifetime in seconds; 0 disables caching.
    pub transient_expires_in: u64,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            numberposts: DEFAULT_NUMBERPOSTS,
            offset: None,
            paged: None,
            post_type: PostTypes::default(),
            orderby: OrderColumn::default(),
            order: SortDirection::default(),
            post_status: DEFAULT_POST_STATUS.to_string(),
            blog_ids: None,
            exclude_blog_ids: None,
            affect_wp_query: false,
            transient_expires_in: 0,
        }
    }
}

/// Offset/limit applied to the ordered union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u32,
}

impl PostQuery {
    pub fn blog_query(&self) -> BlogQuery {
        BlogQuery {
            blog_ids: self.blog_ids.clone(),
            exclude_blog_ids: self.exclude_blog_ids.clone(),
            transient_expires_in: self.transient_expires_in,
        }
    }

    pub fn resolved_page(&self, ambient: Option<&AmbientQuery>) -> u32 {
        self.paged
            .or_else(|| ambient.and_then(AmbientQuery::current_page))
            .unwrap_or(1)
            .max(1)
    }

    pub fn window(&self, ambient: Option<&AmbientQuery>) -> PageWindow {
        let limit = self.numberposts.get();
        let offset = self.offset.unwrap_or_else(|| {
            u64::from(self.resolved_page(ambient) - 1) * u64::from(limit)
        });
        PageWindow { offset, limit }
    }

    pub fn ttl(&self) -> Option<Duration> {
        cache_lifetime(self.transient_expires_in)
    }

    /// Copy with the page number pinned, so the cache key reflects the page actually served.
    pub fn pinned(&self, ambient: Option<&AmbientQuery>) -> Self {
        Self {
            paged: Some(self.resolved_page(ambient)),
            ..self.clone()
        }
    }
}

/// Parameters of a blog listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogQuery {
    pub blog_ids: Option<BlogIdSet>,
    pub exclude_blog_ids: Option<BlogIdSet>,
    pub transient_expires_in: u64,
}

impl BlogQuery {
    /// Empty id lists filter nothing.
    pub fn filter(&self) -> BlogFilter {
        let non_empty = |ids: &Option<BlogIdSet>| ids.clone().filter(|ids| !ids.is_empty());
        BlogFilter {
            include: non_empty(&self.blog_ids),
            exclude: non_empty(&self.exclude_blog_ids),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        cache_lifetime(self.transient_expires_in)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(numberposts: u32) -> PostQuery {
        PostQuery {
            numberposts: NonZeroU32::new(numberposts).expect("non-zero"),
            ..PostQuery::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let query: PostQuery = serde_json::from_str("{}").expect("empty object");
        assert_eq!(query.numberposts.get(), 5);
        assert_eq!(query.post_type.as_slice(), ["post"]);
        assert_eq!(query.orderby.as_str(), "post_date");
        assert_eq!(query.order, SortDirection::Desc);
        assert_eq!(query.post_status, "publish");
        assert!(query.blog_ids.is_none());
        assert!(!query.affect_wp_query);
        assert!(query.ttl().is_none());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert!(serde_json::from_str::<PostQuery>(r#"{"numberposts": 0}"#).is_err());
    }

    #[test]
    fn offset_follows_page_number() {
        for n in [1_u32, 2, 5, 10] {
            for p in 1_u32..=4 {
                let window = PostQuery {
                    paged: Some(p),
                    ..query(n)
                }
                .window(None);
                assert_eq!(window.offset, u64::from((p - 1) * n));
                assert_eq!(window.limit, n);
            }
        }
    }

    #[test]
    fn explicit_offset_wins_over_page() {
        let window = PostQuery {
            offset: Some(3),
            paged: Some(4),
            ..query(10)
        }
        .window(None);
        assert_eq!(window.offset, 3);
    }

    #[test]
    fn page_falls_back_to_ambient_then_one() {
        let ambient = AmbientQuery::with_page(3);
        assert_eq!(query(5).resolved_page(Some(&ambient)), 3);
        assert_eq!(query(5).resolved_page(None), 1);

        let explicit = PostQuery {
            paged: Some(2),
            ..query(5)
        };
        assert_eq!(explicit.resolved_page(Some(&ambient)), 2);

        let zero = PostQuery {
            paged: Some(0),
            ..query(5)
        };
        assert_eq!(zero.window(None).offset, 0);
    }

    #[test]
    fn blog_query_carries_filters_and_ttl() {
        let query: PostQuery = serde_json::from_str(
            r#"{"blog_ids": [2, 3], "exclude_blog_ids": 3, "transient_expires_in": 60}"#,
        )
        .expect("valid query");

        let blogs = query.blog_query();
        assert_eq!(blogs.blog_ids.as_ref().map(BlogIdSet::to_vec), Some(vec![2, 3]));
        assert_eq!(blogs.exclude_blog_ids.as_ref().map(BlogIdSet::to_vec), Some(vec![3]));
        assert_eq!(blogs.ttl(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn oversized_lifetime_is_capped() {
        let query = PostQuery {
            transient_expires_in: u64::MAX,
            ..query(5)
        };
        assert_eq!(query.ttl(), Some(MAX_TRANSIENT_TTL));
        assert_eq!(query.blog_query().ttl(), Some(MAX_TRANSIENT_TTL));
    }

    #[test]
    fn empty_id_lists_do_not_filter() {
        let query = BlogQuery {
            blog_ids: Some(BlogIdSet::default()),
            ..BlogQuery::default()
        };
        assert_eq!(query.filter(), BlogFilter::default());
    }
}
