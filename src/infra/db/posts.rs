//! Merged post query across the network's posts tables.
//!
//! Shape of the statement (one `SELECT` per source in `merged`):
//!
//! ```sql
//! WITH merged AS (
//!     SELECT 1::bigint AS blog_id, p."ID" AS post_id, p."post_date" AS sort_key, to_jsonb(p) AS native
//!     FROM "wp_posts" p WHERE p.post_type = ANY($1) AND p.post_status = $2
//!     UNION ALL
//!     SELECT 2::bigint AS blog_id, ... FROM "wp_2_posts" p WHERE ...
//! ),
//! found AS (SELECT COUNT(*) AS found_posts FROM merged),
//! page AS (SELECT * FROM merged ORDER BY sort_key DESC, blog_id ASC, post_id DESC LIMIT $n OFFSET $m)
//! SELECT found.found_posts, page.blog_id, page.native FROM found LEFT JOIN page ON TRUE ...
//! ```
//!
//! The count and the window come back in one round trip. An empty window still yields
//! one row carrying the count, with `blog_id`/`native` NULL.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use crate::application::plan::MergePlan;
use crate::application::repos::{MergedPosts, MergedRow, NetworkPostsRepo, RepoError};
use crate::domain::entities::POST_ID_COLUMN;
use crate::domain::types::BlogId;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct MergedPageRow {
    found_posts: i64,
    blog_id: Option<i64>,
    native: Option<Value>,
}

#[async_trait]
impl NetworkPostsRepo for PostgresRepositories {
    async fn fetch_merged(&self, plan: &MergePlan) -> Result<MergedPosts, RepoError> {
        let mut qb = Self::merged_query(plan)?;

        let rows = qb
            .build_query_as::<MergedPageRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let found_posts = match rows.first() {
            Some(row) => Self::convert_count(row.found_posts)?,
            None => 0,
        };

        let rows = rows
            .into_iter()
            .filter_map(|row| {
                row.native.map(|native| MergedRow {
                    blog_id: row.blog_id.map(BlogId::new),
                    native,
                })
            })
            .collect();

        Ok(MergedPosts { rows, found_posts })
    }
}

impl PostgresRepositories {
    fn merged_query(plan: &MergePlan) -> Result<QueryBuilder<'static, Postgres>, RepoError> {
        if plan.sources.is_empty() {
            return Err(RepoError::InvalidInput {
                message: "merge plan has no sources".to_string(),
            });
        }

        let limit = i64::from(plan.window.limit);
        let offset = i64::try_from(plan.window.offset).map_err(|_| RepoError::InvalidInput {
            message: format!("offset {} exceeds supported range", plan.window.offset),
        })?;
        let direction = plan.order.as_sql();

        let mut qb = QueryBuilder::new("WITH merged AS (");
        for (index, source) in plan.sources.iter().enumerate() {
            if index > 0 {
                qb.push(" UNION ALL ");
            }
            qb.push("SELECT ");
            qb.push(source.blog_id.get());
            qb.push("::bigint AS blog_id, p.");
            Self::push_ident(&mut qb, POST_ID_COLUMN);
            qb.push(" AS post_id, p.");
            Self::push_ident(&mut qb, plan.orderby.as_str());
            qb.push(" AS sort_key, to_jsonb(p) AS native FROM ");
            Self::push_ident(&mut qb, &source.table);
            qb.push(" p WHERE p.post_type = ANY(");
            qb.push_bind(plan.post_types.as_slice().to_vec());
            qb.push(") AND p.post_status = ");
            qb.push_bind(plan.post_status.clone());
        }
        qb.push("), found AS (SELECT COUNT(*) AS found_posts FROM merged)");

        qb.push(", page AS (SELECT blog_id, post_id, sort_key, native FROM merged ORDER BY ");
        Self::push_page_order(&mut qb, "", direction);
        qb.push(" LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);
        qb.push(")");

        qb.push(" SELECT found.found_posts, page.blog_id, page.native FROM found LEFT JOIN page ON TRUE ORDER BY ");
        Self::push_page_order(&mut qb, "page.", direction);

        Ok(qb)
    }

    /// Total order over the union: the requested column, then origin blog, then post id.
    fn push_page_order(qb: &mut QueryBuilder<'static, Postgres>, qualifier: &str, direction: &str) {
        qb.push(format!(
            "{qualifier}sort_key {direction}, {qualifier}blog_id ASC, {qualifier}post_id {direction}"
        ));
    }
}
