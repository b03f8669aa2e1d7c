use async_trait::async_trait;
use sqlx::QueryBuilder;

use crate::application::context::BlogScope;
use crate::application::repos::{BlogDirectory, BlogFilter, BlogInfo, BlogRow, RepoError};
use crate::domain::types::BlogId;

use super::{PostgresRepositories, map_sqlx_error};

const OPTION_BLOGNAME: &str = "blogname";
const OPTION_HOME: &str = "home";

#[derive(sqlx::FromRow)]
struct DirectoryRow {
    blog_id: i64,
    domain: String,
    path: String,
}

impl From<DirectoryRow> for BlogRow {
    fn from(row: DirectoryRow) -> Self {
        Self {
            blog_id: BlogId::new(row.blog_id),
            domain: row.domain,
            path: row.path,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    option_name: String,
    option_value: String,
}

#[async_trait]
impl BlogDirectory for PostgresRepositories {
    async fn list_blogs(&self, filter: &BlogFilter) -> Result<Vec<BlogRow>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT blog_id, domain, path FROM ");
        Self::push_ident(&mut qb, &self.naming().blogs_table());
        qb.push(" WHERE TRUE");

        if let Some(include) = filter.include.as_ref() {
            qb.push(" AND blog_id = ANY(");
            qb.push_bind(include.to_vec());
            qb.push(")");
        }
        if let Some(exclude) = filter.exclude.as_ref() {
            qb.push(" AND NOT (blog_id = ANY(");
            qb.push_bind(exclude.to_vec());
            qb.push("))");
        }
        qb.push(" ORDER BY blog_id");

        let rows = qb
            .build_query_as::<DirectoryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BlogRow::from).collect())
    }

    async fn read_blog_info(&self, scope: &BlogScope<'_>) -> Result<BlogInfo, RepoError> {
        let mut qb = QueryBuilder::new("SELECT option_name, option_value FROM ");
        Self::push_ident(&mut qb, &self.naming().options_table(scope.blog_id()));
        qb.push(" WHERE option_name IN (");
        qb.push_bind(OPTION_BLOGNAME);
        qb.push(", ");
        qb.push_bind(OPTION_HOME);
        qb.push(")");

        let rows = qb
            .build_query_as::<OptionRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut info = BlogInfo::default();
        for row in rows {
            match row.option_name.as_str() {
                OPTION_BLOGNAME => info.name = row.option_value,
                OPTION_HOME => info.home_url = row.option_value.trim_end_matches('/').to_string(),
                _ => {}
            }
        }

        Ok(info)
    }
}
