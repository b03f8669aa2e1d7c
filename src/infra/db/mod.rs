//! Postgres-backed adapters for the network tables and the transient table.

mod blogs;
mod posts;
mod transients;
mod util;

pub use transients::PostgresTransientStore;
pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    migrate::MigrateError,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::plan::TableNaming;
use crate::application::repos::RepoError;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
    naming: TableNaming,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool, naming: TableNaming) -> Self {
        Self {
            pool: Arc::new(pool),
            naming,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn naming(&self) -> &TableNaming {
        &self.naming
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    /// Creates the transient table. The network tables are never touched.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Pushes a double-quoted identifier. Callers only pass names validated by `TableNaming`
    /// or `OrderColumn`.
    fn push_ident<'q>(qb: &mut QueryBuilder<'q, Postgres>, ident: &str) {
        qb.push("\"");
        qb.push(ident);
        qb.push("\"");
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
