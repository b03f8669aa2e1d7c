//! Aggregation against a real Postgres database.
//!
//! - Each test gets a fresh database from `sqlx::test` with the transient table migrated.
//! - The network tables are created by the test itself, the way a multisite install lays them out.
//! - Marked `#[ignore]`; run with `DATABASE_URL` set and `cargo test -- --ignored`.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crossblog::application::blogs::BlogResolver;
use crossblog::application::context::BlogContextStack;
use crossblog::application::error::AppError;
use crossblog::application::plan::TableNaming;
use crossblog::application::posts::NetworkPostService;
use crossblog::application::query::{BlogQuery, PostQuery};
use crossblog::application::render::{ArchiveOptions, ArchiveRenderer, Renderer};
use crossblog::application::repos::RepoError;
use crossblog::application::transients::TransientCache;
use crossblog::cache::{TransientKeys, TransientStore};
use crossblog::domain::types::{BlogId, BlogIdSet, SortDirection};
use crossblog::infra::db::{PostgresRepositories, PostgresTransientStore};
use crossblog::presentation::views::{ARCHIVE_DETAILED, TemplateCatalog};
use serde_json::json;
use sqlx::PgPool;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

const POSTS_COLUMNS: &str = r#"(
    "ID" BIGINT PRIMARY KEY,
    post_title TEXT NOT NULL,
    post_date TIMESTAMP NOT NULL,
    post_type TEXT NOT NULL,
    post_status TEXT NOT NULL,
    menu_order INTEGER NOT NULL DEFAULT 0,
    guid TEXT NOT NULL DEFAULT ''
)"#;

async fn seed_network(pool: &PgPool) -> TestResult<()> {
    sqlx::query("CREATE TABLE wp_blogs (blog_id BIGINT PRIMARY KEY, domain TEXT NOT NULL, path TEXT NOT NULL)")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO wp_blogs VALUES (1, 'net.test', '/'), (2, 'net.test', '/two/'), (3, 'net.test', '/three/')")
        .execute(pool)
        .await?;

    for (prefix, name, home) in [
        ("wp_", "Main", "https://net.test"),
        ("wp_2_", "Two", "https://net.test/two/"),
        ("wp_3_", "Three", "https://net.test/three"),
    ] {
        sqlx::query(&format!(
            "CREATE TABLE {prefix}options (option_name TEXT PRIMARY KEY, option_value TEXT NOT NULL)"
        ))
        .execute(pool)
        .await?;
        sqlx::query(&format!(
            "INSERT INTO {prefix}options VALUES ('blogname', $1), ('home', $2), ('admin_email', 'x@net.test')"
        ))
        .bind(name)
        .bind(home)
        .execute(pool)
        .await?;
        sqlx::query(&format!("CREATE TABLE {prefix}posts {POSTS_COLUMNS}"))
            .execute(pool)
            .await?;
    }

    sqlx::query(
        "INSERT INTO wp_posts (\"ID\", post_title, post_date, post_type, post_status) VALUES \
         (1, 'A', '2024-01-01 09:00:00', 'post', 'publish'), \
         (2, 'B', '2024-01-02 09:00:00', 'post', 'publish'), \
         (3, 'hidden', '2024-01-02 10:00:00', 'post', 'draft')",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "INSERT INTO wp_2_posts (\"ID\", post_title, post_date, post_type, post_status) VALUES \
         (1, 'C', '2024-01-03 09:00:00', 'post', 'publish'), \
         (2, 'About', '2024-01-04 09:00:00', 'page', 'publish')",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn service(pool: &PgPool) -> (NetworkPostService, Arc<PostgresTransientStore>) {
    let naming = TableNaming::default();
    let repositories = Arc::new(PostgresRepositories::new(pool.clone(), naming.clone()));
    let store = Arc::new(PostgresTransientStore::new(pool.clone()));
    let cache = TransientCache::new(store.clone(), TransientKeys::default());
    let context = Arc::new(BlogContextStack::new(naming.main_blog_id()));
    let blogs = BlogResolver::new(repositories.clone(), cache.clone(), context);
    (
        NetworkPostService::new(blogs, repositories, cache, naming),
        store,
    )
}

fn ascending(numberposts: u32) -> PostQuery {
    PostQuery {
        numberposts: NonZeroU32::new(numberposts).expect("non-zero"),
        order: SortDirection::Asc,
        ..PostQuery::default()
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn live_merge_pages_across_blogs(pool: PgPool) -> TestResult<()> {
    seed_network(&pool).await?;
    let (posts, _) = service(&pool);

    let first = posts
        .get_posts_page(
            &PostQuery {
                paged: Some(1),
                ..ascending(2)
            },
            None,
        )
        .await?;
    let titles: Vec<&str> = first.posts.iter().map(|post| post.title()).collect();
    assert_eq!(titles, ["A", "B"]);
    assert_eq!(first.found_posts, 3);
    assert_eq!(first.max_num_pages(), 2);

    let second = posts
        .get_posts_page(
            &PostQuery {
                paged: Some(2),
                ..ascending(2)
            },
            None,
        )
        .await?;
    assert_eq!(second.posts.len(), 1);
    assert_eq!(second.posts[0].title(), "C");
    assert_eq!(second.posts[0].blog_id, BlogId::new(2));
    assert_eq!(second.posts[0].id, 1);
    assert_eq!(second.posts[0].column("menu_order"), Some(&json!(0)));

    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn live_blog_listing_reads_options(pool: PgPool) -> TestResult<()> {
    seed_network(&pool).await?;
    let (posts, _) = service(&pool);

    let blogs = posts
        .get_blogs(&BlogQuery {
            blog_ids: Some(BlogIdSet::new([1, 2, 3])),
            exclude_blog_ids: Some(BlogIdSet::new([3])),
            transient_expires_in: 0,
        })
        .await?;

    let summary: Vec<(i64, &str, &str)> = blogs
        .iter()
        .map(|blog| (blog.blog_id.get(), blog.name.as_str(), blog.home_url.as_str()))
        .collect();
    assert_eq!(
        summary,
        [(1, "Main", "https://net.test"), (2, "Two", "https://net.test/two")]
    );

    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn live_transients_round_trip_through_table(pool: PgPool) -> TestResult<()> {
    seed_network(&pool).await?;
    let (posts, store) = service(&pool);
    let query = PostQuery {
        transient_expires_in: 60,
        ..ascending(5)
    };

    let cold = posts.get_posts_page(&query, None).await?;
    // Drop the source rows; the cached page must still be served.
    sqlx::query("DELETE FROM wp_2_posts").execute(&pool).await?;
    let warm = posts.get_posts_page(&query, None).await?;
    assert_eq!(cold, warm);

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM crossblog_transients")
        .fetch_one(&pool)
        .await?;
    assert_eq!(stored, 2);

    store.set("expired", json!(1), Duration::ZERO).await?;
    assert!(store.get("expired").await?.is_none());
    assert_eq!(store.purge_expired().await?, 1);

    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn live_missing_posts_table_fails_merge(pool: PgPool) -> TestResult<()> {
    seed_network(&pool).await?;
    sqlx::query("DROP TABLE wp_3_posts").execute(&pool).await?;
    let (posts, _) = service(&pool);

    let err = posts
        .get_posts_page(&ascending(5), None)
        .await
        .expect_err("blog 3 has no posts table");
    assert!(matches!(
        err,
        AppError::Repo(RepoError::MissingRelation { .. })
    ));

    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn live_archive_renders_detailed_template(pool: PgPool) -> TestResult<()> {
    seed_network(&pool).await?;
    let (posts, _) = service(&pool);
    let archive = ArchiveRenderer::new(posts, TemplateCatalog::new());

    let options = ArchiveOptions {
        renderer: Renderer::Template(ARCHIVE_DETAILED.to_string()),
        show_date: false,
    };

    let html = archive
        .render_post_archive_to_string(&ascending(5), &options, None)
        .await?;

    assert!(html.contains("https://net.test/two/?p=1"));
    assert!(html.contains("Two"));
    assert!(!html.contains("hidden"));

    Ok(())
}
