use std::{process::ExitCode, sync::Arc};

use crossblog::{
    application::{
        ambient::AmbientQuery,
        blogs::BlogResolver,
        context::BlogContextStack,
        error::{AppError, ErrorReport},
        posts::NetworkPostService,
        render::{ArchiveOptions, ArchiveRenderer, Renderer},
        transients::TransientCache,
    },
    cache::{MemoryTransientStore, TransientBackend, TransientConfig, TransientKeys, TransientStore},
    config::{self, BlogsArgs, Command, PostsArgs, RenderArgs, Settings},
    infra::{
        db::{PostgresRepositories, PostgresTransientStore},
        error::InfraError,
        telemetry,
    },
    presentation::views::TemplateCatalog,
};
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_application_error(&error);
            ExitCode::from(error.exit_code())
        }
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error("crossblog::main", error);
    let log = || {
        error!(
            source = report.source,
            error = %error,
            chain = ?report.messages,
            "application error"
        );
    };

    if dispatcher::has_been_set() {
        log();
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, log);
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let services = build_services(&settings).await?;

    match cli_args.command {
        Command::Posts(args) => run_posts(&services, args).await,
        Command::Blogs(args) => run_blogs(&services, args).await,
        Command::Render(args) => run_render(&services, &settings, args).await,
    }
}

struct Services {
    posts: NetworkPostService,
    archive: ArchiveRenderer,
}

async fn build_services(settings: &Settings) -> Result<Services, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;

    let transient_config = TransientConfig::from(&settings.transients);
    let store: Arc<dyn TransientStore> = match transient_config.backend {
        TransientBackend::Memory => Arc::new(MemoryTransientStore::new(&transient_config)),
        TransientBackend::Postgres => {
            PostgresRepositories::run_migrations(&pool)
                .await
                .map_err(InfraError::from)?;
            let store = PostgresTransientStore::new(pool.clone());
            match store.purge_expired().await {
                Ok(purged) => info!(purged, "Expired transients purged"),
                Err(err) => warn!(error = %err, "Failed to purge expired transients"),
            }
            Arc::new(store)
        }
    };
    info!(
        backend = ?transient_config.backend,
        key_prefix = %transient_config.key_prefix,
        "Transient store ready"
    );

    let naming = settings.network.naming.clone();
    let repositories = Arc::new(PostgresRepositories::new(pool, naming.clone()));
    repositories.health_check().await.map_err(InfraError::from)?;
    let cache = TransientCache::new(store, TransientKeys::new(transient_config.key_prefix));
    let context = Arc::new(BlogContextStack::new(naming.main_blog_id()));

    let blogs = BlogResolver::new(repositories.clone(), cache.clone(), context);
    let posts = NetworkPostService::new(blogs, repositories, cache, naming);
    let archive = ArchiveRenderer::new(posts.clone(), TemplateCatalog::new());

    Ok(Services { posts, archive })
}

async fn run_posts(services: &Services, args: PostsArgs) -> Result<(), AppError> {
    let query = args.query.to_query()?;
    let ambient = ambient_query(args.current_page);

    let page = services.posts.get_posts_page(&query, Some(&ambient)).await?;
    let max_num_pages = page.max_num_pages();

    print_json(&json!({
        "posts": page.posts,
        "found_posts": page.found_posts,
        "numberposts": page.numberposts.get(),
        "max_num_pages": max_num_pages,
        "pagination": ambient.pagination(),
    }))
}

async fn run_blogs(services: &Services, args: BlogsArgs) -> Result<(), AppError> {
    let query = args.to_query()?;
    let blogs = services.posts.get_blogs(&query).await?;
    print_json(&json!({ "blogs": blogs }))
}

async fn run_render(
    services: &Services,
    settings: &Settings,
    args: RenderArgs,
) -> Result<(), AppError> {
    let query = args.query.to_query()?;
    let options = ArchiveOptions {
        renderer: Renderer::Template(
            args.template
                .unwrap_or_else(|| settings.render.template.clone()),
        ),
        show_date: args.show_date.unwrap_or(settings.render.show_date),
    };

    let ambient = ambient_query(args.current_page);

    let html = services
        .archive
        .render_post_archive_to_string(&query, &options, Some(&ambient))
        .await?;
    println!("{html}");
    Ok(())
}

fn ambient_query(current_page: Option<u32>) -> AmbientQuery {
    match current_page {
        Some(page) => AmbientQuery::with_page(page),
        None => AmbientQuery::new(),
    }
}

fn print_json(value: &serde_json::Value) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
