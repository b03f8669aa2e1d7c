//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{collections::BTreeMap, num::NonZeroU32, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::plan::{DEFAULT_MAIN_BLOG_ID, DEFAULT_TABLE_PREFIX, TableNaming};
use crate::application::query::{BlogQuery, PostQuery};
use crate::cache::{DEFAULT_KEY_PREFIX, TransientBackend};
use crate::domain::error::DomainError;
use crate::domain::types::{BlogId, BlogIdSet, OrderColumn, PostTypes, SortDirection};
use crate::presentation::views::ARCHIVE_SIMPLE;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "crossblog";
const ENV_PREFIX: &str = "CROSSBLOG";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_MEMORY_CAPACITY: u64 = 256;

/// Command-line arguments for the crossblog binary.
#[derive(Debug, Parser)]
#[command(
    name = "crossblog",
    version,
    about = "Query posts across every blog of a network"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CROSSBLOG_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print merged posts as JSON.
    Posts(PostsArgs),
    /// Print the network's blogs as JSON.
    Blogs(BlogsArgs),
    /// Render merged posts through an archive template.
    Render(RenderArgs),
}

impl Command {
    fn overrides(&self) -> &SettingsOverrides {
        match self {
            Command::Posts(args) => &args.overrides,
            Command::Blogs(args) => &args.overrides,
            Command::Render(args) => &args.overrides,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct PostsArgs {
    #[command(flatten)]
    pub overrides: SettingsOverrides,

    #[command(flatten)]
    pub query: PostQueryArgs,

    /// Starting page of the surrounding listing, used when --paged is absent.
    #[arg(long = "current-page", value_name = "PAGE")]
    pub current_page: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct BlogsArgs {
    #[command(flatten)]
    pub overrides: SettingsOverrides,

    /// Only these blogs (comma or space separated ids).
    #[arg(long = "blog-ids", value_name = "IDS")]
    pub blog_ids: Option<String>,

    /// Skip these blogs (comma or space separated ids).
    #[arg(long = "exclude-blog-ids", value_name = "IDS")]
    pub exclude_blog_ids: Option<String>,

    /// Cache the result for this many seconds.
    #[arg(long = "transient-expires-in", value_name = "SECONDS", default_value_t = 0)]
    pub transient_expires_in: u64,
}

impl BlogsArgs {
    pub fn to_query(&self) -> Result<BlogQuery, DomainError> {
        Ok(BlogQuery {
            blog_ids: parse_ids(self.blog_ids.as_deref())?,
            exclude_blog_ids: parse_ids(self.exclude_blog_ids.as_deref())?,
            transient_expires_in: self.transient_expires_in,
        })
    }
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: SettingsOverrides,

    #[command(flatten)]
    pub query: PostQueryArgs,

    /// Template name; defaults to `render.template`.
    #[arg(long, value_name = "NAME")]
    pub template: Option<String>,

    /// Toggle post dates; defaults to `render.show_date`.
    #[arg(long = "show-date", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub show_date: Option<bool>,

    /// Starting page of the surrounding listing, used when --paged is absent.
    #[arg(long = "current-page", value_name = "PAGE")]
    pub current_page: Option<u32>,
}

/// Query options shared by `posts` and `render`.
#[derive(Debug, Args, Default, Clone)]
pub struct PostQueryArgs {
    /// Page size.
    #[arg(long, value_name = "COUNT")]
    pub numberposts: Option<NonZeroU32>,

    /// Explicit offset; overrides --paged.
    #[arg(long, value_name = "COUNT")]
    pub offset: Option<u64>,

    /// 1-based page number.
    #[arg(long, value_name = "PAGE")]
    pub paged: Option<u32>,

    /// Post types (comma or space separated).
    #[arg(long = "post-type", value_name = "TYPES")]
    pub post_type: Option<String>,

    #[arg(long, value_name = "COLUMN")]
    pub orderby: Option<String>,

    /// ASC or DESC.
    #[arg(long, value_name = "DIRECTION")]
    pub order: Option<String>,

    #[arg(long = "post-status", value_name = "STATUS")]
    pub post_status: Option<String>,

    #[arg(long = "blog-ids", value_name = "IDS")]
    pub blog_ids: Option<String>,

    #[arg(long = "exclude-blog-ids", value_name = "IDS")]
    pub exclude_blog_ids: Option<String>,

    /// Publish pagination figures for the surrounding listing.
    #[arg(long = "affect-wp-query", action = clap::ArgAction::SetTrue)]
    pub affect_wp_query: bool,

    /// Cache the result for this many seconds.
    #[arg(long = "transient-expires-in", value_name = "SECONDS")]
    pub transient_expires_in: Option<u64>,
}

impl PostQueryArgs {
    /// Applies the given flags on top of the query defaults.
    pub fn to_query(&self) -> Result<PostQuery, DomainError> {
        let mut query = PostQuery::default();
        if let Some(numberposts) = self.numberposts {
            query.numberposts = numberposts;
        }
        query.offset = self.offset;
        query.paged = self.paged;
        if let Some(post_type) = self.post_type.as_deref() {
            query.post_type = PostTypes::parse(post_type)?;
        }
        if let Some(orderby) = self.orderby.as_ref() {
            query.orderby = OrderColumn::new(orderby.clone())?;
        }
        if let Some(order) = self.order.as_deref() {
            query.order = SortDirection::from_str(order)?;
        }
        if let Some(status) = self.post_status.as_ref() {
            query.post_status = status.clone();
        }
        query.blog_ids = parse_ids(self.blog_ids.as_deref())?;
        query.exclude_blog_ids = parse_ids(self.exclude_blog_ids.as_deref())?;
        query.affect_wp_query = self.affect_wp_query;
        if let Some(ttl) = self.transient_expires_in {
            query.transient_expires_in = ttl;
        }
        Ok(query)
    }
}

fn parse_ids(raw: Option<&str>) -> Result<Option<BlogIdSet>, DomainError> {
    raw.map(BlogIdSet::from_str).transpose()
}

#[derive(Debug, Args, Default, Clone)]
pub struct SettingsOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the network table prefix.
    #[arg(long = "table-prefix", value_name = "PREFIX")]
    pub table_prefix: Option<String>,

    /// Override the main blog id.
    #[arg(long = "main-blog-id", value_name = "ID")]
    pub main_blog_id: Option<i64>,

    /// Override the transient backend (memory|postgres).
    #[arg(long = "transient-backend", value_name = "BACKEND")]
    pub transient_backend: Option<String>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub network: NetworkSettings,
    pub transients: TransientSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub naming: TableNaming,
}

#[derive(Debug, Clone)]
pub struct TransientSettings {
    pub backend: TransientBackend,
    pub memory_capacity: usize,
    pub key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub template: String,
    pub show_date: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(cli.command.overrides());

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    network: RawNetworkSettings,
    transients: RawTransientSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &SettingsOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(prefix) = overrides.table_prefix.as_ref() {
            self.network.table_prefix = Some(prefix.clone());
        }
        if let Some(id) = overrides.main_blog_id {
            self.network.main_blog_id = Some(id);
        }
        if let Some(backend) = overrides.transient_backend.as_ref() {
            self.transients.backend = Some(backend.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            network,
            transients,
            render,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            network: build_network_settings(network)?,
            transients: build_transient_settings(transients)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_network_settings(network: RawNetworkSettings) -> Result<NetworkSettings, LoadError> {
    let prefix = network
        .table_prefix
        .unwrap_or_else(|| DEFAULT_TABLE_PREFIX.to_string());
    let main_blog_id = network
        .main_blog_id
        .map(BlogId::new)
        .unwrap_or(DEFAULT_MAIN_BLOG_ID);

    let mut naming = TableNaming::new(prefix, main_blog_id)
        .map_err(|err| LoadError::invalid("network.table_prefix", err.to_string()))?;

    for (raw_id, prefix) in network.table_overrides {
        let blog_id = raw_id
            .trim()
            .parse::<i64>()
            .ok()
            .map(BlogId::new)
            .filter(|id| id.is_assigned())
            .ok_or_else(|| {
                LoadError::invalid(
                    "network.table_overrides",
                    format!("`{raw_id}` is not a blog id"),
                )
            })?;
        naming = naming
            .with_override(blog_id, prefix)
            .map_err(|err| LoadError::invalid("network.table_overrides", err.to_string()))?;
    }

    Ok(NetworkSettings { naming })
}

fn build_transient_settings(
    transients: RawTransientSettings,
) -> Result<TransientSettings, LoadError> {
    let backend = match transients.backend.as_deref().map(str::trim) {
        None | Some("memory") => TransientBackend::Memory,
        Some("postgres") => TransientBackend::Postgres,
        Some(other) => {
            return Err(LoadError::invalid(
                "transients.backend",
                format!("unknown backend `{other}`; expected memory or postgres"),
            ));
        }
    };

    let capacity = transients
        .memory_capacity
        .unwrap_or(DEFAULT_MEMORY_CAPACITY);
    if capacity == 0 {
        return Err(LoadError::invalid(
            "transients.memory_capacity",
            "must be greater than zero",
        ));
    }
    let memory_capacity = usize::try_from(capacity).map_err(|_| {
        LoadError::invalid(
            "transients.memory_capacity",
            "value exceeds supported range for usize",
        )
    })?;

    let key_prefix = transients
        .key_prefix
        .map(|prefix| prefix.trim().to_string())
        .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
    if key_prefix.is_empty() || !key_prefix.is_ascii() {
        return Err(LoadError::invalid(
            "transients.key_prefix",
            "must be a non-empty ASCII string",
        ));
    }

    Ok(TransientSettings {
        backend,
        memory_capacity,
        key_prefix,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let template = render
        .template
        .unwrap_or_else(|| ARCHIVE_SIMPLE.to_string());
    if template.trim().is_empty() {
        return Err(LoadError::invalid(
            "render.template",
            "template name must not be empty",
        ));
    }

    Ok(RenderSettings {
        template,
        show_date: render.show_date.unwrap_or(true),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNetworkSettings {
    table_prefix: Option<String>,
    main_blog_id: Option<i64>,
    table_overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTransientSettings {
    backend: Option<String>,
    memory_capacity: Option<u64>,
    key_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    template: Option<String>,
    show_date: Option<bool>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
