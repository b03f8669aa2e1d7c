use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::posts::METRIC_MERGE_QUERY_MS;
use crate::cache::{METRIC_TRANSIENT_HIT, METRIC_TRANSIENT_INVALIDATED, METRIC_TRANSIENT_MISS};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber writing to stderr; stdout carries command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_TRANSIENT_HIT,
            Unit::Count,
            "Total number of transient reads served from the store."
        );
        describe_counter!(
            METRIC_TRANSIENT_MISS,
            Unit::Count,
            "Total number of transient reads that found no usable entry."
        );
        describe_counter!(
            METRIC_TRANSIENT_INVALIDATED,
            Unit::Count,
            "Total number of cached post lists evicted because the page size changed."
        );
        describe_histogram!(
            METRIC_MERGE_QUERY_MS,
            Unit::Milliseconds,
            "Merged cross-blog query latency in milliseconds."
        );
    });
}
