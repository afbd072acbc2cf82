use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    if config.json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init()?;
    }

    tracing::debug!(level = %config.log_level, json = config.json, "Telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking a transition to its side effects
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping one `apply` call
pub fn create_transition_span(
    machine: &str,
    id: &str,
    action: &str,
    correlation_id: &str,
) -> tracing::Span {
    tracing::info_span!(
        "fsm_apply",
        machine = machine,
        item.id = id,
        action = action,
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}

/// Span wrapping one watcher invocation
pub fn create_watcher_span(watcher: &str, id: &str, version: &str) -> tracing::Span {
    tracing::info_span!(
        "watcher",
        watcher = watcher,
        item.id = id,
        item.version = version,
        otel.kind = "consumer"
    )
}
