//! # Structured Logging Module
//!
//! Environment-aware structured logging for the proxy process, plus helpers
//! that emit one structured event per statement or lease operation.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `RUST_LOG` wins when set; otherwise the level follows `SHARD_PROXY_ENV`.
/// Set `SHARD_PROXY_LOG_JSON=1` for JSON lines instead of human output.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = if json_output_requested() {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Embedding transports may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var("SHARD_PROXY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn json_output_requested() -> bool {
    matches!(
        std::env::var("SHARD_PROXY_LOG_JSON").as_deref(),
        Ok("1") | Ok("true")
    )
}

/// Log structured data for a client statement
pub fn log_statement_operation(
    operation: &str,
    session_id: u32,
    statement_kind: Option<&str>,
    unit_count: usize,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        session_id = session_id,
        statement_kind = statement_kind,
        unit_count = unit_count,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 STATEMENT_OPERATION"
    );
}

/// Log structured data for connection lease bookkeeping
pub fn log_lease_operation(operation: &str, session_id: u32, leases: usize, status: &str) {
    tracing::debug!(
        operation = %operation,
        session_id = session_id,
        leases = leases,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "🔌 LEASE_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
        log_statement_operation("execute", 7, Some("DQL"), 2, "ok", None);
    }
}
