//! Shared logging utilities for consistent tracing across the engine

use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Filter directive used for both crates at the given level
pub fn filter_directive(log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");
    format!("jury={base_level},shared={base_level}")
}

/// Initialize tracing subscriber with the given log level
pub fn init_tracing_with_level(log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = filter_directive(log_level);

    // `try_init` so repeated initialisation in tests is harmless
    let _ = fmt()
        .with_env_filter(EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();
}

/// Initialize tracing subscriber at `info`
pub fn init_tracing() {
    init_tracing_with_level(None);
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for judge-scoped info logging
#[macro_export]
macro_rules! judge_info {
    ($judge_id:expr, $op:expr, $($arg:tt)*) => {
        tracing::info!(
            judge = %$judge_id,
            op = $op,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for judge-scoped warning logging
#[macro_export]
macro_rules! judge_warn {
    ($judge_id:expr, $op:expr, $($arg:tt)*) => {
        tracing::warn!(
            judge = %$judge_id,
            op = $op,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for judge-scoped error logging
#[macro_export]
macro_rules! judge_error {
    ($judge_id:expr, $op:expr, $($arg:tt)*) => {
        tracing::error!(
            judge = %$judge_id,
            op = $op,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for judge-scoped debug logging
#[macro_export]
macro_rules! judge_debug {
    ($judge_id:expr, $op:expr, $($arg:tt)*) => {
        tracing::debug!(
            judge = %$judge_id,
            op = $op,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(details: &str) {
    info!(timestamp = format_timestamp(), "🚀 Starting {}", details);
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(reason: &str) {
    info!(timestamp = format_timestamp(), "🛑 Shutting down: {}", reason);
}

/// Contextual logging helper for error conditions
pub fn log_error(context: &str, error: &dyn std::fmt::Display) {
    error!(
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(message: &str) {
    info!(timestamp = format_timestamp(), "✅ {}", message);
}
