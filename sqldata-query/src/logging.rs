//! Logging setup.
//!
//! Library code emits `tracing` events and never installs a subscriber on
//! its own. Applications call [`init`] once, or install their own.
//!
//! # Environment Variables
//!
//! - `SQLDATA_DEBUG=true|1|yes` - Enable debug logging
//! - `SQLDATA_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `SQLDATA_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! ```rust,no_run
//! use sqldata_query::logging;
//!
//! logging::init();
//! ```
//!
//! Requests are logged at `debug` with their URL (tokens stripped), table
//! and row counts. Credentials and tokens are never logged.

use std::sync::Once;

use crate::env::{EnvSource, StdEnvSource};

#[doc(hidden)]
pub use tracing;

static INIT: Once = Once::new();

const DEBUG_VAR: &str = "SQLDATA_DEBUG";
const LEVEL_VAR: &str = "SQLDATA_LOG_LEVEL";
const FORMAT_VAR: &str = "SQLDATA_LOG_FORMAT";

/// Check if `SQLDATA_DEBUG` enables debug logging.
#[inline]
pub fn is_debug_enabled() -> bool {
    debug_enabled_in(&StdEnvSource)
}

/// Check a given environment for `SQLDATA_DEBUG`.
pub fn debug_enabled_in<S: EnvSource>(source: &S) -> bool {
    source
        .get(DEBUG_VAR)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Configured log level. Defaults to `debug` under `SQLDATA_DEBUG`, else `warn`.
pub fn get_log_level() -> &'static str {
    log_level_in(&StdEnvSource)
}

/// Log level from a given environment.
pub fn log_level_in<S: EnvSource>(source: &S) -> &'static str {
    let fallback = if debug_enabled_in(source) { "debug" } else { "warn" };
    match source.get(LEVEL_VAR).map(|l| l.to_lowercase()).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => fallback,
    }
}

/// Configured output format. Defaults to `json`.
pub fn get_log_format() -> &'static str {
    log_format_in(&StdEnvSource)
}

/// Output format from a given environment.
pub fn log_format_in<S: EnvSource>(source: &S) -> &'static str {
    match source.get(FORMAT_VAR).map(|f| f.to_lowercase()).as_deref() {
        Some("pretty") => "pretty",
        Some("compact") => "compact",
        _ => "json",
    }
}

/// Install a subscriber from the environment. Later calls are no-ops.
///
/// Does nothing unless `SQLDATA_DEBUG` or `SQLDATA_LOG_LEVEL` is set.
pub fn init() {
    let env = StdEnvSource;
    if !debug_enabled_in(&env) && !env.contains(LEVEL_VAR) {
        return;
    }
    init_with(log_level_in(&env), log_format_in(&env));
}

/// Install a subscriber with an explicit level and format. Later calls are no-ops.
pub fn init_with(level: &str, format: &str) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(format!(
                "sqldata={},sqldata_query={},sqldata_http={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            match format {
                "json" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .init(),
                "compact" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .init(),
                _ => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .init(),
            }

            tracing::info!(level = level, format = format, "sqldata logging initialized");
        }

        #[cfg(not(feature = "tracing-subscriber"))]
        {
            let _ = (level, format);
        }
    });
}

/// Debug event emitted only when `SQLDATA_DEBUG` is on.
#[macro_export]
macro_rules! sqldata_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            $crate::logging::tracing::debug!($($arg)*);
        }
    };
}
