//! Observability infrastructure for keel services.
//!
//! Structured logging with consistent spans. This module provides the
//! initialization helper every service binary calls once at startup; the
//! lifecycle controller forwards its `log.level` / `log.human` settings here.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    #[default]
    Json,
    /// Human-readable logs (for development).
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops. `RUST_LOG` overrides `default_level`.
///
/// # Example
///
/// ```rust
/// use keel_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty, "info");
/// ```
pub fn init_logging(format: LogFormat, default_level: &str) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        // Should not panic (uses Once internally)
        init_logging(LogFormat::Pretty, "info");
        init_logging(LogFormat::Json, "debug"); // Second call should be no-op
    }
}
