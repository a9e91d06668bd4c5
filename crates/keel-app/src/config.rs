//! Lifecycle controller configuration.
//!
//! Every setting has a default and may be overridden through environment
//! variables. This is the canonical runtime configuration path for
//! container deployments.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use keel_core::observability::LogFormat;
use keel_core::{Error, Result};

/// Default administrative HTTP port.
pub const DEFAULT_ADMIN_PORT: u16 = 9000;

/// Default pause between the shutdown trigger and handler execution.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Default overall shutdown deadline.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Distributed-trace exporter selection.
///
/// The exporter itself is an external collaborator; the controller only
/// validates and carries the selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceExporter {
    /// Tracing disabled.
    #[default]
    Disabled,
    /// Export to Stackdriver.
    Stackdriver,
    /// Export over OTLP.
    Otlp,
}

impl TraceExporter {
    fn parse(name: &str, value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" => Ok(Self::Disabled),
            "stackdriver" => Ok(Self::Stackdriver),
            "otlp" => Ok(Self::Otlp),
            other => Err(Error::invalid_input(format!(
                "{name} must be one of: \"\", stackdriver, otlp (got {other})"
            ))),
        }
    }
}

/// Administrative HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bind the admin port at startup.
    pub enabled: bool,
    /// Admin HTTP port.
    pub port: u16,
    /// Expose `/debug/dump/*` endpoints.
    pub with_debug_urls: bool,
    /// Expose the `/metrics` endpoint.
    pub with_metrics: bool,
    /// Expose `/ready` and `/healthy`.
    pub with_probes: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: DEFAULT_ADMIN_PORT,
            with_debug_urls: false,
            with_metrics: true,
            with_probes: true,
        }
    }
}

/// Graceful-shutdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Pause between the shutdown trigger and handler execution, allowing
    /// load balancers to drain.
    pub grace_period: Duration,
    /// Overall deadline for the handler sequence.
    pub timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Trace configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Exporter selection.
    pub exporter: TraceExporter,
    /// Default sampling probability in `[0, 1]`.
    pub probability_sample: f64,
}

/// Configuration for the application lifecycle controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Threshold for the structured log sink (e.g. `info`, `keel=debug`).
    pub log_level: String,
    /// Human-readable instead of JSON log formatting.
    pub log_human: bool,
    /// Admin server settings.
    pub admin: AdminConfig,
    /// Shutdown settings.
    pub shutdown: ShutdownConfig,
    /// Trace settings.
    pub trace: TraceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_human: false,
            admin: AdminConfig::default(),
            shutdown: ShutdownConfig::default(),
            trace: TraceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `KEEL_LOG_LEVEL`
    /// - `KEEL_LOG_HUMAN`
    /// - `KEEL_ADMINSERVER_ENABLED`
    /// - `KEEL_ADMINSERVER_PORT`
    /// - `KEEL_ADMINSERVER_DEBUG_URLS`
    /// - `KEEL_ADMINSERVER_METRICS`
    /// - `KEEL_ADMINSERVER_PROBES`
    /// - `KEEL_SHUTDOWN_GRACE_PERIOD` (humantime, e.g. "3s", "500ms")
    /// - `KEEL_SHUTDOWN_TIMEOUT` (humantime)
    /// - `KEEL_TRACE_EXPORTER` ("", "stackdriver", "otlp")
    /// - `KEEL_TRACE_PROBABILITY_SAMPLE` (float in `[0, 1]`)
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(level) = env_string("KEEL_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(human) = env_bool("KEEL_LOG_HUMAN")? {
            config.log_human = human;
        }

        if let Some(enabled) = env_bool("KEEL_ADMINSERVER_ENABLED")? {
            config.admin.enabled = enabled;
        }
        if let Some(port) = env_u16("KEEL_ADMINSERVER_PORT")? {
            config.admin.port = port;
        }
        if let Some(debug_urls) = env_bool("KEEL_ADMINSERVER_DEBUG_URLS")? {
            config.admin.with_debug_urls = debug_urls;
        }
        if let Some(with_metrics) = env_bool("KEEL_ADMINSERVER_METRICS")? {
            config.admin.with_metrics = with_metrics;
        }
        if let Some(with_probes) = env_bool("KEEL_ADMINSERVER_PROBES")? {
            config.admin.with_probes = with_probes;
        }

        if let Some(grace) = env_duration("KEEL_SHUTDOWN_GRACE_PERIOD")? {
            config.shutdown.grace_period = grace;
        }
        if let Some(timeout) = env_duration("KEEL_SHUTDOWN_TIMEOUT")? {
            config.shutdown.timeout = timeout;
        }

        if let Some(exporter) = env_string("KEEL_TRACE_EXPORTER") {
            config.trace.exporter = TraceExporter::parse("KEEL_TRACE_EXPORTER", &exporter)?;
        }
        if let Some(p) = env_f64("KEEL_TRACE_PROBABILITY_SAMPLE")? {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::invalid_input(
                    "KEEL_TRACE_PROBABILITY_SAMPLE must be within [0, 1]".to_string(),
                ));
            }
            config.trace.probability_sample = p;
        }

        Ok(config)
    }

    /// Returns the log format implied by `log_human`.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        if self.log_human {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u16>()
        .map(Some)
        .map_err(|e| Error::invalid_input(format!("{name} must be a u16: {e}")))
}

fn env_f64(name: &str) -> Result<Option<f64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<f64>()
        .map(Some)
        .map_err(|e| Error::invalid_input(format!("{name} must be a float: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::invalid_input(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}

fn env_duration(name: &str) -> Result<Option<Duration>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    humantime::parse_duration(&v)
        .map(Some)
        .map_err(|e| Error::invalid_input(format!("{name} must be a duration (e.g. \"3s\"): {e}")))
}
