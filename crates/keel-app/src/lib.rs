//! # keel-app
//!
//! Application lifecycle controller for long-running network services.
//!
//! The controller bootstraps a service, exposes administrative HTTP
//! endpoints (readiness, healthiness, metrics, debug dumps), intercepts
//! termination signals, and orchestrates prioritized graceful shutdown of
//! registered handlers with per-handler timeouts and error policies.
//!
//! ## Example
//!
//! ```rust,no_run
//! use keel_app::{App, AppConfig, ErrorPolicy, ShutdownHandler};
//!
//! # async fn demo() -> keel_core::Result<()> {
//! let app = App::new(AppConfig::from_env()?)?;
//!
//! app.register_shutdown_handler(ShutdownHandler::new(
//!     "flush-queue",
//!     20,
//!     ErrorPolicy::Warn,
//!     |_cancel| async { Ok(()) },
//! )?)?;
//!
//! app.run(|cancel| async move {
//!     cancel.cancelled().await;
//!     Ok(())
//! })
//! .await
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod config;
pub mod debug;
pub mod metrics;
pub mod probe;
pub mod respond;
pub mod server;
pub mod shutdown;
pub mod signal;

pub use app::App;
pub use config::{AdminConfig, AppConfig, ShutdownConfig, TraceConfig, TraceExporter};
pub use probe::{Probe, ProbeGroup, ProbeReport};
pub use respond::ErrorResponse;
pub use server::AdminState;
pub use shutdown::{ErrorPolicy, ShutdownHandler};
