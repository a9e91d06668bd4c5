//! The application lifecycle controller.
//!
//! One controller is constructed at process start. It owns the readiness
//! and healthiness probe groups, the admin HTTP server, and the shutdown
//! handler queue, and it translates main-loop completion, OS termination
//! signals, and explicit [`App::shutdown`] calls into one graceful
//! shutdown sequence.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use metrics::histogram;
use tokio_util::sync::CancellationToken;

use keel_core::observability::init_logging;
use keel_core::panic::error_from_panic;
use keel_core::{Code, Error, Result, Severity};

use crate::config::AppConfig;
use crate::metrics::{record_handler_failure, record_main_loop_panic, SHUTDOWN_HANDLER_DURATION};
use crate::probe::{Probe, ProbeGroup};
use crate::server::{self, AdminState};
use crate::shutdown::{ErrorPolicy, HandlerQueue, ShutdownHandler};
use crate::signal;

/// How long the controller waits for the main loop to observe its
/// cancellation after shutdown completes.
const MAIN_LOOP_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The application lifecycle controller.
pub struct App {
    config: AppConfig,
    readiness: Arc<ProbeGroup>,
    healthiness: Arc<ProbeGroup>,
    app_ready: Probe,
    app_healthy: Probe,
    handlers: Mutex<HandlerQueue>,
    shutdown_outcome: tokio::sync::Mutex<Option<Result<()>>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Creates a controller with its probe groups and own probes.
    ///
    /// # Errors
    ///
    /// Returns an error when the built-in probe groups cannot be created.
    pub fn new(config: AppConfig) -> Result<Self> {
        let readiness = Arc::new(ProbeGroup::new("readiness")?);
        let healthiness = Arc::new(ProbeGroup::new("healthiness")?);
        let app_ready = readiness.register("app")?;
        let app_healthy = healthiness.register("app")?;
        Ok(Self {
            config,
            readiness,
            healthiness,
            app_ready,
            app_healthy,
            handlers: Mutex::new(HandlerQueue::default()),
            shutdown_outcome: tokio::sync::Mutex::new(None),
        })
    }

    /// Returns the controller configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the readiness probe group for registering service probes.
    #[must_use]
    pub fn readiness(&self) -> &Arc<ProbeGroup> {
        &self.readiness
    }

    /// Returns the healthiness probe group for registering service probes.
    #[must_use]
    pub fn healthiness(&self) -> &Arc<ProbeGroup> {
        &self.healthiness
    }

    /// Registers a shutdown handler.
    ///
    /// Handlers execute highest-priority-first; ties run in registration
    /// order.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible for parity with handler
    /// construction.
    pub fn register_shutdown_handler(&self, handler: ShutdownHandler) -> Result<()> {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handler);
        Ok(())
    }

    /// Runs the service: spawns the main loop and the admin server, waits
    /// for the loop to finish or a termination signal, then shuts down.
    ///
    /// Panics in the main loop are captured and funneled through the
    /// shutdown pipeline as `PANIC`/`fatal` errors.
    ///
    /// # Errors
    ///
    /// Returns the main loop's error if it failed, otherwise the shutdown
    /// outcome.
    pub async fn run<F, Fut>(&self, main_loop: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        init_logging(self.config.log_format(), &self.config.log_level);
        if self.config.admin.enabled && self.config.admin.with_metrics {
            crate::metrics::init_metrics();
        }

        let admin_cancel = CancellationToken::new();
        let admin_task = if self.config.admin.enabled {
            let config = self.config.admin.clone();
            let state = AdminState {
                readiness: Arc::clone(&self.readiness),
                healthiness: Arc::clone(&self.healthiness),
            };
            let cancel = admin_cancel.clone();
            Some(tokio::spawn(async move {
                if let Err(err) = server::serve(&config, state, cancel).await {
                    tracing::error!(error = %err, "admin server failed");
                }
            }))
        } else {
            None
        };

        self.app_ready.set_ok(true);
        self.app_healthy.set_ok(true);

        let main_cancel = CancellationToken::new();
        let mut main_task = tokio::spawn(main_loop(main_cancel.child_token()));

        let early_result = tokio::select! {
            joined = &mut main_task => Some(flatten_main_result(joined)),
            signal = signal::wait_for_termination() => {
                match signal {
                    Ok(()) => tracing::info!("termination signal received"),
                    Err(err) => tracing::error!(error = %err, "signal listener failed"),
                }
                None
            }
        };

        if let Some(Err(err)) = &early_result {
            tracing::error!(error = %err, "main loop failed");
        }

        let shutdown_result = self.shutdown().await;

        // Let the main loop observe its cancellation before the process is
        // reported unhealthy.
        main_cancel.cancel();
        let main_result = match early_result {
            Some(result) => result,
            None => match tokio::time::timeout(MAIN_LOOP_DRAIN_TIMEOUT, &mut main_task).await {
                Ok(joined) => flatten_main_result(joined),
                Err(_) => {
                    tracing::warn!("main loop did not observe cancellation in time");
                    Ok(())
                }
            },
        };

        self.app_healthy.set_ok(false);
        admin_cancel.cancel();
        if let Some(task) = admin_task {
            let _ = task.await;
        }

        main_result.and(shutdown_result)
    }

    /// Runs the graceful shutdown sequence.
    ///
    /// Idempotent: repeated or concurrent calls return the first recorded
    /// outcome and handlers run at most once.
    ///
    /// # Errors
    ///
    /// Returns the error of the first `abort`-policy handler failure, or a
    /// deadline error when the sequence exceeds `shutdown.timeout`.
    pub async fn shutdown(&self) -> Result<()> {
        let mut outcome = self.shutdown_outcome.lock().await;
        if let Some(result) = outcome.as_ref() {
            return result.clone();
        }
        let result = self.perform_shutdown().await;
        *outcome = Some(result.clone());
        result
    }

    async fn perform_shutdown(&self) -> Result<()> {
        tracing::info!(
            grace_ms = self.config.shutdown.grace_period.as_millis() as u64,
            timeout_ms = self.config.shutdown.timeout.as_millis() as u64,
            "shutdown started"
        );
        self.app_ready.set_ok(false);

        // Load balancers drain while the service already reports not-ready.
        tokio::time::sleep(self.config.shutdown.grace_period).await;

        let deadline = CancellationToken::new();
        {
            let deadline = deadline.clone();
            let timeout = self.config.shutdown.timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                deadline.cancel();
            });
        }

        let handlers = self
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain();
        let worker_deadline = deadline.clone();
        let worker = tokio::spawn(run_handlers(handlers, worker_deadline));

        let result = tokio::select! {
            joined = worker => match joined {
                Ok(result) => result,
                Err(join_err) if join_err.is_panic() => {
                    // ErrorPolicy::Panic re-raises in the caller.
                    std::panic::resume_unwind(join_err.into_panic());
                }
                Err(_) => Err(Error::internal("shutdown worker canceled")),
            },
            () = deadline.cancelled() => Err(Error::build()
                .op("app.shutdown")
                .code(Code::EXPIRED_CONTEXT)
                .severity(Severity::Runtime)
                .msg("shutdown deadline exceeded")
                .finish()
                .unwrap_or_else(|| Error::new("shutdown deadline exceeded"))),
        };

        match &result {
            Ok(()) => tracing::info!("shutdown finished"),
            Err(err) => tracing::error!(error = %err, "shutdown finished with error"),
        }
        result
    }
}

/// Executes handlers sequentially, applying each handler's error policy.
async fn run_handlers(handlers: Vec<ShutdownHandler>, deadline: CancellationToken) -> Result<()> {
    for handler in handlers {
        let started = Instant::now();
        let result = handler.execute(&deadline).await;
        histogram!(SHUTDOWN_HANDLER_DURATION, "handler" => handler.name().to_string())
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                tracing::debug!(handler = handler.name(), "shutdown handler completed");
            }
            Err(err) => {
                record_handler_failure(handler.name());
                match handler.policy() {
                    ErrorPolicy::Warn => {
                        tracing::warn!(handler = handler.name(), error = %err, "shutdown handler failed");
                    }
                    ErrorPolicy::Abort => {
                        tracing::error!(handler = handler.name(), error = %err, "shutdown handler failed, aborting");
                        return Err(err);
                    }
                    ErrorPolicy::Fatal => {
                        tracing::error!(handler = handler.name(), error = %err, "shutdown handler failed fatally");
                        std::process::exit(1);
                    }
                    ErrorPolicy::Panic => {
                        std::panic::panic_any(err);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Normalizes a joined main-loop outcome, converting panics into
/// structured errors.
fn flatten_main_result(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            record_main_loop_panic();
            Err(error_from_panic(join_err.into_panic()))
        }
        Err(_) => Err(Error::internal("main loop task canceled")),
    }
}
