//! Severity-gate retrier for endpoint middlewares.
//!
//! Termination rules differ from the generic [`Retrier`](crate::Retrier):
//! severity alone decides. `input` and `fatal` failures abort immediately,
//! `runtime` failures are always retried, and only unclassified failures
//! consume the bounded retry budget.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use keel_core::{Error, Result, Severity};

use crate::backoff::{BackoffCalculator, ExponentialBackoff};

/// Retrier terminating on error severity.
#[derive(Clone)]
pub struct SeverityGateRetrier {
    max_retries: Option<u32>,
    backoff: Arc<dyn BackoffCalculator>,
}

impl Default for SeverityGateRetrier {
    fn default() -> Self {
        Self {
            max_retries: Some(DEFAULT_MAX_RETRIES),
            backoff: Arc::new(ExponentialBackoff::default()),
        }
    }
}

impl std::fmt::Debug for SeverityGateRetrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeverityGateRetrier")
            .field("max_retries", &self.max_retries)
            .field("backoff", &"<BackoffCalculator>")
            .finish()
    }
}

/// Default bound on retries of unclassified failures.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

impl SeverityGateRetrier {
    /// Creates a gate retrier with the default budget and backoff.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds retries of unclassified failures; `None` retries forever.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replaces the backoff calculator.
    #[must_use]
    pub fn with_backoff(mut self, backoff: impl BackoffCalculator + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Runs `op` under the severity gate.
    ///
    /// # Errors
    ///
    /// Returns the first `input`/`fatal` error, the last unclassified error
    /// once the budget is spent, or an `EXPIRED_CONTEXT` error when
    /// `cancel` fires during a backoff sleep.
    pub async fn execute<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut counted: u32 = 0;
        let mut attempt: u32 = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::expired_context("retry aborted before attempt"));
            }

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match err.severity() {
                Severity::Input | Severity::Fatal => return Err(err),
                Severity::Runtime => {}
                Severity::Unset => {
                    counted += 1;
                    if let Some(max) = self.max_retries {
                        if counted > max {
                            return Err(err);
                        }
                    }
                }
            }

            let delay = self.backoff.backoff(attempt);
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(Error::expired_context("retry canceled during backoff"));
                }
                () = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}
