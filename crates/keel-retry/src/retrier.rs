//! The retrier: runs an operation with bounded retries.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use keel_core::{Error, Result};

use crate::backoff::{BackoffCalculator, ExponentialBackoff};
use crate::evaluator::{GenericEvaluator, RetryEvaluator};
use crate::wrapper::{ErrorWrapper, IdentityWrapper};

/// Strategy-driven retrier.
///
/// Holds no per-call state: the attempt counter, last error, and current
/// backoff delay live on the stack of each [`Retrier::execute`] call, so a
/// single retrier is safely shared across tasks.
#[derive(Clone)]
pub struct Retrier {
    evaluator: Arc<dyn RetryEvaluator>,
    backoff: Arc<dyn BackoffCalculator>,
    wrapper: Arc<dyn ErrorWrapper>,
}

impl Default for Retrier {
    fn default() -> Self {
        Self {
            evaluator: Arc::new(GenericEvaluator::new()),
            backoff: Arc::new(ExponentialBackoff::default()),
            wrapper: Arc::new(IdentityWrapper),
        }
    }
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("evaluator", &"<RetryEvaluator>")
            .field("backoff", &"<BackoffCalculator>")
            .field("wrapper", &"<ErrorWrapper>")
            .finish()
    }
}

impl Retrier {
    /// Creates a retrier with the default policies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the retryability evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: impl RetryEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    /// Replaces the backoff calculator.
    #[must_use]
    pub fn with_backoff(mut self, backoff: impl BackoffCalculator + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Replaces the final-error wrapper.
    #[must_use]
    pub fn with_wrapper(mut self, wrapper: impl ErrorWrapper + 'static) -> Self {
        self.wrapper = Arc::new(wrapper);
        self
    }

    /// Runs `op` until it succeeds, the evaluator rejects a further
    /// attempt, or `cancel` fires.
    ///
    /// The evaluator is consulted with `attempt + 1` — the attempt that
    /// would run next, making the bound off by one relative to the
    /// evaluator's own view. Existing services depend on this and it is
    /// kept as-is.
    ///
    /// # Errors
    ///
    /// Returns the wrapped final error, or an `EXPIRED_CONTEXT` error when
    /// `cancel` fires before or during a backoff sleep.
    pub async fn execute<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::expired_context("retry aborted before attempt"));
            }

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.evaluator.is_retryable(attempt + 1, &err) {
                return Err(self.wrapper.wrap(attempt, err));
            }

            let delay = self.backoff.backoff(attempt);
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying operation");
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use keel_core::{Code, Severity};

    /// Allows exactly `allow` retries, then rejects.
    struct FixedEvaluator {
        allow: u32,
        seen: AtomicU32,
    }

    impl FixedEvaluator {
        fn new(allow: u32) -> Self {
            Self {
                allow,
                seen: AtomicU32::new(0),
            }
        }
    }

    impl RetryEvaluator for FixedEvaluator {
        fn is_retryable(&self, _attempt: u32, _err: &Error) -> bool {
            self.seen.fetch_add(1, Ordering::SeqCst) < self.allow
        }
    }

    fn runtime_err() -> Error {
        Error::build()
            .severity(Severity::Runtime)
            .msg("transient")
            .finish()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn success_returns_immediately() {
        let retrier = Retrier::default();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result = retrier
            .execute(&cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, Error>(42) }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn evaluator_true_k_times_runs_k_plus_one_attempts() {
        let retrier = Retrier::default().with_evaluator(FixedEvaluator::new(3));
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<()> = retrier
            .execute(&cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(runtime_err()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn max_attempts_one_retries_zero_times() {
        // is_retryable is consulted with attempt + 1 = 2, which exceeds the
        // bound, so a single-attempt retrier never sleeps.
        let retrier =
            Retrier::default().with_evaluator(GenericEvaluator::new().with_max_attempts(1));
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<()> = retrier
            .execute(&cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(runtime_err()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn severity_whitelist_classification_scenario() {
        // Whitelist {runtime}, max attempts 3: two runtime failures then
        // success completes after exactly three invocations.
        let retrier = Retrier::default().with_evaluator(
            GenericEvaluator::new()
                .with_max_attempts(3)
                .whitelist_severities([Severity::Runtime]),
        );
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result = retrier
            .execute(&cancel, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(runtime_err())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // An input-severity failure is returned after a single invocation.
        let calls = AtomicU32::new(0);
        let retrier = Retrier::default().with_evaluator(
            GenericEvaluator::new()
                .with_max_attempts(3)
                .whitelist_severities([Severity::Runtime]),
        );
        let result: Result<()> = retrier
            .execute(&cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::invalid_input("bad")) }
            })
            .await;
        assert_eq!(result.unwrap_err().severity(), Severity::Input);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wrapper_shapes_the_final_error() {
        struct OpWrapper;
        impl ErrorWrapper for OpWrapper {
            fn wrap(&self, attempt: u32, err: Error) -> Error {
                Error::build()
                    .op("retrier.exhausted")
                    .kv("attempts", attempt)
                    .cause(err)
                    .finish()
                    .unwrap()
            }
        }
        let retrier = Retrier::default()
            .with_evaluator(GenericEvaluator::new().with_max_attempts(1))
            .with_wrapper(OpWrapper);
        let cancel = CancellationToken::new();
        let result: Result<()> = retrier
            .execute(&cancel, || async { Err(runtime_err()) })
            .await;
        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("retrier.exhausted"));
        assert!(err.to_string().contains("attempts=1"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_terminal() {
        let retrier = Retrier::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<()> = retrier
            .execute(&cancel, || async { Err(runtime_err()) })
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.code(), &Code::EXPIRED_CONTEXT);
    }
}
