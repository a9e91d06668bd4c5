//! # keel-retry
//!
//! A strategy-driven retry engine. Three orthogonal policies compose into
//! a [`Retrier`]:
//!
//! | Policy              | Decides                                  | Default                  |
//! |---------------------|------------------------------------------|--------------------------|
//! | [`RetryEvaluator`]  | whether a failure may be retried         | [`GenericEvaluator`]     |
//! | [`BackoffCalculator`]| how long to sleep before the next attempt| [`ExponentialBackoff`]   |
//! | [`ErrorWrapper`]    | the shape of the final returned error    | [`IdentityWrapper`]      |
//!
//! A second flavor, [`SeverityGateRetrier`], terminates on error severity
//! alone: `input` and `fatal` abort immediately, `runtime` retries forever,
//! and only unclassified failures consume the retry budget.
//!
//! All sleeps are cancelable through a
//! [`CancellationToken`](tokio_util::sync::CancellationToken); cancellation
//! is terminal and surfaces as code `EXPIRED_CONTEXT`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use keel_retry::Retrier;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), keel_core::Error> {
//! let retrier = Retrier::default();
//! let cancel = CancellationToken::new();
//! let value = retrier
//!     .execute(&cancel, || async { fetch_remote().await })
//!     .await?;
//! # Ok(())
//! # }
//! # async fn fetch_remote() -> Result<u32, keel_core::Error> { Ok(1) }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

mod backoff;
mod evaluator;
mod gate;
mod retrier;
mod wrapper;

pub use backoff::{BackoffCalculator, ExponentialBackoff};
pub use evaluator::{GenericEvaluator, RetryEvaluator};
pub use gate::SeverityGateRetrier;
pub use retrier::Retrier;
pub use wrapper::{ErrorWrapper, IdentityWrapper};
