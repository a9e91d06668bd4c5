//! Final-error wrapping policy.

use keel_core::Error;

/// Policy object shaping the final error returned by the retrier.
pub trait ErrorWrapper: Send + Sync {
    /// Wraps the last error after the given attempt failed terminally.
    fn wrap(&self, attempt: u32, err: Error) -> Error;
}

/// The default wrapper: returns the last error unmodified.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityWrapper;

impl ErrorWrapper for IdentityWrapper {
    fn wrap(&self, _attempt: u32, err: Error) -> Error {
        err
    }
}
