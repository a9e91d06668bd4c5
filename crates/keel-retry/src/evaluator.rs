//! Retryability evaluation policy.

use std::collections::HashSet;

use keel_core::{Code, Error, Severity};

/// Policy object returning whether a given failure may be retried.
pub trait RetryEvaluator: Send + Sync {
    /// Returns true when the given attempt may proceed after `err`.
    fn is_retryable(&self, attempt: u32, err: &Error) -> bool;
}

/// Default maximum attempt count.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// The generic evaluator: bounded attempts plus whitelist/blacklist rules
/// over error codes and severities.
///
/// An empty whitelist means "allow everything not blacklisted". Blacklists
/// always win over whitelists.
#[derive(Debug, Default)]
pub struct GenericEvaluator {
    max_attempts: Option<u32>,
    code_whitelist: Option<HashSet<Code>>,
    code_blacklist: HashSet<Code>,
    severity_whitelist: Option<HashSet<Severity>>,
    severity_blacklist: HashSet<Severity>,
}

impl GenericEvaluator {
    /// Creates an evaluator with the default attempt bound and no
    /// code or severity rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempt count (default 5).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Restricts retries to the given codes.
    #[must_use]
    pub fn whitelist_codes(mut self, codes: impl IntoIterator<Item = Code>) -> Self {
        self.code_whitelist = Some(codes.into_iter().collect());
        self
    }

    /// Forbids retries for the given codes.
    #[must_use]
    pub fn blacklist_codes(mut self, codes: impl IntoIterator<Item = Code>) -> Self {
        self.code_blacklist = codes.into_iter().collect();
        self
    }

    /// Restricts retries to the given severities.
    #[must_use]
    pub fn whitelist_severities(mut self, severities: impl IntoIterator<Item = Severity>) -> Self {
        self.severity_whitelist = Some(severities.into_iter().collect());
        self
    }

    /// Forbids retries for the given severities.
    #[must_use]
    pub fn blacklist_severities(mut self, severities: impl IntoIterator<Item = Severity>) -> Self {
        self.severity_blacklist = severities.into_iter().collect();
        self
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryEvaluator for GenericEvaluator {
    fn is_retryable(&self, attempt: u32, err: &Error) -> bool {
        if attempt > self.max_attempts() {
            return false;
        }

        let code = err.code();
        if self.code_blacklist.contains(code) {
            return false;
        }
        if let Some(whitelist) = &self.code_whitelist {
            if !whitelist.contains(code) {
                return false;
            }
        }

        let severity = err.severity();
        if self.severity_blacklist.contains(&severity) {
            return false;
        }
        if let Some(whitelist) = &self.severity_whitelist {
            if !whitelist.contains(&severity) {
                return false;
            }
        }

        true
    }
}
