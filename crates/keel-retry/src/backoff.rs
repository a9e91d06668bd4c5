//! Backoff calculation policy.
//!
//! [`ExponentialBackoff`] grows the delay as `base × multiplier^(attempt-1)`
//! plus a uniform random extra, optionally capped. Because the base delay is
//! derived purely from the attempt number, jitter never feeds back into
//! subsequent calculations.

use std::time::Duration;

/// Policy object returning the sleep duration before the next attempt.
pub trait BackoffCalculator: Send + Sync {
    /// Computes the delay after the given attempt (1-indexed) failed.
    fn backoff(&self, attempt: u32) -> Duration;
}

/// Default backoff base delay (100 ms).
pub const DEFAULT_BASE: Duration = Duration::from_millis(100);

/// Default growth multiplier.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Default upper bound of the uniform random extra (20 ms).
pub const DEFAULT_RANDOM_EXTRA: Duration = Duration::from_millis(20);

/// Exponential backoff with uniform jitter.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base: Duration,
    multiplier: f64,
    random_extra: Duration,
    max_delay: Option<Duration>,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            multiplier: DEFAULT_MULTIPLIER,
            random_extra: DEFAULT_RANDOM_EXTRA,
            max_delay: None,
        }
    }
}

impl ExponentialBackoff {
    /// Sets the initial delay.
    #[must_use]
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Sets the growth multiplier. Values below 1 are coerced to the
    /// default of 2.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier < 1.0 {
            DEFAULT_MULTIPLIER
        } else {
            multiplier
        };
        self
    }

    /// Sets the upper bound of the uniform random extra.
    #[must_use]
    pub fn with_random_extra(mut self, extra: Duration) -> Self {
        self.random_extra = extra;
        self
    }

    /// Caps the total delay.
    #[must_use]
    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        let ceiling = self.max_delay.map_or(f64::MAX, |d| d.as_secs_f64());
        if !secs.is_finite() || secs < 0.0 || secs > ceiling {
            self.max_delay.unwrap_or(Duration::MAX)
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl BackoffCalculator for ExponentialBackoff {
    fn backoff(&self, attempt: u32) -> Duration {
        let jitter = Duration::from_millis(rand_jitter(self.random_extra.as_millis() as u64));
        let delay = self.base_delay(attempt).saturating_add(jitter);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// Generates uniform jitter in `[0, bound_ms]`.
fn rand_jitter(bound_ms: u64) -> u64 {
    if bound_ms == 0 {
        return 0;
    }
    // Simple linear congruential generator for jitter
    // (avoids full rand dependency for this simple case)
    use std::time::SystemTime;
    let seed = u64::from(
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos(),
    );
    seed.wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407)
        % (bound_ms + 1)
}
