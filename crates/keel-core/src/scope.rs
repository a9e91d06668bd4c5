//! Per-operation request scope: trace and request identifiers.
//!
//! There is no implicit context propagation in Rust, so callers thread an
//! explicit [`RequestScope`] through function signatures. The contract is
//! present-or-synthesize: helpers parse incoming header values and fabricate
//! fresh identifiers whenever a value is absent or malformed.

use std::fmt;
use std::str::FromStr;

use ulid::Ulid;
use uuid::Uuid;

use crate::error::Error;

/// Header carrying the trace identifier (32 hex characters).
pub const TRACE_ID_HEADER: &str = "X-TRACEID";

/// Header carrying the sampling probability (decimal float in `[0, 1]`).
pub const PROBABILITY_SAMPLE_HEADER: &str = "X-PROBABILITYSAMPLE";

/// Header carrying the request identifier (`<timestamp-ms>-<ulid>`).
pub const REQUEST_ID_HEADER: &str = "X-REQUESTID";

/// A distributed-trace identity: 16 random bytes plus an optional sampling
/// probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trace {
    /// Raw trace identifier bytes.
    pub id: [u8; 16],
    /// Probability with which this trace is sampled, when known.
    pub probability_sample: Option<f64>,
}

impl Trace {
    /// Generates a fresh trace with random identifier bytes.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4().into_bytes(),
            probability_sample: None,
        }
    }

    /// Parses a 32-hex-character trace identifier.
    ///
    /// Returns `None` for empty or malformed values; callers synthesize a
    /// fresh trace in that case.
    #[must_use]
    pub fn parse_id(s: &str) -> Option<Self> {
        if s.len() != 32 {
            return None;
        }
        let mut id = [0u8; 16];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let hex = std::str::from_utf8(chunk).ok()?;
            id[i] = u8::from_str_radix(hex, 16).ok()?;
        }
        Some(Self {
            id,
            probability_sample: None,
        })
    }

    /// Attaches a sampling probability, ignoring values outside `[0, 1]`.
    #[must_use]
    pub fn with_probability_sample(mut self, p: f64) -> Self {
        if (0.0..=1.0).contains(&p) {
            self.probability_sample = Some(p);
        }
        self
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.id {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A per-request identity: millisecond Unix timestamp plus a random ULID.
///
/// Formatted as `<timestamp>-<ulid>`; empty iff both components are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestId {
    /// Millisecond Unix timestamp at generation time.
    pub timestamp_ms: u64,
    /// Random 128-bit ULID rendered in Crockford base32.
    pub ulid: String,
}

impl RequestId {
    /// Generates a fresh request ID from the current time and a new ULID.
    #[must_use]
    pub fn generate() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            timestamp_ms: u64::try_from(now).unwrap_or_default(),
            ulid: Ulid::new().to_string(),
        }
    }

    /// Returns true when both components are zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamp_ms == 0 && self.ulid.is_empty()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(f, "{}-{}", self.timestamp_ms, self.ulid)
    }
}

impl FromStr for RequestId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts, ulid) = s
            .split_once('-')
            .ok_or_else(|| Error::invalid_input(format!("malformed request ID '{s}'")))?;
        let timestamp_ms = ts
            .parse::<u64>()
            .map_err(|e| Error::invalid_input(format!("malformed request ID '{s}': {e}")))?;
        if ulid.is_empty() {
            return Err(Error::invalid_input(format!(
                "malformed request ID '{s}': missing ulid"
            )));
        }
        Ok(Self {
            timestamp_ms,
            ulid: ulid.to_string(),
        })
    }
}

/// The explicit request-scope struct threaded through per-operation calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestScope {
    /// Distributed-trace identity.
    pub trace: Trace,
    /// Request identity.
    pub request_id: RequestId,
}

impl RequestScope {
    /// Fabricates a scope with fresh trace and request identifiers.
    #[must_use]
    pub fn synthesize() -> Self {
        Self {
            trace: Trace::generate(),
            request_id: RequestId::generate(),
        }
    }

    /// Builds a scope from raw header values, synthesizing any part that is
    /// absent or malformed.
    #[must_use]
    pub fn from_header_values(
        trace_id: Option<&str>,
        probability_sample: Option<&str>,
        request_id: Option<&str>,
    ) -> Self {
        let mut trace = trace_id
            .and_then(Trace::parse_id)
            .unwrap_or_else(Trace::generate);
        if let Some(p) = probability_sample.and_then(|v| v.parse::<f64>().ok()) {
            trace = trace.with_probability_sample(p);
        }
        let request_id = request_id
            .and_then(|v| RequestId::from_str(v).ok())
            .unwrap_or_else(RequestId::generate);
        Self { trace, request_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_roundtrips_through_hex() {
        let trace = Trace::generate();
        let hex = trace.to_string();
        assert_eq!(hex.len(), 32);
        let parsed = Trace::parse_id(&hex).expect("valid hex");
        assert_eq!(parsed.id, trace.id);
    }

    #[test]
    fn trace_rejects_malformed_ids() {
        assert!(Trace::parse_id("").is_none());
        assert!(Trace::parse_id("abc").is_none());
        assert!(Trace::parse_id(&"g".repeat(32)).is_none());
    }

    #[test]
    fn trace_ignores_out_of_range_probability() {
        let trace = Trace::generate().with_probability_sample(1.5);
        assert!(trace.probability_sample.is_none());
        let trace = Trace::generate().with_probability_sample(0.25);
        assert_eq!(trace.probability_sample, Some(0.25));
    }

    #[test]
    fn request_id_formats_and_parses() {
        let id = RequestId::generate();
        assert!(!id.is_empty());
        let formatted = id.to_string();
        let parsed: RequestId = formatted.parse().expect("well-formed");
        assert_eq!(parsed, id);
    }

    #[test]
    fn request_id_zero_value_is_empty() {
        let id = RequestId::default();
        assert!(id.is_empty());
        assert_eq!(id.to_string(), "");
    }

    #[test]
    fn request_id_rejects_malformed_values() {
        assert!("nodash".parse::<RequestId>().is_err());
        assert!("abc-01H".parse::<RequestId>().is_err());
        assert!("123-".parse::<RequestId>().is_err());
    }

    #[test]
    fn scope_synthesizes_missing_parts() {
        let scope = RequestScope::from_header_values(None, None, None);
        assert!(!scope.request_id.is_empty());

        let known = Trace::generate();
        let hex = known.to_string();
        let scope = RequestScope::from_header_values(Some(&hex), Some("0.5"), Some("bogus"));
        assert_eq!(scope.trace.id, known.id);
        assert_eq!(scope.trace.probability_sample, Some(0.5));
        assert!(!scope.request_id.is_empty());
    }

    #[test]
    fn scope_ignores_malformed_trace() {
        let scope = RequestScope::from_header_values(Some("short"), Some("nope"), None);
        assert!(scope.trace.probability_sample.is_none());
        assert_eq!(scope.trace.to_string().len(), 32);
    }
}
