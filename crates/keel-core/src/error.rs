//! Structured error type shared across all keel components.
//!
//! Errors carry machine-inspectable classification through a cause chain
//! without losing the human-readable message:
//!
//! - an **operation label** (dot-delimited, e.g. `registry.get_schema`)
//! - a **code** from an open set of short identifiers
//! - a **severity** (`input`, `runtime`, `fatal`, or unset)
//! - ordered **key/value context** for debugging
//! - an optional **cause** (another [`Error`], any `std::error::Error`,
//!   or a plain message)
//!
//! Code and severity resolution walks the chain outermost-first and the
//! first non-unset value wins; unset values inherit from the cause.

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

use serde::Serialize;

/// The result type used throughout keel.
pub type Result<T> = std::result::Result<T, Error>;

/// Error severity classification.
///
/// Downstream layers consult the severity to decide whether an error is
/// retryable and which HTTP status it maps to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Not classified; inherits from the cause chain.
    #[default]
    Unset,
    /// Caused by caller data; never retried, maps to HTTP 4xx.
    Input,
    /// Transient condition worth retrying.
    Runtime,
    /// Programming bug or unrecoverable state; never retried.
    Fatal,
}

impl Severity {
    /// Returns true when this severity carries no classification.
    #[must_use]
    pub const fn is_unset(self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unset => "unset",
            Self::Input => "input",
            Self::Runtime => "runtime",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Short machine-readable error code.
///
/// The set is open: any identifier may be constructed with [`Code::new`].
/// The empty code is "unset" and inherits from the cause chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Code(Cow<'static, str>);

impl Code {
    /// The unset code; inherits from the cause chain.
    pub const UNSET: Self = Self::from_static("");

    /// Unclassified internal failure.
    pub const INTERNAL_ERROR: Self = Self::from_static("INTERNAL_ERROR");

    /// Malformed or otherwise unacceptable caller input.
    pub const BAD_REQUEST: Self = Self::from_static("BAD_REQUEST");

    /// An operation exceeded its deadline.
    pub const REQUEST_TIMEOUT: Self = Self::from_static("REQUEST_TIMEOUT");

    /// A recovered panic.
    pub const PANIC: Self = Self::from_static("PANIC");

    /// Bytes that could not be decoded.
    pub const DECODE_ERROR: Self = Self::from_static("DECODE_ERROR");

    /// A payload exceeding the configured size bound.
    pub const RESPONSE_TOO_LONG: Self = Self::from_static("RESPONSE_TOO_LONG");

    /// The caller's context was canceled or past its deadline.
    pub const EXPIRED_CONTEXT: Self = Self::from_static("EXPIRED_CONTEXT");

    /// Creates a code from a static identifier.
    #[must_use]
    pub const fn from_static(code: &'static str) -> Self {
        Self(Cow::Borrowed(code))
    }

    /// Creates a code from an arbitrary identifier.
    pub fn new(code: impl Into<String>) -> Self {
        Self(Cow::Owned(code.into()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when this code carries no classification.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The cause slot of an [`Error`].
#[derive(Debug, Clone)]
enum Cause {
    /// Another structured error; chain walking continues into it.
    Structured(Box<Error>),
    /// A foreign error; terminates the structured chain. Shared so that
    /// recorded error values (e.g. shutdown outcomes) can be cloned.
    Dynamic(std::sync::Arc<dyn std::error::Error + Send + Sync + 'static>),
    /// A plain root message.
    Message(String),
}

/// Structured error carrying classification through a cause chain.
///
/// Constructed through [`Error::build`] or the convenience constructors.
/// The `Display` implementation walks the cause chain depth-first,
/// concatenating operation labels with `": "`, ending with the root cause
/// text, and appending accumulated key/value context as `[k=v,...]`.
#[derive(Debug, Clone)]
pub struct Error {
    op: Option<String>,
    code: Code,
    severity: Severity,
    context: Vec<(String, String)>,
    cause: Option<Cause>,
}

impl Error {
    /// Starts building an error from a heterogeneous set of inputs.
    #[must_use]
    pub fn build() -> ErrorBuilder {
        ErrorBuilder::default()
    }

    /// Creates an error from a plain root message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            op: None,
            code: Code::UNSET,
            severity: Severity::Unset,
            context: Vec::new(),
            cause: Some(Cause::Message(msg.into())),
        }
    }

    /// Wraps a foreign error without further classification.
    pub fn from_source(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            op: None,
            code: Code::UNSET,
            severity: Severity::Unset,
            context: Vec::new(),
            cause: Some(Cause::Dynamic(std::sync::Arc::new(source))),
        }
    }

    /// Creates an `Input`-severity error with code `BAD_REQUEST`.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::build()
            .code(Code::BAD_REQUEST)
            .severity(Severity::Input)
            .msg(msg)
            .finish()
            .unwrap_or_else(Self::absent)
    }

    /// Creates a `Fatal`-severity error with code `INTERNAL_ERROR`.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::build()
            .code(Code::INTERNAL_ERROR)
            .severity(Severity::Fatal)
            .msg(msg)
            .finish()
            .unwrap_or_else(Self::absent)
    }

    /// Creates an `Input`-severity decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::build()
            .code(Code::DECODE_ERROR)
            .severity(Severity::Input)
            .msg(msg)
            .finish()
            .unwrap_or_else(Self::absent)
    }

    /// Creates an `EXPIRED_CONTEXT` error for canceled callers.
    pub fn expired_context(msg: impl Into<String>) -> Self {
        Self::build()
            .code(Code::EXPIRED_CONTEXT)
            .severity(Severity::Runtime)
            .msg(msg)
            .finish()
            .unwrap_or_else(Self::absent)
    }

    // finish() only returns None when no cause or message was supplied;
    // the constructors above always supply one.
    fn absent() -> Self {
        Self::new("absent error")
    }

    /// Returns the effective code: the first non-unset code walking the
    /// chain outermost-first.
    #[must_use]
    pub fn code(&self) -> &Code {
        static UNSET: Code = Code::UNSET;
        let mut cur = self;
        loop {
            if !cur.code.is_unset() {
                return &cur.code;
            }
            match &cur.cause {
                Some(Cause::Structured(inner)) => cur = inner,
                _ => return &UNSET,
            }
        }
    }

    /// Returns the effective severity: the first non-unset severity walking
    /// the chain outermost-first.
    #[must_use]
    pub fn severity(&self) -> Severity {
        let mut cur = self;
        loop {
            if !cur.severity.is_unset() {
                return cur.severity;
            }
            match &cur.cause {
                Some(Cause::Structured(inner)) => cur = inner,
                _ => return Severity::Unset,
            }
        }
    }

    /// Returns the text of the deepest cause in the chain.
    #[must_use]
    pub fn root_cause(&self) -> String {
        let mut cur = self;
        loop {
            match &cur.cause {
                Some(Cause::Structured(inner)) => cur = inner,
                Some(Cause::Dynamic(e)) => return e.to_string(),
                Some(Cause::Message(m)) => return m.clone(),
                None => return cur.op.clone().unwrap_or_default(),
            }
        }
    }

    /// Returns the operation label of this error, if set.
    #[must_use]
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Returns the key/value context attached to this error (not the chain).
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Returns the structured cause, if the cause is a structured error.
    #[must_use]
    pub fn structured_cause(&self) -> Option<&Error> {
        match &self.cause {
            Some(Cause::Structured(inner)) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        let mut kvs: Vec<&(String, String)> = Vec::new();
        let mut cur = self;
        loop {
            kvs.extend(cur.context.iter());
            if let Some(op) = &cur.op {
                if wrote {
                    f.write_str(": ")?;
                }
                f.write_str(op)?;
                wrote = true;
            }
            match &cur.cause {
                Some(Cause::Structured(inner)) => cur = inner,
                Some(Cause::Dynamic(e)) => {
                    if wrote {
                        f.write_str(": ")?;
                    }
                    write!(f, "{e}")?;
                    wrote = true;
                    break;
                }
                Some(Cause::Message(m)) => {
                    if wrote {
                        f.write_str(": ")?;
                    }
                    f.write_str(m)?;
                    wrote = true;
                    break;
                }
                None => break,
            }
        }
        if !wrote {
            f.write_str("unknown error")?;
        }
        if !kvs.is_empty() {
            f.write_str(" [")?;
            for (i, (k, v)) in kvs.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{k}={v}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            Some(Cause::Structured(inner)) => Some(inner.as_ref()),
            Some(Cause::Dynamic(e)) => Some(&**e),
            _ => None,
        }
    }
}

/// Builder assembling an [`Error`] from an optional cause plus decorations.
///
/// Decoration order does not matter: code, severity, operation label, and
/// key/value pairs are applied to the same slot regardless of call order.
#[derive(Debug, Default)]
pub struct ErrorBuilder {
    op: Option<String>,
    code: Code,
    severity: Severity,
    context: Vec<(String, String)>,
    cause: Option<Cause>,
    msg: Option<String>,
    decorated: bool,
}

impl ErrorBuilder {
    /// Sets the operation label (dot-delimited path).
    #[must_use]
    pub fn op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self.decorated = true;
        self
    }

    /// Sets the error code.
    #[must_use]
    pub fn code(mut self, code: Code) -> Self {
        self.code = code;
        self.decorated = true;
        self
    }

    /// Sets the severity.
    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self.decorated = true;
        self
    }

    /// Appends a key/value annotation.
    #[must_use]
    pub fn kv(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.push((key.into(), value.to_string()));
        self.decorated = true;
        self
    }

    /// Sets a structured cause.
    #[must_use]
    pub fn cause(mut self, cause: Error) -> Self {
        self.cause = Some(Cause::Structured(Box::new(cause)));
        self
    }

    /// Sets a foreign-error cause.
    #[must_use]
    pub fn source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Cause::Dynamic(std::sync::Arc::new(source)));
        self
    }

    /// Sets a root message. When a cause is also present the message
    /// becomes an intermediate operation label in front of the cause.
    #[must_use]
    pub fn msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    /// Finalizes the error.
    ///
    /// Returns `None` when decorations were supplied without any cause or
    /// message (there is nothing to report). When nothing at all was
    /// supplied, returns a synthetic fatal error carrying the caller
    /// file/line to surface the programming mistake.
    #[track_caller]
    #[must_use]
    pub fn finish(self) -> Option<Error> {
        let cause = match (self.cause, self.msg) {
            (Some(cause), Some(msg)) => Some(Cause::Structured(Box::new(Error {
                op: Some(msg),
                code: Code::UNSET,
                severity: Severity::Unset,
                context: Vec::new(),
                cause: Some(cause),
            }))),
            (Some(cause), None) => Some(cause),
            (None, Some(msg)) => Some(Cause::Message(msg)),
            (None, None) => {
                if self.decorated {
                    return None;
                }
                let loc = Location::caller();
                return Some(Error {
                    op: None,
                    code: Code::INTERNAL_ERROR,
                    severity: Severity::Fatal,
                    context: vec![
                        ("file".to_string(), loc.file().to_string()),
                        ("line".to_string(), loc.line().to_string()),
                    ],
                    cause: Some(Cause::Message(
                        "error built with no arguments".to_string(),
                    )),
                });
            }
        };
        Some(Error {
            op: self.op,
            code: self.code,
            severity: self.severity,
            context: self.context,
            cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::TimedOut, "connection timed out")
    }

    #[test]
    fn display_walks_op_chain() {
        let inner = Error::build()
            .op("registry.fetch")
            .msg("connection refused")
            .finish()
            .unwrap();
        let outer = Error::build()
            .op("codec.decode")
            .cause(inner)
            .finish()
            .unwrap();
        assert_eq!(
            outer.to_string(),
            "codec.decode: registry.fetch: connection refused"
        );
    }

    #[test]
    fn display_appends_accumulated_context() {
        let inner = Error::build()
            .op("registry.fetch")
            .kv("schemaId", 42)
            .msg("boom")
            .finish()
            .unwrap();
        let outer = Error::build()
            .op("codec.decode")
            .kv("subject", "payments")
            .cause(inner)
            .finish()
            .unwrap();
        assert_eq!(
            outer.to_string(),
            "codec.decode: registry.fetch: boom [subject=payments,schemaId=42]"
        );
    }

    #[test]
    fn display_is_deterministic() {
        let build = || {
            Error::build()
                .op("a.b")
                .kv("k", "v")
                .msg("root")
                .finish()
                .unwrap()
        };
        assert_eq!(build().to_string(), build().to_string());
    }

    #[test]
    fn code_resolution_prefers_outermost_non_unset() {
        let inner = Error::build()
            .code(Code::BAD_REQUEST)
            .msg("bad payload")
            .finish()
            .unwrap();
        let outer = Error::build().op("decode").cause(inner).finish().unwrap();
        assert_eq!(outer.code(), &Code::BAD_REQUEST);

        let overridden = Error::build()
            .code(Code::DECODE_ERROR)
            .cause(Error::build().code(Code::BAD_REQUEST).msg("x").finish().unwrap())
            .finish()
            .unwrap();
        assert_eq!(overridden.code(), &Code::DECODE_ERROR);
    }

    #[test]
    fn severity_resolution_inherits_through_unset() {
        let inner = Error::build()
            .severity(Severity::Runtime)
            .msg("transient")
            .finish()
            .unwrap();
        let outer = Error::build().op("retry").cause(inner).finish().unwrap();
        assert_eq!(outer.severity(), Severity::Runtime);
    }

    #[test]
    fn decoration_order_does_not_matter() {
        let a = Error::build()
            .op("x")
            .code(Code::PANIC)
            .severity(Severity::Fatal)
            .msg("m")
            .finish()
            .unwrap();
        let b = Error::build()
            .msg("m")
            .severity(Severity::Fatal)
            .code(Code::PANIC)
            .op("x")
            .finish()
            .unwrap();
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.code(), b.code());
        assert_eq!(a.severity(), b.severity());
    }

    #[test]
    fn root_cause_returns_deepest_text() {
        let err = Error::build()
            .op("outer")
            .cause(
                Error::build()
                    .op("middle")
                    .source(io_error())
                    .finish()
                    .unwrap(),
            )
            .finish()
            .unwrap();
        assert_eq!(err.root_cause(), "connection timed out");
    }

    #[test]
    fn decorations_without_cause_yield_none() {
        assert!(Error::build().op("lonely").finish().is_none());
        assert!(Error::build().code(Code::PANIC).finish().is_none());
    }

    #[test]
    fn empty_build_yields_synthetic_error_with_location() {
        let err = Error::build().finish().unwrap();
        assert_eq!(err.code(), &Code::INTERNAL_ERROR);
        assert_eq!(err.severity(), Severity::Fatal);
        let ctx = err.context();
        assert!(ctx.iter().any(|(k, v)| k == "file" && v.contains("error.rs")));
        assert!(ctx.iter().any(|(k, _)| k == "line"));
    }

    #[test]
    fn message_with_cause_becomes_intermediate_label() {
        let err = Error::build()
            .op("outer")
            .msg("while fetching schema")
            .cause(Error::new("root"))
            .finish()
            .unwrap();
        assert_eq!(err.to_string(), "outer: while fetching schema: root");
    }

    #[test]
    fn source_chain_is_exposed() {
        let err = Error::build().op("op").source(io_error()).finish().unwrap();
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "connection timed out");
    }

    #[test]
    fn unset_code_reports_unset() {
        let err = Error::new("plain");
        assert!(err.code().is_unset());
        assert_eq!(err.severity(), Severity::Unset);
    }
}
