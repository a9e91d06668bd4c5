//! Panic capture helpers.
//!
//! Long-running services must not die from a handler panic. These helpers
//! convert recovered panic payloads into structured [`Error`] values with
//! code `PANIC` and severity `Fatal`, preserving an already-structured
//! error when the panic value is one.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{Code, Error, Severity};

/// Runs `f`, converting a panic into a structured error.
///
/// # Errors
///
/// Returns the closure's own error on failure, or a `PANIC`/`Fatal` error
/// when the closure panics.
pub fn catch_panic<T>(f: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(error_from_panic(payload)),
    }
}

/// Converts a panic payload into a structured error.
///
/// String payloads become the root message. A payload that already is an
/// [`Error`] is kept as the cause so its context survives; the outer code
/// and severity are still forced to `PANIC`/`Fatal`.
#[must_use]
pub fn error_from_panic(payload: Box<dyn Any + Send>) -> Error {
    let builder = Error::build().code(Code::PANIC).severity(Severity::Fatal);
    match payload.downcast::<Error>() {
        Ok(err) => builder.cause(*err).finish(),
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            builder.msg(msg).finish()
        }
    }
    .unwrap_or_else(|| Error::internal("panic with empty payload"))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
