//! # keel-core
//!
//! Core abstractions shared by every keel service component:
//!
//! - **Error Model**: structured errors carrying an operation trace, a
//!   machine-readable code, a severity, and key/value context
//! - **Panic Capture**: helpers that turn panics into structured errors
//! - **Request Scope**: trace and request-id values threaded through
//!   per-operation call paths
//! - **Observability**: structured-logging initialization
//!
//! ## Crate Boundary
//!
//! `keel-core` is the only crate allowed to define shared primitives.
//! Higher-level crates (`keel-retry`, `keel-schema`, `keel-app`) depend on
//! it and never on each other's internals.
//!
//! ## Example
//!
//! ```rust
//! use keel_core::prelude::*;
//!
//! let err = Error::build()
//!     .op("billing.charge")
//!     .code(Code::REQUEST_TIMEOUT)
//!     .severity(Severity::Runtime)
//!     .msg("upstream did not answer")
//!     .finish()
//!     .expect("cause provided");
//!
//! assert_eq!(err.code(), &Code::REQUEST_TIMEOUT);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod observability;
pub mod panic;
pub mod scope;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use keel_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Code, Error, ErrorBuilder, Result, Severity};
    pub use crate::panic::catch_panic;
    pub use crate::scope::{RequestId, RequestScope, Trace};
}

// Re-export key types at crate root for ergonomics
pub use error::{Code, Error, ErrorBuilder, Result, Severity};
pub use observability::{init_logging, LogFormat};
pub use panic::{catch_panic, error_from_panic};
pub use scope::{RequestId, RequestScope, Trace};
