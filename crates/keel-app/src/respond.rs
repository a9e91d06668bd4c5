//! HTTP response mapping for structured errors.
//!
//! Transport boundaries render errors as JSON `{"code", "message"}` with a
//! status derived from classification: severity `input` maps to 400, code
//! `REQUEST_TIMEOUT` to 408, everything else to 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use keel_core::{Code, Error, Severity};

/// JSON body rendered at the HTTP boundary.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Effective machine-readable error code.
    pub code: String,
    /// Full formatted error chain.
    pub message: String,
}

/// Response wrapper for [`Error`].
#[derive(Debug)]
pub struct ErrorResponse(pub Error);

impl ErrorResponse {
    /// Returns the HTTP status for the wrapped error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        if self.0.severity() == Severity::Input {
            return StatusCode::BAD_REQUEST;
        }
        if self.0.code() == &Code::REQUEST_TIMEOUT {
            return StatusCode::REQUEST_TIMEOUT;
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.0.code();
        let code = if code.is_unset() {
            Code::INTERNAL_ERROR
        } else {
            code.clone()
        };
        (
            status,
            Json(ErrorBody {
                code: code.as_str().to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_severity_maps_to_bad_request() {
        let response = ErrorResponse(Error::invalid_input("bad field"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn request_timeout_code_maps_to_408() {
        let err = Error::build()
            .code(Code::REQUEST_TIMEOUT)
            .severity(Severity::Runtime)
            .msg("too slow")
            .finish()
            .unwrap();
        assert_eq!(
            ErrorResponse(err).status(),
            StatusCode::REQUEST_TIMEOUT
        );
    }

    #[test]
    fn everything_else_maps_to_500() {
        assert_eq!(
            ErrorResponse(Error::internal("bug")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorResponse(Error::new("unclassified")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unset_code_renders_as_internal_error() {
        let response = ErrorResponse(Error::new("plain")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn input_severity_wins_over_timeout_code() {
        // Severity is checked first; a timed-out parse of caller data is
        // still the caller's fault.
        let err = Error::build()
            .code(Code::REQUEST_TIMEOUT)
            .severity(Severity::Input)
            .msg("bad and slow")
            .finish()
            .unwrap();
        assert_eq!(ErrorResponse(err).status(), StatusCode::BAD_REQUEST);
    }
}
