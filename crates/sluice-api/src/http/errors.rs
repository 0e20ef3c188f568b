//! RFC9457-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sluice_core::{ErrorKind, TransferError, TransferOutcome};
use tracing::error;

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_INTERNAL, PROBLEM_NOT_FOUND, PROBLEM_PATH_ESCAPE,
    PROBLEM_REQUEST_TIMEOUT, PROBLEM_SERVICE_UNAVAILABLE,
};
use crate::models::ProblemDetails;

/// Structured API error rendered as a problem document.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn path_escape() -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_PATH_ESCAPE, "bad request")
            .with_detail("Invalid file path")
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(detail)
    }

    pub(crate) fn request_timeout() -> Self {
        Self::new(
            StatusCode::REQUEST_TIMEOUT,
            PROBLEM_REQUEST_TIMEOUT,
            "request timeout",
        )
        .with_detail("Request timeout")
    }

    pub(crate) fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            PROBLEM_SERVICE_UNAVAILABLE,
            "service unavailable",
        )
        .with_detail(detail)
    }

    /// Map a pipeline error onto its response status.
    pub(crate) fn from_transfer(err: &TransferError) -> Self {
        match err.kind() {
            ErrorKind::InvalidInput => match err {
                TransferError::InvalidInput { reason: "empty", .. } => {
                    Self::bad_request("File name is required")
                }
                _ => Self::bad_request("Invalid file name"),
            },
            ErrorKind::PathEscape => Self::path_escape(),
            ErrorKind::NotFound => Self::not_found("File not found"),
            ErrorKind::Io => Self::internal("Internal server error"),
            ErrorKind::QueueFull => Self::service_unavailable("Server busy, please try again later"),
            ErrorKind::ShuttingDown => Self::service_unavailable("Server is shutting down"),
            ErrorKind::Timeout => Self::request_timeout(),
        }
    }

    /// Map an outcome that ended before any response head was committed.
    pub(crate) fn from_headless_outcome(outcome: &TransferOutcome) -> Self {
        match outcome {
            TransferOutcome::Failed(err) => Self::from_transfer(err),
            TransferOutcome::Cancelled { .. } => {
                Self::service_unavailable("Server is shutting down")
            }
            TransferOutcome::Completed { .. } | TransferOutcome::Aborted { .. } => {
                error!(
                    outcome = outcome.label(),
                    "transfer ended without committing a response head"
                );
                Self::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn transfer_errors_map_to_statuses() {
        let cases = [
            (
                TransferError::InvalidInput {
                    field: "file",
                    reason: "empty",
                    value: None,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                TransferError::PathEscape {
                    requested: "../x".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                TransferError::NotFound {
                    path: PathBuf::from("x"),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                TransferError::Io {
                    operation: "read",
                    path: PathBuf::from("x"),
                    source: io::Error::other("disk"),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                TransferError::Internal {
                    detail: "panic".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (TransferError::QueueFull, StatusCode::SERVICE_UNAVAILABLE),
            (TransferError::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
            (
                TransferError::Timeout {
                    waited: Duration::from_secs(1),
                },
                StatusCode::REQUEST_TIMEOUT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from_transfer(&err).status, status, "{err:?}");
        }
    }

    #[test]
    fn path_escape_has_its_own_problem_type() {
        let err = ApiError::from_transfer(&TransferError::PathEscape {
            requested: "../secret.txt".into(),
        });
        assert_eq!(err.kind, PROBLEM_PATH_ESCAPE);
    }

    #[test]
    fn cancelled_before_head_reports_unavailable() {
        let err = ApiError::from_headless_outcome(&TransferOutcome::Cancelled { bytes: 0 });
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
