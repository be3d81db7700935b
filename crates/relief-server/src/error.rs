//! Error types for the service surface.
//!
//! [`ApiError`] wraps a [`CoreError`] (or a request-shape problem caught
//! before the core is reached) and renders it as
//! `{"error": kind, "message": text, "status": code}` via its
//! [`IntoResponse`] implementation. [`UpstreamError`] covers the
//! geocoder and the official feeds.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relief_core::{CoreError, ErrorKind};

/// Errors returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A coordination-layer failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The request was malformed before reaching the core (bad path
    /// segment, unknown query key, unparsable number).
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    /// Stable classification of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
            Self::BadRequest(_) => ErrorKind::Validation,
        }
    }

    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        Self::Core(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "error": self.kind().as_str(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Failures talking to an upstream collaborator.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The request could not be sent or the body could not be read.
    #[error("{service} request failed: {source}")]
    Request {
        /// Upstream name.
        service: &'static str,
        /// The underlying transport error.
        source: reqwest::Error,
    },

    /// The upstream answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Status {
        /// Upstream name.
        service: &'static str,
        /// HTTP status received.
        status: reqwest::StatusCode,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response did not have the expected shape.
    #[error("{service} response parse failed: {detail}")]
    Parse {
        /// Upstream name.
        service: &'static str,
        /// What was wrong.
        detail: String,
    },
}

impl From<UpstreamError> for CoreError {
    fn from(err: UpstreamError) -> Self {
        Self::Upstream(err.to_string())
    }
}
