//! API error type and ClusterError → HTTP status mapping.

use super::response;
use crate::error::ClusterError;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// API error with HTTP status code.
#[derive(Debug)]
pub struct ApiError {
    /// Human-readable error message.
    pub message: String,
    /// HTTP status code.
    pub status: StatusCode,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    /// Prefix the message, keeping the status.
    pub fn context(mut self, prefix: &str) -> Self {
        self.message = format!("{}{}", prefix, self.message);
        self
    }

    /// Convert to HTTP response.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        response::error(self.status, self.message)
    }
}

impl From<ClusterError> for ApiError {
    fn from(err: ClusterError) -> Self {
        let status = match &err {
            // 400 Bad Request
            ClusterError::Validation(_) => StatusCode::BAD_REQUEST,

            // 503 Service Unavailable (the cluster could not take the change right now)
            ClusterError::Replication(_)
            | ClusterError::NotLeader { .. }
            | ClusterError::Timeout { .. }
            | ClusterError::Membership(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error (everything else)
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            message: err.to_string(),
            status,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for ApiError {}
