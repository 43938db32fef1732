//! Livy client error types.

use thiserror::Error;

/// Result type for remote service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from the remote session service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport failure or response decoding failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Api { status: u16, body: String },
}
