//! Pool-facing error types.

use std::time::Duration;
use thiserror::Error;

use crate::client::{ServiceError, SessionState};

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The remote service failed or answered with a non-success status.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// No session became available within `max_wait`.
    #[error("no session became available within {waited:?}")]
    Exhausted { waited: Duration },

    /// A session did not become idle within the creation timeout. The
    /// partially created session has been deleted.
    #[error("session {id} did not become idle within the creation timeout")]
    CreationTimeout { id: i64 },

    /// A session left the starting state for an unusable one.
    #[error("session {id} entered state {state} while starting")]
    StartupFailed { id: i64, state: SessionState },

    /// A session disappeared from the server while being waited on.
    #[error("session {id} no longer exists")]
    SessionNotFound { id: i64 },

    /// A statement was still running when the query timeout elapsed. The
    /// statement is left outstanding remotely.
    #[error("statement {statement_id} on session {session_id} still running after {waited:?}")]
    ExecutionTimeout {
        session_id: i64,
        statement_id: i64,
        waited: Duration,
    },

    /// The pool has been closed.
    #[error("pool is closed")]
    Closed,
}
