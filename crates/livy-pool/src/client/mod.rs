//! Remote session service client.
//!
//! [`SessionApi`] is the seam the factory, pool and session handle are
//! generic over; [`LivyClient`] is the HTTP implementation. Tests substitute
//! an in-memory implementation.

mod error;
mod http;
mod models;

use async_trait::async_trait;

pub use error::{ServiceError, ServiceResult};
pub use http::LivyClient;
pub use models::{
    CreateSessionRequest, Session, SessionList, SessionState, Statement, StatementKind,
    StatementOutput, StatementRequest, StatementState,
};

/// Operations the pool needs from a Livy-compatible session service.
///
/// Implementations must be safe for concurrent use by multiple pool workers.
#[async_trait]
pub trait SessionApi: Send + Sync + 'static {
    /// Create a new interactive session. Returns the session as initially
    /// reported, usually in `not_started` or `starting` state.
    async fn create_session(&self, request: &CreateSessionRequest) -> ServiceResult<Session>;

    /// Fetch a session by ID. `None` when the session no longer exists.
    async fn get_session(&self, id: i64) -> ServiceResult<Option<Session>>;

    /// List all sessions visible to this client.
    async fn list_sessions(&self) -> ServiceResult<SessionList>;

    /// Delete a session.
    async fn delete_session(&self, id: i64) -> ServiceResult<()>;

    /// Submit a statement; returns immediately with a non-terminal statement.
    async fn submit_statement(
        &self,
        session_id: i64,
        code: &str,
        kind: StatementKind,
    ) -> ServiceResult<Statement>;

    /// Fetch the current state of a statement.
    async fn get_statement(&self, session_id: i64, statement_id: i64) -> ServiceResult<Statement>;

    /// Request cancellation of a statement.
    async fn cancel_statement(&self, session_id: i64, statement_id: i64) -> ServiceResult<()>;
}
