//! Handle to a borrowed session: statement submission and synchronous
//! execution.

use log::{debug, error};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::client::{Session, SessionApi, Statement, StatementKind};
use crate::error::{PoolError, PoolResult};
use crate::poll::{wait_until, WaitOutcome};
use crate::pool::PooledSession;

/// How often statement state is re-queried while waiting for completion.
pub(crate) const STATEMENT_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Overall bound on a synchronous statement execution.
pub(crate) const QUERY_TIMEOUT: Duration = Duration::from_secs(2 * 3600);

/// A borrowed session. Exclusively owned by one borrower between
/// [`SessionPool::borrow`](crate::pool::SessionPool::borrow) and
/// [`SessionPool::give_back`](crate::pool::SessionPool::give_back).
pub struct SessionHandle<C: SessionApi> {
    pooled: PooledSession,
    client: Arc<C>,
    cancel: CancellationToken,
}

impl<C: SessionApi> SessionHandle<C> {
    pub(crate) fn new(pooled: PooledSession, client: Arc<C>, cancel: CancellationToken) -> Self {
        Self {
            pooled,
            client,
            cancel,
        }
    }

    /// Remote session ID.
    pub fn id(&self) -> i64 {
        self.pooled.session.id
    }

    /// The session as last reported by the server.
    pub fn session(&self) -> &Session {
        self.pooled.session()
    }

    /// Submit a statement and return immediately with its non-terminal form.
    pub async fn submit(&self, code: &str, kind: StatementKind) -> PoolResult<Statement> {
        let statement = self.client.submit_statement(self.id(), code, kind).await?;
        debug!("submitted statement {} on session {}", statement.id, self.id());
        Ok(statement)
    }

    /// Submit a statement and poll until it reaches a terminal state, bounded
    /// by [`QUERY_TIMEOUT`]. A statement that terminates in `error` state is
    /// a successful result, not an `Err`. On timeout the statement is left
    /// outstanding remotely; no cancel is attempted.
    pub async fn execute(&self, code: &str, kind: StatementKind) -> PoolResult<Statement> {
        let statement = self.submit(code, kind).await?;
        let session_id = self.id();
        let statement_id = statement.id;

        let outcome = wait_until(
            STATEMENT_POLL_INTERVAL,
            QUERY_TIMEOUT,
            &self.cancel,
            || {
                let client = Arc::clone(&self.client);
                async move {
                    let current = client
                        .get_statement(session_id, statement_id)
                        .await
                        .map_err(PoolError::from)?;
                    Ok::<_, PoolError>(current.state.is_terminal().then_some(current))
                }
            },
        )
        .await?;

        match outcome {
            WaitOutcome::Ready(statement) => Ok(statement),
            WaitOutcome::TimedOut => {
                error!(
                    "statement {} on session {} still running after {:?}",
                    statement_id, session_id, QUERY_TIMEOUT
                );
                Err(PoolError::ExecutionTimeout {
                    session_id,
                    statement_id,
                    waited: QUERY_TIMEOUT,
                })
            }
            WaitOutcome::Cancelled => Err(PoolError::Closed),
        }
    }

    /// Fetch the current state of a statement on this session.
    pub async fn get_statement(&self, statement_id: i64) -> PoolResult<Statement> {
        Ok(self.client.get_statement(self.id(), statement_id).await?)
    }

    /// Request cancellation of a statement. One remote call, no polling.
    pub async fn cancel(&self, statement_id: i64) -> PoolResult<()> {
        Ok(self.client.cancel_statement(self.id(), statement_id).await?)
    }

    /// Run the fixed probe statement used to exercise a session end to end.
    pub async fn smoke_test(&self) -> PoolResult<Statement> {
        self.execute("show databases", StatementKind::Sql).await
    }

    pub(crate) fn into_pooled(self) -> PooledSession {
        self.pooled
    }
}
