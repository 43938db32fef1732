//! Session lifecycle: create, validate, destroy, reattach.
//!
//! The factory is the only component that talks to the remote service on the
//! pool's behalf. "Wait until ready" lives here in one place, so a session
//! that is mid-startup when reattached or re-validated is handled identically
//! to one just created.

use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::{CreateSessionRequest, Session, SessionApi, SessionState};
use crate::config::{default_name_prefix, SessionParams};
use crate::error::{PoolError, PoolResult};
use crate::poll::{wait_until, WaitOutcome};

/// How often session state is re-queried while waiting for readiness.
pub(crate) const READINESS_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// How long a session may take to become idle before it is deleted.
pub(crate) const CREATE_SESSION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Creates, validates and destroys remote sessions for the pool.
pub struct SessionFactory<C> {
    client: Arc<C>,
    params: SessionParams,
    name_prefix: String,
    /// Sessions from a previous run of this process, reused before any new
    /// session is created. Shared by concurrent pool workers.
    reattach: Mutex<VecDeque<Session>>,
    cancel: CancellationToken,
}

impl<C: SessionApi> SessionFactory<C> {
    /// Build a factory, reattaching to any remote sessions whose name carries
    /// this instance's reserved prefix. A failed listing is logged and
    /// treated as "no reattachable sessions"; it never fails construction.
    pub async fn new(client: Arc<C>, params: SessionParams, cancel: CancellationToken) -> Self {
        let name_prefix = params
            .name_prefix
            .clone()
            .unwrap_or_else(default_name_prefix);

        let reattach = match client.list_sessions().await {
            Ok(list) => {
                let sessions: VecDeque<Session> = list
                    .sessions
                    .into_iter()
                    .filter(|s| {
                        s.name
                            .as_deref()
                            .is_some_and(|name| name.starts_with(&name_prefix))
                    })
                    .collect();
                if !sessions.is_empty() {
                    info!("reattaching to {} existing session(s)", sessions.len());
                }
                sessions
            }
            Err(err) => {
                error!("listing existing sessions failed, starting empty: {}", err);
                VecDeque::new()
            }
        };

        Self {
            client,
            params,
            name_prefix,
            reattach: Mutex::new(reattach),
            cancel,
        }
    }

    /// The reserved name prefix in effect for this factory.
    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Produce a ready session: a reattached one if any remain, otherwise a
    /// freshly created one polled until idle. Every failure path deletes the
    /// partially created session before the error is raised.
    pub async fn create(&self) -> PoolResult<Session> {
        if let Some(session) = self.reattach.lock().await.pop_front() {
            info!("reusing session {} from a previous run", session.id);
            return Ok(session);
        }

        let request = CreateSessionRequest {
            proxy_user: self.params.proxy_user.clone(),
            driver_memory: self.params.driver_memory.clone(),
            driver_cores: self.params.driver_cores,
            executor_memory: self.params.executor_memory.clone(),
            executor_cores: self.params.executor_cores,
            num_executors: self.params.num_executors,
            queue: self.params.queue.clone(),
            name: format!("{}{}", self.name_prefix, Uuid::new_v4()),
            heartbeat_timeout_in_second: self.params.heartbeat_timeout.as_secs(),
        };
        let created = self.client.create_session(&request).await?;
        info!("created session {}, waiting for it to become idle", created.id);

        match self.await_ready(created.id).await {
            Ok(session) => Ok(session),
            Err(err) => {
                if !matches!(err, PoolError::SessionNotFound { .. }) {
                    self.try_delete(created.id).await;
                }
                Err(err)
            }
        }
    }

    /// Re-query remote state and decide whether the session is still good.
    ///
    /// A usable state passes. A starting session enters the same readiness
    /// poll as creation and passes if it reaches idle. Everything else is
    /// invalid: unusable states are deleted first, a no-longer-existing
    /// session is not (nothing to delete), and any transport error is
    /// fail-closed invalid.
    pub async fn validate(&self, session: &Session) -> bool {
        let current = match self.client.get_session(session.id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                error!("validate: session {} no longer exists", session.id);
                return false;
            }
            Err(err) => {
                error!("validate: fetching session {} failed: {}", session.id, err);
                return false;
            }
        };

        if current.state.is_usable() {
            debug!("validate: session {} is {}", session.id, current.state);
            return true;
        }

        if current.state.is_pending() {
            return match self.await_ready(session.id).await {
                Ok(_) => true,
                Err(err) => {
                    error!("validate: session {} never became idle: {}", session.id, err);
                    if matches!(
                        err,
                        PoolError::CreationTimeout { .. } | PoolError::StartupFailed { .. }
                    ) {
                        self.try_delete(session.id).await;
                    }
                    false
                }
            };
        }

        error!(
            "validate: session {} is in state {}, discarding",
            session.id, current.state
        );
        self.try_delete(session.id).await;
        false
    }

    /// Delete the remote session. The outcome is logged; transport failures
    /// propagate to the caller.
    pub async fn destroy(&self, session: &Session) -> PoolResult<()> {
        self.client.delete_session(session.id).await?;
        info!("deleted session {}", session.id);
        Ok(())
    }

    /// Poll session state every [`READINESS_POLL_INTERVAL`] until it reaches
    /// idle, leaves `{starting, idle}`, times out, or the pool shuts down.
    /// Does not delete on failure; each caller decides what cleanup its path
    /// needs.
    async fn await_ready(&self, id: i64) -> PoolResult<Session> {
        let outcome = wait_until(
            READINESS_POLL_INTERVAL,
            CREATE_SESSION_TIMEOUT,
            &self.cancel,
            || {
                let client = Arc::clone(&self.client);
                async move {
                    match client.get_session(id).await.map_err(PoolError::from)? {
                        Some(s) if s.state == SessionState::Idle => Ok(Some(s)),
                        Some(s) if s.state.is_pending() => {
                            debug!("waiting for session {} to become idle", id);
                            Ok(None)
                        }
                        Some(s) => Err(PoolError::StartupFailed {
                            id,
                            state: s.state,
                        }),
                        None => Err(PoolError::SessionNotFound { id }),
                    }
                }
            },
        )
        .await?;

        match outcome {
            WaitOutcome::Ready(session) => Ok(session),
            WaitOutcome::TimedOut => {
                error!(
                    "session {} did not become idle within {:?}",
                    id, CREATE_SESSION_TIMEOUT
                );
                Err(PoolError::CreationTimeout { id })
            }
            WaitOutcome::Cancelled => Err(PoolError::Closed),
        }
    }

    async fn try_delete(&self, id: i64) {
        if let Err(err) = self.client.delete_session(id).await {
            warn!("failed to delete session {}: {}", id, err);
        } else {
            info!("deleted session {}", id);
        }
    }
}
