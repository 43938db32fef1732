//! Bounded, fair, blocking session pool.
//!
//! The pool bounds concurrent access with explicit bookkeeping rather than a
//! generic pool library: one mutex-guarded state block holding the FIFO idle
//! list, the active and in-creation counts, and the ordered queue of blocked
//! borrowers. The invariant `idle + active + creating <= max_total` holds at
//! all times, and the lock is never held across a remote call.

mod eviction;

pub use eviction::should_evict;

use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::{Session, SessionApi};
use crate::config::{PoolConfig, SessionParams};
use crate::error::{PoolError, PoolResult};
use crate::factory::SessionFactory;
use crate::session::SessionHandle;

/// A session wrapped with the pool-local bookkeeping the eviction policy
/// needs. `created_at` is recorded when the wrapper is first materialized
/// (at creation or reattachment), not when the remote session started.
#[derive(Debug, Clone)]
pub struct PooledSession {
    pub(crate) session: Session,
    pub(crate) created_at: Instant,
}

impl PooledSession {
    fn new(session: Session) -> Self {
        Self {
            session,
            created_at: Instant::now(),
        }
    }

    /// The remote session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Time since this wrapper was first materialized.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// A blocked borrower. Receives a session directly on handoff; a dropped
/// sender nudges it to re-run its acquire step.
struct Waiter {
    id: u64,
    tx: oneshot::Sender<PooledSession>,
}

struct PoolState {
    idle: VecDeque<PooledSession>,
    active: usize,
    creating: usize,
    waiters: VecDeque<Waiter>,
    closed: bool,
}

impl PoolState {
    fn total(&self) -> usize {
        self.idle.len() + self.active + self.creating
    }
}

/// Counts of sessions by pool slot state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub active: usize,
    pub creating: usize,
}

/// Bounded, fair, blocking pool of remote sessions.
///
/// Handles are cheap clones of one shared pool. Dropping the last handle
/// stops the background sweep and interrupts in-flight waits, but only
/// [`close`](SessionPool::close) deletes the pooled sessions remotely.
pub struct SessionPool<C: SessionApi> {
    inner: Arc<PoolInner<C>>,
}

impl<C: SessionApi> Clone for SessionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PoolInner<C: SessionApi> {
    factory: SessionFactory<C>,
    client: Arc<C>,
    config: PoolConfig,
    state: Mutex<PoolState>,
    cancel: CancellationToken,
    waiter_seq: AtomicU64,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<C: SessionApi> Drop for PoolInner<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Acquire {
    Take(PooledSession),
    Create,
    Wait { id: u64, rx: oneshot::Receiver<PooledSession> },
}

impl<C: SessionApi> SessionPool<C> {
    /// Build a pool and start its eviction sweep. Reattaches to sessions
    /// left over from a previous run of this process (see
    /// [`SessionFactory::new`]).
    pub async fn new(client: Arc<C>, config: PoolConfig, params: SessionParams) -> Self {
        let cancel = CancellationToken::new();
        let factory = SessionFactory::new(Arc::clone(&client), params, cancel.child_token()).await;
        let inner = Arc::new(PoolInner {
            factory,
            client,
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                active: 0,
                creating: 0,
                waiters: VecDeque::new(),
                closed: false,
            }),
            cancel,
            waiter_seq: AtomicU64::new(0),
            sweeper: Mutex::new(None),
        });

        let sweeper = tokio::spawn(sweep_loop(
            inner.config.eviction_check_interval,
            inner.cancel.clone(),
            Arc::downgrade(&inner),
        ));
        *inner.sweeper.lock().await = Some(sweeper);

        Self { inner }
    }

    /// Borrow a session, blocking up to `max_wait` when the pool is at
    /// capacity. Idle sessions are preferred; below `max_total` a new one is
    /// created. Sessions that fail borrow validation are deleted and the
    /// acquire is retried.
    pub async fn borrow(&self) -> PoolResult<SessionHandle<C>> {
        let start = Instant::now();
        let deadline = start + self.inner.config.max_wait;
        let mut waiter_id: Option<u64> = None;

        loop {
            let acquire = {
                let mut state = self.inner.state.lock().await;
                if state.closed {
                    return Err(PoolError::Closed);
                }
                if let Some(pooled) = state.idle.pop_front() {
                    state.active += 1;
                    Acquire::Take(pooled)
                } else if state.total() < self.inner.config.max_total {
                    state.creating += 1;
                    Acquire::Create
                } else {
                    let (tx, rx) = oneshot::channel();
                    // a borrower re-entering the queue after a nudge keeps
                    // its first-arrival id; ids are monotonic, so sorted
                    // insertion keeps the queue ordered by arrival
                    let id = *waiter_id.get_or_insert_with(|| {
                        self.inner.waiter_seq.fetch_add(1, Ordering::Relaxed)
                    });
                    let at = state.waiters.partition_point(|w| w.id < id);
                    state.waiters.insert(at, Waiter { id, tx });
                    Acquire::Wait { id, rx }
                }
            };

            match acquire {
                Acquire::Take(pooled) => {
                    if let Some(handle) = self.checked_handle(pooled).await {
                        return Ok(handle);
                    }
                }
                Acquire::Create => match self.inner.factory.create().await {
                    Ok(session) => {
                        let pooled = PooledSession::new(session);
                        // validate already deleted the remote session on failure
                        if self.inner.config.test_on_create
                            && !self.inner.factory.validate(&pooled.session).await
                        {
                            warn!(
                                "new session {} failed validation, discarding",
                                pooled.session.id
                            );
                            self.inner.release_creating().await;
                            continue;
                        }
                        let mut state = self.inner.state.lock().await;
                        state.creating -= 1;
                        state.active += 1;
                        drop(state);
                        return Ok(self.make_handle(pooled));
                    }
                    Err(err) => {
                        self.inner.release_creating().await;
                        return Err(err);
                    }
                },
                Acquire::Wait { id, mut rx } => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match timeout(remaining, &mut rx).await {
                        Ok(Ok(pooled)) => {
                            // handed off by a returner; counted active already
                            if let Some(handle) = self.checked_handle(pooled).await {
                                return Ok(handle);
                            }
                        }
                        // nudged: capacity or an idle session freed up
                        Ok(Err(_)) => continue,
                        Err(_) => {
                            let mut state = self.inner.state.lock().await;
                            let pos = state.waiters.iter().position(|w| w.id == id);
                            if let Some(pos) = pos {
                                state.waiters.remove(pos);
                            }
                            drop(state);
                            if pos.is_none() {
                                // a handoff raced our timeout; take it anyway
                                if let Ok(pooled) = rx.try_recv() {
                                    if let Some(handle) = self.checked_handle(pooled).await {
                                        return Ok(handle);
                                    }
                                    continue;
                                }
                            }
                            return Err(PoolError::Exhausted {
                                waited: start.elapsed(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Return a borrowed session. Handed directly to the longest-blocked
    /// borrower when one is waiting; deleted when the idle set is full or
    /// the pool is closed; otherwise pooled as idle.
    pub async fn give_back(&self, handle: SessionHandle<C>) {
        let pooled = handle.into_pooled();

        let closed = self.inner.state.lock().await.closed;
        if closed {
            self.inner.release_active().await;
            self.inner.destroy_logged(&pooled.session).await;
            return;
        }

        // validate already deleted the remote session on failure
        if self.inner.config.test_while_idle
            && !self.inner.factory.validate(&pooled.session).await
        {
            warn!(
                "returned session {} failed validation, discarding",
                pooled.session.id
            );
            self.inner.release_active().await;
            return;
        }

        self.inner.repool(pooled).await;
    }

    /// Warm the pool up to `count` idle sessions, bounded by `max_idle` and
    /// `max_total`. Stops at the first creation failure.
    pub async fn prepare(&self, count: usize) -> PoolResult<()> {
        loop {
            {
                let mut state = self.inner.state.lock().await;
                if state.closed {
                    return Err(PoolError::Closed);
                }
                if state.idle.len() >= count
                    || state.idle.len() >= self.inner.config.max_idle
                    || state.total() >= self.inner.config.max_total
                {
                    return Ok(());
                }
                state.creating += 1;
            }
            match self.inner.factory.create().await {
                Ok(session) => {
                    let pooled = PooledSession::new(session);
                    let mut state = self.inner.state.lock().await;
                    state.creating -= 1;
                    if state.closed {
                        drop(state);
                        self.inner.destroy_logged(&pooled.session).await;
                        return Err(PoolError::Closed);
                    }
                    state.idle.push_back(pooled);
                    drop(state);
                    self.inner.nudge_one_waiter().await;
                }
                Err(err) => {
                    self.inner.release_creating().await;
                    return Err(err);
                }
            }
        }
    }

    /// Current counts. Point-in-time snapshot, for observability and tests.
    pub async fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock().await;
        PoolStatus {
            idle: state.idle.len(),
            active: state.active,
            creating: state.creating,
        }
    }

    /// Close the pool: stop the eviction sweep, wake every blocked borrower,
    /// delete all idle sessions. Sessions still borrowed are deleted when
    /// returned. Idempotent.
    pub async fn close(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return;
            }
            state.closed = true;
            // dropping the senders wakes every blocked borrower; each then
            // observes the closed flag and fails with Closed
            state.waiters.clear();
        }
        self.inner.cancel.cancel();
        if let Some(sweeper) = self.inner.sweeper.lock().await.take() {
            let _ = sweeper.await;
        }
        loop {
            let pooled = self.inner.state.lock().await.idle.pop_front();
            match pooled {
                Some(pooled) => self.inner.destroy_logged(&pooled.session).await,
                None => break,
            }
        }
        info!("session pool closed");
    }

    /// Validate-on-borrow wrapper. On failure the remote session has already
    /// been deleted by validation; reports `None` so the caller retries.
    async fn checked_handle(&self, pooled: PooledSession) -> Option<SessionHandle<C>> {
        if self.inner.config.test_on_borrow
            && !self.inner.factory.validate(&pooled.session).await
        {
            warn!(
                "session {} failed borrow validation, discarding",
                pooled.session.id
            );
            self.inner.release_active().await;
            return None;
        }
        Some(self.make_handle(pooled))
    }

    fn make_handle(&self, pooled: PooledSession) -> SessionHandle<C> {
        SessionHandle::new(
            pooled,
            Arc::clone(&self.inner.client),
            self.inner.cancel.child_token(),
        )
    }
}

impl<C: SessionApi> PoolInner<C> {
    /// Hand a returned session to a blocked borrower, pool it as idle, or
    /// delete it when the idle set is already full.
    async fn repool(&self, mut pooled: PooledSession) {
        enum Fate {
            Pooled,
            IdleFull(PooledSession),
            Closed(PooledSession),
        }

        let fate = {
            let mut state = self.state.lock().await;
            if state.closed {
                state.active -= 1;
                Fate::Closed(pooled)
            } else {
                loop {
                    match Self::pop_waiter(&mut state, self.config.fairness) {
                        Some(waiter) => match waiter.tx.send(pooled) {
                            // ownership moved; the session stays active
                            Ok(()) => return,
                            // that borrower gave up; try the next one
                            Err(rejected) => pooled = rejected,
                        },
                        None => break,
                    }
                }
                state.active -= 1;
                if state.idle.len() >= self.config.max_idle {
                    Fate::IdleFull(pooled)
                } else {
                    state.idle.push_back(pooled);
                    Fate::Pooled
                }
            }
        };

        match fate {
            Fate::Pooled => {}
            Fate::IdleFull(pooled) => {
                debug!(
                    "idle set full, deleting returned session {}",
                    pooled.session.id
                );
                self.destroy_logged(&pooled.session).await;
                self.nudge_one_waiter().await;
            }
            Fate::Closed(pooled) => {
                self.destroy_logged(&pooled.session).await;
            }
        }
    }

    fn pop_waiter(state: &mut PoolState, fairness: bool) -> Option<Waiter> {
        if fairness {
            state.waiters.pop_front()
        } else {
            state.waiters.pop_back()
        }
    }

    /// Release an active slot and nudge one blocked borrower to retry.
    async fn release_active(&self) {
        let mut state = self.state.lock().await;
        state.active -= 1;
        drop(state);
        self.nudge_one_waiter().await;
    }

    /// Release an in-creation slot and nudge one blocked borrower to retry.
    async fn release_creating(&self) {
        let mut state = self.state.lock().await;
        state.creating -= 1;
        drop(state);
        self.nudge_one_waiter().await;
    }

    /// Wake one blocked borrower without a session: dropping its sender makes
    /// its receive fail, which sends it back through the acquire step.
    async fn nudge_one_waiter(&self) {
        let mut state = self.state.lock().await;
        while let Some(waiter) = Self::pop_waiter(&mut state, self.config.fairness) {
            if !waiter.tx.is_closed() {
                break;
            }
        }
    }

    async fn destroy_logged(&self, session: &Session) {
        if let Err(err) = self.factory.destroy(session).await {
            warn!("failed to delete session {}: {}", session.id, err);
        }
    }

    /// One eviction pass: atomically pull every over-age idle session out of
    /// the idle set, then delete them. With `test_while_idle`, also
    /// re-validate the remaining idle sessions.
    async fn sweep_once(&self) {
        let evicted: Vec<PooledSession> = {
            let mut state = self.state.lock().await;
            let idle_count = state.idle.len();
            let mut keep = VecDeque::with_capacity(idle_count);
            let mut out = Vec::new();
            while let Some(pooled) = state.idle.pop_front() {
                if eviction::should_evict(&pooled, idle_count, &self.config) {
                    out.push(pooled);
                } else {
                    keep.push_back(pooled);
                }
            }
            state.idle = keep;
            out
        };

        for pooled in evicted {
            info!(
                "evicting session {} (age {:?})",
                pooled.session.id,
                pooled.age()
            );
            self.destroy_logged(&pooled.session).await;
            self.nudge_one_waiter().await;
        }

        if self.config.test_while_idle {
            self.validate_idle().await;
        }
    }

    /// Validate each idle session against the remote service. A session under
    /// validation is removed from the idle set (a concurrent borrow cannot
    /// take it) and its slot is reserved via the creating count so the total
    /// bound holds.
    async fn validate_idle(&self) {
        let rounds = self.state.lock().await.idle.len();
        for _ in 0..rounds {
            let pooled = {
                let mut state = self.state.lock().await;
                match state.idle.pop_front() {
                    Some(pooled) => {
                        state.creating += 1;
                        pooled
                    }
                    None => break,
                }
            };

            if self.factory.validate(&pooled.session).await {
                let mut state = self.state.lock().await;
                state.creating -= 1;
                if state.closed {
                    drop(state);
                    self.destroy_logged(&pooled.session).await;
                    break;
                }
                state.idle.push_back(pooled);
                drop(state);
                self.nudge_one_waiter().await;
            } else {
                // validate already deleted the remote session
                warn!(
                    "idle session {} failed validation, discarding",
                    pooled.session.id
                );
                self.release_creating().await;
            }
        }
    }
}

/// Background eviction sweep; exits when the pool's token is cancelled or
/// every pool handle is gone. Holds only a weak reference so an unclosed,
/// dropped pool is not kept alive by its own sweeper.
async fn sweep_loop<C: SessionApi>(
    period: Duration,
    cancel: CancellationToken,
    inner: Weak<PoolInner<C>>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick of an interval completes immediately
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => return,
        }
        let Some(inner) = inner.upgrade() else { return };
        inner.sweep_once().await;
    }
}
