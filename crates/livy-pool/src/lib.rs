//! Bounded, fair pool of Apache Livy interactive sessions.
//!
//! Creating a remote interpreter session takes tens of seconds to minutes, so
//! this crate keeps a small number of them alive and lets concurrent callers
//! borrow a ready session, run statements on it, and return it for reuse.
//! Sessions that go bad are detected by re-querying their remote state and
//! are deleted and replaced; sessions past a maximum age are evicted by a
//! background sweep.
//!
//! ```no_run
//! use std::sync::Arc;
//! use livy_pool::{LivyClient, PoolConfig, SessionParams, SessionPool, StatementKind};
//!
//! # async fn run() -> Result<(), livy_pool::PoolError> {
//! let client = Arc::new(LivyClient::new("http://livy.example.com:8998"));
//! let pool = SessionPool::new(client, PoolConfig::default(), SessionParams::default()).await;
//!
//! let session = pool.borrow().await?;
//! let statement = session.execute("show databases", StatementKind::Sql).await?;
//! println!("{:?}", statement.output);
//! pool.give_back(session).await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod factory;
mod poll;
pub mod pool;
pub mod session;

pub use client::{
    CreateSessionRequest, LivyClient, ServiceError, Session, SessionApi, SessionList,
    SessionState, Statement, StatementKind, StatementOutput, StatementState,
};
pub use config::{PoolConfig, SessionParams};
pub use error::{PoolError, PoolResult};
pub use factory::SessionFactory;
pub use pool::{PoolStatus, PooledSession, SessionPool};
pub use session::SessionHandle;
