//! Data models for the Livy REST API.
//!
//! Field names follow the wire format documented at
//! <https://livy.incubator.apache.org/docs/latest/rest-api.html>.

use serde::{Deserialize, Serialize};

/// Remote-reported state of an interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session has not been started yet.
    NotStarted,
    /// Session is starting up.
    Starting,
    /// Session is idle and ready to accept statements.
    Idle,
    /// Session is executing a statement.
    Busy,
    /// Session is shutting down.
    ShuttingDown,
    /// Session errored out.
    Error,
    /// Session exited unexpectedly.
    Dead,
    /// Session was killed.
    Killed,
    /// Session finished successfully.
    Success,
}

impl SessionState {
    /// Whether a session in this state can accept or is processing work.
    pub fn is_usable(self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Busy | SessionState::Success
        )
    }

    /// Whether the session is still coming up and worth waiting on.
    pub fn is_pending(self) -> bool {
        matches!(self, SessionState::Starting)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::NotStarted => "not_started",
            SessionState::Starting => "starting",
            SessionState::Idle => "idle",
            SessionState::Busy => "busy",
            SessionState::ShuttingDown => "shutting_down",
            SessionState::Error => "error",
            SessionState::Dead => "dead",
            SessionState::Killed => "killed",
            SessionState::Success => "success",
        };
        write!(f, "{}", s)
    }
}

/// An interactive session as reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Server-assigned session ID.
    pub id: i64,
    /// YARN application ID, once the session has one.
    #[serde(default)]
    pub app_id: Option<String>,
    /// User the session runs as.
    #[serde(default)]
    pub owner: Option<String>,
    /// User the session was started on behalf of.
    #[serde(default)]
    pub proxy_user: Option<String>,
    /// Caller-assigned session name. Pool-managed sessions carry the
    /// reserved name prefix.
    #[serde(default)]
    pub name: Option<String>,
    /// Current session state.
    pub state: SessionState,
}

/// Response of the list-sessions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionList {
    #[serde(default)]
    pub from: i64,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// Remote-reported state of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementState {
    /// Queued behind other statements.
    Waiting,
    /// Currently executing.
    Running,
    /// Finished; output is available.
    Available,
    /// Failed.
    Error,
    /// Cancellation requested.
    Cancelling,
    /// Cancelled.
    Cancelled,
}

impl StatementState {
    /// Whether the statement has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        !matches!(self, StatementState::Waiting | StatementState::Running)
    }
}

impl std::fmt::Display for StatementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatementState::Waiting => "waiting",
            StatementState::Running => "running",
            StatementState::Available => "available",
            StatementState::Error => "error",
            StatementState::Cancelling => "cancelling",
            StatementState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Terminal output of a statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementOutput {
    /// `"ok"` or `"error"`.
    pub status: String,
    #[serde(default)]
    pub execution_count: Option<i64>,
    /// Result payload, keyed by MIME type (e.g. `"text/plain"`).
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Error class name, when `status` is `"error"`.
    #[serde(default)]
    pub ename: Option<String>,
    /// Error value, when `status` is `"error"`.
    #[serde(default)]
    pub evalue: Option<String>,
    #[serde(default)]
    pub traceback: Option<Vec<String>>,
}

/// One unit of code submitted for execution within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub id: i64,
    pub state: StatementState,
    #[serde(default)]
    pub output: Option<StatementOutput>,
    /// Execution progress, 0.0 to 1.0.
    #[serde(default)]
    pub progress: f64,
    /// Start timestamp in epoch milliseconds, 0 if not started.
    #[serde(default)]
    pub started: i64,
    /// Completion timestamp in epoch milliseconds, 0 if not completed.
    #[serde(default)]
    pub completed: i64,
}

/// Interpreter kind for a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Spark,
    PySpark,
    SparkR,
    Sql,
}

/// Request body for creating a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_user: Option<String>,
    pub driver_memory: String,
    pub driver_cores: u32,
    pub executor_memory: String,
    pub executor_cores: u32,
    pub num_executors: u32,
    pub queue: String,
    /// Unique name under the pool's reserved prefix.
    pub name: String,
    pub heartbeat_timeout_in_second: u64,
}

/// Request body for submitting a statement.
#[derive(Debug, Clone, Serialize)]
pub struct StatementRequest {
    pub code: String,
    pub kind: StatementKind,
}
