//! Scripted in-memory session service for pool tests.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

use livy_pool::{
    CreateSessionRequest, ServiceError, Session, SessionApi, SessionList, SessionState, Statement,
    StatementKind, StatementOutput, StatementState,
};

/// Initialize test logging once; later calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A session whose successive `get_session` answers follow a script; the
/// last state repeats forever.
struct ScriptedSession {
    name: Option<String>,
    states: Vec<SessionState>,
    cursor: usize,
}

impl ScriptedSession {
    fn current(&self) -> SessionState {
        self.states[self.cursor.min(self.states.len() - 1)]
    }

    fn advance(&mut self) -> SessionState {
        let state = self.current();
        self.cursor += 1;
        state
    }
}

struct ScriptedStatement {
    states: Vec<StatementState>,
    cursor: usize,
}

struct MockState {
    next_session_id: i64,
    next_statement_id: i64,
    sessions: HashMap<i64, ScriptedSession>,
    /// IDs reported by `list_sessions`, in insertion order.
    listed: Vec<i64>,
    /// Script applied to sessions made through `create_session`.
    create_script: Vec<SessionState>,
    /// Script applied to newly submitted statements.
    statement_script: Vec<StatementState>,
    statements: HashMap<(i64, i64), ScriptedStatement>,
    list_fails: bool,
    create_fails: bool,
    create_calls: usize,
    deleted: Vec<i64>,
    cancelled: Vec<(i64, i64)>,
    live: usize,
    max_live: usize,
}

/// In-memory [`SessionApi`] with scriptable behavior and call accounting.
pub struct MockLivy {
    state: Mutex<MockState>,
}

#[allow(dead_code)]
impl MockLivy {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_session_id: 0,
                next_statement_id: 0,
                sessions: HashMap::new(),
                listed: Vec::new(),
                create_script: vec![SessionState::Starting, SessionState::Idle],
                statement_script: vec![StatementState::Available],
                statements: HashMap::new(),
                list_fails: false,
                create_fails: false,
                create_calls: 0,
                deleted: Vec::new(),
                cancelled: Vec::new(),
                live: 0,
                max_live: 0,
            }),
        }
    }

    /// Register a pre-existing session that `list_sessions` will report.
    pub fn add_existing(&self, name: &str, state: SessionState) -> i64 {
        let mut mock = self.state.lock().unwrap();
        let id = mock.next_session_id;
        mock.next_session_id += 1;
        mock.sessions.insert(
            id,
            ScriptedSession {
                name: Some(name.to_string()),
                states: vec![state],
                cursor: 0,
            },
        );
        mock.listed.push(id);
        mock.live += 1;
        mock.max_live = mock.max_live.max(mock.live);
        id
    }

    /// Override the remaining `get_session` answers for one session.
    pub fn set_session_states(&self, id: i64, states: Vec<SessionState>) {
        let mut mock = self.state.lock().unwrap();
        let scripted = mock.sessions.get_mut(&id).expect("unknown session");
        scripted.states = states;
        scripted.cursor = 0;
    }

    /// Script applied to every session created from now on.
    pub fn set_create_script(&self, states: Vec<SessionState>) {
        self.state.lock().unwrap().create_script = states;
    }

    /// Script applied to every statement submitted from now on.
    pub fn set_statement_script(&self, states: Vec<StatementState>) {
        self.state.lock().unwrap().statement_script = states;
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.lock().unwrap().create_fails = fail;
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.lock().unwrap().list_fails = fail;
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    /// Every session ID a delete call was issued for, in order.
    pub fn deleted(&self) -> Vec<i64> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn cancelled(&self) -> Vec<(i64, i64)> {
        self.state.lock().unwrap().cancelled.clone()
    }

    /// Highest number of sessions alive at any one time.
    pub fn max_live(&self) -> usize {
        self.state.lock().unwrap().max_live
    }

    /// Snapshot of a session's model without advancing its script.
    pub fn session_snapshot(&self, id: i64) -> Session {
        let mock = self.state.lock().unwrap();
        let scripted = mock.sessions.get(&id).expect("unknown session");
        Self::session_model(id, scripted, scripted.current())
    }

    /// Drop a session server-side without recording a delete call.
    pub fn remove_session(&self, id: i64) {
        let mut mock = self.state.lock().unwrap();
        if mock.sessions.remove(&id).is_some() {
            mock.live -= 1;
        }
    }

    fn session_model(id: i64, scripted: &ScriptedSession, state: SessionState) -> Session {
        Session {
            id,
            app_id: None,
            owner: None,
            proxy_user: None,
            name: scripted.name.clone(),
            state,
        }
    }

    fn output_for(state: StatementState) -> Option<StatementOutput> {
        match state {
            StatementState::Available => Some(StatementOutput {
                status: "ok".to_string(),
                execution_count: Some(1),
                data: Some(json!({ "text/plain": "ok" })),
                ename: None,
                evalue: None,
                traceback: None,
            }),
            StatementState::Error => Some(StatementOutput {
                status: "error".to_string(),
                execution_count: Some(1),
                data: None,
                ename: Some("AnalysisException".to_string()),
                evalue: Some("boom".to_string()),
                traceback: Some(Vec::new()),
            }),
            _ => None,
        }
    }

    fn server_error() -> ServiceError {
        ServiceError::Api {
            status: 500,
            body: "internal server error".to_string(),
        }
    }
}

#[async_trait]
impl SessionApi for MockLivy {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<Session, ServiceError> {
        let mut mock = self.state.lock().unwrap();
        mock.create_calls += 1;
        if mock.create_fails {
            return Err(Self::server_error());
        }
        let id = mock.next_session_id;
        mock.next_session_id += 1;
        let scripted = ScriptedSession {
            name: Some(request.name.clone()),
            states: mock.create_script.clone(),
            cursor: 0,
        };
        let session = Self::session_model(id, &scripted, SessionState::Starting);
        mock.sessions.insert(id, scripted);
        mock.live += 1;
        mock.max_live = mock.max_live.max(mock.live);
        Ok(session)
    }

    async fn get_session(&self, id: i64) -> Result<Option<Session>, ServiceError> {
        let mut mock = self.state.lock().unwrap();
        match mock.sessions.get_mut(&id) {
            Some(scripted) => {
                let state = scripted.advance();
                let session = Self::session_model(id, scripted, state);
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn list_sessions(&self) -> Result<SessionList, ServiceError> {
        let mock = self.state.lock().unwrap();
        if mock.list_fails {
            return Err(Self::server_error());
        }
        let sessions: Vec<Session> = mock
            .listed
            .iter()
            .filter_map(|id| {
                mock.sessions
                    .get(id)
                    .map(|scripted| Self::session_model(*id, scripted, scripted.current()))
            })
            .collect();
        Ok(SessionList {
            from: 0,
            total: sessions.len() as i64,
            sessions,
        })
    }

    async fn delete_session(&self, id: i64) -> Result<(), ServiceError> {
        let mut mock = self.state.lock().unwrap();
        mock.deleted.push(id);
        if mock.sessions.remove(&id).is_some() {
            mock.live -= 1;
            Ok(())
        } else {
            Err(ServiceError::Api {
                status: 404,
                body: "session not found".to_string(),
            })
        }
    }

    async fn submit_statement(
        &self,
        session_id: i64,
        _code: &str,
        _kind: StatementKind,
    ) -> Result<Statement, ServiceError> {
        let mut mock = self.state.lock().unwrap();
        if !mock.sessions.contains_key(&session_id) {
            return Err(Self::server_error());
        }
        let id = mock.next_statement_id;
        mock.next_statement_id += 1;
        let states = mock.statement_script.clone();
        mock.statements
            .insert((session_id, id), ScriptedStatement { states, cursor: 0 });
        Ok(Statement {
            id,
            state: StatementState::Waiting,
            output: None,
            progress: 0.0,
            started: 0,
            completed: 0,
        })
    }

    async fn get_statement(
        &self,
        session_id: i64,
        statement_id: i64,
    ) -> Result<Statement, ServiceError> {
        let mut mock = self.state.lock().unwrap();
        let scripted = mock
            .statements
            .get_mut(&(session_id, statement_id))
            .ok_or_else(Self::server_error)?;
        let state = scripted.states[scripted.cursor.min(scripted.states.len() - 1)];
        scripted.cursor += 1;
        Ok(Statement {
            id: statement_id,
            state,
            output: Self::output_for(state),
            progress: if state.is_terminal() { 1.0 } else { 0.5 },
            started: 1,
            completed: if state.is_terminal() { 2 } else { 0 },
        })
    }

    async fn cancel_statement(
        &self,
        session_id: i64,
        statement_id: i64,
    ) -> Result<(), ServiceError> {
        let mut mock = self.state.lock().unwrap();
        mock.cancelled.push((session_id, statement_id));
        Ok(())
    }
}
