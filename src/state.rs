use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::session::ExamSession;

/// Live exam sessions, keyed by session id. One owner per session (one
/// exam-taking context); the mutex also serializes answer submissions
/// against the same session.
pub type SessionMap = Arc<Mutex<HashMap<i64, ExamSession>>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub sessions: SessionMap,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self {
            pool,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SessionMap {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
