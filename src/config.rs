// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Question count for a quick practice round.
pub const QUICK_QUESTION_COUNT: i64 = 10;

/// Question count for a full-length mock exam.
pub const MOCK_QUESTION_COUNT: i64 = 75;

/// Time budget for a mock exam: 90 seconds per question.
pub const MOCK_TIME_LIMIT_SECS: u64 = MOCK_QUESTION_COUNT as u64 * 90;

/// Interval between timer ticks driven by the session tick task.
pub const TICK_INTERVAL_SECS: u64 = 1;

/// Live sessions with no candidate interaction for this long are evicted
/// by their tick task. Untimed modes have no expiry of their own, so this
/// is what bounds the live-session map.
pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 2 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let admin_username = env::var("ADMIN_USERNAME").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username,
            admin_password,
        }
    }
}
