// src/models/stats.rs

use serde::Serialize;
use sqlx::prelude::FromRow;

/// Aggregated struct for displaying the mock-exam leaderboard.
/// Represents a row joined from `users` and `exam_sessions`.
#[derive(Debug, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub username: String,
    pub score: i64,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Raw per-subject counts from the answer-record aggregate query.
#[derive(Debug, FromRow)]
pub struct SubjectCountsRow {
    pub subject: String,
    pub total: i64,
    pub correct: i64,
}

#[derive(Debug, Serialize)]
pub struct SubjectAccuracy {
    pub subject: String,
    pub total: i64,
    pub correct: i64,
    pub accuracy: u32,
}

/// Lifetime study statistics for the dashboard.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub sessions_completed: i64,
    pub total_answered: i64,
    pub total_correct: i64,
    pub overall_accuracy: u32,
    pub total_time_seconds: i64,
    pub average_score: Option<i64>,
    pub by_subject: Vec<SubjectAccuracy>,
}
