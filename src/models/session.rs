// src/models/session.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::session::ExamMode;
use crate::session::summary::ResultSummary;

use super::question::PublicQuestion;

/// Represents the 'exam_sessions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExamSessionRow {
    pub id: i64,
    pub user_id: i64,
    pub mode: String,
    /// Ordered question ids, fixed at session start.
    pub question_ids: Json<Vec<i64>>,
    pub score: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'answer_records' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct AnswerRecordRow {
    pub session_id: i64,
    pub question_index: i64,
    pub question_id: i64,
    pub selected_option_ids: Json<Vec<i64>>,
    pub is_correct: bool,
    pub time_spent_seconds: i64,
}

/// DTO for starting a session.
#[derive(Debug, Deserialize, Validate)]
pub struct StartSessionRequest {
    pub mode: ExamMode,
    #[validate(length(min = 1, max = 100))]
    pub subject: Option<String>,
    /// Caller-specified count for custom mode; optional cap for SRS.
    #[validate(range(min = 1, max = 150))]
    pub question_count: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: i64,
    pub mode: ExamMode,
    /// Present for timed modes only.
    pub time_limit_seconds: Option<u64>,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigateAction {
    Next,
    Prev,
    Jump,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub action: NavigateAction,
    /// Target index, only meaningful for `jump`.
    pub index: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct NavigateResponse {
    pub current_index: usize,
}

/// DTO for submitting one answer.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    pub question_index: usize,
    pub selected_option_ids: Vec<i64>,
    #[validate(range(max = 14400))]
    pub time_spent_seconds: u32,
}

/// Correctness and the withheld answer key, returned only after submission.
#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub correct: bool,
    pub correct_option_ids: Vec<i64>,
    pub rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FlagRequest {
    pub question_id: i64,
}

#[derive(Debug, Serialize)]
pub struct FlagResponse {
    pub question_id: i64,
    pub flagged: bool,
}

/// Live view of a session for the exam UI.
#[derive(Debug, Serialize)]
pub struct SessionStateResponse {
    pub session_id: i64,
    pub mode: ExamMode,
    pub current_index: usize,
    pub total_questions: usize,
    pub answered_indices: Vec<usize>,
    pub flagged_question_ids: Vec<i64>,
    pub elapsed_seconds: Option<u64>,
    pub remaining_seconds: Option<u64>,
    pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct CompleteSessionResponse {
    pub session_id: i64,
    pub summary: ResultSummary,
}

/// One row of the session-history listing.
#[derive(Debug, Serialize, FromRow)]
pub struct SessionHistoryEntry {
    pub id: i64,
    pub mode: String,
    pub question_count: i64,
    pub score: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}
