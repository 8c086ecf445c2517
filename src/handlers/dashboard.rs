// src/handlers/dashboard.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::stats::{DashboardResponse, LeaderboardEntry, SubjectAccuracy, SubjectCountsRow},
    session::summary::percentage,
    utils::jwt::Claims,
};

#[derive(sqlx::FromRow)]
struct TotalsRow {
    sessions_completed: Option<i64>,
    total_answered: Option<i64>,
    total_correct: Option<i64>,
    total_time_seconds: Option<i64>,
    average_score: Option<i64>,
}

/// Lifetime study statistics for the current user: totals, average mock
/// performance, and accuracy broken down by subject.
pub async fn get_dashboard(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let totals = sqlx::query_as::<_, TotalsRow>(
        "SELECT \
            (SELECT COUNT(*) FROM exam_sessions WHERE user_id = $1 AND completed_at IS NOT NULL) AS sessions_completed, \
            (SELECT COUNT(*) FROM answer_records ar JOIN exam_sessions s ON ar.session_id = s.id WHERE s.user_id = $1) AS total_answered, \
            (SELECT COUNT(*) FROM answer_records ar JOIN exam_sessions s ON ar.session_id = s.id WHERE s.user_id = $1 AND ar.is_correct) AS total_correct, \
            (SELECT COALESCE(SUM(ar.time_spent_seconds), 0)::BIGINT FROM answer_records ar JOIN exam_sessions s ON ar.session_id = s.id WHERE s.user_id = $1) AS total_time_seconds, \
            (SELECT ROUND(AVG(score))::BIGINT FROM exam_sessions WHERE user_id = $1 AND completed_at IS NOT NULL) AS average_score",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch dashboard totals: {:?}", e);
        AppError::from(e)
    })?;

    let subject_rows = sqlx::query_as::<_, SubjectCountsRow>(
        "SELECT q.subject, \
            COUNT(*) AS total, \
            COUNT(*) FILTER (WHERE ar.is_correct) AS correct \
         FROM answer_records ar \
         JOIN exam_sessions s ON ar.session_id = s.id \
         JOIN questions q ON ar.question_id = q.id \
         WHERE s.user_id = $1 \
         GROUP BY q.subject \
         ORDER BY q.subject",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let total_answered = totals.total_answered.unwrap_or(0);
    let total_correct = totals.total_correct.unwrap_or(0);

    let by_subject = subject_rows
        .into_iter()
        .map(|row| SubjectAccuracy {
            accuracy: percentage(row.correct as u32, row.total as u32),
            subject: row.subject,
            total: row.total,
            correct: row.correct,
        })
        .collect();

    Ok(Json(DashboardResponse {
        sessions_completed: totals.sessions_completed.unwrap_or(0),
        total_answered,
        total_correct,
        overall_accuracy: percentage(total_correct as u32, total_answered as u32),
        total_time_seconds: totals.total_time_seconds.unwrap_or(0),
        average_score: totals.average_score,
        by_subject,
    }))
}

/// Retrieves the top 5 completed mock-exam scores.
pub async fn get_leaderboard(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let leaderboard = sqlx::query_as::<_, LeaderboardEntry>(
        "SELECT u.username, s.score, s.completed_at \
         FROM exam_sessions s \
         JOIN users u ON s.user_id = u.id \
         WHERE s.mode = 'mock' AND s.completed_at IS NOT NULL AND s.score IS NOT NULL \
         ORDER BY s.score DESC, s.completed_at ASC \
         LIMIT 5",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(leaderboard))
}
