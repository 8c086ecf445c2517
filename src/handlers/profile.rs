// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use url::Url;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        session::SessionHistoryEntry,
        user::{MeResponse, UpdateProfileRequest, User},
    },
    utils::{
        hash::{hash_password, verify_password},
        jwt::Claims,
    },
};

/// Row shape for the profile query with its study-stat subqueries.
#[derive(sqlx::FromRow)]
struct MeRow {
    id: i64,
    username: String,
    role: String,
    avatar_url: Option<String>,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    sessions_completed: Option<i64>,
    total_answered: Option<i64>,
    best_mock_score: Option<i64>,
}

/// Get current user's profile and study statistics.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    // Subqueries are fine here given the indexes on user_id / session_id.
    let me = sqlx::query_as::<_, MeRow>(
        "SELECT \
            u.id, u.username, u.role, u.avatar_url, u.created_at, \
            (SELECT COUNT(*) FROM exam_sessions WHERE user_id = u.id AND completed_at IS NOT NULL) AS sessions_completed, \
            (SELECT COUNT(*) FROM answer_records ar JOIN exam_sessions s ON ar.session_id = s.id WHERE s.user_id = u.id) AS total_answered, \
            (SELECT MAX(score) FROM exam_sessions WHERE user_id = u.id AND mode = 'mock' AND completed_at IS NOT NULL) AS best_mock_score \
         FROM users u \
         WHERE u.id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(MeResponse {
        id: me.id,
        username: me.username,
        role: me.role,
        avatar_url: me.avatar_url,
        created_at: me.created_at,
        sessions_completed: me.sessions_completed.unwrap_or(0),
        total_answered: me.total_answered.unwrap_or(0),
        best_mock_score: me.best_mock_score,
    }))
}

/// Update the current user's profile. Password changes require the current
/// password; the avatar must be a parseable URL.
pub async fn update_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id();

    if let Some(avatar_url) = &payload.avatar_url {
        if Url::parse(avatar_url).is_err() {
            return Err(AppError::BadRequest("avatar_url is not a valid URL".to_string()));
        }
        sqlx::query("UPDATE users SET avatar_url = $1 WHERE id = $2")
            .bind(avatar_url)
            .bind(user_id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_password) = &payload.password {
        let current = payload.current_password.as_deref().ok_or_else(|| {
            AppError::BadRequest("current_password is required to change password".to_string())
        })?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("User not found".to_string()))?;

        if !verify_password(current, &user.password)? {
            return Err(AppError::AuthError("Current password is incorrect".to_string()));
        }

        let hashed = hash_password(new_password)?;
        sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(&hashed)
            .bind(user_id)
            .execute(&pool)
            .await?;
    }

    Ok(StatusCode::OK)
}

/// List the current user's exam sessions, newest first.
pub async fn list_my_sessions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let sessions = sqlx::query_as::<_, SessionHistoryEntry>(
        "SELECT \
            id, mode, jsonb_array_length(question_ids)::BIGINT AS question_count, \
            score, created_at, completed_at \
         FROM exam_sessions \
         WHERE user_id = $1 \
         ORDER BY created_at DESC \
         LIMIT 100",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(sessions))
}
