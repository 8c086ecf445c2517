// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::{CreateQuestionRequest, Question, UpdateQuestionRequest},
        user::User,
    },
    utils::{hash::hash_password, html::clean_html, jwt::Claims},
};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id DESC")
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list users: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(users))
}

/// DTO for Admin creating a user (can specify role).
#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "Username length must be between 3 and 50 characters."))]
    pub username: String,
    #[validate(length(min = 4, max = 128, message = "Password length must be between 4 and 128 characters."))]
    pub password: String,
    pub role: String, // 'user' or 'admin'
}

/// Creates a new user with specific role.
/// Admin only.
pub async fn create_user(
    State(pool): State<PgPool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if payload.role != "user" && payload.role != "admin" {
        return Err(AppError::BadRequest("role must be 'user' or 'admin'".to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(&payload.role)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": user.id}))))
}

/// DTO for updating a user. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub username: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Check existence
    sqlx::query("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    // Perform updates sequentially if fields are present
    if let Some(new_username) = payload.username {
        sqlx::query("UPDATE users SET username = $1 WHERE id = $2")
            .bind(&new_username)
            .bind(id)
            .execute(&pool)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    }

    if let Some(new_role) = payload.role {
        if new_role != "user" && new_role != "admin" {
            return Err(AppError::BadRequest("role must be 'user' or 'admin'".to_string()));
        }
        sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(&new_role)
            .bind(id)
            .execute(&pool)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    }

    if let Some(new_password) = payload.password {
        let hashed = hash_password(&new_password)?;
        sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(&hashed)
            .bind(id)
            .execute(&pool)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    }

    Ok(StatusCode::OK)
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    // Prevent self-deletion
    if id == claims.user_id() {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    pub subject: Option<String>,
    pub difficulty: Option<String>,
    pub limit: Option<i64>,
}

/// Lists bank questions including answer keys.
/// Admin only.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);

    let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM questions WHERE TRUE");
    if let Some(subject) = &params.subject {
        builder.push(" AND subject = ");
        builder.push_bind(subject);
    }
    if let Some(difficulty) = &params.difficulty {
        builder.push(" AND difficulty = ");
        builder.push_bind(difficulty);
    }
    builder.push(" ORDER BY id DESC LIMIT ");
    builder.push_bind(limit);

    let questions: Vec<Question> = builder.build_query_as().fetch_all(&pool).await?;

    Ok(Json(questions))
}

/// Creates a new bank question. Stems and rationales may carry light
/// markup, so both are sanitized before storage.
/// Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let content = clean_html(&payload.content);
    let rationale = payload.rationale.as_deref().map(clean_html);
    let tags = payload.tags.map(SqlJson);

    let question = sqlx::query_as::<_, Question>(
        "INSERT INTO questions (type, content, options, subject, difficulty, tags, rationale) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(&payload.question_type)
    .bind(&content)
    .bind(SqlJson(&payload.options))
    .bind(&payload.subject)
    .bind(&payload.difficulty)
    .bind(tags)
    .bind(rationale)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": question.id}))))
}

/// Updates a question by ID. Partial update via QueryBuilder.
/// Admin only.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.question_type.is_none()
        && payload.content.is_none()
        && payload.options.is_none()
        && payload.subject.is_none()
        && payload.difficulty.is_none()
        && payload.tags.is_none()
        && payload.rationale.is_none()
    {
        return Ok(StatusCode::OK);
    }

    // New options must keep the answer-key invariant against the question's
    // effective type (the one being set, or the stored one).
    if let Some(options) = &payload.options {
        let effective_type = match &payload.question_type {
            Some(t) => t.clone(),
            None => {
                let current = sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&pool)
                    .await?
                    .ok_or(AppError::NotFound("Question not found".to_string()))?;
                current.question_type
            }
        };
        let correct = options.iter().filter(|o| o.is_correct).count();
        let valid = match effective_type.as_str() {
            "single" => correct == 1,
            "multiple" => correct >= 1,
            _ => false,
        };
        if !valid {
            return Err(AppError::BadRequest(
                "options do not satisfy the answer-key invariant for the question type".to_string(),
            ));
        }
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(q_type) = payload.question_type {
        if q_type != "single" && q_type != "multiple" {
            return Err(AppError::BadRequest("type must be 'single' or 'multiple'".to_string()));
        }
        separated.push("type = ");
        separated.push_bind_unseparated(q_type);
    }

    if let Some(content) = payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(clean_html(&content));
    }

    if let Some(options) = payload.options {
        separated.push("options = ");
        separated.push_bind_unseparated(serde_json::to_value(options).unwrap_or_default());
    }

    if let Some(subject) = payload.subject {
        separated.push("subject = ");
        separated.push_bind_unseparated(subject);
    }

    if let Some(difficulty) = payload.difficulty {
        if !matches!(difficulty.as_str(), "easy" | "medium" | "hard") {
            return Err(AppError::BadRequest("difficulty must be easy, medium or hard".to_string()));
        }
        separated.push("difficulty = ");
        separated.push_bind_unseparated(difficulty);
    }

    if let Some(tags) = payload.tags {
        separated.push("tags = ");
        separated.push_bind_unseparated(serde_json::to_value(tags).unwrap_or_default());
    }

    if let Some(rationale) = payload.rationale {
        separated.push("rationale = ");
        separated.push_bind_unseparated(clean_html(&rationale));
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a bank question by ID.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
