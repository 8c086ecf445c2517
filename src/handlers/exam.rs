// src/handlers/exam.rs

use std::collections::{BTreeSet, HashMap};

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use tokio::time::{Duration, interval};
use validator::Validate;

use crate::{
    config::{SESSION_IDLE_TIMEOUT_SECS, TICK_INTERVAL_SECS},
    error::AppError,
    models::{
        question::{PublicQuestion, Question, SubjectCount},
        session::{
            AnswerRecordRow, CompleteSessionResponse, ExamSessionRow, FlagRequest, FlagResponse,
            NavigateAction, NavigateRequest, NavigateResponse, SessionStateResponse,
            StartSessionRequest, StartSessionResponse, SubmitAnswerRequest, SubmitAnswerResponse,
        },
    },
    session::{
        Difficulty, ExamMode, ExamSession, QuestionKind, SessionQuestion,
        answer::{AnswerRecord, AnswerSheet},
        summary::{self, ResultSummary},
        timer::TickOutcome,
    },
    state::{AppState, SessionMap},
    utils::jwt::Claims,
};

/// Builds the core's view of a question (answer key + grouping metadata)
/// from a bank row. Bank rows with an unknown type or difficulty mean the
/// bank is corrupt, not that the request was bad.
fn to_session_question(q: &Question) -> Result<SessionQuestion, AppError> {
    let kind = q
        .question_type
        .parse()
        .map_err(AppError::InternalServerError)?;
    let difficulty = q.difficulty.parse().map_err(AppError::InternalServerError)?;

    Ok(SessionQuestion {
        id: q.id,
        kind,
        subject: q.subject.clone(),
        difficulty,
        correct_option_ids: q.correct_option_ids(),
        rationale: q.rationale.clone(),
    })
}

/// Looks up a live session and verifies the caller owns it.
fn owned_session<'a>(
    sessions: &'a mut HashMap<i64, ExamSession>,
    session_id: i64,
    claims: &Claims,
) -> Result<&'a mut ExamSession, AppError> {
    let session = sessions
        .get_mut(&session_id)
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    if session.user_id() != claims.user_id() {
        return Err(AppError::Forbidden(
            "Session belongs to another user".to_string(),
        ));
    }

    Ok(session)
}

async fn persist_completion(
    pool: &PgPool,
    session_id: i64,
    summary: &ResultSummary,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE exam_sessions SET score = $1, completed_at = NOW() \
         WHERE id = $2 AND completed_at IS NULL",
    )
    .bind(i64::from(summary.score))
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Drives the session timer, one tick per second. The Timer itself never
/// schedules; this task is the external tick source. When a mock budget
/// expires the session is auto-completed with whatever was answered.
/// Abandoned sessions (no interaction for the idle timeout) are evicted
/// so the live-session map stays bounded; the database row keeps whatever
/// answers were persisted.
fn spawn_tick_task(sessions: SessionMap, pool: PgPool, session_id: i64) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(TICK_INTERVAL_SECS));
        // The first interval tick fires immediately; skip it.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let mut map = sessions.lock().await;
            let Some(session) = map.get_mut(&session_id) else {
                break;
            };
            if session.is_completed() {
                break;
            }

            if let TickOutcome::Expired = session.tick() {
                tracing::info!("Session {} time expired, auto-completing", session_id);
                let summary = session.complete();
                if let Err(e) = persist_completion(&pool, session_id, &summary).await {
                    tracing::error!(
                        "Failed to persist auto-completed session {}: {:?}",
                        session_id,
                        e
                    );
                }
                map.remove(&session_id);
                break;
            }

            if session.idle_seconds() >= SESSION_IDLE_TIMEOUT_SECS {
                tracing::info!("Session {} abandoned, evicting live state", session_id);
                map.remove(&session_id);
                break;
            }
        }
    });
}

/// Lists subjects present in the question bank, for the practice filter UI.
pub async fn list_subjects(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let subjects = sqlx::query_as::<_, SubjectCount>(
        "SELECT subject, COUNT(*) AS question_count FROM questions GROUP BY subject ORDER BY subject",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(subjects))
}

/// Opens a new exam session.
///
/// Resolves the question count by mode (quick = 10, mock = 75, SRS = due
/// count, custom = caller-specified), draws the questions, and registers the
/// session both in the database and in the live-session map. All-or-nothing:
/// if the bank cannot satisfy the request, no session is created.
pub async fn start_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id();

    // None only for an uncapped SRS review (draw the whole due pool).
    let requested: Option<i64> = if let Some(n) = req.mode.fixed_question_count() {
        Some(n)
    } else if req.mode == ExamMode::Custom {
        Some(req.question_count.ok_or_else(|| {
            AppError::BadRequest("custom mode requires question_count".to_string())
        })?)
    } else {
        req.question_count
    };

    let questions: Vec<Question> = if req.mode == ExamMode::Srs {
        // Due pool: every question this user has answered incorrectly.
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT * FROM questions WHERE id IN ( \
             SELECT DISTINCT ar.question_id FROM answer_records ar \
             JOIN exam_sessions s ON ar.session_id = s.id \
             WHERE s.user_id = ",
        );
        qb.push_bind(user_id);
        qb.push(" AND ar.is_correct = FALSE)");
        if let Some(subject) = &req.subject {
            qb.push(" AND subject = ");
            qb.push_bind(subject);
        }
        qb.push(" ORDER BY RANDOM()");
        if let Some(n) = requested {
            qb.push(" LIMIT ");
            qb.push_bind(n);
        }
        qb.build_query_as().fetch_all(&state.pool).await?
    } else {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM questions");
        if let Some(subject) = &req.subject {
            qb.push(" WHERE subject = ");
            qb.push_bind(subject);
        }
        qb.push(" ORDER BY RANDOM() LIMIT ");
        // Non-SRS modes always have a concrete count.
        qb.push_bind(requested.unwrap_or(1));
        qb.build_query_as().fetch_all(&state.pool).await?
    };

    // SRS returns whatever is due, capped by the request; it fails only on
    // an empty pool. The fixed-count modes are all-or-nothing.
    let minimum = if req.mode == ExamMode::Srs {
        1
    } else {
        requested.unwrap_or(1)
    };
    if (questions.len() as i64) < minimum {
        return Err(AppError::QuestionUnavailable(format!(
            "only {} questions available for the requested mode and filters",
            questions.len()
        )));
    }

    let session_questions = questions
        .iter()
        .map(to_session_question)
        .collect::<Result<Vec<_>, _>>()?;

    let question_ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
    let row = sqlx::query_as::<_, ExamSessionRow>(
        "INSERT INTO exam_sessions (user_id, mode, question_ids) \
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(user_id)
    .bind(req.mode.as_str())
    .bind(SqlJson(&question_ids))
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create exam session: {:?}", e);
        AppError::from(e)
    })?;

    let session = ExamSession::new(row.id, user_id, req.mode, session_questions);
    state.sessions.lock().await.insert(row.id, session);
    spawn_tick_task(state.sessions.clone(), state.pool.clone(), row.id);

    tracing::info!(
        "User {} started {} session {} with {} questions",
        user_id,
        req.mode.as_str(),
        row.id,
        question_ids.len()
    );

    Ok(Json(StartSessionResponse {
        session_id: row.id,
        mode: req.mode,
        time_limit_seconds: req.mode.time_limit(),
        questions: questions.into_iter().map(PublicQuestion::from).collect(),
    }))
}

/// Live view of a session for the exam UI.
pub async fn get_session_state(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut map = state.sessions.lock().await;
    let session = owned_session(&mut map, session_id, &claims)?;

    Ok(Json(SessionStateResponse {
        session_id,
        mode: session.mode(),
        current_index: session.current_index(),
        total_questions: session.len(),
        answered_indices: session.answered_indices(),
        flagged_question_ids: session.flagged_ids(),
        elapsed_seconds: session.timer().elapsed(),
        remaining_seconds: session.timer().remaining(),
        completed: session.is_completed(),
    }))
}

/// Moves the session cursor. `next`/`prev` are no-ops at the bounds and
/// `jump` clamps, so this never fails on position.
pub async fn navigate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
    Json(req): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut map = state.sessions.lock().await;
    let session = owned_session(&mut map, session_id, &claims)?;

    let current_index = match req.action {
        NavigateAction::Next => session.advance(),
        NavigateAction::Prev => session.retreat(),
        NavigateAction::Jump => {
            let index = req.index.ok_or_else(|| {
                AppError::BadRequest("jump requires an index".to_string())
            })?;
            session.jump_to(index)
        }
    };

    Ok(Json(NavigateResponse { current_index }))
}

/// Records an answer for one question and persists it alongside the live
/// sheet. Resubmission for the same index overwrites. The answer key and
/// rationale travel only in this response, never in the question payload.
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // The lock is held across the database write so that records hit the
    // database in the order the candidate submitted them.
    let mut map = state.sessions.lock().await;
    let session = owned_session(&mut map, session_id, &claims)?;

    let record: AnswerRecord =
        session.submit_answer(req.question_index, &req.selected_option_ids, req.time_spent_seconds)?;

    // The index was validated by submit_answer above.
    let question = session
        .question(req.question_index)
        .ok_or_else(|| AppError::InternalServerError("question vanished from session".to_string()))?;

    let response = SubmitAnswerResponse {
        correct: record.correct,
        correct_option_ids: question.correct_option_ids.iter().copied().collect(),
        rationale: question.rationale.clone(),
    };

    let selected: Vec<i64> = record.selected_option_ids.iter().copied().collect();
    sqlx::query(
        "INSERT INTO answer_records \
         (session_id, question_index, question_id, selected_option_ids, is_correct, time_spent_seconds) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (session_id, question_index) DO UPDATE SET \
             question_id = EXCLUDED.question_id, \
             selected_option_ids = EXCLUDED.selected_option_ids, \
             is_correct = EXCLUDED.is_correct, \
             time_spent_seconds = EXCLUDED.time_spent_seconds, \
             created_at = NOW()",
    )
    .bind(session_id)
    .bind(record.question_index as i64)
    .bind(record.question_id)
    .bind(SqlJson(&selected))
    .bind(record.correct)
    .bind(i64::from(record.time_spent_seconds))
    .execute(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to persist answer record: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(response))
}

/// Toggles the review flag on a question. Pure membership, no failure modes.
pub async fn toggle_flag(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
    Json(req): Json<FlagRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut map = state.sessions.lock().await;
    let session = owned_session(&mut map, session_id, &claims)?;

    let flagged = session.toggle_flag(req.question_id);

    Ok(Json(FlagResponse {
        question_id: req.question_id,
        flagged,
    }))
}

/// Finalizes the session: aggregates the result, persists score and
/// completion time, and drops the live state.
pub async fn complete_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut map = state.sessions.lock().await;
    let session = owned_session(&mut map, session_id, &claims)?;

    let summary = session.complete();
    persist_completion(&state.pool, session_id, &summary).await?;
    map.remove(&session_id);

    tracing::info!("Session {} completed with score {}", session_id, summary.score);

    Ok(Json(CompleteSessionResponse { session_id, summary }))
}

/// Recomputes the result summary of a completed session from persisted
/// records (the live state is gone by then).
pub async fn get_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let row = sqlx::query_as::<_, ExamSessionRow>("SELECT * FROM exam_sessions WHERE id = $1")
        .bind(session_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    if row.user_id != claims.user_id() {
        return Err(AppError::Forbidden("Session belongs to another user".to_string()));
    }
    if row.completed_at.is_none() {
        return Err(AppError::Conflict("Session not completed yet".to_string()));
    }

    let record_rows =
        sqlx::query_as::<_, AnswerRecordRow>("SELECT * FROM answer_records WHERE session_id = $1")
            .bind(session_id)
            .fetch_all(&pool)
            .await?;

    let question_ids = row.question_ids.0;
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM questions WHERE id IN (");
    let mut separated = qb.separated(",");
    for id in &question_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");
    let bank_rows: Vec<Question> = qb.build_query_as().fetch_all(&pool).await?;

    // Restore session order. A bank row deleted since the session ran had
    // its records cascade-deleted too; a placeholder keeps the indices of
    // the surviving records aligned.
    let mut by_id: HashMap<i64, Question> = bank_rows.into_iter().map(|q| (q.id, q)).collect();
    let mut questions = Vec::with_capacity(question_ids.len());
    for id in &question_ids {
        questions.push(match by_id.remove(id) {
            Some(q) => to_session_question(&q)?,
            None => SessionQuestion {
                id: *id,
                kind: QuestionKind::Single,
                subject: "unknown".to_string(),
                difficulty: Difficulty::Medium,
                correct_option_ids: BTreeSet::new(),
                rationale: None,
            },
        });
    }

    let sheet = AnswerSheet::from_records(record_rows.into_iter().map(|r| AnswerRecord {
        question_index: r.question_index as usize,
        question_id: r.question_id,
        selected_option_ids: r.selected_option_ids.0.into_iter().collect(),
        correct: r.is_correct,
        time_spent_seconds: r.time_spent_seconds as u32,
    }));

    let summary = summary::summarize(&questions, &sheet);

    Ok(Json(CompleteSessionResponse { session_id, summary }))
}
