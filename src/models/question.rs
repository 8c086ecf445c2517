// src/models/question.rs

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::{Validate, ValidationError};

use crate::session::{Difficulty, QuestionKind};

/// One answer option as stored in the JSONB `options` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Question type: 'single' (single choice) or 'multiple' (SATA).
    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub question_type: String,

    /// The stem (prompt text) of the question.
    pub content: String,

    /// Options including their correctness flags.
    /// Stored as a JSON array in the database.
    pub options: Json<Vec<AnswerOption>>,

    /// Subject/chapter reference (e.g. 'pharmacology').
    pub subject: String,

    /// Ordinal difficulty: 'easy', 'medium' or 'hard'.
    pub difficulty: String,

    pub tags: Option<Json<Vec<String>>>,

    /// Explanation shown after the candidate answers.
    pub rationale: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    pub fn correct_option_ids(&self) -> std::collections::BTreeSet<i64> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id)
            .collect()
    }
}

/// Option as sent to the candidate: correctness withheld until submission.
#[derive(Debug, Clone, Serialize)]
pub struct PublicOption {
    pub id: i64,
    pub text: String,
}

/// DTO for sending a question to the candidate. Excludes correctness flags
/// and rationale; both come back only in the submission response.
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: String,
    pub content: String,
    pub options: Vec<PublicOption>,
    pub subject: String,
    pub difficulty: String,
    pub tags: Option<Vec<String>>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_type: q.question_type,
            content: q.content,
            options: q
                .options
                .0
                .into_iter()
                .map(|o| PublicOption { id: o.id, text: o.text })
                .collect(),
            subject: q.subject,
            difficulty: q.difficulty,
            tags: q.tags.map(|t| t.0),
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_answer_key))]
pub struct CreateQuestionRequest {
    pub question_type: String,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    #[validate(length(min = 2, max = 10))]
    pub options: Vec<AnswerOption>,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    pub difficulty: String,
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 4000))]
    pub rationale: Option<String>,
}

/// Enforces the answer-key invariant: option ids unique; single-choice has
/// exactly one correct option, SATA at least one. Also checks the type and
/// difficulty vocabularies.
fn validate_answer_key(req: &CreateQuestionRequest) -> Result<(), ValidationError> {
    let kind = QuestionKind::from_str(&req.question_type)
        .map_err(|_| ValidationError::new("question_type_must_be_single_or_multiple"))?;

    if Difficulty::from_str(&req.difficulty).is_err() {
        return Err(ValidationError::new("difficulty_must_be_easy_medium_or_hard"));
    }

    let mut seen = HashSet::new();
    for opt in &req.options {
        if !seen.insert(opt.id) {
            return Err(ValidationError::new("option_ids_must_be_unique"));
        }
        if opt.text.is_empty() || opt.text.len() > 500 {
            return Err(ValidationError::new("option_text_length_invalid"));
        }
    }

    let correct = req.options.iter().filter(|o| o.is_correct).count();
    match kind {
        QuestionKind::Single if correct != 1 => {
            Err(ValidationError::new("single_choice_needs_exactly_one_correct_option"))
        }
        QuestionKind::Multiple if correct == 0 => {
            Err(ValidationError::new("sata_needs_at_least_one_correct_option"))
        }
        _ => Ok(()),
    }
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub question_type: Option<String>,
    pub content: Option<String>,
    pub options: Option<Vec<AnswerOption>>,
    pub subject: Option<String>,
    pub difficulty: Option<String>,
    pub tags: Option<Vec<String>>,
    pub rationale: Option<String>,
}

/// Subject listing for the practice-filter UI.
#[derive(Debug, Serialize, FromRow)]
pub struct SubjectCount {
    pub subject: String,
    pub question_count: i64,
}
