// src/session/mod.rs

pub mod answer;
pub mod flags;
pub mod navigator;
pub mod summary;
pub mod timer;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{MOCK_QUESTION_COUNT, MOCK_TIME_LIMIT_SECS, QUICK_QUESTION_COUNT};
use answer::{AnswerRecord, AnswerSheet};
use flags::FlagSet;
use navigator::Navigator;
use summary::ResultSummary;
use timer::{SessionTimer, TickOutcome};

/// Exam mode, stored as TEXT in `exam_sessions.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamMode {
    /// Short untimed practice round, fixed at 10 questions.
    Quick,
    /// Timed full-length simulation, fixed at 75 questions.
    Mock,
    /// Spaced-repetition review drawn from previously missed questions.
    Srs,
    /// Caller picks the question count (and optional subject).
    Custom,
}

impl ExamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamMode::Quick => "quick",
            ExamMode::Mock => "mock",
            ExamMode::Srs => "srs",
            ExamMode::Custom => "custom",
        }
    }

    /// Question count fixed by policy; `None` means caller-determined
    /// (SRS due count or custom request).
    pub fn fixed_question_count(&self) -> Option<i64> {
        match self {
            ExamMode::Quick => Some(QUICK_QUESTION_COUNT),
            ExamMode::Mock => Some(MOCK_QUESTION_COUNT),
            ExamMode::Srs | ExamMode::Custom => None,
        }
    }

    /// Time budget in seconds for timed modes.
    pub fn time_limit(&self) -> Option<u64> {
        match self {
            ExamMode::Mock => Some(MOCK_TIME_LIMIT_SECS),
            _ => None,
        }
    }
}

/// Question kind: 'single' (one correct option) or 'multiple' (SATA,
/// exact set match required).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multiple,
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(QuestionKind::Single),
            "multiple" => Ok(QuestionKind::Multiple),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// The slice of a question the session core needs: the answer key and the
/// grouping metadata. Built from a `questions` row at session start and
/// immutable for the life of the session.
#[derive(Debug, Clone)]
pub struct SessionQuestion {
    pub id: i64,
    pub kind: QuestionKind,
    pub subject: String,
    pub difficulty: Difficulty,
    pub correct_option_ids: BTreeSet<i64>,
    pub rationale: Option<String>,
}

/// Errors raised by the session core. Mapped to HTTP statuses in
/// `crate::error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Submission with no options selected. Recovered by re-prompting,
    /// never persisted.
    EmptySelection,
    /// Question index outside the session's list. A logic fault in the
    /// caller, not a normal runtime condition.
    IndexOutOfRange { index: usize, len: usize },
    /// The session was already completed; no further mutation is allowed.
    AlreadyCompleted,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::EmptySelection => write!(f, "no options selected"),
            SessionError::IndexOutOfRange { index, len } => {
                write!(f, "question index {} out of range (session has {} questions)", index, len)
            }
            SessionError::AlreadyCompleted => write!(f, "session already completed"),
        }
    }
}

impl std::error::Error for SessionError {}

/// One candidate's attempt at an ordered, immutable set of questions.
///
/// Owns the navigator, answer sheet, flag set and timer; the handler layer
/// reaches them only through the methods below. There is no ambient global:
/// the server keeps live sessions in `AppState` and passes them here by
/// `&mut`.
#[derive(Debug)]
pub struct ExamSession {
    id: i64,
    user_id: i64,
    mode: ExamMode,
    questions: Vec<SessionQuestion>,
    navigator: Navigator,
    sheet: AnswerSheet,
    flags: FlagSet,
    timer: SessionTimer,
    /// Seconds since the candidate last interacted with the session.
    idle_seconds: u64,
    completed: bool,
}

impl ExamSession {
    pub fn new(id: i64, user_id: i64, mode: ExamMode, questions: Vec<SessionQuestion>) -> Self {
        let timer = match mode.time_limit() {
            Some(budget) => SessionTimer::count_down(budget),
            None => SessionTimer::count_up(),
        };
        let len = questions.len();

        Self {
            id,
            user_id,
            mode,
            questions,
            navigator: Navigator::new(len),
            sheet: AnswerSheet::new(),
            flags: FlagSet::new(),
            timer,
            idle_seconds: 0,
            completed: false,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn mode(&self) -> ExamMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&SessionQuestion> {
        self.questions.get(index)
    }

    pub fn questions(&self) -> &[SessionQuestion] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.navigator.current()
    }

    pub fn advance(&mut self) -> usize {
        self.idle_seconds = 0;
        self.navigator.advance()
    }

    pub fn retreat(&mut self) -> usize {
        self.idle_seconds = 0;
        self.navigator.retreat()
    }

    pub fn jump_to(&mut self, index: usize) -> usize {
        self.idle_seconds = 0;
        self.navigator.jump_to(index)
    }

    /// Records (or replaces) the answer for `index` and returns the stored
    /// record with its computed correctness.
    pub fn submit_answer(
        &mut self,
        index: usize,
        selected_option_ids: &[i64],
        time_spent_seconds: u32,
    ) -> Result<AnswerRecord, SessionError> {
        if self.completed {
            return Err(SessionError::AlreadyCompleted);
        }
        self.idle_seconds = 0;

        let question = self
            .questions
            .get(index)
            .ok_or(SessionError::IndexOutOfRange { index, len: self.questions.len() })?;

        self.sheet
            .submit(question, index, selected_option_ids, time_spent_seconds)
            .cloned()
    }

    pub fn answer(&self, index: usize) -> Option<&AnswerRecord> {
        self.sheet.get(index)
    }

    pub fn answered_indices(&self) -> Vec<usize> {
        self.sheet.indices().collect()
    }

    pub fn toggle_flag(&mut self, question_id: i64) -> bool {
        self.idle_seconds = 0;
        self.flags.toggle(question_id)
    }

    pub fn is_flagged(&self, question_id: i64) -> bool {
        self.flags.is_flagged(question_id)
    }

    pub fn flagged_ids(&self) -> Vec<i64> {
        self.flags.ids()
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    /// Advances the timer by one second. The caller owns the tick schedule;
    /// a completed session no longer ticks. Also accumulates idle time so
    /// the tick task can evict abandoned sessions.
    pub fn tick(&mut self) -> TickOutcome {
        if self.completed {
            return TickOutcome::Running;
        }
        self.idle_seconds += 1;
        self.timer.tick()
    }

    pub fn idle_seconds(&self) -> u64 {
        self.idle_seconds
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Terminates the session and returns the aggregated result. Terminal:
    /// every later `submit_answer` fails with `AlreadyCompleted`.
    pub fn complete(&mut self) -> ResultSummary {
        self.completed = true;
        self.summary()
    }

    pub fn summary(&self) -> ResultSummary {
        summary::summarize(&self.questions, &self.sheet)
    }
}

#[cfg(test)]
pub(crate) fn single_choice(id: i64, subject: &str, difficulty: Difficulty, correct: i64) -> SessionQuestion {
    SessionQuestion {
        id,
        kind: QuestionKind::Single,
        subject: subject.to_string(),
        difficulty,
        correct_option_ids: BTreeSet::from([correct]),
        rationale: None,
    }
}

#[cfg(test)]
pub(crate) fn multi_select(id: i64, subject: &str, difficulty: Difficulty, correct: &[i64]) -> SessionQuestion {
    SessionQuestion {
        id,
        kind: QuestionKind::Multiple,
        subject: subject.to_string(),
        difficulty,
        correct_option_ids: correct.iter().copied().collect(),
        rationale: None,
    }
}
