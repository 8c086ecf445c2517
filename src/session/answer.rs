// src/session/answer.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{QuestionKind, SessionError, SessionQuestion};

/// One stored response to one question within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub question_index: usize,
    pub question_id: i64,
    pub selected_option_ids: BTreeSet<i64>,
    pub correct: bool,
    pub time_spent_seconds: u32,
}

/// The accumulated answers of a session, keyed by question index. At most
/// one record per index; resubmission replaces the prior record.
#[derive(Debug, Clone, Default)]
pub struct AnswerSheet {
    records: BTreeMap<usize, AnswerRecord>,
}

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a sheet from persisted records, e.g. when re-deriving a
    /// result summary after completion.
    pub fn from_records(records: impl IntoIterator<Item = AnswerRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.question_index, r))
                .collect(),
        }
    }

    /// Evaluates and stores the selection for `index`, replacing any prior
    /// record. The selection collapses to a set first, so duplicate ids and
    /// ordering never affect correctness.
    pub fn submit(
        &mut self,
        question: &SessionQuestion,
        index: usize,
        selected_option_ids: &[i64],
        time_spent_seconds: u32,
    ) -> Result<&AnswerRecord, SessionError> {
        let chosen: BTreeSet<i64> = selected_option_ids.iter().copied().collect();
        if chosen.is_empty() {
            return Err(SessionError::EmptySelection);
        }

        let correct = evaluate(question.kind, &question.correct_option_ids, &chosen);

        let record = AnswerRecord {
            question_index: index,
            question_id: question.id,
            selected_option_ids: chosen,
            correct,
            time_spent_seconds,
        };

        self.records.insert(index, record);
        Ok(&self.records[&index])
    }

    pub fn get(&self, index: usize) -> Option<&AnswerRecord> {
        self.records.get(&index)
    }

    pub fn records(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.records.values()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.records.keys().copied()
    }

    pub fn answered(&self) -> usize {
        self.records.len()
    }
}

/// Correctness policy.
///
/// Single-choice: exactly one id selected and it is the correct one.
/// Multi-select (SATA): the selected set equals the correct set. No partial
/// credit in either direction.
pub fn evaluate(kind: QuestionKind, correct_ids: &BTreeSet<i64>, chosen: &BTreeSet<i64>) -> bool {
    match kind {
        QuestionKind::Single => chosen.len() == 1 && chosen.is_subset(correct_ids),
        QuestionKind::Multiple => chosen == correct_ids,
    }
}
