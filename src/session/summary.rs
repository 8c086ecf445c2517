// src/session/summary.rs

use std::collections::BTreeMap;

use serde::Serialize;

use super::answer::AnswerSheet;
use super::{Difficulty, SessionQuestion};

/// Correct/total pair for one grouping bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupStat {
    pub total: u32,
    pub correct: u32,
    /// round(correct / total * 100); 0 for an empty bucket.
    pub accuracy: u32,
}

/// Aggregated outcome of a session, derived on demand from the answer
/// sheet. "No answers yet" is a valid state, not an error: everything is
/// zero then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub answered: u32,
    pub correct: u32,
    pub incorrect: u32,
    /// round(correct / answered * 100).
    pub score: u32,
    pub total_time_seconds: u64,
    pub by_subject: BTreeMap<String, GroupStat>,
    pub by_difficulty: BTreeMap<Difficulty, GroupStat>,
}

pub fn summarize(questions: &[SessionQuestion], sheet: &AnswerSheet) -> ResultSummary {
    let mut correct = 0u32;
    let mut answered = 0u32;
    let mut total_time_seconds = 0u64;
    let mut by_subject: BTreeMap<String, GroupStat> = BTreeMap::new();
    let mut by_difficulty: BTreeMap<Difficulty, GroupStat> = BTreeMap::new();

    for record in sheet.records() {
        // Records always point into the session's question list; a missing
        // index would mean the sheet outlived its session.
        let Some(question) = questions.get(record.question_index) else {
            continue;
        };

        answered += 1;
        total_time_seconds += u64::from(record.time_spent_seconds);
        if record.correct {
            correct += 1;
        }

        let subject = by_subject.entry(question.subject.clone()).or_default();
        subject.total += 1;
        if record.correct {
            subject.correct += 1;
        }

        let difficulty = by_difficulty.entry(question.difficulty).or_default();
        difficulty.total += 1;
        if record.correct {
            difficulty.correct += 1;
        }
    }

    for stat in by_subject.values_mut().chain(by_difficulty.values_mut()) {
        stat.accuracy = percentage(stat.correct, stat.total);
    }

    ResultSummary {
        answered,
        correct,
        incorrect: answered - correct,
        score: percentage(correct, answered),
        total_time_seconds,
        by_subject,
        by_difficulty,
    }
}

pub fn percentage(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(correct) / f64::from(total) * 100.0).round() as u32
}
