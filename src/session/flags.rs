// src/session/flags.rs

use std::collections::HashSet;

/// Question ids marked for later review. Membership only; independent of
/// whether the question has been answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flagged: HashSet<i64>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership; returns whether the question is flagged afterwards.
    pub fn toggle(&mut self, question_id: i64) -> bool {
        if self.flagged.remove(&question_id) {
            false
        } else {
            self.flagged.insert(question_id);
            true
        }
    }

    pub fn is_flagged(&self, question_id: i64) -> bool {
        self.flagged.contains(&question_id)
    }

    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.flagged.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.flagged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }

    pub fn clear(&mut self) {
        self.flagged.clear();
    }
}
