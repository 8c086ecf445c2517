// src/session/navigator.rs

/// Cursor over the session's ordered question list.
///
/// Never leaves `[0, len)`. Reaching the last index is not a terminal state;
/// the session ends only through an explicit complete action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    index: usize,
    len: usize,
}

impl Navigator {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn current(&self) -> usize {
        self.index
    }

    /// Moves forward one question; no-op at the last index.
    pub fn advance(&mut self) -> usize {
        if self.index + 1 < self.len {
            self.index += 1;
        }
        self.index
    }

    /// Moves back one question; no-op at index 0.
    pub fn retreat(&mut self) -> usize {
        if self.index > 0 {
            self.index -= 1;
        }
        self.index
    }

    /// Jumps to an arbitrary index, clamped to the valid range.
    pub fn jump_to(&mut self, index: usize) -> usize {
        self.index = index.min(self.len.saturating_sub(1));
        self.index
    }
}
