// src/session/timer.rs

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    /// A count-down reached zero. The caller decides what to do with it
    /// (the exam handlers auto-complete the session).
    Expired,
}

/// Session clock. Advances one second per external tick. It does no
/// scheduling of its own; the handler layer drives it from a tokio
/// interval task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTimer {
    /// Elapsed seconds since session start (practice modes).
    CountUp { elapsed: u64 },
    /// Remaining seconds of a fixed budget (mock exams).
    CountDown { remaining: u64 },
}

impl SessionTimer {
    pub fn count_up() -> Self {
        SessionTimer::CountUp { elapsed: 0 }
    }

    pub fn count_down(budget_seconds: u64) -> Self {
        SessionTimer::CountDown { remaining: budget_seconds }
    }

    pub fn tick(&mut self) -> TickOutcome {
        match self {
            SessionTimer::CountUp { elapsed } => {
                *elapsed += 1;
                TickOutcome::Running
            }
            SessionTimer::CountDown { remaining } => {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    TickOutcome::Expired
                } else {
                    TickOutcome::Running
                }
            }
        }
    }

    pub fn elapsed(&self) -> Option<u64> {
        match self {
            SessionTimer::CountUp { elapsed } => Some(*elapsed),
            SessionTimer::CountDown { .. } => None,
        }
    }

    pub fn remaining(&self) -> Option<u64> {
        match self {
            SessionTimer::CountUp { .. } => None,
            SessionTimer::CountDown { remaining } => Some(*remaining),
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, SessionTimer::CountDown { remaining: 0 })
    }
}
