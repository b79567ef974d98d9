/// Per-call time budget.
///
/// Started at the top of each detection call; both backends re-check it
/// between units of work (one triangle test, one delivered result) and
/// suspend by returning to the caller rather than blocking.

use std::time::{Duration, Instant};

/// Elapsed-time budget for one detection call.
///
/// A `Duration::MAX` slice never expires (useful for exhaustive scans in
/// tests); a `Duration::ZERO` slice expires after the first unit of
/// work, forcing single-step advancement.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    start: Instant,
    slice: Duration,
}

impl TimeBudget {
    /// Start a budget of the given slice duration.
    pub fn start(slice: Duration) -> Self {
        Self {
            start: Instant::now(),
            slice,
        }
    }

    /// An inexhaustible budget.
    pub fn unlimited() -> Self {
        Self::start(Duration::MAX)
    }

    /// Whether the slice has been used up.
    pub fn expired(&self) -> bool {
        self.slice != Duration::MAX && self.start.elapsed() > self.slice
    }

    /// Time spent since the budget was started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// The configured slice duration.
    pub fn slice(&self) -> Duration {
        self.slice
    }
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod tests;
