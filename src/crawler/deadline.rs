//! Cooperative time budget for a crawl

use std::time::{Duration, Instant};

/// A wall-clock budget that starts when created
///
/// Checked between documents only; work in progress is never interrupted.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_is_expired() {
        let deadline = Deadline::new(Duration::ZERO);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_generous_budget_is_not_expired() {
        let deadline = Deadline::new(Duration::from_secs(3600));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() > Duration::from_secs(3500));
    }
}
