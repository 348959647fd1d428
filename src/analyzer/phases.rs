//! Wall-clock budgeting for the analysis phases.
//!
//! A single file's analysis runs as three phases (parse, extract,
//! mark-lines). Each phase checks the shared budget before starting and
//! again at batch boundaries while walking lines or nodes. A phase that
//! runs out of budget returns whatever it has computed so far; it never
//! blocks or fails outright.

use std::time::{Duration, Instant};

use crate::config::CoverageConfig;

/// Elapsed-time budget shared by all phases of one file's analysis.
#[derive(Debug, Clone)]
pub struct PhaseBudget {
    started: Instant,
    limit: Duration,
    batch_size: usize,
}

impl PhaseBudget {
    pub fn new(limit: Duration, batch_size: usize) -> Self {
        Self {
            started: Instant::now(),
            limit,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &CoverageConfig) -> Self {
        Self::new(
            Duration::from_millis(config.analysis_budget_ms),
            config.batch_size,
        )
    }

    /// Polling check against the wall clock.
    pub fn exhausted(&self) -> bool {
        self.started.elapsed() >= self.limit
    }

    /// True when work should continue past `index`. Only polls the clock
    /// at batch boundaries so the check stays cheap in tight loops.
    pub fn check_batch(&self, index: usize) -> bool {
        if index % self.batch_size != 0 {
            return true;
        }
        !self.exhausted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_budget_is_not_exhausted() {
        let budget = PhaseBudget::new(Duration::from_secs(10), 100);
        assert!(!budget.exhausted());
        assert!(budget.check_batch(0));
        assert!(budget.check_batch(100));
    }

    #[test]
    fn zero_budget_is_exhausted_immediately() {
        let budget = PhaseBudget::new(Duration::ZERO, 100);
        assert!(budget.exhausted());
        assert!(!budget.check_batch(0));
    }

    #[test]
    fn non_boundary_indices_skip_the_clock() {
        let budget = PhaseBudget::new(Duration::ZERO, 100);
        // Mid-batch indices never poll, so they keep going even when
        // the budget is spent.
        assert!(budget.check_batch(1));
        assert!(budget.check_batch(99));
        assert!(!budget.check_batch(200));
    }
}
