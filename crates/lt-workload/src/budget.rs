//! ---
//! lt_section: "02-workloads"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Operation budget implementing run-level stop conditions."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
//! Run-level stop conditions shared by the instances a factory hands out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lt_common::LimitsConfig;
use once_cell::sync::OnceCell;

/// Counts completed operations against the configured limits.
///
/// The clock starts on the first call that observes the budget, so a
/// factory built long before the run does not eat into the run time.
/// The budget is exhausted as soon as any single limit is reached.
#[derive(Debug, Default)]
pub struct OperationBudget {
    max_writes: Option<u64>,
    max_reads: Option<u64>,
    run_time: Option<Duration>,
    writes: AtomicU64,
    reads: AtomicU64,
    started_at: OnceCell<Instant>,
}

impl OperationBudget {
    /// Budget with no limits; workers run until stopped externally.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Budget derived from the `[limits]` configuration section.
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        let mut budget = Self::unlimited();
        if let Some(max) = limits.max_writes {
            budget = budget.with_max_writes(max);
        }
        if let Some(max) = limits.max_reads {
            budget = budget.with_max_reads(max);
        }
        if let Some(run_time) = limits.run_time {
            budget = budget.with_run_time(run_time);
        }
        budget
    }

    /// Limit the number of successful writes.
    pub fn with_max_writes(mut self, max: u64) -> Self {
        self.max_writes = Some(max);
        self
    }

    /// Limit the number of successful reads.
    pub fn with_max_reads(mut self, max: u64) -> Self {
        self.max_reads = Some(max);
        self
    }

    /// Limit the wall time of the run.
    pub fn with_run_time(mut self, run_time: Duration) -> Self {
        self.run_time = Some(run_time);
        self
    }

    /// Record a successful write and return the new total.
    pub fn record_write(&self) -> u64 {
        self.start();
        self.writes.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a successful read and return the new total.
    pub fn record_read(&self) -> u64 {
        self.start();
        self.reads.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Successful writes so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Successful reads so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Time since the budget was first observed.
    pub fn elapsed(&self) -> Duration {
        self.start().elapsed()
    }

    /// Whether any configured limit has been reached.
    pub fn is_exhausted(&self) -> bool {
        if matches!(self.max_writes, Some(max) if self.writes() >= max) {
            return true;
        }
        if matches!(self.max_reads, Some(max) if self.reads() >= max) {
            return true;
        }
        matches!(self.run_time, Some(run_time) if self.elapsed() >= run_time)
    }

    fn start(&self) -> Instant {
        *self.started_at.get_or_init(Instant::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_budget_never_exhausts() {
        let budget = OperationBudget::unlimited();
        for _ in 0..1_000 {
            budget.record_write();
            budget.record_read();
        }
        assert!(!budget.is_exhausted());
        assert_eq!(budget.writes(), 1_000);
        assert_eq!(budget.reads(), 1_000);
    }

    #[test]
    fn any_limit_exhausts_the_budget() {
        let budget = OperationBudget::unlimited()
            .with_max_writes(3)
            .with_max_reads(100);
        budget.record_write();
        budget.record_write();
        assert!(!budget.is_exhausted());
        assert_eq!(budget.record_write(), 3);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn run_time_limit_exhausts_after_deadline() {
        let budget = OperationBudget::unlimited().with_run_time(Duration::from_millis(20));
        assert!(!budget.is_exhausted());
        std::thread::sleep(Duration::from_millis(30));
        assert!(budget.is_exhausted());
    }

    #[test]
    fn built_from_limits_config() {
        let limits = LimitsConfig {
            max_writes: None,
            max_reads: Some(1),
            run_time: None,
        };
        let budget = OperationBudget::from_limits(&limits);
        assert!(!budget.is_exhausted());
        budget.record_read();
        assert!(budget.is_exhausted());
    }
}
