//! Aggregated outcome of a workload run.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Failure, WorkerError};
use crate::executor::WorkerOutcome;
use crate::trace::{StateStats, StateTrace};

/// What one worker did, minus its error.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    /// Worker id.
    pub tid: u32,
    /// State calls that returned successfully.
    pub iterations_completed: u64,
    /// Executed states.
    pub trace: StateTrace,
}

/// Workers that failed the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureGroup {
    /// State that failed.
    pub state: String,
    /// Rendered failure.
    pub message: String,
    /// Workers that hit it, ascending.
    pub tids: Vec<u32>,
    /// Iteration each of those workers failed at, same order as `tids`.
    pub iterations: Vec<u64>,
}

impl std::fmt::Display for FailureGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} worker(s) {:?} failed in state `{}`: {}",
            self.tids.len(),
            self.tids,
            self.state,
            self.message
        )
    }
}

/// Result of one run: every worker error, the teardown outcome and stats.
#[derive(Debug)]
pub struct AggregatedResult {
    /// True if no worker failed and teardown succeeded.
    pub ok: bool,
    /// Seed the run used.
    pub seed: u64,
    /// Number of workers started.
    pub thread_count: u32,
    /// Iteration budget per worker.
    pub iterations: u64,
    /// Per-worker reports, by tid.
    pub workers: Vec<WorkerReport>,
    /// Every worker error, by tid.
    pub errors: Vec<WorkerError>,
    /// Teardown failure, if any.
    pub teardown_error: Option<Failure>,
    /// Per-state figures across all workers.
    pub state_stats: BTreeMap<String, StateStats>,
    /// Wall time from setup start to teardown end.
    pub duration: Duration,
}

impl AggregatedResult {
    pub(crate) fn from_outcomes(
        seed: u64,
        thread_count: u32,
        iterations: u64,
        mut outcomes: Vec<WorkerOutcome>,
        teardown_error: Option<Failure>,
        duration: Duration,
    ) -> Self {
        outcomes.sort_by_key(|o| o.tid);

        let mut state_stats: BTreeMap<String, StateStats> = BTreeMap::new();
        let mut workers = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();

        for outcome in outcomes {
            for (state, stats) in outcome.trace.stats() {
                state_stats.entry(state.clone()).or_default().merge(stats);
            }
            if let Some(error) = outcome.error {
                errors.push(error);
            }
            workers.push(WorkerReport {
                tid: outcome.tid,
                iterations_completed: outcome.iterations_completed,
                trace: outcome.trace,
            });
        }

        Self {
            ok: errors.is_empty() && teardown_error.is_none(),
            seed,
            thread_count,
            iterations,
            workers,
            errors,
            teardown_error,
            state_stats,
            duration,
        }
    }

    /// Returns the report for worker `tid`.
    #[must_use]
    pub fn worker(&self, tid: u32) -> Option<&WorkerReport> {
        self.workers.iter().find(|w| w.tid == tid)
    }

    /// Total state calls across workers, including failed ones.
    #[must_use]
    pub fn total_invocations(&self) -> u64 {
        self.state_stats.values().map(|s| s.invocations).sum()
    }

    /// Total successful state calls across workers.
    #[must_use]
    pub fn total_completed(&self) -> u64 {
        self.workers.iter().map(|w| w.iterations_completed).sum()
    }

    /// Groups identical failures so a bug hit by many workers is listed once.
    #[must_use]
    pub fn failure_groups(&self) -> Vec<FailureGroup> {
        let mut groups: BTreeMap<(String, String), FailureGroup> = BTreeMap::new();
        for error in &self.errors {
            let message = error.failure.to_string();
            let group = groups
                .entry((error.state.clone(), message.clone()))
                .or_insert_with(|| FailureGroup {
                    state: error.state.clone(),
                    message,
                    tids: Vec::new(),
                    iterations: Vec::new(),
                });
            group.tids.push(error.tid);
            group.iterations.push(error.iteration);
        }
        groups.into_values().collect()
    }

    /// Prints a human-readable summary.
    pub fn print_summary(&self) {
        println!("=== Workload Run ===");
        println!(
            "Seed {}: {} workers x {} iterations, {} calls ({} completed) in {}ms",
            self.seed,
            self.thread_count,
            self.iterations,
            self.total_invocations(),
            self.total_completed(),
            self.duration.as_millis()
        );
        for (state, stats) in &self.state_stats {
            println!(
                "  {state}: {} calls, {} failed, p50={}us p99={}us max={}us",
                stats.invocations,
                stats.failures,
                stats.latency_percentile_us(50.0),
                stats.latency_percentile_us(99.0),
                stats.latency_max_us()
            );
        }
        println!("Worker errors: {}", self.errors.len());
        for group in self.failure_groups() {
            println!("  - {group}");
        }
        if let Some(e) = &self.teardown_error {
            println!("Teardown failed: {e}");
        }
        println!("Result: {}", if self.ok { "PASS" } else { "FAIL" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(tid: u32, completed: u64, error: Option<(&str, u64, &str)>) -> WorkerOutcome {
        let mut trace = StateTrace::new(false);
        for i in 0..completed {
            trace.record(i, "step", Duration::from_micros(1), true);
        }
        let error = error.map(|(state, iteration, msg)| {
            trace.record(iteration, state, Duration::from_micros(1), false);
            WorkerError {
                tid,
                state: state.to_string(),
                iteration,
                failure: Failure::Error(msg.into()),
            }
        });
        WorkerOutcome {
            tid,
            iterations_completed: completed,
            error,
            trace,
        }
    }

    #[test]
    fn test_clean_run_is_ok() {
        let result = AggregatedResult::from_outcomes(
            1,
            2,
            5,
            vec![outcome(1, 5, None), outcome(0, 5, None)],
            None,
            Duration::ZERO,
        );
        assert!(result.ok);
        assert_eq!(result.workers[0].tid, 0);
        assert_eq!(result.total_invocations(), 10);
        assert_eq!(result.state_stats["step"].invocations, 10);
    }

    #[test]
    fn test_teardown_failure_fails_run() {
        let result = AggregatedResult::from_outcomes(
            1,
            1,
            5,
            vec![outcome(0, 5, None)],
            Some(Failure::Error("drop failed".into())),
            Duration::ZERO,
        );
        assert!(!result.ok);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_all_errors_kept_and_grouped() {
        let result = AggregatedResult::from_outcomes(
            1,
            4,
            10,
            vec![
                outcome(3, 2, Some(("write", 2, "duplicate key"))),
                outcome(0, 10, None),
                outcome(1, 7, Some(("write", 7, "duplicate key"))),
                outcome(2, 1, Some(("read", 1, "stale read"))),
            ],
            None,
            Duration::ZERO,
        );

        assert!(!result.ok);
        let tids: Vec<_> = result.errors.iter().map(|e| e.tid).collect();
        assert_eq!(tids, vec![1, 2, 3]);

        let groups = result.failure_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].state, "read");
        assert_eq!(groups[1].tids, vec![1, 3]);
        assert_eq!(groups[1].iterations, vec![7, 2]);
        assert_eq!(result.total_invocations(), 23);
        assert_eq!(result.total_completed(), 20);
    }
}
