//! Per-worker record of executed states.
//!
//! Every worker keeps per-state call counts and a latency histogram. When
//! visit recording is enabled it also keeps the full ordered sequence of
//! visits, which is what makes a seeded worker's path comparable across runs.

use std::collections::BTreeMap;
use std::time::Duration;

use hdrhistogram::Histogram;

/// Significant figures kept by latency histograms.
const HISTOGRAM_SIGFIG: u8 = 3;

/// One executed state call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVisit {
    /// Zero-based iteration index.
    pub iteration: u64,
    /// State that ran.
    pub state: String,
    /// Wall time of the call in microseconds.
    pub latency_us: u64,
    /// Whether the call returned successfully.
    pub ok: bool,
}

/// Aggregate figures for one state.
#[derive(Debug, Clone)]
pub struct StateStats {
    /// Number of calls, including failed ones.
    pub invocations: u64,
    /// Number of failed calls.
    pub failures: u64,
    latency_us: Histogram<u64>,
}

impl StateStats {
    /// Creates empty stats.
    ///
    /// # Panics
    ///
    /// Panics if histogram creation fails (should not happen with valid parameters).
    #[must_use]
    pub fn new() -> Self {
        Self {
            invocations: 0,
            failures: 0,
            latency_us: Histogram::new(HISTOGRAM_SIGFIG).expect("histogram creation"),
        }
    }

    fn record(&mut self, latency_us: u64, ok: bool) {
        self.invocations += 1;
        if !ok {
            self.failures += 1;
        }
        self.latency_us.saturating_record(latency_us);
    }

    /// Folds another worker's stats for the same state into these.
    pub fn merge(&mut self, other: &Self) {
        self.invocations += other.invocations;
        self.failures += other.failures;
        // Both sides auto-resize, so adding never runs out of range.
        let _ = self.latency_us.add(&other.latency_us);
    }

    /// Latency at the given percentile, in microseconds.
    #[must_use]
    pub fn latency_percentile_us(&self, percentile: f64) -> u64 {
        self.latency_us.value_at_percentile(percentile)
    }

    /// Maximum observed latency, in microseconds.
    #[must_use]
    pub fn latency_max_us(&self) -> u64 {
        self.latency_us.max()
    }

    /// Mean latency, in microseconds.
    #[must_use]
    pub fn latency_mean_us(&self) -> f64 {
        self.latency_us.mean()
    }
}

impl Default for StateStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything one worker executed.
#[derive(Debug, Clone, Default)]
pub struct StateTrace {
    record_visits: bool,
    visits: Vec<StateVisit>,
    stats: BTreeMap<String, StateStats>,
}

impl StateTrace {
    /// Creates a trace. Visits are kept only if `record_visits` is set.
    #[must_use]
    pub fn new(record_visits: bool) -> Self {
        Self {
            record_visits,
            visits: Vec::new(),
            stats: BTreeMap::new(),
        }
    }

    /// Records one state call.
    #[allow(clippy::cast_possible_truncation)] // a single call won't run for 584k years.
    pub fn record(&mut self, iteration: u64, state: &str, elapsed: Duration, ok: bool) {
        let latency_us = elapsed.as_micros() as u64;

        self.stats
            .entry(state.to_string())
            .or_default()
            .record(latency_us, ok);

        if self.record_visits {
            self.visits.push(StateVisit {
                iteration,
                state: state.to_string(),
                latency_us,
                ok,
            });
        }
    }

    /// Returns true if visits are being kept.
    #[must_use]
    pub const fn records_visits(&self) -> bool {
        self.record_visits
    }

    /// Recorded visits in execution order.
    #[must_use]
    pub fn visits(&self) -> &[StateVisit] {
        &self.visits
    }

    /// Names of visited states in execution order.
    #[must_use]
    pub fn states(&self) -> Vec<&str> {
        self.visits.iter().map(|v| v.state.as_str()).collect()
    }

    /// Per-state figures.
    #[must_use]
    pub const fn stats(&self) -> &BTreeMap<String, StateStats> {
        &self.stats
    }

    /// Total state calls recorded.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.stats.values().map(|s| s.invocations).sum()
    }
}
