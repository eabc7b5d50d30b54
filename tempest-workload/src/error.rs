//! Error types for workload configuration and execution.
//!
//! Errors fall into four groups:
//! - [`ConfigError`]: the workload description is malformed. Raised before the
//!   shared handle is touched.
//! - [`RunError::Setup`]: the setup hook failed. No worker is started and
//!   teardown is skipped.
//! - [`WorkerError`]: a state function failed inside one worker. Buffered and
//!   reported after every worker has finished.
//! - Teardown failures, reported on the [`AggregatedResult`](crate::AggregatedResult)
//!   next to any worker errors.

use std::any::Any;

use thiserror::Error;

/// Boxed error returned by state functions and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Placeholder state name for a worker whose thread was lost before reporting.
pub const UNKNOWN_STATE: &str = "<unknown>";

/// A malformed workload description.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `thread_count` must be at least one.
    #[error("thread count must be at least 1, got {thread_count}")]
    InvalidThreadCount {
        /// The rejected thread count.
        thread_count: u32,
    },

    /// The start state is not a declared state.
    #[error("start state `{state}` is not a declared state")]
    UnknownStartState {
        /// The missing state name.
        state: String,
    },

    /// Transitions were declared for a state that does not exist.
    #[error("transitions declared for unknown state `{state}`")]
    UnknownTransitionSource {
        /// The missing state name.
        state: String,
    },

    /// A transition points at a state that does not exist.
    #[error("transition `{from}` -> `{to}` targets an unknown state")]
    UnknownTransitionTarget {
        /// Source state.
        from: String,
        /// Missing target state.
        to: String,
    },

    /// A transition weight is negative or not finite.
    #[error("transition `{from}` -> `{to}` has invalid weight {weight}")]
    InvalidWeight {
        /// Source state.
        from: String,
        /// Target state.
        to: String,
        /// The rejected weight.
        weight: f64,
    },

    /// A reachable state has iterations remaining but nowhere to go.
    #[error(
        "state `{state}` is reachable at iteration {iteration} but has no outgoing transitions"
    )]
    DeadEndState {
        /// The dead-end state.
        state: String,
        /// Earliest iteration at which the state can run.
        iteration: u64,
    },
}

/// Why a state function, setup or teardown hook did not complete.
#[derive(Debug, Error)]
pub enum Failure {
    /// The function returned an error.
    #[error("{0}")]
    Error(#[source] BoxError),

    /// The function panicked (typically a failed assertion).
    #[error("panicked: {0}")]
    Panic(String),

    /// The worker thread was lost before it could report.
    #[error("worker thread lost: {0}")]
    Lost(String),
}

impl Failure {
    /// Builds a failure from a payload caught by `catch_unwind`.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panic(message)
    }

    /// Returns true if the failure came from a panic.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }
}

/// A state function failure inside one worker.
#[derive(Debug, Error)]
#[error("worker {tid} failed in state `{state}` at iteration {iteration}: {failure}")]
pub struct WorkerError {
    /// Worker that failed.
    pub tid: u32,
    /// State being executed.
    pub state: String,
    /// Zero-based iteration index of the failing call.
    pub iteration: u64,
    /// The underlying failure.
    #[source]
    pub failure: Failure,
}

/// Errors that abort a run before any worker is started.
#[derive(Debug, Error)]
pub enum RunError {
    /// The workload description failed validation.
    #[error("invalid workload: {0}")]
    Config(#[from] ConfigError),

    /// The setup hook failed.
    #[error("setup failed: {0}")]
    Setup(#[source] Failure),
}

impl RunError {
    /// Returns the configuration error, if this is one.
    #[must_use]
    pub const fn as_config(&self) -> Option<&ConfigError> {
        match self {
            Self::Config(e) => Some(e),
            Self::Setup(_) => None,
        }
    }
}
