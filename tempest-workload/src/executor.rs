//! Single-worker state machine loop.
//!
//! Runs one worker's iterations in order: call the current state against the
//! shared handle, then draw from the worker's generator to pick the next
//! state. The loop adds no locking, batching or isolation around the calls.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use rand::Rng;
use tracing::{debug, trace};

use crate::context::WorkerContext;
use crate::error::{Failure, WorkerError};
use crate::trace::StateTrace;
use crate::transition::TransitionSelector;
use crate::workload::WorkloadConfig;

/// What one worker did.
#[derive(Debug)]
pub struct WorkerOutcome {
    /// Worker id.
    pub tid: u32,
    /// State calls that returned successfully.
    pub iterations_completed: u64,
    /// The failure that stopped the worker, if any.
    pub error: Option<WorkerError>,
    /// Executed states.
    pub trace: StateTrace,
}

/// Drives one worker through a workload's state machine.
pub struct StateMachineExecutor<'a, D, H> {
    config: &'a WorkloadConfig<D, H>,
    selector: TransitionSelector,
    record_visits: bool,
}

impl<'a, D, H> StateMachineExecutor<'a, D, H> {
    /// Creates an executor over a validated config.
    #[must_use]
    pub const fn new(config: &'a WorkloadConfig<D, H>, selector: TransitionSelector) -> Self {
        Self {
            config,
            selector,
            record_visits: false,
        }
    }

    /// Keeps every visit in the outcome's trace.
    #[must_use]
    pub const fn record_visits(mut self, record: bool) -> Self {
        self.record_visits = record;
        self
    }

    /// Runs `config.iterations` state calls, stopping at the first failure.
    ///
    /// Errors and panics raised by a state are neither retried nor swallowed:
    /// they end this worker's loop and are returned tagged with the tid, the
    /// state and the iteration index.
    pub fn run(&self, ctx: &mut WorkerContext<D>, handle: &H) -> WorkerOutcome {
        let tid = ctx.tid();
        let mut trace = StateTrace::new(self.record_visits);
        let mut state = self.config.start_state.clone();

        let error = self.run_loop(ctx, handle, &mut state, &mut trace);

        debug!(
            tid,
            completed = ctx.iterations_completed(),
            failed = error.is_some(),
            "worker finished"
        );

        WorkerOutcome {
            tid,
            iterations_completed: ctx.iterations_completed(),
            error,
            trace,
        }
    }

    fn run_loop(
        &self,
        ctx: &mut WorkerContext<D>,
        handle: &H,
        state: &mut String,
        trace: &mut StateTrace,
    ) -> Option<WorkerError> {
        let iterations = self.config.iterations;

        for iteration in 0..iterations {
            let Some(f) = self.config.states.get(state.as_str()) else {
                return Some(WorkerError {
                    tid: ctx.tid(),
                    state: state.clone(),
                    iteration,
                    failure: Failure::Error(format!("state `{state}` is not declared").into()),
                });
            };

            ctx.enter(iteration, state.as_str());
            trace!(tid = ctx.tid(), iteration, state = %state, "invoking state");

            let started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| f(ctx, handle)));
            let elapsed = started.elapsed();

            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(Failure::Error(e)),
                Err(payload) => Some(Failure::from_panic(payload.as_ref())),
            };
            trace.record(iteration, state.as_str(), elapsed, failure.is_none());

            if let Some(failure) = failure {
                return Some(WorkerError {
                    tid: ctx.tid(),
                    state: state.clone(),
                    iteration,
                    failure,
                });
            }
            ctx.complete();

            // No successor is needed after the final call.
            if iteration + 1 == iterations {
                break;
            }

            let draw: f64 = ctx.rng().gen();
            let next = self
                .config
                .transitions
                .get(state.as_str())
                .and_then(|edges| self.selector.next(edges, draw));
            match next {
                Some(next) => {
                    state.clear();
                    state.push_str(next);
                }
                None => {
                    return Some(WorkerError {
                        tid: ctx.tid(),
                        state: state.clone(),
                        iteration,
                        failure: Failure::Error(
                            format!("state `{state}` has no outgoing transitions").into(),
                        ),
                    });
                }
            }
        }

        None
    }
}
