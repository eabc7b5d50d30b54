//! Runs a workload: setup, concurrent workers, teardown.
//!
//! Every worker gets its own dedicated OS thread and runs against the same
//! shared handle, so all `thread_count` workers are live at once. A failing worker never cancels its
//! siblings; every error is collected and reported once all workers are done.
//! Teardown runs exactly once after the workers, whether or not they failed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::context::WorkerContext;
use crate::error::{Failure, RunError, WorkerError, UNKNOWN_STATE};
use crate::executor::{StateMachineExecutor, WorkerOutcome};
use crate::report::AggregatedResult;
use crate::seed::random_seed;
use crate::settings::RunSettings;
use crate::trace::StateTrace;
use crate::transition::TransitionSelector;
use crate::workload::{HookFn, WorkloadConfig};

/// Runs workloads according to a set of [`RunSettings`].
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    settings: RunSettings,
}

impl Scheduler {
    /// Creates a scheduler.
    #[must_use]
    pub const fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Runs `config` once against `handle`.
    ///
    /// The config is validated first; a [`RunError::Config`] means neither the
    /// handle nor any hook was touched. A [`RunError::Setup`] means setup
    /// failed, no worker started and teardown was skipped. Otherwise the
    /// returned result holds every worker error and the teardown outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if validation or setup fails.
    pub async fn run<D, H>(
        &self,
        mut config: WorkloadConfig<D, H>,
        handle: Arc<H>,
    ) -> Result<AggregatedResult, RunError>
    where
        D: Clone + Send + Sync + 'static,
        H: Send + Sync + 'static,
    {
        config.thread_count = self.settings.effective_threads(config.thread_count);
        config.iterations = self.settings.effective_iterations(config.iterations);
        config.validate()?;

        let seed = self.settings.seed.unwrap_or_else(random_seed);
        let thread_count = config.thread_count;
        let iterations = config.iterations;
        info!(
            seed,
            thread_count,
            iterations,
            start_state = %config.start_state,
            "starting workload"
        );

        let started = Instant::now();
        let config = Arc::new(config);

        if let Err(failure) = run_hook(Arc::clone(&config.setup), Arc::clone(&handle)).await {
            error!(seed, error = %failure, "setup failed, skipping workers and teardown");
            return Err(RunError::Setup(failure));
        }

        let pending = self.spawn_workers(&config, &handle, seed);
        let outcomes = join_workers(pending).await;

        let teardown_error = run_hook(Arc::clone(&config.teardown), handle).await.err();
        if let Some(failure) = &teardown_error {
            error!(seed, error = %failure, "teardown failed");
        }

        let result = AggregatedResult::from_outcomes(
            seed,
            thread_count,
            iterations,
            outcomes,
            teardown_error,
            started.elapsed(),
        );
        info!(
            seed,
            ok = result.ok,
            errors = result.errors.len(),
            invocations = result.total_invocations(),
            duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            "workload finished"
        );
        Ok(result)
    }

    fn spawn_workers<D, H>(
        &self,
        config: &Arc<WorkloadConfig<D, H>>,
        handle: &Arc<H>,
        seed: u64,
    ) -> Vec<PendingWorker>
    where
        D: Clone + Send + Sync + 'static,
        H: Send + Sync + 'static,
    {
        let selector = TransitionSelector::new(self.settings.transition_order);
        let record_visits = self.settings.record_trace;

        (0..config.thread_count)
            .map(|tid| {
                let config = Arc::clone(config);
                let handle = Arc::clone(handle);
                let mut ctx = WorkerContext::new(
                    tid,
                    config.thread_count,
                    config.iterations,
                    seed,
                    config.data.clone(),
                );
                let (outcome_tx, outcome_rx) = oneshot::channel();

                // Every worker must be live at once, so no capped pool.
                std::thread::Builder::new()
                    .name(format!("worker-{tid}"))
                    .spawn(move || {
                        let outcome = StateMachineExecutor::new(&config, selector)
                            .record_visits(record_visits)
                            .run(&mut ctx, &handle);
                        // The receiver only goes away if the run was dropped.
                        let _ = outcome_tx.send(outcome);
                    })
                    .map(|_| outcome_rx)
                    .map_err(|e| format!("failed to spawn worker thread {tid}: {e}"))
            })
            .collect()
    }
}

/// A worker thread's outcome channel, or why the thread never started.
type PendingWorker = Result<oneshot::Receiver<WorkerOutcome>, String>;

/// Runs `config` with `run_seed` and default settings otherwise.
///
/// # Errors
///
/// Returns an error if validation or setup fails.
pub async fn run_workload<D, H>(
    config: WorkloadConfig<D, H>,
    handle: Arc<H>,
    run_seed: u64,
) -> Result<AggregatedResult, RunError>
where
    D: Clone + Send + Sync + 'static,
    H: Send + Sync + 'static,
{
    Scheduler::new(RunSettings::default().with_seed(run_seed))
        .run(config, handle)
        .await
}

/// Waits for every worker. A lost worker is reported as its own error.
async fn join_workers(pending: Vec<PendingWorker>) -> Vec<WorkerOutcome> {
    let mut outcomes = Vec::with_capacity(pending.len());
    for (tid, worker) in (0u32..).zip(pending) {
        let received = match worker {
            Ok(outcome_rx) => outcome_rx
                .await
                .map_err(|_| format!("worker thread {tid} exited without reporting")),
            Err(e) => Err(e),
        };
        let outcome = received.unwrap_or_else(|reason| WorkerOutcome {
            tid,
            iterations_completed: 0,
            error: Some(WorkerError {
                tid,
                state: UNKNOWN_STATE.to_string(),
                iteration: 0,
                failure: Failure::Lost(reason),
            }),
            trace: StateTrace::default(),
        });
        if let Some(e) = &outcome.error {
            warn!(
                tid = e.tid,
                state = %e.state,
                iteration = e.iteration,
                error = %e.failure,
                "worker failed"
            );
        }
        outcomes.push(outcome);
    }
    outcomes
}

/// Runs a setup or teardown hook on the blocking pool, capturing panics.
async fn run_hook<H>(hook: HookFn<H>, handle: Arc<H>) -> Result<(), Failure>
where
    H: Send + Sync + 'static,
{
    let joined = tokio::task::spawn_blocking(move || {
        match panic::catch_unwind(AssertUnwindSafe(|| hook(&*handle))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Failure::Error(e)),
            Err(payload) => Err(Failure::from_panic(payload.as_ref())),
        }
    })
    .await;

    joined.unwrap_or_else(|e| Err(Failure::Lost(e.to_string())))
}
