//! Provisioning and validation of the shared target around a run.
//!
//! The scheduler never provisions anything itself. A [`ClusterFixture`]
//! builds the shared handle before a run and checks the target's global
//! consistency afterwards; [`run_with_fixture`] wires the two around one
//! [`Scheduler::run`] call.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::error::RunError;
use crate::report::AggregatedResult;
use crate::scheduler::Scheduler;
use crate::workload::WorkloadConfig;

/// Environment that provides the shared handle and validates it after a run.
#[allow(async_fn_in_trait)]
pub trait ClusterFixture {
    /// Handle passed to every state, setup and teardown call.
    type Handle: Send + Sync + 'static;
    /// Provisioning or validation failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Provisions the target and returns its handle.
    async fn before(&self) -> Result<Self::Handle, Self::Error>;

    /// Checks the target's consistency after a run.
    async fn after(&self, handle: &Self::Handle) -> Result<(), Self::Error>;
}

/// Errors from [`run_with_fixture`].
#[derive(Debug, Error)]
pub enum FixtureError<E: std::error::Error + 'static> {
    /// The target could not be provisioned.
    #[error("failed to provision target: {0}")]
    Provision(#[source] E),

    /// The run was rejected or its setup failed.
    #[error(transparent)]
    Run(#[from] RunError),

    /// The target failed its post-run consistency check.
    #[error("target failed validation after run: {source}")]
    Validate {
        /// Result of the run that preceded validation.
        result: Box<AggregatedResult>,
        /// Validation failure.
        #[source]
        source: E,
    },
}

/// Provisions the target, runs `config` against it, then validates it.
///
/// `after` is called whenever `before` succeeded, including when the run
/// itself was rejected. A validation failure on a rejected run is logged and
/// the run error is returned.
///
/// # Errors
///
/// Returns an error if provisioning, the run, or validation fails.
#[allow(clippy::future_not_send)]
pub async fn run_with_fixture<F, D>(
    fixture: &F,
    scheduler: &Scheduler,
    config: WorkloadConfig<D, F::Handle>,
) -> Result<AggregatedResult, FixtureError<F::Error>>
where
    F: ClusterFixture,
    D: Clone + Send + Sync + 'static,
{
    let handle = Arc::new(fixture.before().await.map_err(FixtureError::Provision)?);
    info!("target provisioned");

    let run = scheduler.run(config, Arc::clone(&handle)).await;
    let validation = fixture.after(&handle).await;

    match (run, validation) {
        (Ok(result), Ok(())) => Ok(result),
        (Ok(result), Err(source)) => Err(FixtureError::Validate {
            result: Box::new(result),
            source,
        }),
        (Err(e), validation) => {
            if let Err(v) = validation {
                warn!(error = %v, "target validation failed after rejected run");
            }
            Err(FixtureError::Run(e))
        }
    }
}
