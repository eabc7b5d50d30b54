//! Tempest Workload: concurrent probabilistic state-machine workloads.
//!
//! A workload is a declarative state machine: named state functions, weighted
//! transitions between them, a scratch-data template and setup/teardown hooks.
//! Running it starts `thread_count` workers at once against one shared handle
//! to the system under test. Each worker walks the machine for `iterations`
//! steps using its own seeded generator, so a worker's path is reproducible
//! while the interleaving between workers is left to the OS scheduler.
//!
//! # Architecture
//!
//! - [`WorkloadConfig`] / [`compose`]: descriptions and override-with-call-through
//!   derivation of new workloads from existing ones
//! - [`TransitionSelector`]: weighted choice of the next state
//! - [`StateMachineExecutor`]: one worker's iteration loop
//! - [`Scheduler`]: validation, setup, worker fan-out, teardown, aggregation
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tempest_workload::{run_workload, Transitions, WorkloadConfig};
//!
//! let config = WorkloadConfig::builder(0u64)
//!     .thread_count(4)
//!     .iterations(100)
//!     .state("init", |ctx, db: &Db| db.insert(ctx.tid(), 0))
//!     .state("update", |ctx, db: &Db| {
//!         ctx.data += 1;
//!         db.update(ctx.tid(), ctx.data)
//!     })
//!     .transitions("init", Transitions::new().with("update", 1.0))
//!     .transitions("update", Transitions::new().with("update", 1.0))
//!     .build();
//!
//! let result = run_workload(config, Arc::new(db), 42).await?;
//! assert!(result.ok, "{:?}", result.failure_groups());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod context;
mod error;
mod report;
mod trace;
mod transition;
mod workload;

pub mod compose;
pub mod executor;
pub mod fixture;
pub mod scheduler;
pub mod seed;
pub mod settings;

pub use context::WorkerContext;
pub use error::{BoxError, ConfigError, Failure, RunError, WorkerError, UNKNOWN_STATE};
pub use report::{AggregatedResult, FailureGroup, WorkerReport};
pub use trace::{StateStats, StateTrace, StateVisit};
pub use transition::{Edge, TransitionOrder, TransitionSelector, Transitions};
pub use workload::{
    HookFn, StateFn, StateResult, States, TransitionTable, WorkloadBuilder, WorkloadConfig,
    DEFAULT_START_STATE,
};

// Re-export entry points.
pub use compose::compose;
pub use executor::{StateMachineExecutor, WorkerOutcome};
pub use fixture::{run_with_fixture, ClusterFixture, FixtureError};
pub use scheduler::{run_workload, Scheduler};
pub use settings::{RunSettings, SettingsError};
