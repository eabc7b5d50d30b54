//! Override-with-call-through composition of workloads.
//!
//! A derived workload starts as a copy of its base and is handed, together
//! with the untouched base, to an `extend` callback. The callback replaces or
//! wraps entries of the copy, typically calling through to the base's version:
//!
//! ```ignore
//! let derived = compose(base, |mut child, parent| {
//!     if let Some(insert) = parent.state("insert") {
//!         child.states.insert("insert", move |ctx, db| {
//!             insert(ctx, db)?;
//!             ctx.data.inserted += 1;
//!             Ok(())
//!         });
//!     }
//!     child.iterations = 50;
//!     child
//! });
//! ```
//!
//! The parent is only borrowed for the duration of the callback and dropped
//! afterwards. Composition is sequential: composing again from a derived
//! workload hands the callback that derived workload as its parent.

use crate::workload::WorkloadConfig;

/// Derives a new workload from `base`.
///
/// `extend` receives a structural copy of `base` (scratch data cloned by
/// value, functions shared by reference) and `base` itself, and returns the
/// new workload. The base's functions are never mutated through the copy.
#[must_use]
pub fn compose<D, H, F>(base: WorkloadConfig<D, H>, extend: F) -> WorkloadConfig<D, H>
where
    D: Clone,
    F: FnOnce(WorkloadConfig<D, H>, &WorkloadConfig<D, H>) -> WorkloadConfig<D, H>,
{
    let child = base.clone();
    extend(child, &base)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::context::WorkerContext;
    use crate::transition::Transitions;
    use crate::workload::StateResult;

    type Config = WorkloadConfig<u32, AtomicU32>;

    fn base() -> Config {
        WorkloadConfig::builder(0)
            .iterations(3)
            .state("init", |ctx: &mut WorkerContext<u32>, hits: &AtomicU32| {
                ctx.data += 1;
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .transitions("init", Transitions::new().with("init", 1.0))
            .build()
    }

    fn call(config: &Config, state: &str, handle: &AtomicU32) -> u32 {
        let mut ctx = WorkerContext::new(0, 1, 1, 0, config.data);
        let f = config.state(state).expect("state declared");
        f(&mut ctx, handle).expect("state ok");
        ctx.data
    }

    fn add_one(mut child: Config, parent: &Config) -> Config {
        let inner = parent.state("init").expect("parent declares init");
        child.states.insert("init", move |ctx, hits| {
            inner(ctx, hits)?;
            ctx.data += 1;
            Ok(())
        });
        child
    }

    #[test]
    fn test_wrapped_state_calls_through() {
        let hits = AtomicU32::new(0);
        let derived = compose(base(), add_one);

        assert_eq!(call(&derived, "init", &hits), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parent_unchanged_by_child() {
        let hits = AtomicU32::new(0);
        let parent = base();
        let original = parent.state("init").expect("declared");
        let derived = compose(parent.clone(), add_one);

        assert!(Arc::ptr_eq(&original, &parent.state("init").expect("declared")));
        assert!(!Arc::ptr_eq(&original, &derived.state("init").expect("declared")));
        assert_eq!(call(&parent, "init", &hits), 1);
    }

    #[test]
    fn test_chained_composition_sees_previous_result() {
        let hits = AtomicU32::new(0);
        let derived = compose(compose(base(), add_one), |child, parent| {
            // The parent here is the first derivation, so its init adds 2.
            assert_eq!(call(parent, "init", &AtomicU32::new(0)), 2);
            add_one(child, parent)
        });

        assert_eq!(call(&derived, "init", &hits), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scratch_data_copied_by_value() {
        let derived = base().extend(|mut child, parent| {
            child.data = parent.data + 10;
            child
        });
        assert_eq!(derived.data, 10);
    }

    #[test]
    fn test_hooks_call_through() {
        let hits = AtomicU32::new(0);
        let parent = WorkloadConfig::<u32, AtomicU32>::builder(0)
            .setup(|hits| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();

        let derived = compose(parent, |mut child, parent| {
            let inner = Arc::clone(&parent.setup);
            child.setup = Arc::new(move |hits: &AtomicU32| -> StateResult {
                inner(hits)?;
                hits.fetch_add(10, Ordering::SeqCst);
                Ok(())
            });
            child
        });

        (derived.setup)(&hits).expect("setup ok");
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }
}
