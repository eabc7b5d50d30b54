//! Workload descriptions.
//!
//! A [`WorkloadConfig`] is plain data: named state functions, weighted
//! transitions between them, a scratch-data template copied into every worker,
//! and setup/teardown hooks run once per run against the shared handle.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::context::WorkerContext;
use crate::error::{BoxError, ConfigError};
use crate::transition::Transitions;

/// Default name of the first state a worker runs.
pub const DEFAULT_START_STATE: &str = "init";

/// Result of a state function or hook.
pub type StateResult = Result<(), BoxError>;

/// A named step run once per iteration by a worker.
pub type StateFn<D, H> = Arc<dyn Fn(&mut WorkerContext<D>, &H) -> StateResult + Send + Sync>;

/// Setup or teardown hook run against the shared handle.
pub type HookFn<H> = Arc<dyn Fn(&H) -> StateResult + Send + Sync>;

/// Transition table: source state to its outgoing edges.
pub type TransitionTable = BTreeMap<String, Transitions>;

/// State functions in declaration order.
pub struct States<D, H> {
    entries: Vec<(String, StateFn<D, H>)>,
}

impl<D, H> States<D, H> {
    /// Creates an empty set of states.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Declares a state, replacing an existing one of the same name in place.
    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut WorkerContext<D>, &H) -> StateResult + Send + Sync + 'static,
    {
        self.insert_arc(name, Arc::new(f));
    }

    /// Declares a state from an already shared function.
    pub fn insert_arc(&mut self, name: impl Into<String>, f: StateFn<D, H>) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = f;
        } else {
            self.entries.push((name, f));
        }
    }

    /// Removes a state.
    pub fn remove(&mut self, name: &str) -> Option<StateFn<D, H>> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Looks up a state function.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StateFn<D, H>> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Returns true if `name` is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// State names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of declared states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no state is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<D, H> Default for States<D, H> {
    fn default() -> Self {
        Self::new()
    }
}

// Function handles are shared, never duplicated.
impl<D, H> Clone for States<D, H> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<D, H> fmt::Debug for States<D, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn noop_hook<H>() -> HookFn<H> {
    Arc::new(|_: &H| -> StateResult { Ok(()) })
}

/// Declarative description of one concurrent workload.
///
/// `D` is the per-worker scratch data template, `H` the shared handle type.
pub struct WorkloadConfig<D, H> {
    /// Number of concurrent workers (at least 1).
    pub thread_count: u32,
    /// State calls per worker.
    pub iterations: u64,
    /// First state each worker runs.
    pub start_state: String,
    /// Named state functions.
    pub states: States<D, H>,
    /// Weighted outgoing edges per state.
    pub transitions: TransitionTable,
    /// Scratch data template, cloned into each worker.
    pub data: D,
    /// Run once before any worker starts.
    pub setup: HookFn<H>,
    /// Run once after every worker has finished.
    pub teardown: HookFn<H>,
}

impl<D: Clone, H> Clone for WorkloadConfig<D, H> {
    fn clone(&self) -> Self {
        Self {
            thread_count: self.thread_count,
            iterations: self.iterations,
            start_state: self.start_state.clone(),
            states: self.states.clone(),
            transitions: self.transitions.clone(),
            data: self.data.clone(),
            setup: Arc::clone(&self.setup),
            teardown: Arc::clone(&self.teardown),
        }
    }
}

impl<D: fmt::Debug, H> fmt::Debug for WorkloadConfig<D, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadConfig")
            .field("thread_count", &self.thread_count)
            .field("iterations", &self.iterations)
            .field("start_state", &self.start_state)
            .field("states", &self.states)
            .field("transitions", &self.transitions)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl<D, H> WorkloadConfig<D, H> {
    /// Creates a single-threaded, zero-iteration config with no states.
    #[must_use]
    pub fn new(data: D) -> Self {
        Self {
            thread_count: 1,
            iterations: 0,
            start_state: DEFAULT_START_STATE.to_string(),
            states: States::new(),
            transitions: TransitionTable::new(),
            data,
            setup: noop_hook(),
            teardown: noop_hook(),
        }
    }

    /// Starts a builder with the given scratch-data template.
    #[must_use]
    pub fn builder(data: D) -> WorkloadBuilder<D, H> {
        WorkloadBuilder::new(data)
    }

    /// Returns a shared handle to a state function, for call-through wrappers.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<StateFn<D, H>> {
        self.states.get(name).cloned()
    }

    /// Returns the outgoing edges of `state`.
    #[must_use]
    pub fn transitions_from(&self, state: &str) -> Option<&Transitions> {
        self.transitions.get(state)
    }

    /// Checks the description before anything is run.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: thread count, start state,
    /// transition sources and targets, weights, then reachable dead ends.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_count < 1 {
            return Err(ConfigError::InvalidThreadCount {
                thread_count: self.thread_count,
            });
        }

        if !self.states.contains(&self.start_state) {
            return Err(ConfigError::UnknownStartState {
                state: self.start_state.clone(),
            });
        }

        for (from, edges) in &self.transitions {
            if !self.states.contains(from) {
                return Err(ConfigError::UnknownTransitionSource {
                    state: from.clone(),
                });
            }
            for edge in edges.iter() {
                if !self.states.contains(&edge.target) {
                    return Err(ConfigError::UnknownTransitionTarget {
                        from: from.clone(),
                        to: edge.target.clone(),
                    });
                }
                if !edge.weight.is_finite() || edge.weight < 0.0 {
                    return Err(ConfigError::InvalidWeight {
                        from: from.clone(),
                        to: edge.target.clone(),
                        weight: edge.weight,
                    });
                }
            }
        }

        self.check_reachable_dead_ends()
    }

    /// Breadth-first walk from the start state over positive-weight edges.
    ///
    /// A state first reached at step `d` runs no earlier than iteration `d`
    /// and must be able to move on whenever `d + 1 < iterations`.
    fn check_reachable_dead_ends(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Ok(());
        }

        let mut depth: HashMap<&str, u64> = HashMap::new();
        let mut queue = VecDeque::new();
        depth.insert(self.start_state.as_str(), 0);
        queue.push_back((self.start_state.as_str(), 0u64));

        while let Some((state, d)) = queue.pop_front() {
            if d + 1 >= self.iterations {
                continue;
            }

            let Some(edges) = self
                .transitions
                .get(state)
                .filter(|e| e.total_weight() > 0.0)
            else {
                return Err(ConfigError::DeadEndState {
                    state: state.to_string(),
                    iteration: d,
                });
            };

            for edge in edges.iter() {
                if edge.weight > 0.0 && !depth.contains_key(edge.target.as_str()) {
                    depth.insert(edge.target.as_str(), d + 1);
                    queue.push_back((edge.target.as_str(), d + 1));
                }
            }
        }

        Ok(())
    }

    /// Builds a new config from this one with call-through access to it.
    ///
    /// See [`compose`](crate::compose::compose).
    #[must_use]
    pub fn extend<F>(self, extend: F) -> Self
    where
        D: Clone,
        F: FnOnce(Self, &Self) -> Self,
    {
        crate::compose::compose(self, extend)
    }
}

impl<D: Default, H> Default for WorkloadConfig<D, H> {
    fn default() -> Self {
        Self::new(D::default())
    }
}

/// Builder for [`WorkloadConfig`].
pub struct WorkloadBuilder<D, H> {
    config: WorkloadConfig<D, H>,
}

impl<D, H> WorkloadBuilder<D, H> {
    /// Creates a builder with the given scratch-data template.
    #[must_use]
    pub fn new(data: D) -> Self {
        Self {
            config: WorkloadConfig::new(data),
        }
    }

    /// Sets the number of concurrent workers.
    #[must_use]
    pub const fn thread_count(mut self, thread_count: u32) -> Self {
        self.config.thread_count = thread_count;
        self
    }

    /// Sets the number of state calls per worker.
    #[must_use]
    pub const fn iterations(mut self, iterations: u64) -> Self {
        self.config.iterations = iterations;
        self
    }

    /// Sets the first state.
    #[must_use]
    pub fn start_state(mut self, state: impl Into<String>) -> Self {
        self.config.start_state = state.into();
        self
    }

    /// Declares a state.
    #[must_use]
    pub fn state<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut WorkerContext<D>, &H) -> StateResult + Send + Sync + 'static,
    {
        self.config.states.insert(name, f);
        self
    }

    /// Declares the outgoing edges of `from`, replacing any previous ones.
    #[must_use]
    pub fn transitions(mut self, from: impl Into<String>, edges: Transitions) -> Self {
        self.config.transitions.insert(from.into(), edges);
        self
    }

    /// Sets the setup hook.
    #[must_use]
    pub fn setup<F>(mut self, f: F) -> Self
    where
        F: Fn(&H) -> StateResult + Send + Sync + 'static,
    {
        self.config.setup = Arc::new(f);
        self
    }

    /// Sets the teardown hook.
    #[must_use]
    pub fn teardown<F>(mut self, f: F) -> Self
    where
        F: Fn(&H) -> StateResult + Send + Sync + 'static,
    {
        self.config.teardown = Arc::new(f);
        self
    }

    /// Returns the built config. Validation happens when the config is run.
    #[must_use]
    pub fn build(self) -> WorkloadConfig<D, H> {
        self.config
    }
}

impl<D: Default, H> Default for WorkloadBuilder<D, H> {
    fn default() -> Self {
        Self::new(D::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut WorkerContext<()>, _: &()) -> StateResult {
        Ok(())
    }

    fn two_state(iterations: u64) -> WorkloadBuilder<(), ()> {
        WorkloadConfig::builder(())
            .thread_count(2)
            .iterations(iterations)
            .state("init", noop)
            .state("step", noop)
            .transitions("init", Transitions::new().with("step", 1.0))
            .transitions("step", Transitions::new().with("step", 1.0))
    }

    #[test]
    fn test_valid_config() {
        assert_eq!(two_state(5).build().validate(), Ok(()));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let config = two_state(5).thread_count(0).build();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidThreadCount { thread_count: 0 })
        );
    }

    #[test]
    fn test_unknown_start_state_rejected() {
        let config = two_state(5).start_state("missing").build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownStartState { state }) if state == "missing"
        ));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let config = two_state(5)
            .transitions("step", Transitions::new().with("nowhere", 1.0))
            .build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownTransitionTarget { from, to }) if from == "step" && to == "nowhere"
        ));
    }

    #[test]
    fn test_unknown_source_rejected() {
        let config = two_state(5)
            .transitions("ghost", Transitions::new().with("step", 1.0))
            .build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownTransitionSource { state }) if state == "ghost"
        ));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let config = two_state(5)
            .transitions("init", Transitions::new().with("step", -1.0))
            .build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn test_reachable_dead_end_rejected() {
        let config = two_state(5)
            .state("dangling", noop)
            .transitions("init", Transitions::new().with("dangling", 1.0))
            .transitions("dangling", Transitions::new())
            .build();
        assert_eq!(
            config.validate(),
            Err(ConfigError::DeadEndState {
                state: "dangling".to_string(),
                iteration: 1,
            })
        );
    }

    #[test]
    fn test_dead_end_in_final_iteration_allowed() {
        // "dangling" first runs at iteration 1, which is also the last.
        let config = two_state(2)
            .state("dangling", noop)
            .transitions("init", Transitions::new().with("dangling", 1.0))
            .build();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_unreachable_dead_end_allowed() {
        let config = two_state(10)
            .state("orphan", noop)
            .transitions("init", Transitions::new().with("step", 1.0).with("orphan", 0.0))
            .build();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_states_keep_declaration_order() {
        let config = two_state(1).state("alpha", noop).state("init", noop).build();
        let names: Vec<_> = config.states.names().collect();
        assert_eq!(names, vec!["init", "step", "alpha"]);
    }
}
