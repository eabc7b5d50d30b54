//! Per-worker runtime state.

use rand_chacha::ChaCha8Rng;

use crate::seed::worker_rng;

/// State owned by a single worker for the length of one run.
///
/// State functions receive the context mutably. The scratch `data` is a
/// private copy of the workload's template, so mutations are never visible to
/// other workers; anything that must be shared goes through the shared handle.
#[derive(Debug, Clone)]
pub struct WorkerContext<D> {
    tid: u32,
    thread_count: u32,
    iterations: u64,
    rng: ChaCha8Rng,
    current_state: String,
    iteration: u64,
    iterations_completed: u64,
    /// Per-worker scratch data.
    pub data: D,
}

impl<D> WorkerContext<D> {
    /// Creates the context for worker `tid`.
    #[must_use]
    pub fn new(tid: u32, thread_count: u32, iterations: u64, run_seed: u64, data: D) -> Self {
        Self {
            tid,
            thread_count,
            iterations,
            rng: worker_rng(run_seed, tid),
            current_state: String::new(),
            iteration: 0,
            iterations_completed: 0,
            data,
        }
    }

    /// Worker id, `0..thread_count`.
    #[must_use]
    pub const fn tid(&self) -> u32 {
        self.tid
    }

    /// Number of workers in the run.
    #[must_use]
    pub const fn thread_count(&self) -> u32 {
        self.thread_count
    }

    /// Iteration budget of this worker.
    #[must_use]
    pub const fn iterations(&self) -> u64 {
        self.iterations
    }

    /// The state currently executing (empty before the first iteration).
    #[must_use]
    pub fn current_state(&self) -> &str {
        &self.current_state
    }

    /// Zero-based index of the current iteration.
    #[must_use]
    pub const fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Number of state calls that have returned successfully.
    #[must_use]
    pub const fn iterations_completed(&self) -> u64 {
        self.iterations_completed
    }

    /// The worker's generator. Draws made here also advance transition selection.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Consumes the context, returning the scratch data.
    #[must_use]
    pub fn into_data(self) -> D {
        self.data
    }

    pub(crate) fn enter(&mut self, iteration: u64, state: &str) {
        self.iteration = iteration;
        self.current_state.clear();
        self.current_state.push_str(state);
    }

    pub(crate) fn complete(&mut self) {
        self.iterations_completed += 1;
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn test_context_tracks_progress() {
        let mut ctx = WorkerContext::new(1, 4, 10, 99, Vec::<u32>::new());
        assert_eq!(ctx.tid(), 1);
        assert_eq!(ctx.thread_count(), 4);
        assert_eq!(ctx.current_state(), "");

        ctx.enter(0, "init");
        ctx.data.push(7);
        ctx.complete();

        assert_eq!(ctx.current_state(), "init");
        assert_eq!(ctx.iterations_completed(), 1);
        assert_eq!(ctx.into_data(), vec![7]);
    }

    #[test]
    fn test_context_rng_is_seeded_by_tid() {
        let mut a = WorkerContext::new(0, 2, 1, 5, ());
        let mut b = WorkerContext::new(0, 2, 1, 5, ());
        let mut c = WorkerContext::new(1, 2, 1, 5, ());

        let x: u64 = a.rng().gen();
        assert_eq!(x, b.rng().gen::<u64>());
        assert_ne!(x, c.rng().gen::<u64>());
    }
}
