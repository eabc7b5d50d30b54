//! Deterministic per-worker seeding.
//!
//! Every worker owns a `ChaCha8Rng` keyed by the run seed, with the worker's
//! tid as the ChaCha stream. Workers never share a generator, so the draws a
//! worker sees depend only on `(run_seed, tid)` and how many draws it made.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Returns the generator for worker `tid` in a run seeded with `run_seed`.
#[must_use]
pub fn worker_rng(run_seed: u64, tid: u32) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(run_seed);
    rng.set_stream(u64::from(tid));
    rng
}

/// Picks a fresh run seed when none was configured.
#[must_use]
pub fn random_seed() -> u64 {
    rand::thread_rng().gen()
}
