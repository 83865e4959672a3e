//! Reproducible random-stream splitting.
//!
//! Each replicate gets its own `StdRng`, seeded with `run seed + replicate
//! index`. `seed_from_u64` already expands the `u64` through PCG32, so
//! neighbouring sub-seeds still give unrelated streams. A replicate's draws
//! depend only on the run seed and its own index, never on which worker thread
//! ran it or in what order replicates were scheduled.

use rand::SeedableRng;
use rand::rngs::StdRng;

/// Sub-seed for replicate `index` of a run seeded with `seed`.
pub fn replicate_seed(seed: u64, index: u64) -> u64 {
    seed.wrapping_add(index)
}

pub fn replicate_rng(seed: u64, index: u64) -> StdRng {
    StdRng::seed_from_u64(replicate_seed(seed, index))
}
