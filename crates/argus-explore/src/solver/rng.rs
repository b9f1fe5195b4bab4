//! Per-stage RNG seeding with ChaCha8.
//!
//! Each generator stage gets its own ChaCha8Rng seeded from
//! `(global_seed + stage_id)`. Same seed -> same argument vectors, always.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Stage used by standalone random generation.
pub const STAGE_RANDOM: u64 = 0;
/// Stage used for tie-breaks and widening inside the search tree.
pub const STAGE_TREE: u64 = 1;
/// Stage used by the tree generator's random fallback.
pub const STAGE_FALLBACK: u64 = 2;

/// Create a deterministic RNG for a given global seed and stage ID.
pub fn stage_rng(global_seed: u64, stage_id: u64) -> ChaCha8Rng {
    let combined = global_seed.wrapping_add(stage_id);
    ChaCha8Rng::seed_from_u64(combined)
}
