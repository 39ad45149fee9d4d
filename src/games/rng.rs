//! Randomness helpers shared by every engine.
//!
//! There is no global RNG: callers pass their own source, so a seeded
//! `ChaCha8Rng` reproduces any round exactly.

use crate::errors::GameError;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic source for tests and replays
pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// OS-seeded source for live play
pub fn system() -> ChaCha8Rng {
    ChaCha8Rng::from_entropy()
}

/// Uniform random permutation
pub fn shuffle<T, R: Rng + ?Sized>(mut items: Vec<T>, rng: &mut R) -> Vec<T> {
    items.shuffle(rng);
    items
}

/// Draw one item with probability proportional to `weight_fn(item)`.
///
/// Non-finite and negative weights count as zero. Fails with `EmptyDomain`
/// when there is nothing to draw from, including when every weight is zero.
pub fn weighted_pick<'a, T, F, R>(items: &'a [T], weight_fn: F, rng: &mut R) -> Result<&'a T, GameError>
where
    F: Fn(&T) -> f64,
    R: Rng + ?Sized,
{
    let weights = items.iter().map(|item| {
        let w = weight_fn(item);
        if w.is_finite() && w > 0.0 {
            w
        } else {
            0.0
        }
    });
    let dist = WeightedIndex::<f64>::new(weights).map_err(|_| GameError::EmptyDomain)?;
    Ok(&items[dist.sample(rng)])
}

/// Draw `count` distinct indices from `0..domain` without replacement
pub fn sample_indices<R: Rng + ?Sized>(domain: usize, count: usize, rng: &mut R) -> Result<Vec<usize>, GameError> {
    if count > domain {
        return Err(GameError::InvalidSelection(format!(
            "cannot draw {} distinct values from {}",
            count, domain
        )));
    }
    Ok(index::sample(rng, domain, count).into_vec())
}
