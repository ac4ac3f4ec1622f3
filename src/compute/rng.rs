//! Random number generation for stochastic kernels.
//!
//! Kernels never own a generator. Callers create one per invocation from a
//! seed and thread it through; a [`SeedStrategy`] turns the run's base seed
//! into distinct per-step, per-stage seeds.

use rand::prelude::*;
use rand_distr::Binomial;

use super::SimError;

/// Largest count that is sampled exactly (2^53, the f64 integer limit).
pub const MAX_EXACT_COUNT: f64 = 9_007_199_254_740_992.0;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Which consumer a derived seed is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Transition,
    Dispersal,
    Replicate,
}

impl Stage {
    fn tag(self) -> u64 {
        match self {
            Stage::Transition => 0x7452_414e_5349_5431,
            Stage::Dispersal => 0x4449_5350_4552_5331,
            Stage::Replicate => 0x5245_504c_4943_4131,
        }
    }
}

/// Derives a seed from a base seed, an index and a stage.
pub trait SeedStrategy: Send + Sync {
    fn derive(&self, base: u64, index: usize, stage: Stage) -> u64;
}

/// Default strategy: SplitMix64 mixing of base seed, index and stage tag.
///
/// Distinct (index, stage) pairs give unrelated seeds for any base seed,
/// including 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct MixedSeeds;

impl SeedStrategy for MixedSeeds {
    fn derive(&self, base: u64, index: usize, stage: Stage) -> u64 {
        let z = splitmix64(base);
        let z = splitmix64(z ^ (index as u64).wrapping_add(1).wrapping_mul(GOLDEN_GAMMA));
        splitmix64(z ^ stage.tag())
    }
}

/// SplitMix64 finalizer.
#[inline]
pub fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Generator for one kernel invocation.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Draw from Binomial(`n`, `p`), never exceeding `n`.
///
/// `p` outside (0, 1) short-circuits without consuming randomness.
#[inline]
pub fn binomial<R: Rng + ?Sized>(rng: &mut R, n: u64, p: f64) -> u64 {
    if n == 0 || p.is_nan() || p <= 0.0 {
        return 0;
    }
    if p >= 1.0 {
        return n;
    }
    match Binomial::new(n, p) {
        Ok(dist) => dist.sample(rng).min(n),
        Err(_) => 0,
    }
}

/// Convert a non-negative value to a sampling count, truncating fractions.
pub fn to_count(what: &str, value: f64) -> Result<u64, SimError> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimError::invalid(
            what,
            format!("{value} is not a non-negative count"),
        ));
    }
    if value > MAX_EXACT_COUNT {
        return Err(SimError::NumericOverflow {
            what: what.to_string(),
            value,
        });
    }
    Ok(value.floor() as u64)
}

/// Reject values that [`to_count`] would refuse, and warn when fractional
/// values are about to be truncated.
pub(crate) fn check_counts(what: &str, values: &[f64]) -> Result<(), SimError> {
    if let Some(&value) = values.iter().find(|&&v| v > MAX_EXACT_COUNT) {
        return Err(SimError::NumericOverflow {
            what: what.to_string(),
            value,
        });
    }
    let fractional = values.iter().filter(|v| v.fract() != 0.0).count();
    if fractional > 0 {
        log::warn!("{what}: truncating {fractional} fractional counts for stochastic sampling");
    }
    Ok(())
}
