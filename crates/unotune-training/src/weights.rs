//! Weight vector operators: random seeding and breeding.
//!
//! # Breeding
//!
//! [`breed`] combines two parents gene by gene:
//!
//! 1. **Uniform crossover** - each gene is copied from either parent with probability 1/2
//! 2. **Mutation** - a [`MutationStep`] is added to the copied gene
//!
//! ## Mutation magnitude
//!
//! The step is `±e^(9 (u - 0.9))` with `u ~ U[0, 1)`, so its magnitude is log-uniform over
//! `[e^-8.1, e^0.9)`:
//!
//! - about 40% of steps are below `e^-4.5 ≈ 0.011` and barely move the gene
//! - about half land in `(0.011, 1)`
//! - about 10% exceed `1`, occasionally jumping far from both parents

use rand::{Rng, distr::Distribution};
use rand_distr::Uniform;
use unotune_engine::{NUM_VALUES, Weights};

/// Upper bound (exclusive) of genes in freshly seeded weight vectors.
pub const DEFAULT_INITIAL_MAX: f64 = 15.0;

/// Builds a weight vector by applying `f` to each gene index.
///
/// ```
/// use unotune_training::weights;
///
/// let w = weights::from_fn(|i| i as f64);
/// assert_eq!(w[11], 11.0);
/// ```
pub fn from_fn<F>(f: F) -> Weights
where
    F: FnMut(usize) -> f64,
{
    std::array::from_fn(f)
}

/// Draws every gene independently and uniformly from `[0, max)`.
///
/// # Panics
///
/// Panics if `max` is not a positive finite number.
pub fn random<R>(rng: &mut R, max: f64) -> Weights
where
    R: Rng + ?Sized,
{
    let uniform = Uniform::new(0.0, max).unwrap();
    from_fn(|_| uniform.sample(rng))
}

/// Signed, heavy-tailed mutation step `sign * e^(9 (u - 0.9))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutationStep;

impl MutationStep {
    /// Step for a drawn sign and `u` in `[0, 1)`.
    #[must_use]
    pub fn step(positive: bool, u: f64) -> f64 {
        let sign = if positive { 1.0 } else { -1.0 };
        sign * (9.0 * (u - 0.9)).exp()
    }
}

impl Distribution<f64> for MutationStep {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let positive = rng.random_bool(0.5);
        let u = rng.random::<f64>();
        Self::step(positive, u)
    }
}

/// Breeds one offspring from two parents by uniform crossover plus mutation.
///
/// For each gene the random draws happen in a fixed order (parent choice, sign, `u`), so a
/// seeded generator always produces the same offspring.
pub fn breed<R>(parent_a: &Weights, parent_b: &Weights, rng: &mut R) -> Weights
where
    R: Rng + ?Sized,
{
    let mut child = [0.0; NUM_VALUES];
    for (i, gene) in child.iter_mut().enumerate() {
        let chosen = if rng.random_bool(0.5) {
            parent_b[i]
        } else {
            parent_a[i]
        };
        *gene = chosen + MutationStep.sample(rng);
    }
    child
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_random_stays_in_range() {
        let mut rng = Pcg32::seed_from_u64(3);
        for _ in 0..100 {
            let w = random(&mut rng, DEFAULT_INITIAL_MAX);
            assert!(w.iter().all(|g| (0.0..DEFAULT_INITIAL_MAX).contains(g)));
        }
    }

    #[test]
    fn test_breed_is_reproducible() {
        let a = from_fn(|i| i as f64);
        let b = from_fn(|i| 100.0 + i as f64);
        let child1 = breed(&a, &b, &mut Pcg32::seed_from_u64(11));
        let child2 = breed(&a, &b, &mut Pcg32::seed_from_u64(11));
        assert_eq!(child1, child2);
        assert_eq!(child1.len(), NUM_VALUES);
    }

    #[test]
    fn test_breed_replays_draws() {
        let a = from_fn(|i| i as f64);
        let b = from_fn(|i| -100.0 - i as f64);
        let mut rng = Pcg32::seed_from_u64(2024);
        let mut replay = rng.clone();

        let child = breed(&a, &b, &mut rng);

        for i in 0..NUM_VALUES {
            let from_b = replay.random_bool(0.5);
            let positive = replay.random_bool(0.5);
            let u = replay.random::<f64>();
            let chosen = if from_b { b[i] } else { a[i] };
            let sign = if positive { 1.0 } else { -1.0 };
            let expected = chosen + sign * (9.0 * (u - 0.9)).exp();
            assert_eq!(child[i].to_bits(), expected.to_bits(), "gene {i}");
        }
    }

    #[test]
    fn test_mutation_step_bounds() {
        assert_eq!(MutationStep::step(true, 0.9), 1.0);
        assert_eq!(MutationStep::step(false, 0.9), -1.0);
        assert!(MutationStep::step(true, 0.0) < 0.001);
        assert!(MutationStep::step(true, 0.999_999) < (0.9f64).exp());
    }

    #[test]
    fn test_mutation_step_is_heavy_tailed() {
        let mut rng = Pcg32::seed_from_u64(99);
        let n = 20_000;
        let mut tiny = 0;
        let mut large = 0;
        for _ in 0..n {
            let step: f64 = MutationStep.sample(&mut rng);
            let m = step.abs();
            if m < (-4.5f64).exp() {
                tiny += 1;
            } else if m > 1.0 {
                large += 1;
            }
        }
        let tiny = f64::from(tiny) / f64::from(n);
        let large = f64::from(large) / f64::from(n);
        assert!((0.37..0.43).contains(&tiny), "tiny = {tiny}");
        assert!((0.07..0.13).contains(&large), "large = {large}");
    }
}
