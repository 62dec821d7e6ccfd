//! Per-match deterministic random number generation.
//!
//! Every match owns exactly one [`MatchRng`], seeded once at setup and
//! threaded through every roll. There is no process-wide generator, so
//! matches running on separate workers never observe each other.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded generator owned by a single match.
#[derive(Debug, Clone)]
pub struct MatchRng {
    seed: u64,
    inner: ChaCha8Rng,
    draws: u64,
}

impl MatchRng {
    /// Create a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            inner: ChaCha8Rng::seed_from_u64(seed),
            draws: 0,
        }
    }

    /// Seed this generator was created with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of values drawn so far.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }

    /// Uniform value in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.draws += 1;
        self.inner.gen::<f64>()
    }

    /// Uniform value in `[lo, hi]`. Returns `lo` when the range is empty.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            self.draws += 1;
            return lo;
        }
        lo + (hi - lo) * self.unit()
    }

    /// Uniform integer in `[lo, hi]` (inclusive).
    pub fn range_i32(&mut self, lo: i32, hi: i32) -> i32 {
        self.draws += 1;
        if hi <= lo {
            return lo;
        }
        self.inner.gen_range(lo..=hi)
    }

    /// Bernoulli trial with probability `p` (clamped to `[0, 1]`).
    pub fn chance(&mut self, p: f64) -> bool {
        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        self.unit() < p
    }

    /// Pick an index proportionally to `weights`.
    ///
    /// Non-positive weights are never picked. Returns `None` if no weight
    /// is positive.
    pub fn pick_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }
        let mut target = self.unit() * total;
        let mut last_positive = None;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            last_positive = Some(i);
            if target < *w {
                return Some(i);
            }
            target -= *w;
        }
        last_positive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = MatchRng::new(42);
        let mut b = MatchRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.unit().to_bits(), b.unit().to_bits());
        }
        assert_eq!(a.draws(), 100);
    }

    #[test]
    fn test_different_seed_diverges() {
        let mut a = MatchRng::new(1);
        let mut b = MatchRng::new(2);
        let same = (0..20).all(|_| a.unit().to_bits() == b.unit().to_bits());
        assert!(!same);
    }

    #[test]
    fn test_uniform_bounds() {
        let mut rng = MatchRng::new(7);
        for _ in 0..1000 {
            let v = rng.uniform(-0.4, 1.2);
            assert!((-0.4..=1.2).contains(&v));
        }
        assert_eq!(rng.uniform(3.0, 3.0), 3.0);
    }

    #[test]
    fn test_range_inclusive() {
        let mut rng = MatchRng::new(9);
        let mut seen_lo = false;
        let mut seen_hi = false;
        for _ in 0..2000 {
            let v = rng.range_i32(-2, 2);
            assert!((-2..=2).contains(&v));
            seen_lo |= v == -2;
            seen_hi |= v == 2;
        }
        assert!(seen_lo && seen_hi);
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = MatchRng::new(3);
        assert!((0..100).all(|_| !rng.chance(0.0)));
        assert!((0..100).all(|_| rng.chance(1.0)));
        assert!(!rng.chance(f64::NAN));
    }

    #[test]
    fn test_pick_weighted_skips_zero() {
        let mut rng = MatchRng::new(11);
        for _ in 0..500 {
            let idx = rng.pick_weighted(&[0.0, 1.0, 0.0, 3.0]).unwrap();
            assert!(idx == 1 || idx == 3);
        }
        assert_eq!(rng.pick_weighted(&[0.0, -1.0]), None);
    }
}
