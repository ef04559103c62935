//! Deterministic random source.
//!
//! Every random draw in the simulation goes through an [`RngService`] owned by
//! the session; nothing reads a thread-local or platform RNG. Reseeding the
//! service replays the exact same stream.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::TAU;

/// Rejection attempts before [`RngService::truncated_normal`] gives up.
pub const TRUNCATED_NORMAL_TRIES: usize = 10;

/// Seedable stream providing uniform ranges, weighted picks and
/// truncated-normal samples.
#[derive(Clone, Debug)]
pub struct RngService {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RngService {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Restart the stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// Seed the stream was last (re)started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform float in [0, 1) with 53 bits of precision.
    pub fn unit(&mut self) -> f64 {
        (self.rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform float in `[min, max)`. Bounds may be given in either order;
    /// equal bounds return that bound. Always consumes one draw.
    pub fn uniform_range(&mut self, min: f64, max: f64) -> f64 {
        let (lo, hi) = ordered(min, max);
        let u = self.unit();
        lo + (hi - lo) * u
    }

    /// Bernoulli trial: true with probability `p` (clamped to [0,1]).
    pub fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    /// Picks an index with probability proportional to its weight.
    ///
    /// Negative and non-finite weights count as zero. Returns `None` when the
    /// total weight is not positive. The draw lands on the first index whose
    /// cumulative weight reaches it; zero-weight entries are never chosen. If
    /// rounding pushes the draw past the running sum, the last positive entry
    /// is returned.
    pub fn weighted_choice_index(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().copied().map(sanitize_weight).sum();
        if !(total > 0.0) || !total.is_finite() {
            return None;
        }
        let draw = self.unit() * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for (i, w) in weights.iter().copied().map(sanitize_weight).enumerate() {
            if w <= 0.0 {
                continue;
            }
            cumulative += w;
            last_positive = Some(i);
            if cumulative >= draw {
                return Some(i);
            }
        }
        last_positive
    }

    /// Standard normal sample via Box–Muller (two draws).
    pub fn standard_normal(&mut self) -> f64 {
        // 1 - unit() lies in (0, 1], keeping ln finite.
        let u1 = 1.0 - self.unit();
        let u2 = self.unit();
        (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }

    /// Normal sample restricted to `[min, max]` by rejection.
    ///
    /// After [`TRUNCATED_NORMAL_TRIES`] misses this returns the mean clamped
    /// into the range. That fallback biases the tail of very narrow windows
    /// and is kept as a known approximation. A non-positive or non-finite
    /// `sd` returns the clamped mean without drawing.
    pub fn truncated_normal(&mut self, mean: f64, sd: f64, min: f64, max: f64) -> f64 {
        let (lo, hi) = ordered(min, max);
        let fallback = if mean.is_nan() { lo } else { mean.max(lo).min(hi) };
        if !(sd > 0.0) || !sd.is_finite() {
            return fallback;
        }
        for _ in 0..TRUNCATED_NORMAL_TRIES {
            let sample = mean + sd * self.standard_normal();
            if (lo..=hi).contains(&sample) {
                return sample;
            }
        }
        fallback
    }
}

fn sanitize_weight(w: f64) -> f64 {
    if w.is_finite() && w > 0.0 {
        w
    } else {
        0.0
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
