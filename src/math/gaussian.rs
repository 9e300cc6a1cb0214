//! Randomness for key generation and encryption
//!
//! [`GaussianSampler`] owns the ChaCha20 stream a party draws all of its
//! secret randomness from: discrete Gaussian errors, ternary secrets and
//! uniform masks.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Default Gaussian standard deviation
pub const DEFAULT_SIGMA: f64 = 3.2;

/// Discrete Gaussian sampler over Z using rejection sampling
#[derive(Clone)]
pub struct GaussianSampler {
    /// Standard deviation σ
    sigma: f64,
    /// Tailcut: reject samples beyond this many standard deviations
    tailcut: i64,
    rng: ChaCha20Rng,
}

impl GaussianSampler {
    /// Sampler seeded from OS entropy
    pub fn new(sigma: f64) -> Self {
        Self::with_rng(sigma, ChaCha20Rng::from_entropy())
    }

    /// Deterministic sampler, for tests and benchmarks only
    pub fn with_seed(sigma: f64, seed: u64) -> Self {
        Self::with_rng(sigma, ChaCha20Rng::seed_from_u64(seed))
    }

    fn with_rng(sigma: f64, rng: ChaCha20Rng) -> Self {
        Self {
            sigma,
            tailcut: (sigma * 6.0).ceil() as i64,
            rng,
        }
    }

    /// Get the standard deviation
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Sample a single value from the discrete Gaussian D_σ
    pub fn sample(&mut self) -> i64 {
        let sigma_sq_2 = 2.0 * self.sigma * self.sigma;
        let bound = self.tailcut;

        loop {
            let x = self.rng.gen_range(-bound..=bound);

            // Accept with probability proportional to exp(-x²/(2σ²))
            let prob = (-((x * x) as f64) / sigma_sq_2).exp();
            let u: f64 = self.rng.gen();
            if u < prob {
                return x;
            }
        }
    }

    /// Sample a value as unsigned mod q, negatives wrapping to q - |x|
    pub fn sample_centered(&mut self, q: u64) -> u64 {
        let s = self.sample();
        if s >= 0 {
            s as u64
        } else {
            q - s.unsigned_abs()
        }
    }

    /// Sample a vector of Gaussian values as unsigned mod q
    pub fn sample_vec_centered(&mut self, len: usize, q: u64) -> Vec<u64> {
        (0..len).map(|_| self.sample_centered(q)).collect()
    }

    /// Uniform ternary vector over {-1, 0, 1} mod q
    pub fn sample_ternary(&mut self, len: usize, q: u64) -> Vec<u64> {
        (0..len)
            .map(|_| match self.rng.gen_range(0..3u8) {
                0 => q - 1,
                1 => 0,
                _ => 1,
            })
            .collect()
    }

    /// Uniform vector over Z_q
    pub fn sample_uniform(&mut self, len: usize, q: u64) -> Vec<u64> {
        (0..len).map(|_| self.rng.gen_range(0..q)).collect()
    }
}

impl std::fmt::Debug for GaussianSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaussianSampler")
            .field("sigma", &self.sigma)
            .field("tailcut", &self.tailcut)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_within_tailcut() {
        let mut sampler = GaussianSampler::new(DEFAULT_SIGMA);
        let bound = (6.0 * DEFAULT_SIGMA).ceil() as i64;
        for _ in 0..1000 {
            assert!(sampler.sample().abs() <= bound);
        }
    }

    #[test]
    fn test_deterministic_seeding() {
        let mut sampler1 = GaussianSampler::with_seed(DEFAULT_SIGMA, 12345);
        let mut sampler2 = GaussianSampler::with_seed(DEFAULT_SIGMA, 12345);
        for _ in 0..100 {
            assert_eq!(sampler1.sample(), sampler2.sample());
        }
    }

    #[test]
    fn test_entropy_seeded_samplers_differ() {
        let mut a = GaussianSampler::new(DEFAULT_SIGMA);
        let mut b = GaussianSampler::new(DEFAULT_SIGMA);
        assert_ne!(a.sample_uniform(8, u64::MAX), b.sample_uniform(8, u64::MAX));
    }

    #[test]
    fn test_distribution_variance() {
        let mut sampler = GaussianSampler::with_seed(DEFAULT_SIGMA, 42);
        let n = 100_000;
        let samples: Vec<i64> = (0..n).map(|_| sampler.sample()).collect();
        let mean = samples.iter().sum::<i64>() as f64 / n as f64;
        let variance = samples
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / n as f64;

        let expected = DEFAULT_SIGMA * DEFAULT_SIGMA;
        assert!(mean.abs() < 0.1, "Mean {} is too far from 0", mean);
        assert!(
            (variance - expected).abs() / expected < 0.1,
            "Variance {} differs from expected {}",
            variance,
            expected
        );
    }

    #[test]
    fn test_ternary_values() {
        let q = 97;
        let mut sampler = GaussianSampler::with_seed(DEFAULT_SIGMA, 7);
        let v = sampler.sample_ternary(1000, q);
        assert!(v.iter().all(|&c| c == 0 || c == 1 || c == q - 1));
        assert!(v.contains(&0) && v.contains(&1) && v.contains(&(q - 1)));
    }
}
