//! Number-Theoretic Transform (NTT) for fast polynomial multiplication.
//!
//! Implements Cooley-Tukey radix-2 NTT for negacyclic convolution over
//! R_q = Z_q[X]/(X^d + 1). A primitive 2d-th root of unity ψ with ψ^d = -1
//! folds the negacyclic twist into the transform itself, so pointwise
//! products in the evaluation domain are products modulo X^d + 1.
//!
//! The modulus must satisfy q ≡ 1 (mod 2d) for ψ to exist.

use super::modular::{find_primitive_root, ModQ};

/// Precomputed NTT context with twiddle factors.
///
/// Create once per (dimension, modulus) pair and share it across every
/// polynomial multiplication of a session.
#[derive(Debug, Clone)]
pub struct NttContext {
    /// Ring dimension (power of two).
    n: usize,
    /// Prime modulus.
    q: u64,
    /// Forward twiddle factors, powers of ψ in bit-reversed order.
    psi_powers: Vec<u64>,
    /// Inverse twiddle factors, powers of ψ^(-1) in bit-reversed order.
    psi_inv_powers: Vec<u64>,
    /// n^(-1) mod q for inverse NTT scaling.
    n_inv: u64,
}

impl NttContext {
    /// Creates an NTT context for the given dimension and modulus.
    ///
    /// # Arguments
    ///
    /// * `n` - Ring dimension (must be a power of two)
    /// * `q` - Prime modulus (must satisfy q ≡ 1 mod 2n)
    pub fn new(n: usize, q: u64) -> Result<Self, &'static str> {
        if !n.is_power_of_two() || n < 2 {
            return Err("n must be a power of two");
        }
        if q % (2 * n as u64) != 1 {
            return Err("q must be ≡ 1 (mod 2n)");
        }

        let psi = find_primitive_root(2 * n as u64, q).ok_or("no primitive 2n-th root of unity")?;
        let psi_inv = ModQ::inverse(psi, q);

        Ok(Self {
            n,
            q,
            psi_powers: Self::bit_reversed_powers(n, psi, q),
            psi_inv_powers: Self::bit_reversed_powers(n, psi_inv, q),
            n_inv: ModQ::inverse(n as u64, q),
        })
    }

    /// Returns the ring dimension.
    pub fn dimension(&self) -> usize {
        self.n
    }

    /// Returns the modulus q.
    pub fn modulus(&self) -> u64 {
        self.q
    }

    /// Performs forward NTT in-place using Cooley-Tukey decimation-in-time.
    ///
    /// # Panics
    ///
    /// Panics if `coeffs.len() != n`.
    pub fn forward(&self, coeffs: &mut [u64]) {
        assert_eq!(coeffs.len(), self.n, "Input length must match dimension");
        let q = self.q;

        let mut t = self.n;
        let mut m = 1;
        while m < self.n {
            t >>= 1;
            for i in 0..m {
                let j1 = 2 * i * t;
                let w = self.psi_powers[m + i];

                for j in j1..j1 + t {
                    let u = coeffs[j];
                    let v = ModQ::mul(coeffs[j + t], w, q);

                    coeffs[j] = ModQ::add(u, v, q);
                    coeffs[j + t] = ModQ::sub(u, v, q);
                }
            }
            m <<= 1;
        }
    }

    /// Performs inverse NTT in-place using Gentleman-Sande decimation-in-frequency.
    ///
    /// # Panics
    ///
    /// Panics if `coeffs.len() != n`.
    pub fn inverse(&self, coeffs: &mut [u64]) {
        assert_eq!(coeffs.len(), self.n, "Input length must match dimension");
        let q = self.q;

        let mut t = 1;
        let mut m = self.n;
        while m > 1 {
            m >>= 1;
            for i in 0..m {
                let j1 = i * 2 * t;
                let w = self.psi_inv_powers[m + i];

                for j in j1..j1 + t {
                    let u = coeffs[j];
                    let v = coeffs[j + t];

                    coeffs[j] = ModQ::add(u, v, q);
                    coeffs[j + t] = ModQ::mul(ModQ::sub(u, v, q), w, q);
                }
            }
            t <<= 1;
        }

        for c in coeffs.iter_mut() {
            *c = ModQ::mul(*c, self.n_inv, q);
        }
    }

    /// Negacyclic product of two coefficient vectors.
    pub fn multiply(&self, a: &[u64], b: &[u64]) -> Vec<u64> {
        let mut a_ntt = a.to_vec();
        let mut b_ntt = b.to_vec();
        self.forward(&mut a_ntt);
        self.forward(&mut b_ntt);

        for (x, y) in a_ntt.iter_mut().zip(&b_ntt) {
            *x = ModQ::mul(*x, *y, self.q);
        }
        self.inverse(&mut a_ntt);
        a_ntt
    }

    fn bit_reversed_powers(n: usize, root: u64, q: u64) -> Vec<u64> {
        let bits = n.trailing_zeros();
        let mut powers = Vec::with_capacity(n);
        let mut acc = 1u64;
        for _ in 0..n {
            powers.push(acc);
            acc = ModQ::mul(acc, root, q);
        }
        (0..n)
            .map(|i| powers[i.reverse_bits() >> (usize::BITS - bits)])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DEFAULT_Q;

    fn naive_negacyclic(a: &[u64], b: &[u64], q: u64) -> Vec<u64> {
        let n = a.len();
        let mut out = vec![0u64; n];
        for i in 0..n {
            for j in 0..n {
                let prod = ModQ::mul(a[i], b[j], q);
                if i + j < n {
                    out[i + j] = ModQ::add(out[i + j], prod, q);
                } else {
                    out[i + j - n] = ModQ::sub(out[i + j - n], prod, q);
                }
            }
        }
        out
    }

    #[test]
    fn test_ntt_inverse_roundtrip() {
        for n in [32, 256, 2048] {
            let ctx = NttContext::new(n, DEFAULT_Q).unwrap();
            let original: Vec<u64> = (0..n as u64).map(|i| i * 12345 % DEFAULT_Q).collect();
            let mut coeffs = original.clone();

            ctx.forward(&mut coeffs);
            ctx.inverse(&mut coeffs);

            assert_eq!(coeffs, original, "roundtrip failed for n={}", n);
        }
    }

    #[test]
    fn test_matches_naive_multiplication() {
        let n = 64;
        let ctx = NttContext::new(n, DEFAULT_Q).unwrap();
        let a: Vec<u64> = (0..n as u64).map(|i| (i * 7919 + 3) % DEFAULT_Q).collect();
        let b: Vec<u64> = (0..n as u64).map(|i| DEFAULT_Q - 1 - i * 104729).collect();

        assert_eq!(ctx.multiply(&a, &b), naive_negacyclic(&a, &b, DEFAULT_Q));
    }

    #[test]
    fn test_negacyclic_wrap() {
        // X^(n-1) · X = X^n = -1
        let n = 256;
        let ctx = NttContext::new(n, DEFAULT_Q).unwrap();
        let mut a = vec![0u64; n];
        let mut b = vec![0u64; n];
        a[n - 1] = 1;
        b[1] = 1;

        let result = ctx.multiply(&a, &b);
        assert_eq!(result[0], DEFAULT_Q - 1);
        assert!(result[1..].iter().all(|&c| c == 0));
    }

    #[test]
    fn test_rejects_unfriendly_modulus() {
        assert!(NttContext::new(256, 65537 + 2).is_err());
        assert!(NttContext::new(100, DEFAULT_Q).is_err());
    }
}
