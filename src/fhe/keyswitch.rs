//! Gadget decomposition and key switching
//!
//! A key-switching key from s_src to s is the matrix of rows
//! K[i] = (a_i, -a_i·s + e_i + s_src·z^i) for i in 0..ℓ. Switching a
//! ciphertext (a, b) computes (0, b) + Σᵢ g⁻¹(a)ᵢ · K[i], which decrypts under
//! s to the same message (a, b) decrypted to under s_src.

use serde::{Deserialize, Serialize};

use crate::math::{GaussianSampler, ModQ, NttContext, Poly};
use crate::params::SchemeParams;

use super::types::Ciphertext;

/// Base-z decomposition parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gadget {
    pub base: u64,
    pub len: usize,
}

impl Gadget {
    pub fn from_params(params: &SchemeParams) -> Self {
        Self {
            base: params.gadget_base,
            len: params.gadget_len,
        }
    }

    /// [1, z, z², ..., z^(ℓ-1)] mod q
    pub fn powers(&self, q: u64) -> Vec<u64> {
        let mut acc = 1u64;
        (0..self.len)
            .map(|_| {
                let p = acc;
                acc = ModQ::mul(acc, self.base, q);
                p
            })
            .collect()
    }
}

/// Unsigned base-z digits of every coefficient, least significant first
pub fn gadget_decompose(poly: &Poly, gadget: &Gadget) -> Vec<Poly> {
    let d = poly.dimension();
    let q = poly.modulus();
    let mut digits = vec![vec![0u64; d]; gadget.len];

    for j in 0..d {
        let mut val = poly.coeff(j);
        for row in digits.iter_mut() {
            row[j] = val % gadget.base;
            val /= gadget.base;
        }
    }

    digits.into_iter().map(|c| Poly::from_coeffs(c, q)).collect()
}

/// Key-switching matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySwitchingKey {
    pub gadget: Gadget,
    pub rows: Vec<Ciphertext>,
}

impl KeySwitchingKey {
    /// Build the matrix switching from `source` to `target`
    pub fn generate(
        source: &Poly,
        target: &Poly,
        gadget: Gadget,
        ctx: &NttContext,
        sampler: &mut GaussianSampler,
    ) -> Self {
        let d = target.dimension();
        let q = target.modulus();

        let rows = gadget
            .powers(q)
            .into_iter()
            .map(|power| {
                let a = Poly::sample_uniform(d, q, sampler);
                let e = Poly::sample_gaussian(d, q, sampler);
                let b = &(&e - &a.mul_ntt(target, ctx)) + &source.scalar_mul(power);
                Ciphertext::from_parts(a, b)
            })
            .collect();

        Self { gadget, rows }
    }

    /// Whether every row lives in the ring of `params` with its gadget
    pub fn matches(&self, params: &SchemeParams) -> bool {
        self.gadget == Gadget::from_params(params)
            && self.rows.len() == self.gadget.len
            && self.rows.iter().all(|row| {
                row.a.matches_ring(params.ring_dim, params.q)
                    && row.b.matches_ring(params.ring_dim, params.q)
            })
    }
}

/// Re-encrypt `ct` under the key targeted by `key`
pub fn key_switch(ct: &Ciphertext, key: &KeySwitchingKey, ctx: &NttContext) -> Ciphertext {
    let d = ct.ring_dim();
    let q = ct.modulus();

    let mut result_a = Poly::zero(d, q);
    let mut result_b = ct.b.clone();

    for (digit, row) in gadget_decompose(&ct.a, &key.gadget).iter().zip(&key.rows) {
        result_a += digit.mul_ntt(&row.a, ctx);
        result_b += digit.mul_ntt(&row.b, ctx);
    }

    Ciphertext::from_parts(result_a, result_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(ct: &Ciphertext, s: &Poly, ctx: &NttContext) -> Poly {
        &ct.b + &ct.a.mul_ntt(s, ctx)
    }

    #[test]
    fn test_decompose_reconstructs() {
        let params = SchemeParams::insecure_d256();
        let gadget = Gadget::from_params(&params);
        let mut sampler = GaussianSampler::with_seed(params.sigma, 5);
        let poly = Poly::sample_uniform(params.ring_dim, params.q, &mut sampler);

        let digits = gadget_decompose(&poly, &gadget);
        let mut rebuilt = Poly::zero(params.ring_dim, params.q);
        for (digit, power) in digits.iter().zip(gadget.powers(params.q)) {
            assert!(digit.coeffs().iter().all(|&c| c < gadget.base));
            rebuilt += digit.scalar_mul(power);
        }
        assert_eq!(rebuilt, poly);
    }

    #[test]
    fn test_key_switch_preserves_phase() {
        let params = SchemeParams::insecure_d256();
        let (d, q) = (params.ring_dim, params.q);
        let ctx = NttContext::new(d, q).unwrap();
        let mut sampler = GaussianSampler::with_seed(params.sigma, 9);

        let s_src = Poly::sample_ternary(d, q, &mut sampler);
        let s_dst = Poly::sample_ternary(d, q, &mut sampler);
        let key = KeySwitchingKey::generate(&s_src, &s_dst, Gadget::from_params(&params), &ctx, &mut sampler);
        assert!(key.matches(&params));

        // Noiseless ciphertext of a large message under s_src
        let message = Poly::constant(params.delta() * 1234, d, q);
        let a = Poly::sample_uniform(d, q, &mut sampler);
        let b = &message - &a.mul_ntt(&s_src, &ctx);
        let ct = Ciphertext::from_parts(a, b);

        let switched = key_switch(&ct, &key, &ctx);
        let diff = &phase(&switched, &s_dst, &ctx) - &message;
        let max_err = diff
            .coeffs()
            .iter()
            .map(|&c| ModQ::to_signed(c, q).unsigned_abs())
            .max()
            .unwrap();
        assert!(max_err < params.delta() / 2, "key-switch noise {} too large", max_err);
    }
}
