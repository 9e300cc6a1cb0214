//! Key material
//!
//! The secret key stays with the owner: [`SecretKey`] deliberately has no
//! serde implementation and redacts itself in `Debug` output. Everything in
//! [`KeyMaterial`] is public and crosses the wire.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{GaussianSampler, NttContext, Poly};
use crate::params::SchemeParams;

use super::galois::apply_automorphism;
use super::keyswitch::{Gadget, KeySwitchingKey};

/// Ternary RLWE secret s
pub struct SecretKey {
    pub(crate) s: Poly,
}

impl SecretKey {
    pub fn generate(params: &SchemeParams, sampler: &mut GaussianSampler) -> Self {
        Self {
            s: Poly::sample_ternary(params.ring_dim, params.q, sampler),
        }
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("ring_dim", &self.s.dimension())
            .finish_non_exhaustive()
    }
}

/// Encryption key pk = (a, -a·s + e)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub a: Poly,
    pub b: Poly,
}

impl PublicKey {
    pub fn generate(
        sk: &SecretKey,
        params: &SchemeParams,
        ctx: &NttContext,
        sampler: &mut GaussianSampler,
    ) -> Self {
        let a = Poly::sample_uniform(params.ring_dim, params.q, sampler);
        let e = Poly::sample_gaussian(params.ring_dim, params.q, sampler);
        let b = &e - &a.mul_ntt(&sk.s, ctx);
        Self { a, b }
    }
}

/// Relinearization key: switches s² back to s
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelinKey {
    pub ksk: KeySwitchingKey,
}

impl RelinKey {
    pub fn generate(
        sk: &SecretKey,
        params: &SchemeParams,
        ctx: &NttContext,
        sampler: &mut GaussianSampler,
    ) -> Self {
        let s_squared = sk.s.mul_ntt(&sk.s, ctx);
        Self {
            ksk: KeySwitchingKey::generate(&s_squared, &sk.s, Gadget::from_params(params), ctx, sampler),
        }
    }
}

/// Rotation keys, one key-switching matrix τ_g(s) → s per Galois element g
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaloisKeys {
    pub keys: BTreeMap<usize, KeySwitchingKey>,
}

impl GaloisKeys {
    pub fn generate(
        sk: &SecretKey,
        elements: &[usize],
        params: &SchemeParams,
        ctx: &NttContext,
        sampler: &mut GaussianSampler,
    ) -> Self {
        let gadget = Gadget::from_params(params);
        let keys = elements
            .iter()
            .map(|&g| {
                let rotated = apply_automorphism(&sk.s, g);
                (g, KeySwitchingKey::generate(&rotated, &sk.s, gadget, ctx, sampler))
            })
            .collect();
        Self { keys }
    }

    pub fn get(&self, g: usize) -> Option<&KeySwitchingKey> {
        self.keys.get(&g)
    }

    pub fn elements(&self) -> impl Iterator<Item = usize> + '_ {
        self.keys.keys().copied()
    }
}

/// Public key material handed to the compute party, in wire order
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub public: PublicKey,
    pub relin: RelinKey,
    pub galois: Option<GaloisKeys>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_key_debug_is_redacted() {
        let params = SchemeParams::insecure_d256();
        let mut sampler = GaussianSampler::with_seed(params.sigma, 1);
        let sk = SecretKey::generate(&params, &mut sampler);
        let text = format!("{:?}", sk);
        assert!(text.contains("ring_dim"));
        assert!(!text.contains("coeffs"));
    }

    #[test]
    fn test_galois_keys_cover_requested_elements() {
        let params = SchemeParams::insecure_d256();
        let ctx = NttContext::new(params.ring_dim, params.q).unwrap();
        let mut sampler = GaussianSampler::with_seed(params.sigma, 2);
        let sk = SecretKey::generate(&params, &mut sampler);

        let keys = GaloisKeys::generate(&sk, &[3, 9], &params, &ctx, &mut sampler);
        assert_eq!(keys.elements().collect::<Vec<_>>(), vec![3, 9]);
        assert!(keys.get(3).unwrap().matches(&params));
        assert!(keys.get(5).is_none());
    }
}
