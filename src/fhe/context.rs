//! Scheme context: the single entry point for homomorphic operations
//!
//! Every operation checks that its operands belong to this context's ring
//! before touching them. Operands decoded from the wire can carry any
//! dimension or modulus, and a mismatch is reported as
//! [`ProtocolError::ParameterMismatch`] rather than panicking deep inside
//! the NTT.

use tracing::debug;

use crate::error::{Error, ProtocolError, Result};
use crate::math::{GaussianSampler, ModQ, NttContext, Poly};
use crate::params::SchemeParams;

use super::encoding::SlotEncoder;
use super::galois::{automorphism_ciphertext, is_valid_galois_element, slot_sum_elements};
use super::keys::{GaloisKeys, KeyMaterial, PublicKey, RelinKey, SecretKey};
use super::keyswitch::key_switch;
use super::types::{Ciphertext, Plaintext, SlotLayout};

fn mismatch(what: impl Into<String>) -> Error {
    ProtocolError::ParameterMismatch(what.into()).into()
}

/// Validated parameters plus the precomputation every operation needs
#[derive(Debug, Clone)]
pub struct FheContext {
    params: SchemeParams,
    ntt: NttContext,
    encoder: SlotEncoder,
}

impl FheContext {
    pub fn new(params: SchemeParams) -> Result<Self> {
        params.validate().map_err(Error::validation)?;
        let ntt = NttContext::new(params.ring_dim, params.q).map_err(Error::validation)?;
        let encoder = SlotEncoder::new(params.ring_dim, params.p)?;
        Ok(Self {
            params,
            ntt,
            encoder,
        })
    }

    pub fn params(&self) -> &SchemeParams {
        &self.params
    }

    /// Galois elements needed to run slot sums over `layout`
    pub fn rotation_elements(&self, layout: SlotLayout) -> Vec<usize> {
        match layout {
            SlotLayout::Scalar => Vec::new(),
            SlotLayout::Batched { slots } => slot_sum_elements(self.params.ring_dim, slots),
        }
    }

    /// Generate a fresh secret key and the public material derived from it
    ///
    /// Rotation keys are only produced when `galois_elements` is non-empty.
    pub fn generate_keys(
        &self,
        galois_elements: &[usize],
        sampler: &mut GaussianSampler,
    ) -> (SecretKey, KeyMaterial) {
        let sk = SecretKey::generate(&self.params, sampler);
        let public = PublicKey::generate(&sk, &self.params, &self.ntt, sampler);
        let relin = RelinKey::generate(&sk, &self.params, &self.ntt, sampler);
        let galois = (!galois_elements.is_empty())
            .then(|| GaloisKeys::generate(&sk, galois_elements, &self.params, &self.ntt, sampler));

        debug!(
            ring_dim = self.params.ring_dim,
            rotations = galois_elements.len(),
            "generated key material"
        );
        (sk, KeyMaterial { public, relin, galois })
    }

    pub fn encode(&self, values: &[i64], layout: SlotLayout) -> Result<Plaintext> {
        self.encoder.encode(values, layout)
    }

    pub fn encode_constant(&self, value: i64) -> Result<Plaintext> {
        self.encoder.encode(&[value], SlotLayout::Scalar)
    }

    pub fn decode(&self, pt: &Plaintext, layout: SlotLayout) -> Result<Vec<i64>> {
        self.check_plaintext(pt)?;
        self.encoder.decode(pt, layout)
    }

    /// Public-key encryption: (a·u + e₁, b·u + e₂ + Δ·m)
    pub fn encrypt(
        &self,
        pt: &Plaintext,
        pk: &PublicKey,
        sampler: &mut GaussianSampler,
    ) -> Result<Ciphertext> {
        self.check_plaintext(pt)?;
        self.check_public_key(pk)?;
        let (d, q) = (self.params.ring_dim, self.params.q);

        let u = Poly::sample_ternary(d, q, sampler);
        let e1 = Poly::sample_gaussian(d, q, sampler);
        let e2 = Poly::sample_gaussian(d, q, sampler);

        let a = &pk.a.mul_ntt(&u, &self.ntt) + &e1;
        let b = &(&pk.b.mul_ntt(&u, &self.ntt) + &e2) + &self.scaled(pt);
        Ok(Ciphertext::from_parts(a, b))
    }

    /// Decrypt to round((b + a·s) / Δ) mod p
    pub fn decrypt(&self, ct: &Ciphertext, sk: &SecretKey) -> Result<Plaintext> {
        self.check_ciphertext(ct)?;
        if !sk.s.matches_ring(self.params.ring_dim, self.params.q) {
            return Err(mismatch("secret key ring differs from context"));
        }

        let delta = self.params.delta();
        let phase = &ct.b + &ct.a.mul_ntt(&sk.s, &self.ntt);
        let coeffs = phase
            .coeffs()
            .iter()
            .map(|&c| ((c + delta / 2) / delta) % self.params.p)
            .collect();
        Ok(Plaintext::new(Poly::from_coeffs(coeffs, self.params.p)))
    }

    pub fn add(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> Result<Ciphertext> {
        self.check_ciphertext(lhs)?;
        self.check_ciphertext(rhs)?;
        Ok(Ciphertext::from_parts(&lhs.a + &rhs.a, &lhs.b + &rhs.b))
    }

    pub fn sub(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> Result<Ciphertext> {
        self.check_ciphertext(lhs)?;
        self.check_ciphertext(rhs)?;
        Ok(Ciphertext::from_parts(&lhs.a - &rhs.a, &lhs.b - &rhs.b))
    }

    pub fn negate(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        Ok(Ciphertext::from_parts(-&ct.a, -&ct.b))
    }

    pub fn add_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        self.check_plaintext(pt)?;
        Ok(Ciphertext::from_parts(ct.a.clone(), &ct.b + &self.scaled(pt)))
    }

    pub fn sub_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        self.check_plaintext(pt)?;
        Ok(Ciphertext::from_parts(ct.a.clone(), &ct.b - &self.scaled(pt)))
    }

    /// Multiply by a plaintext; noise grows with the plaintext's magnitude
    pub fn mul_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        self.check_plaintext(pt)?;
        let lifted = self.lift_centered(pt);
        Ok(Ciphertext::from_parts(
            ct.a.mul_ntt(&lifted, &self.ntt),
            ct.b.mul_ntt(&lifted, &self.ntt),
        ))
    }

    /// Relinearize after a multiplication
    ///
    /// Plaintext multiplication keeps ciphertexts at two components, so the
    /// result is the input unchanged. The key is still checked so a session
    /// that lacks a usable relinearization key fails here.
    pub fn reduce(&self, ct: &Ciphertext, relin: &RelinKey) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        self.check_relin_key(relin)?;
        Ok(ct.clone())
    }

    /// Rotate batched slots left by the power of the orbit generator `g`
    pub fn rotate(&self, ct: &Ciphertext, g: usize, keys: &GaloisKeys) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        let key = keys
            .get(g)
            .ok_or_else(|| Error::from(ProtocolError::MissingKey(format!("rotation key for element {}", g))))?;
        if !key.matches(&self.params) {
            return Err(mismatch(format!("rotation key for element {} has the wrong shape", g)));
        }
        Ok(key_switch(&automorphism_ciphertext(ct, g), key, &self.ntt))
    }

    /// Sum all slots of a batched vector into every slot of its orbit
    pub fn slot_sum(&self, ct: &Ciphertext, slots: usize, keys: &GaloisKeys) -> Result<Ciphertext> {
        self.encoder.check_layout(SlotLayout::Batched { slots })?;
        let mut acc = ct.clone();
        for g in slot_sum_elements(self.params.ring_dim, slots) {
            let rotated = self.rotate(&acc, g, keys)?;
            acc = self.add(&acc, &rotated)?;
        }
        Ok(acc)
    }

    pub fn check_ciphertext(&self, ct: &Ciphertext) -> Result<()> {
        let (d, q) = (self.params.ring_dim, self.params.q);
        if !(ct.a.matches_ring(d, q) && ct.b.matches_ring(d, q)) {
            return Err(mismatch(format!(
                "ciphertext over (d={}, q={}) does not belong to (d={}, q={})",
                ct.ring_dim(),
                ct.modulus(),
                d,
                q
            )));
        }
        Ok(())
    }

    pub fn check_plaintext(&self, pt: &Plaintext) -> Result<()> {
        if !pt.poly.matches_ring(self.params.ring_dim, self.params.p) {
            return Err(mismatch(format!(
                "plaintext over (d={}, p={}) does not belong to (d={}, p={})",
                pt.ring_dim(),
                pt.poly.modulus(),
                self.params.ring_dim,
                self.params.p
            )));
        }
        Ok(())
    }

    pub fn check_public_key(&self, pk: &PublicKey) -> Result<()> {
        let (d, q) = (self.params.ring_dim, self.params.q);
        if !(pk.a.matches_ring(d, q) && pk.b.matches_ring(d, q)) {
            return Err(mismatch("public key ring differs from context"));
        }
        Ok(())
    }

    pub fn check_relin_key(&self, relin: &RelinKey) -> Result<()> {
        if !relin.ksk.matches(&self.params) {
            return Err(mismatch("relinearization key shape differs from context"));
        }
        Ok(())
    }

    /// Check that `keys` is well formed and covers every element in `required`
    pub fn check_galois_keys(&self, keys: &GaloisKeys, required: &[usize]) -> Result<()> {
        let d = self.params.ring_dim;
        for (&g, key) in &keys.keys {
            if !is_valid_galois_element(g, d) || !key.matches(&self.params) {
                return Err(mismatch(format!("rotation key for element {} is invalid", g)));
            }
        }
        if let Some(missing) = required.iter().find(|g| keys.get(**g).is_none()) {
            return Err(ProtocolError::MissingKey(format!("rotation key for element {}", missing)).into());
        }
        Ok(())
    }

    /// Δ·m over R_q
    fn scaled(&self, pt: &Plaintext) -> Poly {
        pt.poly.scalar_mul_into(self.params.delta(), self.params.q)
    }

    /// Centered lift of a plaintext from R_p into R_q
    fn lift_centered(&self, pt: &Plaintext) -> Poly {
        let values: Vec<i64> = pt
            .poly
            .coeffs()
            .iter()
            .map(|&c| ModQ::to_signed(c, self.params.p))
            .collect();
        Poly::from_signed(&values, self.params.ring_dim, self.params.q)
    }
}
