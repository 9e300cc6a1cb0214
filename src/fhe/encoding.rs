//! Integer vectors to plaintext polynomials over R_p
//!
//! Values are centered: anything in [-(p-1)/2, (p-1)/2] encodes losslessly.
//! Batched vectors are evaluations at ζ^e for the slot exponents e, where ζ
//! is a primitive 2d-th root of unity mod p. Slots outside the vector are
//! zero, and the polynomial comes from the interpolation formula
//! m_i = d⁻¹ · Σ_e m(ζ^e) · ζ^(-e·i).

use crate::error::{Error, Result};
use crate::math::modular::find_primitive_root;
use crate::math::{ModQ, Poly};

use super::galois::slot_exponents;
use super::types::{Plaintext, SlotLayout};

#[derive(Debug, Clone)]
pub struct SlotEncoder {
    ring_dim: usize,
    p: u64,
    zeta: u64,
    d_inv: u64,
}

impl SlotEncoder {
    pub fn new(ring_dim: usize, p: u64) -> Result<Self> {
        let zeta = find_primitive_root(2 * ring_dim as u64, p)
            .ok_or_else(|| Error::validation("plaintext modulus has no 2d-th root of unity"))?;
        Ok(Self {
            ring_dim,
            p,
            zeta,
            d_inv: ModQ::inverse(ring_dim as u64, p),
        })
    }

    pub fn check_layout(&self, layout: SlotLayout) -> Result<()> {
        if let SlotLayout::Batched { slots } = layout {
            if !slots.is_power_of_two() || slots > self.ring_dim / 2 {
                return Err(Error::validation(format!(
                    "{} slots do not fit a batched layout at d={}",
                    slots, self.ring_dim
                )));
            }
        }
        Ok(())
    }

    pub fn encode(&self, values: &[i64], layout: SlotLayout) -> Result<Plaintext> {
        self.check_layout(layout)?;
        if values.len() > layout.capacity() {
            return Err(Error::validation(format!(
                "{} values exceed the {} slots of the layout",
                values.len(),
                layout.capacity()
            )));
        }
        let bound = (self.p - 1) / 2;
        if let Some(v) = values.iter().find(|v| v.unsigned_abs() > bound) {
            return Err(Error::validation(format!(
                "value {} is outside the plaintext range ±{}",
                v, bound
            )));
        }

        let d = self.ring_dim;
        let p = self.p;
        let poly = match layout {
            SlotLayout::Scalar => {
                let v = values.first().copied().unwrap_or(0);
                Poly::constant(ModQ::from_signed(v, p), d, p)
            }
            SlotLayout::Batched { slots } => {
                let mut coeffs = vec![0u64; d];
                for (&v, &e) in values.iter().zip(&slot_exponents(d, slots)) {
                    if v == 0 {
                        continue;
                    }
                    // ζ^(-e) = ζ^(2d - e)
                    let step = ModQ::pow(self.zeta, (2 * d - e) as u64, p);
                    let mut term = ModQ::mul(ModQ::from_signed(v, p), self.d_inv, p);
                    for c in coeffs.iter_mut() {
                        *c = ModQ::add(*c, term, p);
                        term = ModQ::mul(term, step, p);
                    }
                }
                Poly::from_coeffs(coeffs, p)
            }
        };
        Ok(Plaintext::new(poly))
    }

    /// Read back every slot of `layout`
    pub fn decode(&self, pt: &Plaintext, layout: SlotLayout) -> Result<Vec<i64>> {
        self.check_layout(layout)?;
        let p = self.p;
        match layout {
            SlotLayout::Scalar => Ok(vec![ModQ::to_signed(pt.poly.coeff(0), p)]),
            SlotLayout::Batched { slots } => Ok(slot_exponents(self.ring_dim, slots)
                .into_iter()
                .map(|e| ModQ::to_signed(self.evaluate(&pt.poly, e), p))
                .collect()),
        }
    }

    /// m(ζ^e) by Horner's rule
    fn evaluate(&self, poly: &Poly, e: usize) -> u64 {
        let point = ModQ::pow(self.zeta, e as u64, self.p);
        poly.coeffs()
            .iter()
            .rev()
            .fold(0u64, |acc, &c| ModQ::add(ModQ::mul(acc, point, self.p), c, self.p))
    }
}
