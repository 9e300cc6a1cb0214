//! Plaintexts, ciphertexts and slot layouts

use serde::{Deserialize, Serialize};

use crate::math::Poly;

/// How a vector of integers is packed into a plaintext polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotLayout {
    /// A single value held as a constant polynomial.
    ///
    /// Constants act slot-wise, so a scalar also reads as the same value
    /// broadcast into every slot of a batched vector.
    Scalar,

    /// Up to `slots` values held as evaluations of the plaintext polynomial at
    /// ζ^(g^k), k = 0..slots, where g generates a cyclic subgroup of
    /// (Z/2dZ)^* of order `slots`. The automorphism X → X^(g^j) rotates such
    /// a vector by j positions.
    Batched { slots: usize },
}

impl SlotLayout {
    /// Number of values the layout carries.
    pub fn capacity(&self) -> usize {
        match self {
            SlotLayout::Scalar => 1,
            SlotLayout::Batched { slots } => *slots,
        }
    }
}

/// Plaintext polynomial over R_p
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plaintext {
    pub poly: Poly,
}

impl Plaintext {
    pub fn new(poly: Poly) -> Self {
        Self { poly }
    }

    pub fn ring_dim(&self) -> usize {
        self.poly.dimension()
    }
}

/// RLWE ciphertext (a, b) with phase b + a·s ≈ Δ·m
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub a: Poly,
    pub b: Poly,
}

impl Ciphertext {
    pub fn from_parts(a: Poly, b: Poly) -> Self {
        Self { a, b }
    }

    pub fn ring_dim(&self) -> usize {
        self.a.dimension()
    }

    pub fn modulus(&self) -> u64 {
        self.a.modulus()
    }
}
