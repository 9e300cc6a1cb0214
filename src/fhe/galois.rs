//! Galois automorphisms and the batched slot orbit
//!
//! τ_g: R → R maps X to X^g for odd g. Over X^d + 1 a monomial X^i lands on
//! X^(g·i mod 2d), picking up a sign flip when that exponent reaches d.
//!
//! Batched slots sit at the evaluation points ζ^(g^k) of one cyclic orbit.
//! Applying τ_(g^j) to a ciphertext encrypting such a vector rotates the
//! slots left by j, but leaves the ciphertext under τ(s); a key switch from
//! τ(s) back to s finishes the rotation.

use crate::math::{ModQ, Poly};

use super::types::Ciphertext;

/// Apply τ_g to a polynomial
///
/// # Arguments
/// * `poly` - Input polynomial
/// * `g` - Galois element (odd, below 2d)
pub fn apply_automorphism(poly: &Poly, g: usize) -> Poly {
    let d = poly.dimension();
    let q = poly.modulus();
    let two_d = 2 * d;

    let mut out = vec![0u64; d];
    for (i, &coeff) in poly.coeffs().iter().enumerate() {
        if coeff == 0 {
            continue;
        }
        let idx = (g * i) % two_d;
        if idx < d {
            out[idx] = ModQ::add(out[idx], coeff, q);
        } else {
            out[idx - d] = ModQ::sub(out[idx - d], coeff, q);
        }
    }

    Poly::from_coeffs(out, q)
}

/// τ_g((a, b)) = (τ_g(a), τ_g(b)), now under τ_g(s)
pub fn automorphism_ciphertext(ct: &Ciphertext, g: usize) -> Ciphertext {
    Ciphertext::from_parts(apply_automorphism(&ct.a, g), apply_automorphism(&ct.b, g))
}

/// Generator of the order-`slots` subgroup of ⟨5⟩ ⊂ (Z/2dZ)^*
///
/// 5 has order d/2 modulo 2d, so 5^((d/2)/slots) has order `slots`.
pub fn orbit_generator(ring_dim: usize, slots: usize) -> usize {
    let two_d = 2 * ring_dim as u64;
    ModQ::pow(5, (ring_dim / 2 / slots) as u64, two_d) as usize
}

/// Exponents g^k mod 2d of the evaluation points backing each slot
pub fn slot_exponents(ring_dim: usize, slots: usize) -> Vec<usize> {
    let g = orbit_generator(ring_dim, slots);
    let two_d = 2 * ring_dim;
    let mut e = 1usize;
    (0..slots)
        .map(|_| {
            let cur = e;
            e = (e * g) % two_d;
            cur
        })
        .collect()
}

/// Galois elements g^(2^i), i = 0..log2(slots), used to sum a batched vector
pub fn slot_sum_elements(ring_dim: usize, slots: usize) -> Vec<usize> {
    let two_d = 2 * ring_dim;
    let mut g = orbit_generator(ring_dim, slots);
    let mut elements = Vec::new();
    let mut span = 1;
    while span < slots {
        elements.push(g);
        g = (g * g) % two_d;
        span <<= 1;
    }
    elements
}

/// Check if g is a valid Galois element for dimension d
pub fn is_valid_galois_element(g: usize, d: usize) -> bool {
    g % 2 == 1 && g < 2 * d
}
