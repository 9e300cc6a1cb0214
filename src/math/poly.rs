//! Polynomial operations over R_q = Z_q[X]/(X^d + 1).
//!
//! Polynomials are always held in coefficient form; multiplication goes
//! through [`NttContext::multiply`] and returns coefficients again.

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use super::gaussian::GaussianSampler;
use super::modular::ModQ;
use super::ntt::NttContext;

/// Polynomial in R_q = Z_q[X]/(X^d + 1).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poly {
    /// Coefficients, lowest degree first.
    coeffs: Vec<u64>,
    /// Modulus q.
    q: u64,
}

impl Poly {
    /// Create zero polynomial with given dimension and modulus
    pub fn zero(dim: usize, q: u64) -> Self {
        Self {
            coeffs: vec![0; dim],
            q,
        }
    }

    /// Create polynomial from coefficient vector, reducing mod q
    pub fn from_coeffs(mut coeffs: Vec<u64>, q: u64) -> Self {
        for c in coeffs.iter_mut() {
            *c %= q;
        }
        Self { coeffs, q }
    }

    /// Create polynomial from signed coefficients
    pub fn from_signed(values: &[i64], dim: usize, q: u64) -> Self {
        let mut coeffs = vec![0; dim];
        for (c, &v) in coeffs.iter_mut().zip(values) {
            *c = ModQ::from_signed(v, q);
        }
        Self { coeffs, q }
    }

    /// Create constant polynomial
    pub fn constant(value: u64, dim: usize, q: u64) -> Self {
        let mut p = Self::zero(dim, q);
        if dim > 0 {
            p.coeffs[0] = value % q;
        }
        p
    }

    /// Sample polynomial with coefficients from discrete Gaussian distribution
    pub fn sample_gaussian(dim: usize, q: u64, sampler: &mut GaussianSampler) -> Self {
        Self {
            coeffs: sampler.sample_vec_centered(dim, q),
            q,
        }
    }

    /// Sample polynomial with ternary coefficients
    pub fn sample_ternary(dim: usize, q: u64, sampler: &mut GaussianSampler) -> Self {
        Self {
            coeffs: sampler.sample_ternary(dim, q),
            q,
        }
    }

    /// Sample uniformly random polynomial
    pub fn sample_uniform(dim: usize, q: u64, sampler: &mut GaussianSampler) -> Self {
        Self {
            coeffs: sampler.sample_uniform(dim, q),
            q,
        }
    }

    pub fn dimension(&self) -> usize {
        self.coeffs.len()
    }

    pub fn modulus(&self) -> u64 {
        self.q
    }

    pub fn coeff(&self, i: usize) -> u64 {
        self.coeffs[i]
    }

    pub fn coeffs(&self) -> &[u64] {
        &self.coeffs
    }

    /// Whether every coefficient lies in [0, q)
    ///
    /// Deserialized polynomials must be checked before use.
    pub fn is_reduced(&self) -> bool {
        self.coeffs.iter().all(|&c| c < self.q)
    }

    /// Check that `self` lives in the ring described by `dim` and `q`
    pub fn matches_ring(&self, dim: usize, q: u64) -> bool {
        self.dimension() == dim && self.q == q && self.is_reduced()
    }

    /// Multiply by a scalar
    pub fn scalar_mul(&self, scalar: u64) -> Self {
        let s = scalar % self.q;
        Self {
            coeffs: self.coeffs.iter().map(|&c| ModQ::mul(c, s, self.q)).collect(),
            q: self.q,
        }
    }

    /// Multiply every coefficient by `scalar`, reducing into Z_`target_q`
    ///
    /// Used to lift a plaintext over R_p into R_q as Δ·m.
    pub fn scalar_mul_into(&self, scalar: u64, target_q: u64) -> Self {
        Self {
            coeffs: self
                .coeffs
                .iter()
                .map(|&c| ModQ::mul(c, scalar, target_q))
                .collect(),
            q: target_q,
        }
    }

    /// Negacyclic product via NTT
    pub fn mul_ntt(&self, other: &Self, ctx: &NttContext) -> Self {
        debug_assert_eq!(self.q, other.q, "Moduli must match");
        debug_assert_eq!(ctx.modulus(), self.q, "NTT modulus must match");
        Self {
            coeffs: ctx.multiply(&self.coeffs, &other.coeffs),
            q: self.q,
        }
    }

    fn zip_with(&self, other: &Self, f: impl Fn(u64, u64, u64) -> u64) -> Self {
        debug_assert_eq!(self.dimension(), other.dimension(), "Dimensions must match");
        debug_assert_eq!(self.q, other.q, "Moduli must match");
        Self {
            coeffs: self
                .coeffs
                .iter()
                .zip(&other.coeffs)
                .map(|(&a, &b)| f(a, b, self.q))
                .collect(),
            q: self.q,
        }
    }
}

impl Add<&Poly> for &Poly {
    type Output = Poly;

    fn add(self, rhs: &Poly) -> Poly {
        self.zip_with(rhs, ModQ::add)
    }
}

impl Add for Poly {
    type Output = Poly;

    fn add(self, rhs: Poly) -> Poly {
        &self + &rhs
    }
}

impl Sub<&Poly> for &Poly {
    type Output = Poly;

    fn sub(self, rhs: &Poly) -> Poly {
        self.zip_with(rhs, ModQ::sub)
    }
}

impl Sub for Poly {
    type Output = Poly;

    fn sub(self, rhs: Poly) -> Poly {
        &self - &rhs
    }
}

impl Neg for &Poly {
    type Output = Poly;

    fn neg(self) -> Poly {
        Poly {
            coeffs: self.coeffs.iter().map(|&c| ModQ::negate(c, self.q)).collect(),
            q: self.q,
        }
    }
}

impl Neg for Poly {
    type Output = Poly;

    fn neg(self) -> Poly {
        -&self
    }
}

impl AddAssign<&Poly> for Poly {
    fn add_assign(&mut self, rhs: &Poly) {
        for (a, &b) in self.coeffs.iter_mut().zip(&rhs.coeffs) {
            *a = ModQ::add(*a, b, self.q);
        }
    }
}

impl AddAssign for Poly {
    fn add_assign(&mut self, rhs: Poly) {
        *self += &rhs;
    }
}

impl SubAssign<&Poly> for Poly {
    fn sub_assign(&mut self, rhs: &Poly) {
        for (a, &b) in self.coeffs.iter_mut().zip(&rhs.coeffs) {
            *a = ModQ::sub(*a, b, self.q);
        }
    }
}
