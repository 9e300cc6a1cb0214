//! Scheme parameter sets
//!
//! The ciphertext modulus q and plaintext modulus p are chosen together:
//! both are primes congruent to 1 mod 2d, and p divides q - 1. The first
//! condition gives NTTs over both rings, the second makes Δ = (q - 1) / p
//! exact so that wrapping a plaintext coefficient past p costs a single unit
//! of noise instead of q mod p.

use serde::{Deserialize, Serialize};

use crate::math::modular::is_prime;

/// NTT-friendly 60-bit prime, q = 4096 · p · 4062 + 1.
pub const DEFAULT_Q: u64 = 1143351150968168449;

/// 36-bit plaintext prime, p ≡ 1 (mod 4096).
pub const DEFAULT_P: u64 = 68719464449;

/// Security level for parameter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// 128-bit security (recommended)
    Bits128,
    /// Small ring for tests and demos; offers no meaningful security
    Insecure,
}

/// Core RLWE parameters shared by owner and compute party
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeParams {
    /// Ring dimension d (power of two)
    pub ring_dim: usize,

    /// Ciphertext modulus q
    /// Must be prime with q ≡ 1 (mod 2d)
    pub q: u64,

    /// Plaintext modulus p
    /// Must be prime with p ≡ 1 (mod 2d) and p | q - 1
    pub p: u64,

    /// Standard deviation for Gaussian error sampling
    pub sigma: f64,

    /// Gadget decomposition base z for key switching (power of two)
    pub gadget_base: u64,

    /// Number of digits in gadget decomposition: z^ℓ ≥ q
    pub gadget_len: usize,

    /// Target security level
    pub security_level: SecurityLevel,
}

impl SchemeParams {
    /// 128-bit secure parameters for d=2048
    pub fn secure_128_d2048() -> Self {
        // A base of 2^4 keeps key-switching noise low enough for a 16-slot
        // sum followed by a constant multiplication.
        let gadget_base: u64 = 1 << 4;
        let gadget_len = ((DEFAULT_Q as f64).log2() / 4.0).ceil() as usize; // 15

        Self {
            ring_dim: 2048,
            q: DEFAULT_Q,
            p: DEFAULT_P,
            sigma: 3.2,
            gadget_base,
            gadget_len,
            security_level: SecurityLevel::Bits128,
        }
    }

    /// Small parameters for tests. Not secure.
    pub fn insecure_d256() -> Self {
        Self {
            ring_dim: 256,
            security_level: SecurityLevel::Insecure,
            ..Self::secure_128_d2048()
        }
    }

    /// Scaling factor Δ = (q - 1) / p
    pub fn delta(&self) -> u64 {
        (self.q - 1) / self.p
    }

    /// Largest magnitude representable in the centered plaintext range
    pub fn max_plain_magnitude(&self) -> u64 {
        (self.p - 1) / 2
    }

    /// Check if parameters are valid
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.ring_dim.is_power_of_two() || self.ring_dim < 32 {
            return Err("ring_dim must be a power of two and at least 32");
        }
        if self.ring_dim > 1 << 15 {
            return Err("ring_dim must be at most 32768");
        }

        let two_d = 2 * self.ring_dim as u64;

        if self.q >= 1 << 62 {
            return Err("q must be below 2^62");
        }
        if self.q % two_d != 1 {
            return Err("q must be ≡ 1 (mod 2d) for NTT");
        }
        if !is_prime(self.q) {
            return Err("q must be prime");
        }

        if self.p % two_d != 1 {
            return Err("p must be ≡ 1 (mod 2d) for slot encoding");
        }
        if !is_prime(self.p) {
            return Err("p must be prime");
        }
        if self.p >= self.q || (self.q - 1) % self.p != 0 {
            return Err("p must divide q - 1");
        }

        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err("sigma must be positive");
        }

        if self.gadget_base < 2 || !self.gadget_base.is_power_of_two() {
            return Err("gadget_base must be a power of two");
        }
        if self.gadget_len == 0 {
            return Err("gadget_len must be positive");
        }
        let covers_q = match self.gadget_base.checked_pow(self.gadget_len as u32) {
            Some(span) => span >= self.q,
            None => true,
        };
        if !covers_q {
            return Err("gadget_base^gadget_len must cover q");
        }

        Ok(())
    }
}

impl Default for SchemeParams {
    fn default() -> Self {
        Self::secure_128_d2048()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_valid() {
        let params = SchemeParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.gadget_len, 15);
    }

    #[test]
    fn test_insecure_params_valid() {
        let params = SchemeParams::insecure_d256();
        assert!(params.validate().is_ok());
        assert_eq!(params.security_level, SecurityLevel::Insecure);
    }

    #[test]
    fn test_delta_is_exact() {
        let params = SchemeParams::secure_128_d2048();
        assert_eq!(params.delta() * params.p, params.q - 1);
        assert_eq!(params.delta(), 16637952);
    }

    #[test]
    fn test_rejects_bad_params() {
        let mut params = SchemeParams::insecure_d256();
        params.ring_dim = 300;
        assert!(params.validate().is_err());

        let mut params = SchemeParams::insecure_d256();
        params.p = 65537;
        assert!(params.validate().is_err());

        let mut params = SchemeParams::insecure_d256();
        params.gadget_len = 2;
        assert!(params.validate().is_err());

        let mut params = SchemeParams::insecure_d256();
        params.sigma = 0.0;
        assert!(params.validate().is_err());

        let mut params = SchemeParams::insecure_d256();
        params.q += 2 * params.ring_dim as u64;
        assert!(params.validate().is_err());
    }
}
