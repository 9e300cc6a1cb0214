//! RLWE backend behind the primitive-library boundary
//!
//! Everything above this module treats keys, plaintexts and ciphertexts as
//! opaque values manipulated through [`FheContext`] and moved across the
//! wire with [`to_bytes`] / [`from_bytes`].
//!
//! The scheme is BFV-style over R_q = Z_q[X]/(X^d + 1) with plaintexts in
//! R_p. Ciphertexts are pairs (a, b) with phase b + a·s = Δ·m + e.

mod context;
pub mod encoding;
pub mod galois;
pub mod keys;
pub mod keyswitch;
pub mod types;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ProtocolError, Result};

pub use context::FheContext;
pub use keys::{GaloisKeys, KeyMaterial, PublicKey, RelinKey, SecretKey};
pub use keyswitch::KeySwitchingKey;
pub use types::{Ciphertext, Plaintext, SlotLayout};

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// Serialize a wire value with bincode
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    wire_options().serialize(value).map_err(|e| {
        ProtocolError::Malformed {
            role: std::any::type_name::<T>().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Deserialize a wire value, bounding allocation by the input length
///
/// # Arguments
/// * `what` - Name of the value, used in the error on failure
/// * `bytes` - Encoded payload
pub fn from_bytes<T: DeserializeOwned>(what: &str, bytes: &[u8]) -> Result<T> {
    wire_options()
        .with_limit(bytes.len() as u64)
        .deserialize(bytes)
        .map_err(|e| {
            ProtocolError::Malformed {
                role: what.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
}
