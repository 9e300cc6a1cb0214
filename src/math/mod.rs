//! Mathematical primitives for the RLWE backend.
//!
//! - **Modular arithmetic** over Z_q and primality checks for parameter validation
//! - **Number-Theoretic Transform (NTT)** for fast polynomial multiplication
//! - **Polynomial operations** over R_q = Z_q[X]/(X^d + 1)
//! - **Sampling** of Gaussian errors, ternary secrets and uniform masks

pub mod gaussian;
pub mod modular;
pub mod ntt;
pub mod poly;

pub use gaussian::GaussianSampler;
pub use modular::ModQ;
pub use ntt::NttContext;
pub use poly::Poly;
