//! fincrypt: confidential budget computation over homomorphic encryption
//!
//! A data owner encrypts personal income and expense figures and sends them
//! to an untrusted compute party, which evaluates a fixed budgeting pipeline
//! on the ciphertexts and returns encrypted results only the owner can read.
//!
//! Key components:
//! - Fixed-point codec turning decimal amounts into scaled integers
//! - Length-prefixed framing over any async byte stream
//! - Tagged, versioned envelopes and the parameter/key handshake
//! - Declarative evaluation pipelines run by one generic evaluator
//! - A BFV-style RLWE backend behind [`fhe::FheContext`]

pub mod codec;
pub mod config;
pub mod error;
pub mod fhe;
pub mod math;
pub mod params;
pub mod pipeline;
pub mod protocol;
pub mod session;
pub mod transport;

pub use codec::{FixedPointCodec, ScaleExponent, ScaledAmount};
pub use config::{OwnerConfig, ParamPreset, ServerConfig};
pub use error::{Error, ProtocolError, Result, TransportError};
pub use params::{SchemeParams, SecurityLevel};
pub use protocol::SessionVariant;
pub use session::{
    run_owner_session, run_server, serve_connection, FinancialInputs, OwnerSession, SessionReport,
};
pub use transport::{FramedTransport, TransportLimits};
