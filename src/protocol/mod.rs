//! Session protocol: envelopes, variants and the handshake state machine

pub mod envelope;
pub mod handshake;
pub mod variant;

pub use envelope::{Envelope, MessageRole, PROTOCOL_VERSION};
pub use handshake::{Handshake, HandshakeState, SessionParams};
pub use variant::SessionVariant;
