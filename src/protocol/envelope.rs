//! Tagged frame payloads
//!
//! Every frame carries one bincode-encoded [`Envelope`]. The role tag names
//! what the payload is, so a receiver can tell a missing key frame from an
//! early input instead of trying to parse one as the other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::fhe;

use super::variant::SessionVariant;

/// Current envelope version
pub const PROTOCOL_VERSION: u16 = 1;

/// What an envelope's payload holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageRole {
    SchemeParameters,
    PublicKey,
    RelinKey,
    GaloisKeys,
    /// i-th pipeline input, owner to compute party
    Input(u8),
    /// i-th pipeline output, compute party to owner
    Result(u8),
    /// UTF-8 reason the compute party gave up
    Abort,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::Input(i) => write!(f, "Input({})", i),
            MessageRole::Result(i) => write!(f, "Result({})", i),
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u16,
    pub variant: SessionVariant,
    pub role: MessageRole,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(variant: SessionVariant, role: MessageRole, payload: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            variant,
            role,
            payload,
        }
    }

    pub fn abort(variant: SessionVariant, reason: &str) -> Self {
        Self::new(variant, MessageRole::Abort, reason.as_bytes().to_vec())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        fhe::to_bytes(self)
    }

    /// Decode a frame and check its version
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: Envelope = fhe::from_bytes("envelope", bytes)?;
        if envelope.version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(envelope.version).into());
        }
        Ok(envelope)
    }

    /// Check the tags against what the session expects next
    ///
    /// An `Abort` from the peer always wins and surfaces as
    /// [`ProtocolError::RemoteAbort`].
    pub fn into_payload(self, variant: SessionVariant, role: MessageRole) -> Result<Vec<u8>> {
        if self.role == MessageRole::Abort {
            let reason = String::from_utf8_lossy(&self.payload).into_owned();
            return Err(ProtocolError::RemoteAbort(reason).into());
        }
        if self.variant != variant {
            return Err(ProtocolError::VariantMismatch {
                expected: variant.to_string(),
                got: self.variant.to_string(),
            }
            .into());
        }
        if self.role != role {
            return Err(ProtocolError::UnexpectedMessage {
                expected: role.to_string(),
                got: self.role.to_string(),
            }
            .into());
        }
        Ok(self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_envelope_bytes_round_trip() {
        let env = Envelope::new(SessionVariant::Budget, MessageRole::Input(1), vec![1, 2, 3]);
        assert_eq!(Envelope::from_bytes(&env.to_bytes().unwrap()).unwrap(), env);
    }

    #[test]
    fn test_rejects_other_versions() {
        let mut env = Envelope::new(SessionVariant::Budget, MessageRole::PublicKey, vec![]);
        env.version = 2;
        let err = Envelope::from_bytes(&fhe::to_bytes(&env).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::UnsupportedVersion(2))));
    }

    #[test]
    fn test_into_payload_checks_tags() {
        let env = Envelope::new(SessionVariant::Budget, MessageRole::Input(0), vec![9]);
        assert_eq!(
            env.clone().into_payload(SessionVariant::Budget, MessageRole::Input(0)).unwrap(),
            vec![9]
        );

        let err = env
            .clone()
            .into_payload(SessionVariant::Budget, MessageRole::RelinKey)
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::UnexpectedMessage { .. })));

        let err = env
            .into_payload(SessionVariant::Itemized, MessageRole::Input(0))
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::VariantMismatch { .. })));
    }

    #[test]
    fn test_abort_surfaces_reason() {
        let env = Envelope::abort(SessionVariant::GoalTracking, "bad key");
        let err = env
            .into_payload(SessionVariant::Budget, MessageRole::Result(0))
            .unwrap_err();
        match err {
            Error::Protocol(ProtocolError::RemoteAbort(reason)) => assert_eq!(reason, "bad key"),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
