//! One-time parameter and key exchange
//!
//! `Init → ParamsSent → KeysSent { sent, total } → Ready`, strictly in that
//! order. The owner advances the machine as it sends, the compute party as
//! it receives; both derive the frame order from the session variant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::params::SchemeParams;

use super::envelope::MessageRole;
use super::variant::SessionVariant;

/// Payload of the first frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    pub scheme: SchemeParams,
    /// Fixed-point scale factor the owner encoded with
    pub scale_factor: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    ParamsSent,
    KeysSent { sent: usize, total: usize },
    Ready,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::KeysSent { sent, total } => write!(f, "KeysSent({} of {})", sent, total),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Handshake progress for one session
#[derive(Debug, Clone)]
pub struct Handshake {
    variant: SessionVariant,
    key_roles: Vec<MessageRole>,
    state: HandshakeState,
}

impl Handshake {
    pub fn new(variant: SessionVariant) -> Self {
        let mut key_roles = vec![MessageRole::PublicKey, MessageRole::RelinKey];
        if variant.requires_rotation_keys() {
            key_roles.push(MessageRole::GaloisKeys);
        }
        Self {
            variant,
            key_roles,
            state: HandshakeState::Init,
        }
    }

    pub fn variant(&self) -> SessionVariant {
        self.variant
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == HandshakeState::Ready
    }

    /// Role of the next handshake frame, `None` once ready
    pub fn next_role(&self) -> Option<MessageRole> {
        match self.state {
            HandshakeState::Init => Some(MessageRole::SchemeParameters),
            HandshakeState::ParamsSent => self.key_roles.first().copied(),
            HandshakeState::KeysSent { sent, .. } => self.key_roles.get(sent).copied(),
            HandshakeState::Ready => None,
        }
    }

    /// Record that the frame tagged `role` went out or came in
    pub fn advance(&mut self, role: MessageRole) -> Result<HandshakeState> {
        let expected = self.next_role().ok_or_else(|| ProtocolError::InvalidState {
            state: self.state.to_string(),
            action: format!("accept {}", role),
        })?;
        if role != expected {
            return Err(ProtocolError::UnexpectedMessage {
                expected: expected.to_string(),
                got: role.to_string(),
            }
            .into());
        }

        let total = self.key_roles.len();
        let sent = match self.state {
            HandshakeState::KeysSent { sent, .. } => sent + 1,
            _ => 1,
        };
        self.state = match self.state {
            HandshakeState::Init => HandshakeState::ParamsSent,
            _ if sent == total => HandshakeState::Ready,
            _ => HandshakeState::KeysSent { sent, total },
        };
        Ok(self.state)
    }
}
