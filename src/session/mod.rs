//! Per-connection session drivers for both peers
//!
//! Each session owns its transport, context and keys; nothing is shared
//! between sessions except the compute party's read-only configuration.

mod compute;
mod owner;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::Result;
use crate::fhe;
use crate::protocol::{Envelope, MessageRole, SessionVariant};
use crate::transport::FramedTransport;

pub use compute::{run_server, serve_connection, ComputeSession};
pub use owner::{run_owner_session, FinancialInputs, OwnerSession, ReportLine, SessionReport};

/// Envelope-level view of a framed transport for one session variant
struct Channel<S> {
    transport: FramedTransport<S>,
    variant: SessionVariant,
}

impl<S> Channel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(transport: FramedTransport<S>, variant: SessionVariant) -> Self {
        Self { transport, variant }
    }

    async fn send<T: Serialize>(&mut self, role: MessageRole, value: &T) -> Result<()> {
        let envelope = Envelope::new(self.variant, role, fhe::to_bytes(value)?);
        self.send_envelope(&envelope).await
    }

    async fn send_envelope(&mut self, envelope: &Envelope) -> Result<()> {
        let bytes = envelope.to_bytes()?;
        self.transport.send_frame(&bytes).await?;
        debug!(role = %envelope.role, len = bytes.len(), "sent envelope");
        Ok(())
    }

    /// Receive the next envelope and decode its payload as `role`
    ///
    /// Tags are checked before the payload is parsed.
    async fn recv<T: DeserializeOwned>(&mut self, role: MessageRole) -> Result<T> {
        let bytes = self.transport.recv_frame().await?;
        let payload = Envelope::from_bytes(&bytes)?.into_payload(self.variant, role)?;
        debug!(%role, len = bytes.len(), "received envelope");
        fhe::from_bytes(&role.to_string(), &payload)
    }
}
