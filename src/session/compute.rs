//! Compute-party side of a session
//!
//! The compute party never holds a secret key. It loads whatever parameters
//! and public keys the owner sends, checks them against each other, runs the
//! variant's pipeline and returns the encrypted outputs.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::codec::FixedPointCodec;
use crate::config::ServerConfig;
use crate::error::{Error, ProtocolError, Result};
use crate::fhe::{self, Ciphertext, FheContext, GaloisKeys, Plaintext, PublicKey, RelinKey};
use crate::params::SecurityLevel;
use crate::pipeline::{pipeline_for, EvalKeys, Evaluator, OperandKind, Value};
use crate::protocol::{Envelope, Handshake, MessageRole, SessionParams, SessionVariant};
use crate::transport::FramedTransport;

use super::Channel;

/// Public material collected during the handshake
#[derive(Default)]
struct LoadedKeys {
    public: Option<PublicKey>,
    relin: Option<RelinKey>,
    galois: Option<GaloisKeys>,
}

enum Stage<S> {
    /// Nothing received yet; the variant is unknown
    Fresh(FramedTransport<S>),
    Open(Channel<S>),
    Closed,
}

/// One compute-party session over a single connection
pub struct ComputeSession<S> {
    stage: Stage<S>,
    config: Arc<ServerConfig>,
}

impl<S> ComputeSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: Arc<ServerConfig>) -> Self {
        let transport = FramedTransport::new(stream, config.limits());
        Self {
            stage: Stage::Fresh(transport),
            config,
        }
    }

    /// Variant fixed by the first frame, once it has arrived
    pub fn variant(&self) -> Option<SessionVariant> {
        match &self.stage {
            Stage::Open(channel) => Some(channel.variant),
            _ => None,
        }
    }

    /// Drive the session to completion and return its variant
    pub async fn run(&mut self) -> Result<SessionVariant> {
        let session_params = self.open().await?;
        let variant = self.channel()?.variant;

        if session_params.scheme.security_level == SecurityLevel::Insecure
            && !self.config.allow_insecure_params
        {
            return Err(ProtocolError::ParameterMismatch("insecure parameter set refused".into()).into());
        }
        let ctx = FheContext::new(session_params.scheme)?;
        let codec = FixedPointCodec::new(session_params.scale_factor)?;
        let pipeline = pipeline_for(variant, self.config.savings_rate);
        let signature = pipeline.validate()?;
        pipeline.check_noise(&signature, ctx.params(), &codec)?;

        let mut handshake = Handshake::new(variant);
        handshake.advance(MessageRole::SchemeParameters)?;

        let mut keys = LoadedKeys::default();
        while let Some(role) = handshake.next_role() {
            let channel = self.channel()?;
            match role {
                MessageRole::PublicKey => {
                    let pk: PublicKey = channel.recv(role).await?;
                    ctx.check_public_key(&pk)?;
                    keys.public = Some(pk);
                }
                MessageRole::RelinKey => {
                    let relin: RelinKey = channel.recv(role).await?;
                    ctx.check_relin_key(&relin)?;
                    keys.relin = Some(relin);
                }
                MessageRole::GaloisKeys => {
                    let galois: GaloisKeys = channel.recv(role).await?;
                    let required: Vec<usize> = signature
                        .rotation_layouts
                        .iter()
                        .flat_map(|layout| ctx.rotation_elements(*layout))
                        .collect();
                    ctx.check_galois_keys(&galois, &required)?;
                    keys.galois = Some(galois);
                }
                other => {
                    return Err(ProtocolError::InvalidState {
                        state: handshake.state().to_string(),
                        action: format!("receive {}", other),
                    }
                    .into())
                }
            }
            let state = handshake.advance(role)?;
            debug!(%state, "handshake advanced");
        }

        let relin = keys
            .relin
            .as_ref()
            .ok_or_else(|| ProtocolError::MissingKey("relinearization key".into()))?;
        if keys.public.is_none() {
            return Err(ProtocolError::MissingKey("public key".into()).into());
        }
        if signature.needs_rotation_keys() && keys.galois.is_none() {
            return Err(ProtocolError::MissingKey("rotation keys".into()).into());
        }
        info!(%variant, ring_dim = ctx.params().ring_dim, "handshake complete");

        let mut inputs = Vec::with_capacity(pipeline.inputs.len());
        for (i, decl) in pipeline.inputs.iter().enumerate() {
            let role = MessageRole::Input(i as u8);
            let channel = self.channel()?;
            let value = match decl.kind {
                OperandKind::Encrypted => {
                    let ct: Ciphertext = channel.recv(role).await?;
                    ctx.check_ciphertext(&ct)?;
                    Value::Encrypted(ct)
                }
                OperandKind::Plain => {
                    let pt: Plaintext = channel.recv(role).await?;
                    ctx.check_plaintext(&pt)?;
                    Value::Plain(pt)
                }
            };
            inputs.push(value);
        }
        debug!(inputs = inputs.len(), "inputs received");

        let evaluator = Evaluator::new(
            &ctx,
            codec,
            EvalKeys {
                relin,
                galois: keys.galois.as_ref(),
            },
        );
        let outputs = evaluator.run(&pipeline, inputs)?;

        let channel = self.channel()?;
        for (i, ct) in outputs.iter().enumerate() {
            channel.send(MessageRole::Result(i as u8), ct).await?;
        }
        info!(%variant, results = outputs.len(), "results sent");
        Ok(variant)
    }

    /// Read the first frame, which fixes the variant
    async fn open(&mut self) -> Result<SessionParams> {
        let mut transport = match std::mem::replace(&mut self.stage, Stage::Closed) {
            Stage::Fresh(transport) => transport,
            other => {
                self.stage = other;
                return Err(ProtocolError::InvalidState {
                    state: "open".into(),
                    action: "read the first frame".into(),
                }
                .into());
            }
        };

        let first = match transport.recv_frame().await {
            Ok(bytes) => Envelope::from_bytes(&bytes),
            Err(err) => Err(err.into()),
        };
        let first = match first {
            Ok(envelope) => envelope,
            Err(err) => {
                self.stage = Stage::Fresh(transport);
                return Err(err);
            }
        };

        let variant = first.variant;
        self.stage = Stage::Open(Channel::new(transport, variant));
        debug!(%variant, role = %first.role, "first envelope");

        if !self.config.allows(variant) {
            return Err(ProtocolError::VariantNotAllowed(variant.to_string()).into());
        }
        let payload = first.into_payload(variant, MessageRole::SchemeParameters)?;
        fhe::from_bytes("scheme parameters", &payload)
    }

    fn channel(&mut self) -> Result<&mut Channel<S>> {
        match &mut self.stage {
            Stage::Open(channel) => Ok(channel),
            _ => Err(ProtocolError::InvalidState {
                state: "not open".into(),
                action: "exchange envelopes".into(),
            }
            .into()),
        }
    }

    /// Tell the owner why the session ends; failures are ignored
    pub async fn abort(&mut self, reason: &Error) {
        let variant = self.variant().unwrap_or(SessionVariant::Budget);
        let envelope = Envelope::abort(variant, &reason.to_string());
        let sent = match &mut self.stage {
            Stage::Open(channel) => channel.send_envelope(&envelope).await,
            Stage::Fresh(transport) => match envelope.to_bytes() {
                Ok(bytes) => transport.send_frame(&bytes).await.map_err(Error::from),
                Err(err) => Err(err),
            },
            Stage::Closed => return,
        };
        if let Err(err) = sent {
            debug!(error = %err, "abort not delivered");
        }
    }

    /// Close the write half
    pub async fn shutdown(&mut self) {
        let closed = match &mut self.stage {
            Stage::Open(channel) => channel.transport.shutdown().await,
            Stage::Fresh(transport) => transport.shutdown().await,
            Stage::Closed => return,
        };
        if let Err(err) = closed {
            debug!(error = %err, "shutdown failed");
        }
    }
}

/// Serve one session and report its outcome
///
/// Errors other than transport failures are sent back as an `Abort` envelope
/// before the connection is closed.
pub async fn serve_connection<S>(stream: S, config: Arc<ServerConfig>) -> Result<SessionVariant>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = ComputeSession::new(stream, config);
    let outcome = session.run().await;
    if let Err(err) = &outcome {
        warn!(kind = err.kind(), error = %err, "session rejected");
        if !matches!(err, Error::Transport(_)) {
            session.abort(err).await;
        }
    }
    session.shutdown().await;
    outcome
}

/// Pause after a failed accept, so a persistent error such as fd
/// exhaustion does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections forever, one task per session
///
/// Accept errors are logged and retried; only a broken listener address
/// stops the server.
pub async fn run_server(listener: TcpListener, config: Arc<ServerConfig>) -> Result<()> {
    info!(addr = %listener.local_addr()?, "accepting sessions");
    let listener = &listener;
    accept_loop(move || listener.accept(), config).await;
    Ok(())
}

async fn accept_loop<S, F, Fut>(mut accept: F, config: Arc<ServerConfig>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<(S, SocketAddr)>>,
{
    loop {
        let (stream, peer) = match accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let config = Arc::clone(&config);
        let span = info_span!("session", %peer);
        tokio::spawn(
            async move {
                if let Ok(variant) = serve_connection(stream, config).await {
                    info!(%variant, "session complete");
                }
            }
            .instrument(span),
        );
    }
}
