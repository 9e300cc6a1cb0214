//! Data-owner side of a session

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::codec::{FixedPointCodec, ScaledAmount};
use crate::config::OwnerConfig;
use crate::error::{Error, ProtocolError, Result};
use crate::fhe::{Ciphertext, FheContext, KeyMaterial, SecretKey};
use crate::math::GaussianSampler;
use crate::pipeline::{
    pipeline_for, OperandKind, Pipeline, PipelineSignature, DEFAULT_SAVINGS_RATE, MAX_CONSTANT_MAGNITUDE,
};
use crate::protocol::{Handshake, MessageRole, SessionParams, SessionVariant};
use crate::transport::FramedTransport;

use super::Channel;

/// Plaintext amounts for one session, shaped by variant
#[derive(Debug, Clone, PartialEq)]
pub enum FinancialInputs {
    Budget {
        income: f64,
        expense: f64,
    },
    GoalTracking {
        total_income: f64,
        savings_goal: f64,
        essential_expenses: f64,
        non_essential_expenses: f64,
    },
    Itemized {
        income_items: Vec<f64>,
        expense_items: Vec<f64>,
    },
}

impl FinancialInputs {
    pub fn variant(&self) -> SessionVariant {
        match self {
            FinancialInputs::Budget { .. } => SessionVariant::Budget,
            FinancialInputs::GoalTracking { .. } => SessionVariant::GoalTracking,
            FinancialInputs::Itemized { .. } => SessionVariant::Itemized,
        }
    }

    /// Amounts per pipeline input, in wire order
    fn amounts(&self) -> Vec<Vec<f64>> {
        match self {
            FinancialInputs::Budget { income, expense } => vec![vec![*income], vec![*expense]],
            FinancialInputs::GoalTracking {
                total_income,
                savings_goal,
                essential_expenses,
                non_essential_expenses,
            } => vec![
                vec![*total_income],
                vec![*savings_goal],
                vec![*essential_expenses],
                vec![*non_essential_expenses],
            ],
            FinancialInputs::Itemized {
                income_items,
                expense_items,
            } => vec![non_empty(income_items), non_empty(expense_items)],
        }
    }
}

fn non_empty(items: &[f64]) -> Vec<f64> {
    if items.is_empty() {
        vec![0.0]
    } else {
        items.to_vec()
    }
}

/// One decrypted output
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub name: String,
    pub amount: ScaledAmount,
    pub value: f64,
}

/// Decrypted results of a session, in pipeline output order
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub variant: SessionVariant,
    pub lines: Vec<ReportLine>,
}

impl SessionReport {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.lines.iter().find(|line| line.name == name).map(|line| line.value)
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} results ===", self.variant)?;
        for line in &self.lines {
            writeln!(f, "  {:<24} {:>16.4}", line.name, line.value)?;
        }
        Ok(())
    }
}

/// Owner session: handshake, submit inputs, collect results
pub struct OwnerSession<S> {
    channel: Channel<S>,
    ctx: FheContext,
    codec: FixedPointCodec,
    handshake: Handshake,
    pipeline: Pipeline,
    signature: PipelineSignature,
    secret: SecretKey,
    keys: KeyMaterial,
    sampler: GaussianSampler,
}

impl<S> OwnerSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Set up a session and generate its keys
    pub fn new(stream: S, config: &OwnerConfig, variant: SessionVariant) -> Result<Self> {
        Self::with_sampler(stream, config, variant, GaussianSampler::new(config.preset.params().sigma))
    }

    /// Same as [`OwnerSession::new`] with a caller-provided sampler
    pub fn with_sampler(
        stream: S,
        config: &OwnerConfig,
        variant: SessionVariant,
        mut sampler: GaussianSampler,
    ) -> Result<Self> {
        config.validate()?;
        let ctx = FheContext::new(config.preset.params())?;
        let codec = FixedPointCodec::new(config.scale_factor)?;

        // The owner only needs the pipeline's shape; the rate is the compute party's
        let pipeline = pipeline_for(variant, DEFAULT_SAVINGS_RATE);
        let signature = pipeline.validate()?;

        let elements: Vec<usize> = signature
            .rotation_layouts
            .iter()
            .flat_map(|layout| ctx.rotation_elements(*layout))
            .collect();
        let (secret, keys) = ctx.generate_keys(&elements, &mut sampler);

        Ok(Self {
            channel: Channel::new(FramedTransport::new(stream, config.limits()), variant),
            ctx,
            codec,
            handshake: Handshake::new(variant),
            pipeline,
            signature,
            secret,
            keys,
            sampler,
        })
    }

    pub fn variant(&self) -> SessionVariant {
        self.handshake.variant()
    }

    /// Send parameters and public key material
    pub async fn handshake(&mut self) -> Result<()> {
        let session_params = SessionParams {
            scheme: self.ctx.params().clone(),
            scale_factor: self.codec.scale_factor(),
        };

        while let Some(role) = self.handshake.next_role() {
            match role {
                MessageRole::SchemeParameters => self.channel.send(role, &session_params).await?,
                MessageRole::PublicKey => self.channel.send(role, &self.keys.public).await?,
                MessageRole::RelinKey => self.channel.send(role, &self.keys.relin).await?,
                MessageRole::GaloisKeys => {
                    let galois = self
                        .keys
                        .galois
                        .as_ref()
                        .ok_or_else(|| ProtocolError::MissingKey("rotation keys".to_string()))?;
                    self.channel.send(role, galois).await?
                }
                other => {
                    return Err(ProtocolError::InvalidState {
                        state: self.handshake.state().to_string(),
                        action: format!("send {}", other),
                    }
                    .into())
                }
            }
            let state = self.handshake.advance(role)?;
            debug!(%state, "handshake advanced");
        }

        info!(variant = %self.variant(), "handshake complete");
        Ok(())
    }

    /// Encode, encrypt and send every input
    ///
    /// Amounts are checked against the worst case the pipeline can produce
    /// before anything is encrypted; nothing is sent if they could overflow.
    pub async fn submit(&mut self, inputs: &FinancialInputs) -> Result<()> {
        if !self.handshake.is_ready() {
            return Err(ProtocolError::InvalidState {
                state: self.handshake.state().to_string(),
                action: "submit inputs".to_string(),
            }
            .into());
        }
        if inputs.variant() != self.variant() {
            return Err(ProtocolError::VariantMismatch {
                expected: self.variant().to_string(),
                got: inputs.variant().to_string(),
            }
            .into());
        }

        let amounts = inputs.amounts();
        let mut scaled_inputs = Vec::with_capacity(amounts.len());
        for (decl, values) in self.pipeline.inputs.iter().zip(&amounts) {
            if values.len() > decl.layout.capacity() {
                return Err(Error::validation(format!(
                    "{} has {} entries, at most {} fit",
                    decl.name,
                    values.len(),
                    decl.layout.capacity()
                )));
            }
            let scaled = values
                .iter()
                .map(|v| self.codec.to_scaled(*v).map(|amount| amount.value))
                .collect::<Result<Vec<i64>>>()?;
            scaled_inputs.push(scaled);
        }

        // Results wrap silently mod p, so refuse anything that could get there
        let constant_bound = self.codec.to_scaled(MAX_CONSTANT_MAGNITUDE)?.value.unsigned_abs();
        self.pipeline.check_magnitudes(
            &self.signature,
            &scaled_inputs,
            constant_bound,
            self.ctx.params().max_plain_magnitude(),
        )?;

        for (i, (decl, scaled)) in self.pipeline.inputs.iter().zip(&scaled_inputs).enumerate() {
            let pt = self.ctx.encode(scaled, decl.layout)?;
            let role = MessageRole::Input(i as u8);
            match decl.kind {
                OperandKind::Encrypted => {
                    let ct = self.ctx.encrypt(&pt, &self.keys.public, &mut self.sampler)?;
                    self.channel.send(role, &ct).await?;
                }
                OperandKind::Plain => self.channel.send(role, &pt).await?,
            }
        }

        info!(inputs = self.pipeline.inputs.len(), "inputs submitted");
        Ok(())
    }

    /// Receive, decrypt and descale every result
    ///
    /// Nothing is returned unless every result frame arrives and decrypts.
    pub async fn collect(&mut self) -> Result<SessionReport> {
        let mut lines = Vec::with_capacity(self.signature.outputs.len());
        for (i, (name, ty)) in self.signature.outputs.iter().enumerate() {
            let ct: Ciphertext = self.channel.recv(MessageRole::Result(i as u8)).await?;
            let pt = self.ctx.decrypt(&ct, &self.secret)?;
            // slot sums leave the total in every slot
            let value = self
                .ctx
                .decode(&pt, ty.layout)?
                .first()
                .copied()
                .ok_or_else(|| Error::validation(format!("{} decoded to no slots", name)))?;

            let amount = ScaledAmount::new(value, ty.exponent);
            lines.push(ReportLine {
                name: name.clone(),
                amount,
                value: self.codec.from_scaled(amount),
            });
        }

        info!(results = lines.len(), "results decrypted");
        Ok(SessionReport {
            variant: self.variant(),
            lines,
        })
    }

    /// Close the write half once results are in
    pub async fn finish(mut self) -> Result<()> {
        self.channel.transport.shutdown().await?;
        Ok(())
    }
}

/// Run a complete owner session over `stream`
pub async fn run_owner_session<S>(
    stream: S,
    config: &OwnerConfig,
    inputs: &FinancialInputs,
) -> Result<SessionReport>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = OwnerSession::new(stream, config, inputs.variant())?;
    session.handshake().await?;
    session.submit(inputs).await?;
    let report = session.collect().await?;
    session.finish().await?;
    Ok(report)
}
