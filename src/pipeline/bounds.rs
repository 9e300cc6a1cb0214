//! Static bounds on noise and plaintext magnitude
//!
//! Neither failure is visible at runtime: a ciphertext whose noise passes
//! Δ/2, or a value that wraps past p/2, still decrypts to *something*. Both
//! are therefore bounded ahead of evaluation. The compute party knows the
//! constants and checks noise; the owner knows the amounts and checks
//! magnitudes.

use std::collections::HashMap;

use crate::codec::FixedPointCodec;
use crate::error::{Error, Result};
use crate::fhe::SlotLayout;
use crate::params::SchemeParams;

use super::{Node, OperandKind, Pipeline, PipelineSignature};

/// Standard deviations of headroom required between the noise estimate and Δ/2
pub const NOISE_TAIL: f64 = 6.0;

/// Noise growth per operation, as standard deviations over R_q
#[derive(Debug, Clone, Copy)]
pub struct NoiseModel {
    /// Fresh public-key encryption: e·u + e₂ + e₁·s
    pub fresh: f64,
    /// Variance added by one key switch: Σ g⁻¹(a)ᵢ · eᵢ
    pub key_switch_var: f64,
    /// Largest noise that still decrypts correctly
    pub limit: f64,
}

impl NoiseModel {
    pub fn new(params: &SchemeParams) -> Self {
        let d = params.ring_dim as f64;
        let var = params.sigma * params.sigma;
        // ternary u and s have variance 2/3
        let fresh = (var * (1.0 + 4.0 * d / 3.0)).sqrt();
        // unsigned digits are uniform on [0, z)
        let z = params.gadget_base as f64;
        let digit_var = (z - 1.0) * (2.0 * z - 1.0) / 6.0;
        let key_switch_var = params.gadget_len as f64 * d * digit_var * var;

        Self {
            fresh,
            key_switch_var,
            limit: (params.delta() / 2) as f64,
        }
    }

    /// One rotate-and-add step of a slot sum
    ///
    /// Coefficients fixed by the automorphism add to themselves, so the
    /// deviation doubles rather than growing by √2.
    pub fn rotate_and_add(&self, sd: f64) -> f64 {
        (4.0 * sd * sd + self.key_switch_var).sqrt()
    }

    pub fn fits(&self, sd: f64) -> bool {
        NOISE_TAIL * sd < self.limit
    }
}

/// Worst-case magnitudes of one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Magnitude {
    /// Largest slot
    peak: u128,
    /// Sum over all slots of the value's layout
    total: u128,
}

impl Magnitude {
    fn of(values: &[i64]) -> Self {
        Self {
            peak: values.iter().map(|v| v.unsigned_abs() as u128).max().unwrap_or(0),
            total: values.iter().map(|v| v.unsigned_abs() as u128).sum(),
        }
    }

    /// A scalar used in a batched layout occupies every slot
    fn spread(self, from: SlotLayout, to: SlotLayout) -> Self {
        match (from, to) {
            (SlotLayout::Scalar, SlotLayout::Batched { slots }) => Self {
                peak: self.peak,
                total: self.peak.saturating_mul(slots as u128),
            },
            _ => self,
        }
    }

    fn plus(self, other: Self) -> Self {
        Self {
            peak: self.peak.saturating_add(other.peak),
            total: self.total.saturating_add(other.total),
        }
    }

    fn times(self, factor: u128) -> Self {
        Self {
            peak: self.peak.saturating_mul(factor),
            total: self.total.saturating_mul(factor),
        }
    }
}

impl Pipeline {
    fn layout_of(&self, signature: &PipelineSignature, name: &str) -> Result<SlotLayout> {
        signature
            .values
            .get(name)
            .map(|ty| ty.layout)
            .ok_or_else(|| Error::validation(format!("pipeline {}: {} is not defined", self.name, name)))
    }

    /// Reject the pipeline if any step's noise estimate leaves less than
    /// [`NOISE_TAIL`] deviations of margin under `params`
    ///
    /// Constants are scaled with `codec`, exactly as the evaluator scales them.
    pub fn check_noise(
        &self,
        signature: &PipelineSignature,
        params: &SchemeParams,
        codec: &FixedPointCodec,
    ) -> Result<()> {
        let model = NoiseModel::new(params);

        let mut constants: HashMap<&str, f64> = HashMap::new();
        for c in &self.constants {
            constants.insert(&c.name, codec.to_scaled(c.value)?.value.unsigned_abs() as f64);
        }

        let mut noise: HashMap<&str, f64> = HashMap::new();
        for input in &self.inputs {
            let sd = match input.kind {
                OperandKind::Encrypted => model.fresh,
                OperandKind::Plain => 0.0,
            };
            noise.insert(&input.name, sd);
        }

        for step in &self.steps {
            let get = |name: &str| {
                noise
                    .get(name)
                    .copied()
                    .ok_or_else(|| Error::validation(format!("pipeline {}: {} is not defined", self.name, name)))
            };

            let sd = match &step.node {
                Node::Add(lhs, rhs) | Node::Sub(lhs, rhs) => get(lhs)? + get(rhs)?,
                Node::MulConstant { input, constant } => {
                    let c = constants.get(constant.as_str()).copied().ok_or_else(|| {
                        Error::validation(format!("pipeline {}: unknown constant {}", self.name, constant))
                    })?;
                    get(input)? * c
                }
                Node::Reduce(input) => get(input)?,
                Node::SlotSum(input) => match self.layout_of(signature, input)? {
                    SlotLayout::Batched { slots } => {
                        (0..slots.trailing_zeros()).fold(get(input)?, |sd, _| model.rotate_and_add(sd))
                    }
                    SlotLayout::Scalar => {
                        return Err(Error::validation(format!("{} is not a batched value", input)))
                    }
                },
            };

            if !model.fits(sd) {
                return Err(Error::validation(format!(
                    "pipeline {}: noise in {} would reach about {:.0} against a decryption margin of {:.0} \
                     at d={}; lower the constants or the scale factor",
                    self.name,
                    step.output,
                    NOISE_TAIL * sd,
                    model.limit,
                    params.ring_dim
                )));
            }
            noise.insert(&step.output, sd);
        }
        Ok(())
    }

    /// Reject `inputs` (scaled, declaration order) if any value the pipeline
    /// computes could leave the plaintext range `±limit`
    ///
    /// `constant_bound` must bound every scaled constant in magnitude, so the
    /// caller does not need to know the constants themselves.
    pub fn check_magnitudes(
        &self,
        signature: &PipelineSignature,
        inputs: &[Vec<i64>],
        constant_bound: u64,
        limit: u64,
    ) -> Result<()> {
        if inputs.len() != self.inputs.len() {
            return Err(Error::validation(format!(
                "pipeline {} takes {} inputs, got {}",
                self.name,
                self.inputs.len(),
                inputs.len()
            )));
        }

        let mut bounds: HashMap<&str, Magnitude> = HashMap::new();
        for (decl, values) in self.inputs.iter().zip(inputs) {
            bounds.insert(&decl.name, Magnitude::of(values));
        }

        for step in &self.steps {
            let get = |name: &str| {
                bounds
                    .get(name)
                    .copied()
                    .ok_or_else(|| Error::validation(format!("pipeline {}: {} is not defined", self.name, name)))
            };

            let bound = match &step.node {
                Node::Add(lhs, rhs) | Node::Sub(lhs, rhs) => {
                    let to = self.layout_of(signature, &step.output)?;
                    let l = get(lhs)?.spread(self.layout_of(signature, lhs)?, to);
                    let r = get(rhs)?.spread(self.layout_of(signature, rhs)?, to);
                    l.plus(r)
                }
                Node::MulConstant { input, .. } => get(input)?.times(constant_bound as u128),
                Node::Reduce(input) => get(input)?,
                Node::SlotSum(input) => {
                    let x = get(input)?;
                    let slots = self.layout_of(signature, input)?.capacity() as u128;
                    Magnitude {
                        peak: x.total,
                        total: x.total.saturating_mul(slots),
                    }
                }
            };

            if bound.peak > limit as u128 {
                return Err(Error::validation(format!(
                    "{} could reach {} in magnitude, beyond the plaintext range ±{}; \
                     use smaller amounts or a smaller scale factor",
                    step.output, bound.peak, limit
                )));
            }
            bounds.insert(&step.output, bound);
        }
        Ok(())
    }
}
