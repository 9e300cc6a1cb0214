//! Generic pipeline evaluator

use std::collections::HashMap;

use tracing::debug;

use crate::codec::FixedPointCodec;
use crate::error::{Error, ProtocolError, Result};
use crate::fhe::{Ciphertext, FheContext, GaloisKeys, Plaintext, RelinKey, SlotLayout};

use super::{Node, OperandKind, Pipeline};

/// A named value during evaluation
#[derive(Debug, Clone)]
pub enum Value {
    Encrypted(Ciphertext),
    Plain(Plaintext),
}

impl Value {
    pub fn kind(&self) -> OperandKind {
        match self {
            Value::Encrypted(_) => OperandKind::Encrypted,
            Value::Plain(_) => OperandKind::Plain,
        }
    }
}

/// Evaluation keys loaded during the handshake
#[derive(Debug, Clone, Copy)]
pub struct EvalKeys<'a> {
    pub relin: &'a RelinKey,
    pub galois: Option<&'a GaloisKeys>,
}

pub struct Evaluator<'a> {
    ctx: &'a FheContext,
    codec: FixedPointCodec,
    keys: EvalKeys<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: &'a FheContext, codec: FixedPointCodec, keys: EvalKeys<'a>) -> Self {
        Self { ctx, codec, keys }
    }

    /// Run `pipeline` over `inputs` (declaration order) and return its
    /// outputs in declaration order
    ///
    /// Pipelines whose noise estimate does not fit the context are refused
    /// before any input is touched.
    pub fn run(&self, pipeline: &Pipeline, inputs: Vec<Value>) -> Result<Vec<Ciphertext>> {
        let signature = pipeline.validate()?;
        pipeline.check_noise(&signature, self.ctx.params(), &self.codec)?;

        if inputs.len() != pipeline.inputs.len() {
            return Err(Error::validation(format!(
                "pipeline {} takes {} inputs, got {}",
                pipeline.name,
                pipeline.inputs.len(),
                inputs.len()
            )));
        }

        let mut env: HashMap<&str, Value> = HashMap::new();
        for (decl, value) in pipeline.inputs.iter().zip(inputs) {
            if value.kind() != decl.kind {
                return Err(Error::validation(format!(
                    "input {} should be {:?}",
                    decl.name, decl.kind
                )));
            }
            env.insert(&decl.name, value);
        }

        let mut constants: HashMap<&str, Plaintext> = HashMap::new();
        for c in &pipeline.constants {
            let scaled = self.codec.to_scaled(c.value)?;
            constants.insert(&c.name, self.ctx.encode_constant(scaled.value)?);
        }

        for step in &pipeline.steps {
            let get = |name: &str| {
                env.get(name)
                    .ok_or_else(|| Error::validation(format!("{} is not defined", name)))
            };

            let value = match &step.node {
                Node::Add(lhs, rhs) => match (get(lhs)?, get(rhs)?) {
                    (Value::Encrypted(a), Value::Encrypted(b)) => self.ctx.add(a, b)?,
                    (Value::Encrypted(a), Value::Plain(b)) | (Value::Plain(b), Value::Encrypted(a)) => {
                        self.ctx.add_plain(a, b)?
                    }
                    (Value::Plain(_), Value::Plain(_)) => {
                        return Err(Error::validation(format!("{} adds two plain values", step.output)))
                    }
                },
                Node::Sub(lhs, rhs) => match (get(lhs)?, get(rhs)?) {
                    (Value::Encrypted(a), Value::Encrypted(b)) => self.ctx.sub(a, b)?,
                    (Value::Encrypted(a), Value::Plain(b)) => self.ctx.sub_plain(a, b)?,
                    // plain - ct = -(ct - plain)
                    (Value::Plain(a), Value::Encrypted(b)) => self.ctx.negate(&self.ctx.sub_plain(b, a)?)?,
                    (Value::Plain(_), Value::Plain(_)) => {
                        return Err(Error::validation(format!("{} subtracts two plain values", step.output)))
                    }
                },
                Node::MulConstant { input, constant } => {
                    let pt = constants
                        .get(constant.as_str())
                        .ok_or_else(|| Error::validation(format!("unknown constant {}", constant)))?;
                    self.ctx.mul_plain(encrypted(get(input)?, input)?, pt)?
                }
                Node::Reduce(input) => self.ctx.reduce(encrypted(get(input)?, input)?, self.keys.relin)?,
                Node::SlotSum(input) => {
                    let ct = encrypted(get(input)?, input)?;
                    let slots = match signature.values.get(input.as_str()).map(|ty| ty.layout) {
                        Some(SlotLayout::Batched { slots }) => slots,
                        _ => return Err(Error::validation(format!("{} is not a batched value", input))),
                    };
                    let galois = self
                        .keys
                        .galois
                        .ok_or_else(|| Error::from(ProtocolError::MissingKey("rotation keys".to_string())))?;
                    self.ctx.slot_sum(ct, slots, galois)?
                }
            };

            debug!(pipeline = %pipeline.name, step = %step.output, "evaluated step");
            env.insert(&step.output, Value::Encrypted(value));
        }

        pipeline
            .outputs
            .iter()
            .map(|name| match env.get(name.as_str()) {
                Some(Value::Encrypted(ct)) => Ok(ct.clone()),
                _ => Err(Error::validation(format!("output {} is not an encrypted value", name))),
            })
            .collect()
    }
}

fn encrypted<'v>(value: &'v Value, name: &str) -> Result<&'v Ciphertext> {
    match value {
        Value::Encrypted(ct) => Ok(ct),
        Value::Plain(_) => Err(Error::validation(format!("{} must be encrypted", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhe::{KeyMaterial, SecretKey};
    use crate::math::GaussianSampler;
    use crate::params::SchemeParams;
    use crate::pipeline::{pipeline_for, DEFAULT_SAVINGS_RATE, ITEM_SLOTS};
    use crate::protocol::SessionVariant;

    struct Fixture {
        ctx: FheContext,
        sk: SecretKey,
        keys: KeyMaterial,
        sampler: GaussianSampler,
    }

    fn fixture(layout: SlotLayout) -> Fixture {
        let ctx = FheContext::new(SchemeParams::insecure_d256()).unwrap();
        let mut sampler = GaussianSampler::with_seed(3.2, 7);
        let elements = ctx.rotation_elements(layout);
        let (sk, keys) = ctx.generate_keys(&elements, &mut sampler);
        Fixture {
            ctx,
            sk,
            keys,
            sampler,
        }
    }

    impl Fixture {
        fn enc(&mut self, values: &[i64], layout: SlotLayout) -> Value {
            let pt = self.ctx.encode(values, layout).unwrap();
            Value::Encrypted(self.ctx.encrypt(&pt, &self.keys.public, &mut self.sampler).unwrap())
        }

        fn evaluator(&self) -> Evaluator<'_> {
            Evaluator::new(
                &self.ctx,
                FixedPointCodec::default(),
                EvalKeys {
                    relin: &self.keys.relin,
                    galois: self.keys.galois.as_ref(),
                },
            )
        }

        fn slot0(&self, ct: &Ciphertext, layout: SlotLayout) -> i64 {
            let pt = self.ctx.decrypt(ct, &self.sk).unwrap();
            self.ctx.decode(&pt, layout).unwrap()[0]
        }
    }

    #[test]
    fn test_budget_pipeline() {
        let mut fx = fixture(SlotLayout::Scalar);
        let inputs = vec![
            fx.enc(&[500_000], SlotLayout::Scalar),
            fx.enc(&[320_050], SlotLayout::Scalar),
        ];
        let pipeline = pipeline_for(SessionVariant::Budget, DEFAULT_SAVINGS_RATE);
        let out = fx.evaluator().run(&pipeline, inputs).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(fx.slot0(&out[0], SlotLayout::Scalar), 179_950);
        // 500000 * 15 at exponent 2
        assert_eq!(fx.slot0(&out[1], SlotLayout::Scalar), 7_500_000);
    }

    #[test]
    fn test_goal_tracking_with_plain_goal() {
        let mut fx = fixture(SlotLayout::Scalar);
        let goal = fx.ctx.encode_constant(50_000).unwrap();
        let inputs = vec![
            fx.enc(&[150_075], SlotLayout::Scalar),
            Value::Plain(goal),
            fx.enc(&[45_050], SlotLayout::Scalar),
            fx.enc(&[12_000], SlotLayout::Scalar),
        ];
        let pipeline = pipeline_for(SessionVariant::GoalTracking, DEFAULT_SAVINGS_RATE);
        let out = fx.evaluator().run(&pipeline, inputs).unwrap();

        let values: Vec<i64> = out.iter().map(|ct| fx.slot0(ct, SlotLayout::Scalar)).collect();
        assert_eq!(values, vec![57_050, 93_025, 43_025]);
    }

    #[test]
    fn test_itemized_pipeline_sums_slots() {
        let layout = SlotLayout::Batched { slots: ITEM_SLOTS };
        let mut fx = fixture(layout);
        let inputs = vec![
            fx.enc(&[100_000, 25_050, 300], layout),
            fx.enc(&[40_000, 5_000], layout),
        ];
        let pipeline = pipeline_for(SessionVariant::Itemized, DEFAULT_SAVINGS_RATE);
        let out = fx.evaluator().run(&pipeline, inputs).unwrap();

        let values: Vec<i64> = out.iter().map(|ct| fx.slot0(ct, layout)).collect();
        assert_eq!(values, vec![125_350, 45_000, 80_350, 1_880_250]);
    }

    #[test]
    fn test_missing_rotation_keys() {
        let layout = SlotLayout::Batched { slots: ITEM_SLOTS };
        let mut fx = fixture(SlotLayout::Scalar);
        let inputs = vec![fx.enc(&[1], layout), fx.enc(&[2], layout)];
        let pipeline = pipeline_for(SessionVariant::Itemized, DEFAULT_SAVINGS_RATE);
        let err = fx.evaluator().run(&pipeline, inputs).unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::MissingKey(_))));
    }

    #[test]
    fn test_refuses_constants_beyond_noise_budget() {
        let layout = SlotLayout::Batched { slots: ITEM_SLOTS };
        let mut fx = fixture(layout);
        let inputs = vec![fx.enc(&[1], layout), fx.enc(&[2], layout)];
        let pipeline = pipeline_for(SessionVariant::Itemized, DEFAULT_SAVINGS_RATE);
        let evaluator = Evaluator::new(
            &fx.ctx,
            FixedPointCodec::new(10_000_000).unwrap(),
            EvalKeys {
                relin: &fx.keys.relin,
                galois: fx.keys.galois.as_ref(),
            },
        );
        let err = evaluator.run(&pipeline, inputs).unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg.contains("noise")));
    }

    #[test]
    fn test_input_kinds_are_checked() {
        let mut fx = fixture(SlotLayout::Scalar);
        let goal = fx.ctx.encode_constant(1).unwrap();
        let inputs = vec![fx.enc(&[1], SlotLayout::Scalar), Value::Plain(goal)];
        let pipeline = pipeline_for(SessionVariant::Budget, DEFAULT_SAVINGS_RATE);
        assert!(fx.evaluator().run(&pipeline, inputs).is_err());

        let inputs = vec![fx.enc(&[1], SlotLayout::Scalar)];
        assert!(fx.evaluator().run(&pipeline, inputs).is_err());
    }
}
