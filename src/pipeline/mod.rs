//! Declarative evaluation pipelines
//!
//! A [`Pipeline`] is data: named inputs, named compute-side constants, an
//! ordered list of steps and the ordered outputs. [`Pipeline::validate`]
//! types every named value before anything is evaluated, including its
//! scale exponent, so a pipeline that would mix scales never runs.
//! [`Evaluator`] interprets any valid pipeline. The checks in [`bounds`]
//! cover what typing cannot: noise growth and plaintext wrap-around.

pub mod bounds;
mod eval;
pub mod variants;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codec::ScaleExponent;
use crate::error::{Error, Result};
use crate::fhe::SlotLayout;

pub use bounds::{NoiseModel, NOISE_TAIL};
pub use eval::{EvalKeys, Evaluator, Value};
pub use variants::{pipeline_for, DEFAULT_SAVINGS_RATE, ITEM_SLOTS};

/// Largest magnitude a pipeline constant may have
///
/// Constants are rates, so the owner can bound every product without
/// learning the compute party's configuration.
pub const MAX_CONSTANT_MAGNITUDE: f64 = 1.0;

/// Whether a value travels encrypted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperandKind {
    Encrypted,
    Plain,
}

/// Pipeline input, supplied by the owner in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub kind: OperandKind,
    pub layout: SlotLayout,
    pub exponent: ScaleExponent,
}

impl InputSpec {
    pub fn encrypted(name: &str, layout: SlotLayout) -> Self {
        Self {
            name: name.to_string(),
            kind: OperandKind::Encrypted,
            layout,
            exponent: ScaleExponent::BASE,
        }
    }

    pub fn plain(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: OperandKind::Plain,
            layout: SlotLayout::Scalar,
            exponent: ScaleExponent::BASE,
        }
    }
}

/// Public decimal constant, scaled with the session's factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantSpec {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Add(String, String),
    Sub(String, String),
    /// Encrypted value times a named constant; exponents add
    MulConstant { input: String, constant: String },
    /// Relinearize after a multiplication
    Reduce(String),
    /// Sum every slot of a batched value
    SlotSum(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub output: String,
    pub node: Node,
}

impl Step {
    pub fn new(output: &str, node: Node) -> Self {
        Self {
            output: output.to_string(),
            node,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub inputs: Vec<InputSpec>,
    pub constants: Vec<ConstantSpec>,
    pub steps: Vec<Step>,
    pub outputs: Vec<String>,
}

/// Static type of a named value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueType {
    pub kind: OperandKind,
    pub layout: SlotLayout,
    pub exponent: ScaleExponent,
    /// Produced by a multiplication and not yet reduced
    pub unreduced: bool,
}

/// What validation learned about a pipeline
#[derive(Debug, Clone)]
pub struct PipelineSignature {
    /// Output names with their types, in declared order
    pub outputs: Vec<(String, ValueType)>,
    /// Batched layouts that get slot-summed, hence need rotation keys
    pub rotation_layouts: Vec<SlotLayout>,
    /// Every named value, inputs and step outputs alike
    pub values: HashMap<String, ValueType>,
}

impl PipelineSignature {
    pub fn needs_rotation_keys(&self) -> bool {
        !self.rotation_layouts.is_empty()
    }
}

fn invalid(pipeline: &str, msg: String) -> Error {
    Error::validation(format!("pipeline {}: {}", pipeline, msg))
}

impl Pipeline {
    /// Type-check the whole DAG
    pub fn validate(&self) -> Result<PipelineSignature> {
        let mut types: HashMap<&str, ValueType> = HashMap::new();
        let mut constants: HashMap<&str, ScaleExponent> = HashMap::new();
        let mut rotation_layouts = Vec::new();

        if self.inputs.len() > u8::MAX as usize || self.outputs.len() > u8::MAX as usize {
            return Err(invalid(&self.name, "too many inputs or outputs".into()));
        }

        for input in &self.inputs {
            let ty = ValueType {
                kind: input.kind,
                layout: input.layout,
                exponent: input.exponent,
                unreduced: false,
            };
            if input.kind == OperandKind::Plain && input.layout != SlotLayout::Scalar {
                return Err(invalid(&self.name, format!("plain input {} must be scalar", input.name)));
            }
            if types.insert(&input.name, ty).is_some() {
                return Err(invalid(&self.name, format!("duplicate name {}", input.name)));
            }
        }
        for constant in &self.constants {
            if !constant.value.is_finite() || constant.value.abs() > MAX_CONSTANT_MAGNITUDE {
                return Err(invalid(
                    &self.name,
                    format!("constant {} must lie within ±{}", constant.name, MAX_CONSTANT_MAGNITUDE),
                ));
            }
            if types.contains_key(constant.name.as_str())
                || constants.insert(&constant.name, ScaleExponent::BASE).is_some()
            {
                return Err(invalid(&self.name, format!("duplicate name {}", constant.name)));
            }
        }

        for step in &self.steps {
            let lookup = |name: &str| {
                types
                    .get(name)
                    .copied()
                    .ok_or_else(|| invalid(&self.name, format!("{} is used before it is defined", name)))
            };

            let ty = match &step.node {
                Node::Add(lhs, rhs) | Node::Sub(lhs, rhs) => {
                    let (l, r) = (lookup(lhs)?, lookup(rhs)?);
                    if l.kind == OperandKind::Plain && r.kind == OperandKind::Plain {
                        return Err(invalid(&self.name, format!("{} combines two plain values", step.output)));
                    }
                    let layout = match (l.layout, r.layout) {
                        (SlotLayout::Scalar, other) | (other, SlotLayout::Scalar) => other,
                        (a, b) if a == b => a,
                        _ => {
                            return Err(invalid(&self.name, format!("{} mixes slot layouts", step.output)))
                        }
                    };
                    ValueType {
                        kind: OperandKind::Encrypted,
                        layout,
                        exponent: l.exponent.additive(r.exponent)?,
                        unreduced: l.unreduced || r.unreduced,
                    }
                }
                Node::MulConstant { input, constant } => {
                    let x = lookup(input)?;
                    let c = constants.get(constant.as_str()).copied().ok_or_else(|| {
                        invalid(&self.name, format!("unknown constant {}", constant))
                    })?;
                    if x.kind != OperandKind::Encrypted {
                        return Err(invalid(&self.name, format!("{} multiplies a plain value", step.output)));
                    }
                    if x.unreduced {
                        return Err(invalid(
                            &self.name,
                            format!("{} must be reduced before it is multiplied again", input),
                        ));
                    }
                    ValueType {
                        exponent: x.exponent.multiplicative(c)?,
                        unreduced: true,
                        ..x
                    }
                }
                Node::Reduce(input) => {
                    let x = lookup(input)?;
                    if x.kind != OperandKind::Encrypted {
                        return Err(invalid(&self.name, format!("{} reduces a plain value", step.output)));
                    }
                    ValueType { unreduced: false, ..x }
                }
                Node::SlotSum(input) => {
                    let x = lookup(input)?;
                    if x.kind != OperandKind::Encrypted || !matches!(x.layout, SlotLayout::Batched { .. }) {
                        return Err(invalid(
                            &self.name,
                            format!("{} needs an encrypted batched operand", step.output),
                        ));
                    }
                    if !rotation_layouts.contains(&x.layout) {
                        rotation_layouts.push(x.layout);
                    }
                    x
                }
            };

            if types.contains_key(step.output.as_str()) || constants.contains_key(step.output.as_str()) {
                return Err(invalid(&self.name, format!("duplicate name {}", step.output)));
            }
            types.insert(&step.output, ty);
        }

        let outputs = self
            .outputs
            .iter()
            .map(|name| {
                let ty = types
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| invalid(&self.name, format!("output {} is never computed", name)))?;
                if ty.kind != OperandKind::Encrypted {
                    return Err(invalid(&self.name, format!("output {} is not encrypted", name)));
                }
                Ok((name.clone(), ty))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PipelineSignature {
            outputs,
            rotation_layouts,
            values: types.into_iter().map(|(name, ty)| (name.to_string(), ty)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(name: &str) -> InputSpec {
        InputSpec::encrypted(name, SlotLayout::Scalar)
    }

    fn pipeline(inputs: Vec<InputSpec>, steps: Vec<Step>, outputs: &[&str]) -> Pipeline {
        Pipeline {
            name: "test".into(),
            inputs,
            constants: vec![ConstantSpec {
                name: "rate".into(),
                value: 0.15,
            }],
            steps,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_exponents_are_tracked() {
        let p = pipeline(
            vec![enc("a"), enc("b")],
            vec![
                Step::new("diff", Node::Sub("a".into(), "b".into())),
                Step::new(
                    "scaled",
                    Node::MulConstant {
                        input: "a".into(),
                        constant: "rate".into(),
                    },
                ),
                Step::new("reduced", Node::Reduce("scaled".into())),
            ],
            &["diff", "reduced"],
        );
        let sig = p.validate().unwrap();
        assert_eq!(sig.outputs[0].1.exponent, ScaleExponent::new(1));
        assert_eq!(sig.outputs[1].1.exponent, ScaleExponent::new(2));
        assert!(!sig.needs_rotation_keys());
    }

    #[test]
    fn test_mixed_exponents_fail_validation() {
        let p = pipeline(
            vec![enc("a")],
            vec![
                Step::new(
                    "scaled",
                    Node::MulConstant {
                        input: "a".into(),
                        constant: "rate".into(),
                    },
                ),
                Step::new("bad", Node::Add("scaled".into(), "a".into())),
            ],
            &["bad"],
        );
        assert!(matches!(p.validate(), Err(Error::ScaleMismatch { .. })));
    }

    #[test]
    fn test_structural_errors() {
        let undefined = pipeline(vec![enc("a")], vec![Step::new("x", Node::Reduce("nope".into()))], &["x"]);
        assert!(undefined.validate().is_err());

        let duplicate = pipeline(vec![enc("a"), enc("a")], vec![], &["a"]);
        assert!(duplicate.validate().is_err());

        let plain_only = pipeline(
            vec![InputSpec::plain("g"), InputSpec::plain("h")],
            vec![Step::new("x", Node::Sub("g".into(), "h".into()))],
            &["x"],
        );
        assert!(plain_only.validate().is_err());

        let plain_output = pipeline(vec![enc("a"), InputSpec::plain("g")], vec![], &["g"]);
        assert!(plain_output.validate().is_err());

        let scalar_sum = pipeline(vec![enc("a")], vec![Step::new("x", Node::SlotSum("a".into()))], &["x"]);
        assert!(scalar_sum.validate().is_err());
    }

    #[test]
    fn test_constants_are_rates() {
        let mut p = pipeline(vec![enc("a")], vec![], &["a"]);
        p.constants[0].value = -1.0;
        assert!(p.validate().is_ok());
        p.constants[0].value = 1.5;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_double_multiplication_requires_reduce() {
        let mul = |input: &str| Node::MulConstant {
            input: input.into(),
            constant: "rate".into(),
        };
        let p = pipeline(
            vec![enc("a")],
            vec![Step::new("x", mul("a")), Step::new("y", mul("x"))],
            &["y"],
        );
        assert!(p.validate().is_err());
    }
}
