//! The fixed pipelines behind each session variant

use crate::fhe::SlotLayout;
use crate::protocol::SessionVariant;

use super::{ConstantSpec, InputSpec, Node, Pipeline, Step};

/// Share of income set aside as savings
pub const DEFAULT_SAVINGS_RATE: f64 = 0.15;

/// Slots per itemized list; longer lists are rejected by the owner
pub const ITEM_SLOTS: usize = 16;

const SAVINGS_RATE: &str = "savings_rate";

fn savings_rate(rate: f64) -> ConstantSpec {
    ConstantSpec {
        name: SAVINGS_RATE.to_string(),
        value: rate,
    }
}

fn sub(output: &str, lhs: &str, rhs: &str) -> Step {
    Step::new(output, Node::Sub(lhs.into(), rhs.into()))
}

fn add(output: &str, lhs: &str, rhs: &str) -> Step {
    Step::new(output, Node::Add(lhs.into(), rhs.into()))
}

/// `output = reduce(input * savings_rate)`, at exponent 2
fn savings(output: &str, input: &str) -> [Step; 2] {
    let scaled = format!("{}_unreduced", output);
    [
        Step::new(
            &scaled,
            Node::MulConstant {
                input: input.into(),
                constant: SAVINGS_RATE.into(),
            },
        ),
        Step::new(output, Node::Reduce(scaled.clone())),
    ]
}

/// Pipeline evaluated for `variant`
///
/// Input and output order is part of the wire protocol: `Input(i)` and
/// `Result(i)` index into these lists.
pub fn pipeline_for(variant: SessionVariant, savings_rate_value: f64) -> Pipeline {
    match variant {
        SessionVariant::Budget => {
            let mut steps = vec![sub("net_income", "income", "expense")];
            steps.extend(savings("savings_contribution", "income"));
            Pipeline {
                name: variant.to_string(),
                inputs: vec![
                    InputSpec::encrypted("income", SlotLayout::Scalar),
                    InputSpec::encrypted("expense", SlotLayout::Scalar),
                ],
                constants: vec![savings_rate(savings_rate_value)],
                steps,
                outputs: vec!["net_income".into(), "savings_contribution".into()],
            }
        }
        SessionVariant::GoalTracking => Pipeline {
            name: variant.to_string(),
            inputs: vec![
                InputSpec::encrypted("total_income", SlotLayout::Scalar),
                InputSpec::plain("savings_goal"),
                InputSpec::encrypted("essential_expenses", SlotLayout::Scalar),
                InputSpec::encrypted("non_essential_expenses", SlotLayout::Scalar),
            ],
            constants: Vec::new(),
            steps: vec![
                add("total_expenses", "essential_expenses", "non_essential_expenses"),
                sub("net_income", "total_income", "total_expenses"),
                sub("goal_difference", "net_income", "savings_goal"),
            ],
            outputs: vec![
                "total_expenses".into(),
                "net_income".into(),
                "goal_difference".into(),
            ],
        },
        SessionVariant::Itemized => {
            let layout = SlotLayout::Batched { slots: ITEM_SLOTS };
            let mut steps = vec![
                Step::new("total_income", Node::SlotSum("income_items".into())),
                Step::new("total_expenses", Node::SlotSum("expense_items".into())),
                sub("net_income", "total_income", "total_expenses"),
            ];
            // Scale the items, then sum: the rate must not multiply rotation noise
            steps.extend(savings("savings_items", "income_items"));
            steps.push(Step::new("savings_contribution", Node::SlotSum("savings_items".into())));
            Pipeline {
                name: variant.to_string(),
                inputs: vec![
                    InputSpec::encrypted("income_items", layout),
                    InputSpec::encrypted("expense_items", layout),
                ],
                constants: vec![savings_rate(savings_rate_value)],
                steps,
                outputs: vec![
                    "total_income".into(),
                    "total_expenses".into(),
                    "net_income".into(),
                    "savings_contribution".into(),
                ],
            }
        }
    }
}
