//! Pipeline arithmetic on encrypted values, checked against plaintext expectations

use fincrypt::codec::{FixedPointCodec, ScaleExponent, ScaledAmount};
use fincrypt::fhe::{FheContext, SlotLayout};
use fincrypt::math::GaussianSampler;
use fincrypt::pipeline::{pipeline_for, EvalKeys, Evaluator, Value, DEFAULT_SAVINGS_RATE};
use fincrypt::{SchemeParams, SessionVariant};

fn context() -> (FheContext, GaussianSampler) {
    let params = SchemeParams::insecure_d256();
    let sampler = GaussianSampler::with_seed(params.sigma, 42);
    (FheContext::new(params).unwrap(), sampler)
}

#[test]
fn test_goal_tracking_values() {
    let (ctx, mut sampler) = context();
    let codec = FixedPointCodec::default();
    let (sk, keys) = ctx.generate_keys(&[], &mut sampler);

    let scaled = |v: f64| codec.to_scaled(v).unwrap().value;
    assert_eq!(scaled(1500.75), 150_075);

    let mut enc = |v: i64| {
        let pt = ctx.encode_constant(v).unwrap();
        Value::Encrypted(ctx.encrypt(&pt, &keys.public, &mut sampler).unwrap())
    };
    let inputs = vec![
        enc(scaled(1500.75)),
        Value::Plain(ctx.encode_constant(scaled(500.0)).unwrap()),
        enc(scaled(450.50)),
        enc(scaled(120.0)),
    ];

    let evaluator = Evaluator::new(
        &ctx,
        codec,
        EvalKeys {
            relin: &keys.relin,
            galois: None,
        },
    );
    let pipeline = pipeline_for(SessionVariant::GoalTracking, DEFAULT_SAVINGS_RATE);
    let outputs = evaluator.run(&pipeline, inputs).unwrap();

    let decoded: Vec<i64> = outputs
        .iter()
        .map(|ct| {
            let pt = ctx.decrypt(ct, &sk).unwrap();
            ctx.decode(&pt, SlotLayout::Scalar).unwrap()[0]
        })
        .collect();
    // 150075 - (45050 + 12000) - 50000
    assert_eq!(decoded, vec![57_050, 93_025, 43_025]);
    assert_eq!(
        codec.from_scaled(ScaledAmount::new(decoded[2], ScaleExponent::BASE)),
        430.25
    );
}

#[test]
fn test_savings_product_carries_two_scale_factors() {
    let (ctx, mut sampler) = context();
    let codec = FixedPointCodec::default();
    let (sk, keys) = ctx.generate_keys(&[], &mut sampler);

    let income = ctx.encode_constant(150_075).unwrap();
    let expense = ctx.encode_constant(45_050).unwrap();
    let inputs = vec![
        Value::Encrypted(ctx.encrypt(&income, &keys.public, &mut sampler).unwrap()),
        Value::Encrypted(ctx.encrypt(&expense, &keys.public, &mut sampler).unwrap()),
    ];

    let evaluator = Evaluator::new(
        &ctx,
        codec,
        EvalKeys {
            relin: &keys.relin,
            galois: None,
        },
    );
    let pipeline = pipeline_for(SessionVariant::Budget, DEFAULT_SAVINGS_RATE);
    let signature = pipeline.validate().unwrap();
    let outputs = evaluator.run(&pipeline, inputs).unwrap();

    let pt = ctx.decrypt(&outputs[1], &sk).unwrap();
    let value = ctx.decode(&pt, SlotLayout::Scalar).unwrap()[0];
    assert_eq!(value, 2_251_125);

    let exponent = signature.outputs[1].1.exponent;
    assert_eq!(exponent, ScaleExponent::new(2));
    assert_eq!(codec.from_scaled(ScaledAmount::new(value, exponent)), 225.1125);
}

#[test]
fn test_custom_savings_rate() {
    let (ctx, mut sampler) = context();
    let (sk, keys) = ctx.generate_keys(&[], &mut sampler);

    let mut enc = |v: i64| {
        let pt = ctx.encode_constant(v).unwrap();
        Value::Encrypted(ctx.encrypt(&pt, &keys.public, &mut sampler).unwrap())
    };
    let inputs = vec![enc(200_000), enc(0)];

    let evaluator = Evaluator::new(
        &ctx,
        FixedPointCodec::default(),
        EvalKeys {
            relin: &keys.relin,
            galois: None,
        },
    );
    let outputs = evaluator
        .run(&pipeline_for(SessionVariant::Budget, 0.2), inputs)
        .unwrap();

    let pt = ctx.decrypt(&outputs[1], &sk).unwrap();
    assert_eq!(ctx.decode(&pt, SlotLayout::Scalar).unwrap(), vec![4_000_000]);
}
