use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fincrypt::codec::FixedPointCodec;
use fincrypt::fhe::{FheContext, SlotLayout};
use fincrypt::math::GaussianSampler;
use fincrypt::pipeline::{pipeline_for, EvalKeys, Evaluator, Value, DEFAULT_SAVINGS_RATE, ITEM_SLOTS};
use fincrypt::{SchemeParams, SessionVariant};

fn pipeline_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    for (label, params) in [
        ("d256", SchemeParams::insecure_d256()),
        ("d2048", SchemeParams::secure_128_d2048()),
    ] {
        let ctx = FheContext::new(params.clone()).unwrap();
        let mut sampler = GaussianSampler::new(params.sigma);
        let layout = SlotLayout::Batched { slots: ITEM_SLOTS };
        let (_sk, keys) = ctx.generate_keys(&ctx.rotation_elements(layout), &mut sampler);
        let eval_keys = EvalKeys {
            relin: &keys.relin,
            galois: keys.galois.as_ref(),
        };
        let evaluator = Evaluator::new(&ctx, FixedPointCodec::default(), eval_keys);

        let mut encrypt = |values: &[i64], layout: SlotLayout| {
            let pt = ctx.encode(values, layout).unwrap();
            Value::Encrypted(ctx.encrypt(&pt, &keys.public, &mut sampler).unwrap())
        };

        let budget_inputs = vec![
            encrypt(&[150_075], SlotLayout::Scalar),
            encrypt(&[45_050], SlotLayout::Scalar),
        ];
        let items: Vec<i64> = (1..=ITEM_SLOTS as i64).map(|i| i * 1_000).collect();
        let itemized_inputs = vec![encrypt(&items, layout), encrypt(&items[..8], layout)];

        let budget = pipeline_for(SessionVariant::Budget, DEFAULT_SAVINGS_RATE);
        group.bench_with_input(BenchmarkId::new("budget", label), &budget, |b, pipeline| {
            b.iter(|| evaluator.run(pipeline, budget_inputs.clone()).unwrap());
        });

        let itemized = pipeline_for(SessionVariant::Itemized, DEFAULT_SAVINGS_RATE);
        group.bench_with_input(BenchmarkId::new("itemized", label), &itemized, |b, pipeline| {
            b.iter(|| evaluator.run(pipeline, itemized_inputs.clone()).unwrap());
        });
    }

    group.finish();
}

fn keygen_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("keygen");
    group.sample_size(10);

    let params = SchemeParams::secure_128_d2048();
    let ctx = FheContext::new(params.clone()).unwrap();
    let mut sampler = GaussianSampler::new(params.sigma);
    let elements = ctx.rotation_elements(SlotLayout::Batched { slots: ITEM_SLOTS });

    group.bench_function("scalar_d2048", |b| b.iter(|| ctx.generate_keys(&[], &mut sampler)));
    group.bench_function("itemized_d2048", |b| {
        b.iter(|| ctx.generate_keys(&elements, &mut sampler))
    });

    group.finish();
}

criterion_group!(benches, pipeline_benchmark, keygen_benchmark);
criterion_main!(benches);
