//! Benchmarks for flow evaluation and robustness scoring.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::prelude::*;

use robust_flow::{
    FlowNetwork, Parameters,
    compute::{RobustnessEvaluator, RobustnessModel},
};

fn network(middle: u16, seed: u64) -> FlowNetwork {
    let params = Parameters {
        nodes_in: 8,
        nodes_middle: middle,
        nodes_out: 8,
        activated_k: 4,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(seed);
    FlowNetwork::generate(&params, 0.3, &mut rng).expect("network generation")
}

fn bench_flow_error(c: &mut Criterion) {
    let mut group = c.benchmark_group("flow_error");

    for middle in [20, 50, 100] {
        let network = network(middle, 7);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("8-{}-8", middle)),
            &middle,
            |b, _| {
                b.iter_batched(
                    || network.clone(),
                    |mut n| black_box(n.flow_error()),
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_robustness(c: &mut Criterion) {
    let mut group = c.benchmark_group("robustness");
    group.sample_size(20);

    let network = network(20, 11);
    let models = [
        ("link", RobustnessModel::Link),
        ("node", RobustnessModel::Node),
        ("noise", RobustnessModel::Noise { noise_level: 0.1 }),
    ];

    for (label, model) in models {
        let evaluator = RobustnessEvaluator::new(model, 0.007);
        let mut rng = StdRng::seed_from_u64(3);

        group.bench_with_input(BenchmarkId::from_parameter(label), &model, |b, _| {
            b.iter(|| black_box(evaluator.evaluate(black_box(&network), &mut rng)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_flow_error, bench_robustness);
criterion_main!(benches);
