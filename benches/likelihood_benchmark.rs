//! Objective, gradient and curvature costs as the sample grows.
//!
//! Run with `cargo bench --bench likelihood_benchmark`.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::{Array1, Array2, array};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tobit::gradient::neg_log_likelihood_gradient;
use tobit::hessian::finite_difference_hessian;
use tobit::likelihood::neg_log_likelihood;
use tobit::{CensoredGroups, CensoringCode, FitConfig, TobitModel, partition};

const SAMPLE_SIZES: [usize; 3] = [1_000, 10_000, 100_000];
const NUM_FEATURES: usize = 4;

/// Design with an intercept column and roughly a third of the rows left-censored.
fn generate_data(n: usize) -> (Array2<f64>, Array1<f64>, Vec<CensoringCode>) {
    let mut rng = StdRng::seed_from_u64(123);
    let x = Array2::from_shape_fn((n, NUM_FEATURES), |(_, j)| {
        if j == 0 { 1.0 } else { rng.gen_range(-2.0..2.0) }
    });
    let mut y = Array1::zeros(n);
    let mut codes = Vec::with_capacity(n);
    for i in 0..n {
        let latent = 0.5 + x[[i, 1]] - 0.5 * x[[i, 2]] + 0.25 * x[[i, 3]] + rng.gen_range(-1.5..1.5);
        if latent <= 0.0 {
            codes.push(CensoringCode::Left);
        } else {
            y[i] = latent;
            codes.push(CensoringCode::Uncensored);
        }
    }
    (x, y, codes)
}

fn setup_groups(n: usize) -> CensoredGroups {
    let (x, y, codes) = generate_data(n);
    partition(x.view(), y.view(), &codes).expect("generated data is consistent")
}

fn benchmark_evaluators(c: &mut Criterion) {
    let params = array![0.4, 0.9, -0.4, 0.3, 1.1];
    let steps = Array1::from_elem(params.len(), 1e-5);
    let mut group = c.benchmark_group("Evaluators");

    for &n in &SAMPLE_SIZES {
        let groups = setup_groups(n);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("NegLogLikelihood", n), &groups, |b, groups| {
            b.iter(|| neg_log_likelihood(black_box(groups), black_box(params.view())))
        });
        group.bench_with_input(BenchmarkId::new("Gradient", n), &groups, |b, groups| {
            b.iter(|| neg_log_likelihood_gradient(black_box(groups), black_box(params.view())))
        });
        group.bench_with_input(BenchmarkId::new("Curvature", n), &groups, |b, groups| {
            b.iter(|| {
                finite_difference_hessian(
                    |theta| neg_log_likelihood_gradient(groups, theta),
                    black_box(params.view()),
                    steps.view(),
                )
            })
        });
    }
    group.finish();
}

fn benchmark_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("Fit");
    group.sample_size(10);

    for &n in &SAMPLE_SIZES[..2] {
        let (x, y, codes) = generate_data(n);
        let features = x.slice(ndarray::s![.., 1..]).to_owned();
        let model = TobitModel::new(FitConfig::default());
        group.bench_with_input(BenchmarkId::new("TobitModel::fit", n), &n, |b, _| {
            b.iter(|| model.fit(black_box(features.view()), black_box(y.view()), &codes))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_evaluators, benchmark_fit);
criterion_main!(benches);
