//! Benchmarks for the full analysis pipeline.
//!
//! Measures the rewriting passes, cut-set enumeration, and probability
//! quantification over redundant n-train trees of growing width.
//!
//! Run with:
//! ```bash
//! cargo bench --bench pipeline
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use moira::{Approximation, Expression, FaultTreeAnalysis, Formula, GateType, Model, Settings};

/// An n-train redundancy tree: AND over n ORs of (valve_i, pump_i).
fn n_train_model(n: usize) -> Model {
    let mut model = Model::new("top");
    let mut top = Formula::new(GateType::And);
    for i in 0..n {
        let valve = format!("valve{i}");
        let pump = format!("pump{i}");
        model.add_basic_event(&valve, Expression::Constant(0.01)).unwrap();
        model.add_basic_event(&pump, Expression::Constant(0.02)).unwrap();
        top = top.formula(Formula::new(GateType::Or).event(valve).event(pump));
    }
    model.add_gate("top", top).unwrap();
    model.freeze().unwrap()
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/analyze");

    for n in [4, 8, 12] {
        let model = n_train_model(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &model, |b, model| {
            b.iter(|| {
                let settings = Settings::new()
                    .with_probability_analysis(true)
                    .with_approximation(Approximation::Exact);
                let mut analysis = FaultTreeAnalysis::new(model, settings).unwrap();
                analysis.analyze().unwrap();
                analysis.p_total()
            })
        });
    }
    group.finish();
}

fn bench_mcs_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/mcs");

    for n in [4, 8, 12] {
        let model = n_train_model(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &model, |b, model| {
            b.iter(|| {
                let mut analysis = FaultTreeAnalysis::new(model, Settings::new()).unwrap();
                analysis.analyze().unwrap();
                analysis.min_cut_sets().len()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_analysis, bench_mcs_only);
criterion_main!(benches);
