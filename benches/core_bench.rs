//! Benchmarks for stackdef core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_yaml_ng::{Mapping, Value};
use stackdef::core::app::{app_schema, AppConfigDefaults, AppConfigDraft, DeploymentDraft};
use stackdef::core::merge::generate_final_config;
use stackdef::core::resolve::resolve;
use stackdef::core::shape::{derive_defaults_shape, derive_final_shape};
use stackdef::core::types::MergeOptions;
use stackdef::tripwire::hasher::fingerprint;

/// Config with `n` environments, each leaving its defaulted fields unset.
fn environments_config(n: usize) -> Value {
    let mut draft = AppConfigDraft::example();
    let template = draft.backend.environments[0].clone();
    draft.backend.environments = (0..n)
        .map(|i| {
            let mut env = template.clone();
            env.name = format!("Env{i:03}");
            env.subdomain = format!("env{i:03}");
            env.deployment = Some(DeploymentDraft {
                wave: Some((i % 4) as u32),
            });
            env
        })
        .collect();
    serde_yaml_ng::to_value(&draft).unwrap()
}

fn standard_defaults() -> Value {
    serde_yaml_ng::to_value(AppConfigDefaults::standard()).unwrap()
}

fn bench_merge_environments(c: &mut Criterion) {
    let defaults = standard_defaults();
    let options = MergeOptions::default();

    let mut group = c.benchmark_group("merge_environments");
    for n in [1, 10, 100] {
        let config = environments_config(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &config, |b, config| {
            b.iter(|| {
                let merged =
                    generate_final_config(black_box(config), black_box(&defaults), &options)
                        .unwrap();
                black_box(merged);
            });
        });
    }
    group.finish();
}

fn bench_merge_depth(c: &mut Criterion) {
    // config: {a: {a: ... {leaf: 1}}}, defaults: {a_defaults: {a_defaults: ... {other: 2}}}
    let mut group = c.benchmark_group("merge_depth");
    for depth in [4, 16, 48] {
        let mut config = Value::Mapping(Mapping::from_iter([("leaf".into(), 1.into())]));
        let mut defaults = Value::Mapping(Mapping::from_iter([("other".into(), 2.into())]));
        for _ in 0..depth {
            config = Value::Mapping(Mapping::from_iter([("a".into(), config)]));
            defaults = Value::Mapping(Mapping::from_iter([("a_defaults".into(), defaults)]));
        }
        let options = MergeOptions::default();
        group.bench_with_input(
            BenchmarkId::from_parameter(depth),
            &(config, defaults),
            |b, (config, defaults)| {
                b.iter(|| {
                    black_box(generate_final_config(config, defaults, &options).unwrap());
                });
            },
        );
    }
    group.finish();
}

fn bench_resolve_strict(c: &mut Criterion) {
    let schema = app_schema();
    let defaults = standard_defaults();
    let config = environments_config(10);
    let options = MergeOptions::default();

    c.bench_function("resolve_strict_10_envs", |b| {
        b.iter(|| {
            let resolved = resolve(&schema, black_box(&config), &defaults, &options).unwrap();
            black_box(resolved);
        });
    });
}

fn bench_derive_shapes(c: &mut Criterion) {
    let schema = app_schema();
    c.bench_function("derive_defaults_shape", |b| {
        b.iter(|| black_box(derive_defaults_shape(black_box(&schema))));
    });
    c.bench_function("derive_final_shape", |b| {
        b.iter(|| black_box(derive_final_shape(black_box(&schema))));
    });
}

fn bench_yaml_parse(c: &mut Criterion) {
    let yaml = serde_yaml_ng::to_string(&environments_config(10)).unwrap();
    c.bench_function("yaml_parse_config", |b| {
        b.iter(|| {
            let config: Value = serde_yaml_ng::from_str(black_box(&yaml)).unwrap();
            black_box(config);
        });
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let resolved = resolve(
        &app_schema(),
        &environments_config(10),
        &standard_defaults(),
        &MergeOptions::default(),
    )
    .unwrap();
    c.bench_function("fingerprint_resolved", |b| {
        b.iter(|| black_box(fingerprint(black_box(&resolved))));
    });
}

criterion_group!(
    benches,
    bench_merge_environments,
    bench_merge_depth,
    bench_resolve_strict,
    bench_derive_shapes,
    bench_yaml_parse,
    bench_fingerprint
);
criterion_main!(benches);
