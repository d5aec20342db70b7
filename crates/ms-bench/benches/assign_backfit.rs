// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ms_bench::SyntheticRecording;
use ms_core::{ExecutionContext, ReproMode};
use ms_prepare::{GfpMethod, global_field_power};
use ms_segment::{assign_samples, backfit};

const N_CHANNELS: usize = 64;
const N_SAMPLES: usize = 100_000;

fn benchmark_backfit(c: &mut Criterion) {
    let recording = SyntheticRecording::generate(N_CHANNELS, N_SAMPLES, 4, 40, 11)
        .expect("benchmark recording should be valid");
    let view = recording.view().expect("benchmark view should be valid");
    let strength = global_field_power(&view, GfpMethod::L1);
    let balanced = ExecutionContext::new();
    let strict = ExecutionContext::new().with_repro_mode(ReproMode::Strict);

    let mut group = c.benchmark_group("assignment");

    group.bench_function("assign_c64_n1e5_k4", |b| {
        b.iter(|| {
            let _labels = assign_samples(black_box(&view), black_box(&recording.maps), &strict)
                .expect("assignment should succeed");
        })
    });

    group.bench_function("backfit_c64_n1e5_k4_strict", |b| {
        b.iter(|| {
            let _fit = backfit(
                black_box(&view),
                black_box(&recording.maps),
                black_box(&strength),
                &strict,
            )
            .expect("backfit should succeed");
        })
    });

    group.bench_function("backfit_c64_n1e5_k4_balanced", |b| {
        b.iter(|| {
            let _fit = backfit(
                black_box(&view),
                black_box(&recording.maps),
                black_box(&strength),
                &balanced,
            )
            .expect("backfit should succeed");
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_backfit);
criterion_main!(benches);
