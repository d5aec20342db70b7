// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use libfuzzer_sys::fuzz_target;
use ms_core::{ExecutionContext, MemoryLayout, PatternSet, ReproMode, SignalView};
use ms_segment::{backfit, cross_validation_criterion};

fn build_layout(seed: u8) -> MemoryLayout {
    if seed & 1 == 0 {
        MemoryLayout::ChannelMajor
    } else {
        MemoryLayout::SampleMajor
    }
}

fn build_value(mode_seed: u8, raw: f64, small: i16) -> f64 {
    match mode_seed % 8 {
        0 => 0.0,
        1 => f64::from(small) / 64.0,
        2 => raw,
        3 => f64::NAN,
        4 => f64::INFINITY,
        5 => f64::MIN_POSITIVE,
        6 => -f64::from(small),
        _ => raw.clamp(-1e6, 1e6),
    }
}

fn build_strength(seed: u8, n: usize, cursor: &mut common::ByteCursor<'_>) -> Vec<f64> {
    match seed % 4 {
        0 => vec![0.0; n],
        1 => (0..n).map(|_| f64::from(cursor.next_u8()) / 16.0).collect(),
        2 => (0..n)
            .map(|_| build_value(cursor.next_u8(), f64::from(cursor.next_i16()), 1))
            .collect(),
        _ => vec![1.0; n],
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);

    let n_channels = common::bounded(cursor.next_u8(), 1, 12);
    let n_samples = common::bounded(cursor.next_u8(), 1, 64);
    let k = common::bounded(cursor.next_u8(), 1, 6);
    let layout = build_layout(cursor.next_u8());

    let payload = cursor.take_padded(n_channels * n_samples * 8);
    let raw = common::decode_f64_chunks(&payload, n_channels * n_samples);
    let values: Vec<f64> = raw
        .iter()
        .map(|&v| build_value(cursor.next_u8(), v, cursor.next_i16()))
        .collect();

    let pattern_values: Vec<f64> = (0..k * n_channels)
        .map(|_| f64::from(cursor.next_i16()) / 128.0)
        .collect();
    let strength_seed = cursor.next_u8();
    let strength = build_strength(strength_seed, n_samples, &mut cursor);
    let repro_mode = match cursor.next_u8() % 3 {
        0 => ReproMode::Strict,
        1 => ReproMode::Balanced,
        _ => ReproMode::Fast,
    };

    let Ok(view) = SignalView::from_f64(&values, n_channels, n_samples, layout) else {
        return;
    };
    let Ok(patterns) = PatternSet::from_rows_normalized(pattern_values, k, n_channels) else {
        return;
    };
    let ctx = ExecutionContext::new().with_repro_mode(repro_mode);

    if let Ok(fit) = backfit(&view, &patterns, &strength, &ctx) {
        assert_eq!(fit.assignment.len(), n_samples);
        assert!(fit.assignment.iter().all(|&label| label < k));
        let _ = cross_validation_criterion(&view, &patterns, &fit.assignment);
    }
});
