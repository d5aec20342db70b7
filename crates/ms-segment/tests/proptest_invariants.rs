// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ms_cluster::{Clusterer, FitRequest, ModifiedKMeans};
use ms_core::{ExecutionContext, MemoryLayout, PatternSet, Polarity, SignalView, TrainingData};
use ms_segment::{
    SelectionCriterion, SelectionPlan, backfit, derive_run_seeds, global_explained_variance,
    select_best,
};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

const MIN_PROPTEST_CASES: u32 = 1000;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

/// `(n_channels, n_samples, signal values, strength)` with a non-zero
/// strength series.
fn recording() -> impl Strategy<Value = (usize, usize, Vec<f64>, Vec<f64>)> {
    (3usize..6, 8usize..40).prop_flat_map(|(n_channels, n_samples)| {
        (
            Just(n_channels),
            Just(n_samples),
            prop::collection::vec(-5.0f64..5.0, n_channels * n_samples),
            prop::collection::vec(0.1f64..3.0, n_samples),
        )
    })
}

type RecordingWithPatterns = (usize, usize, Vec<f64>, Vec<f64>, usize, Vec<f64>);

/// A recording plus `k` pattern rows sized to its channel count, with every
/// entry bounded away from zero.
fn recording_with_patterns() -> impl Strategy<Value = RecordingWithPatterns> {
    (recording(), 1usize..4).prop_flat_map(|((n_channels, n_samples, values, strength), k)| {
        (
            Just(n_channels),
            Just(n_samples),
            Just(values),
            Just(strength),
            Just(k),
            prop::collection::vec(
                prop_oneof![-1.0f64..-0.05, 0.05f64..1.0],
                k * n_channels,
            ),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_invariants.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn backfit_labels_in_range_and_gev_is_additive(
        (n_channels, n_samples, values, strength) in recording(),
        pattern_seed in any::<u64>(),
    ) {
        let signal = SignalView::from_f64(&values, n_channels, n_samples, MemoryLayout::SampleMajor)
            .expect("valid view");
        let k = 1 + (pattern_seed % 3) as usize;
        let rows: Vec<f64> = (0..k * n_channels)
            .map(|i| (((pattern_seed >> (i % 48)) & 0x1f) as f64 - 15.5) / 16.0)
            .collect();
        let patterns = PatternSet::from_rows_normalized(rows, k, n_channels).expect("non-zero rows");

        let fit = backfit(&signal, &patterns, &strength, &ExecutionContext::new()).expect("backfit");
        prop_assert_eq!(fit.assignment.len(), n_samples);
        prop_assert_eq!(fit.polarity.len(), n_samples);
        prop_assert!(fit.assignment.iter().all(|&label| label < k));
        prop_assert!(fit.polarity.iter().all(|p| p.sign() == 1 || p.sign() == -1));

        let sum: f64 = fit.quality.gev_per_pattern.iter().sum();
        prop_assert!((sum - fit.quality.gev).abs() <= 1e-12 * (1.0 + fit.quality.gev.abs()));
        prop_assert!(fit.quality.gev >= 0.0 && fit.quality.gev <= 1.0 + 1e-9);
        prop_assert!(fit.quality.gev_per_pattern.iter().all(|g| *g >= 0.0));
    }

    #[test]
    fn sign_flipped_samples_keep_labels_and_flip_polarity(
        (n_channels, n_samples, values, strength, k, rows) in recording_with_patterns(),
    ) {
        let signal = SignalView::from_f64(&values, n_channels, n_samples, MemoryLayout::SampleMajor)
            .expect("valid view");
        let flipped: Vec<f64> = values.iter().map(|v| -v).collect();
        let mirror = SignalView::from_f64(&flipped, n_channels, n_samples, MemoryLayout::SampleMajor)
            .expect("valid view");
        let patterns = PatternSet::from_rows_normalized(rows, k, n_channels).expect("non-zero rows");
        let ctx = ExecutionContext::new();

        let base = backfit(&signal, &patterns, &strength, &ctx).expect("backfit");
        let other = backfit(&mirror, &patterns, &strength, &ctx).expect("backfit");
        prop_assert_eq!(&base.assignment, &other.assignment);
        prop_assert_eq!(base.quality.gev, other.quality.gev);
        for (a, b) in base.polarity.iter().zip(&other.polarity) {
            // Zero activation is positive on both sides.
            let both_zero = *a == Polarity::Positive && *b == Polarity::Positive;
            prop_assert!(a.sign() == -b.sign() || both_zero);
        }

        let direct = global_explained_variance(&signal, &patterns, &base.assignment, &strength)
            .expect("gev");
        prop_assert_eq!(direct, base.quality);
    }

    #[test]
    fn selection_is_deterministic_and_keeps_the_best_run(
        (n_channels, n_samples, values, strength) in recording(),
        seed in any::<u64>(),
        n_runs in 1usize..5,
    ) {
        let signal = SignalView::from_f64(&values, n_channels, n_samples, MemoryLayout::SampleMajor)
            .expect("valid view");
        let train_idx: Vec<usize> = (0..n_samples).collect();
        let train = TrainingData::gather(&signal, &train_idx).expect("gather");
        let plan = SelectionPlan {
            k: 2,
            n_runs,
            criterion: SelectionCriterion::Gev,
            seed,
            ..SelectionPlan::default()
        };
        let ctx = ExecutionContext::new();
        let clusterer = ModifiedKMeans::default();

        let first = select_best(&signal, &strength, &train, &clusterer, &plan, &ctx);
        let second = select_best(&signal, &strength, &train, &clusterer, &plan, &ctx);
        prop_assert_eq!(&first, &second);

        if let Ok(outcome) = first {
            let seeds = derive_run_seeds(seed, n_runs).expect("seeds");
            prop_assert_eq!(outcome.best.seed, seeds[outcome.best.run_index]);
            prop_assert_eq!(outcome.stats.runs_completed + outcome.stats.runs_failed, n_runs);
            prop_assert_eq!(outcome.stats.selected_run, Some(outcome.best.run_index));
            for (run_index, &run_seed) in seeds.iter().enumerate() {
                if let Ok(fit) = clusterer.fit(&train, &FitRequest::new(2, run_seed)) {
                    let scored = backfit(&signal, &fit.patterns, &strength, &ctx).expect("backfit");
                    prop_assert!(outcome.best.quality.gev >= scored.quality.gev);
                    if run_index < outcome.best.run_index {
                        prop_assert!(outcome.best.quality.gev > scored.quality.gev);
                    }
                }
            }
        }
    }
}
