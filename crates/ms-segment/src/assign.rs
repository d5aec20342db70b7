// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Polarity-invariant assignment of every sample to its best pattern.

use crate::quality::{QualityRecord, check_shapes, global_explained_variance};
use ms_cluster::best_pattern;
use ms_core::{ExecutionContext, MsError, PatternSet, Polarity, SignalView};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Labels of the full signal under a fixed pattern set.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Backfit {
    pub assignment: Vec<usize>,
    pub polarity: Vec<Polarity>,
    pub quality: QualityRecord,
}

fn score_samples(signal: &SignalView<'_>, patterns: &PatternSet) -> Vec<(usize, f64)> {
    let mut sample = vec![0.0; signal.n_channels];
    (0..signal.n_samples)
        .map(|t| {
            signal.sample_into(t, &mut sample);
            best_pattern(patterns, &sample)
        })
        .collect()
}

#[cfg(feature = "rayon")]
fn score_samples_parallel(signal: &SignalView<'_>, patterns: &PatternSet) -> Vec<(usize, f64)> {
    (0..signal.n_samples)
        .into_par_iter()
        .map_init(
            || vec![0.0; signal.n_channels],
            |sample, t| {
                signal.sample_into(t, sample);
                best_pattern(patterns, sample)
            },
        )
        .collect()
}

/// Assigns each sample to the pattern with maximal `|activation|`.
///
/// Ties go to the lowest pattern index. Polarity is the sign of the winning
/// activation, with exactly zero counted as positive.
pub fn assign_samples(
    signal: &SignalView<'_>,
    patterns: &PatternSet,
    ctx: &ExecutionContext<'_>,
) -> Result<(Vec<usize>, Vec<Polarity>), MsError> {
    check_shapes(signal, patterns, None)?;

    #[cfg(feature = "rayon")]
    let scored = if ctx.repro_mode.allows_parallel() {
        score_samples_parallel(signal, patterns)
    } else {
        score_samples(signal, patterns)
    };
    #[cfg(not(feature = "rayon"))]
    let scored = {
        let _ = ctx;
        score_samples(signal, patterns)
    };

    if let Some(t) = scored.iter().position(|(_, act)| !act.is_finite()) {
        return Err(MsError::numerical_issue(format!(
            "activation at sample {t} is not finite"
        )));
    }
    Ok(scored
        .into_iter()
        .map(|(label, act)| (label, Polarity::of(act)))
        .unzip())
}

/// Assigns the full signal with `patterns` and scores the result.
pub fn backfit(
    signal: &SignalView<'_>,
    patterns: &PatternSet,
    strength: &[f64],
    ctx: &ExecutionContext<'_>,
) -> Result<Backfit, MsError> {
    let (assignment, polarity) = assign_samples(signal, patterns, ctx)?;
    let quality = global_explained_variance(signal, patterns, &assignment, strength)?;
    Ok(Backfit {
        assignment,
        polarity,
        quality,
    })
}

#[cfg(test)]
mod tests {
    use super::{assign_samples, backfit};
    use ms_core::{ExecutionContext, MemoryLayout, PatternSet, Polarity, ReproMode, SignalView};

    #[test]
    fn alternating_inverted_topography_is_one_state_with_alternating_polarity() {
        let a = [0.5, -0.5, 0.5, -0.5];
        let b = [0.5, 0.5, -0.5, -0.5];
        let patterns =
            PatternSet::from_rows([a, b].concat(), 2, 4).expect("patterns should be valid");

        let mut values = Vec::new();
        for t in 0..6 {
            let sign = if t % 2 == 0 { 1.0 } else { -1.0 };
            values.extend(a.iter().map(|v| sign * 3.0 * v));
        }
        let view = SignalView::from_f64(&values, 4, 6, MemoryLayout::SampleMajor)
            .expect("view should build");

        let fit = backfit(&view, &patterns, &[1.0; 6], &ExecutionContext::new())
            .expect("backfit should succeed");
        assert_eq!(fit.assignment, vec![0; 6]);
        let signs: Vec<i8> = fit.polarity.iter().map(|p| p.sign()).collect();
        assert_eq!(signs, vec![1, -1, 1, -1, 1, -1]);
        assert!((fit.quality.gev - 1.0).abs() < 1e-12);
        assert_eq!(fit.quality.gev_per_pattern[1], 0.0);
    }

    #[test]
    fn ties_pick_lowest_index_and_zero_is_positive() {
        let patterns = PatternSet::from_rows(vec![1.0, 0.0, 0.0, 1.0], 2, 2)
            .expect("patterns should be valid");
        // Sample 0 ties at |1|, sample 1 is all zero.
        let values = [1.0, -1.0, 0.0, 0.0];
        let view = SignalView::from_f64(&values, 2, 2, MemoryLayout::SampleMajor)
            .expect("view should build");
        let (labels, polarity) =
            assign_samples(&view, &patterns, &ExecutionContext::new()).expect("assign");
        assert_eq!(labels, vec![0, 0]);
        assert_eq!(polarity, vec![Polarity::Positive, Polarity::Positive]);
    }

    #[test]
    fn strict_and_balanced_modes_agree() {
        let patterns = PatternSet::from_rows_normalized(
            vec![1.0, 0.2, -0.3, 0.1, -1.0, 0.4, 0.3, 0.3, 1.0],
            3,
            3,
        )
        .expect("patterns should be valid");
        let values: Vec<f64> = (0..300).map(|i| (i as f64 * 0.37).sin()).collect();
        let view = SignalView::from_f64(&values, 3, 100, MemoryLayout::ChannelMajor)
            .expect("view should build");
        let strict = assign_samples(
            &view,
            &patterns,
            &ExecutionContext::new().with_repro_mode(ReproMode::Strict),
        )
        .expect("assign");
        let balanced = assign_samples(&view, &patterns, &ExecutionContext::new()).expect("assign");
        assert_eq!(strict, balanced);
    }

    #[test]
    fn channel_mismatch_is_invalid_input() {
        let patterns =
            PatternSet::from_rows(vec![1.0, 0.0, 0.0], 1, 3).expect("patterns should be valid");
        let values = [1.0, 2.0];
        let view = SignalView::from_f64(&values, 2, 1, MemoryLayout::ChannelMajor)
            .expect("view should build");
        let err = assign_samples(&view, &patterns, &ExecutionContext::new()).expect_err("mismatch");
        assert!(err.to_string().contains("patterns have 3 channels"));
    }
}
