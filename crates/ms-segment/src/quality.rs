// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Global explained variance (GEV) and the cross-validation criterion.

use ms_cluster::noise_variance;
use ms_core::linalg::pearson;
use ms_core::{MsError, PatternSet, SignalView};

/// Aggregate and per-pattern explained variance of a segmentation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QualityRecord {
    pub gev: f64,
    pub gev_per_pattern: Vec<f64>,
}

pub(crate) fn check_shapes(
    signal: &SignalView<'_>,
    patterns: &PatternSet,
    strength: Option<&[f64]>,
) -> Result<(), MsError> {
    if patterns.n_channels() != signal.n_channels {
        return Err(MsError::invalid_input(format!(
            "patterns have {} channels but the signal has {}",
            patterns.n_channels(),
            signal.n_channels
        )));
    }
    if let Some(strength) = strength
        && strength.len() != signal.n_samples
    {
        return Err(MsError::invalid_input(format!(
            "strength length {} does not match n_samples={}",
            strength.len(),
            signal.n_samples
        )));
    }
    Ok(())
}

fn check_assignment(assignment: &[usize], n_samples: usize, k: usize) -> Result<(), MsError> {
    if assignment.len() != n_samples {
        return Err(MsError::invalid_input(format!(
            "assignment length {} does not match n_samples={n_samples}",
            assignment.len()
        )));
    }
    if let Some((t, label)) = assignment.iter().enumerate().find(|(_, l)| **l >= k) {
        return Err(MsError::invalid_input(format!(
            "assignment at sample {t} is {label}, outside [0, {k})"
        )));
    }
    Ok(())
}

/// Sum of squared strengths; zero energy leaves GEV undefined.
pub(crate) fn strength_energy(strength: &[f64]) -> Result<f64, MsError> {
    let energy: f64 = strength.iter().map(|s| s * s).sum();
    if !energy.is_finite() {
        return Err(MsError::numerical_issue(
            "sum of squared strength is not finite",
        ));
    }
    if energy <= 0.0 {
        return Err(MsError::degenerate_input(
            "strength series has zero energy; explained variance is undefined",
        ));
    }
    Ok(energy)
}

/// Strength-weighted squared correlation between each sample and its
/// assigned pattern.
///
/// `gev = sum_t strength_t^2 * corr(x_t, pattern[a_t])^2 / sum_t strength_t^2`,
/// split by assigned pattern. Correlation is Pearson's r across channels;
/// samples with zero spatial variance contribute nothing. A pattern without
/// samples scores exactly `0.0`.
pub fn global_explained_variance(
    signal: &SignalView<'_>,
    patterns: &PatternSet,
    assignment: &[usize],
    strength: &[f64],
) -> Result<QualityRecord, MsError> {
    check_shapes(signal, patterns, Some(strength))?;
    check_assignment(assignment, signal.n_samples, patterns.k())?;
    let energy = strength_energy(strength)?;

    let mut per_pattern = vec![0.0; patterns.k()];
    let mut sample = vec![0.0; signal.n_channels];
    for (t, (&label, &s)) in assignment.iter().zip(strength).enumerate() {
        if s == 0.0 {
            continue;
        }
        signal.sample_into(t, &mut sample);
        if let Some(r) = pearson(&sample, patterns.row(label)) {
            per_pattern[label] += s * s * r * r;
        }
    }
    per_pattern.iter_mut().for_each(|g| *g /= energy);
    let gev = per_pattern.iter().sum();

    Ok(QualityRecord {
        gev,
        gev_per_pattern: per_pattern,
    })
}

/// Cross-validation criterion of Pascual-Marqui et al. (1995).
///
/// `cv = sigma^2 * ((C - 1) / (C - 1 - k))^2` with `sigma^2` the noise
/// variance of the polarity-invariant fit. Lower is better. Requires more
/// than `k + 1` channels.
pub fn cross_validation_criterion(
    signal: &SignalView<'_>,
    patterns: &PatternSet,
    assignment: &[usize],
) -> Result<f64, MsError> {
    check_shapes(signal, patterns, None)?;
    check_assignment(assignment, signal.n_samples, patterns.k())?;

    let n_channels = signal.n_channels;
    let k = patterns.k();
    if n_channels <= k + 1 {
        return Err(MsError::invalid_input(format!(
            "cross-validation needs n_channels > k + 1; got n_channels={n_channels}, k={k}"
        )));
    }

    let rows = (0..signal.n_samples).map(|t| signal.sample(t));
    let sigma2 = noise_variance(rows, patterns, assignment);
    let ratio = (n_channels - 1) as f64 / (n_channels - 1 - k) as f64;
    Ok(sigma2 * ratio * ratio)
}
