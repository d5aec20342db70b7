// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ms_core::linalg::dot;
use ms_core::{FitDiagnostics, MsError, PatternSet, TrainingData};

pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
pub const DEFAULT_THRESHOLD: f64 = 1e-6;

/// Parameters of a single clustering fit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct FitRequest {
    pub k: usize,
    pub seed: u64,
    pub max_iterations: usize,
    pub threshold: f64,
}

impl FitRequest {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), MsError> {
        if self.k == 0 {
            return Err(MsError::invalid_configuration("FitRequest.k must be >= 1; got 0"));
        }
        if self.max_iterations == 0 {
            return Err(MsError::invalid_configuration(
                "FitRequest.max_iterations must be >= 1; got 0",
            ));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(MsError::invalid_configuration(format!(
                "FitRequest.threshold must be finite and > 0; got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

impl Default for FitRequest {
    fn default() -> Self {
        Self {
            k: 4,
            seed: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Output of a clustering fit on the training subset.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterFit {
    /// Cluster index of every training row.
    pub assignment: Vec<usize>,
    /// Cluster centers, one unit-norm row per cluster.
    pub patterns: PatternSet,
    pub diagnostics: FitDiagnostics,
}

/// Clustering primitive contract: training rows in, `k` unit-norm patterns out.
pub trait Clusterer: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&self, data: &TrainingData, request: &FitRequest) -> Result<ClusterFit, MsError>;

    /// Whether the fit depends on `FitRequest::seed`.
    fn is_randomized(&self) -> bool {
        true
    }
}

/// Shared input checks run by every built-in clusterer.
pub fn validate_fit_inputs(data: &TrainingData, request: &FitRequest) -> Result<(), MsError> {
    request.validate()?;

    if let Some(idx) = data.values().iter().position(|v| !v.is_finite()) {
        return Err(MsError::invalid_input(format!(
            "training data must be finite; flat index {idx} is {}",
            data.values()[idx]
        )));
    }

    let distinct = data.distinct_rows();
    if request.k > distinct {
        return Err(MsError::degenerate_input(format!(
            "requested k={} clusters but the training subset has only {distinct} distinct samples (n_rows={})",
            request.k,
            data.n_rows()
        )));
    }
    Ok(())
}

/// Assigns every row to the pattern with maximal absolute activation.
///
/// Ties resolve to the lowest pattern index. Returns the assignment and the
/// signed activation at the chosen pattern.
pub fn assign_by_activation(data: &TrainingData, patterns: &PatternSet) -> (Vec<usize>, Vec<f64>) {
    let mut assignment = Vec::with_capacity(data.n_rows());
    let mut activation = Vec::with_capacity(data.n_rows());
    for row in data.rows() {
        let (best, act) = best_pattern(patterns, row);
        assignment.push(best);
        activation.push(act);
    }
    (assignment, activation)
}

/// Index and signed activation of the pattern with maximal `|activation|`
/// for one sample; first maximum wins.
#[inline]
pub fn best_pattern(patterns: &PatternSet, x: &[f64]) -> (usize, f64) {
    let mut best = 0usize;
    let mut best_act = dot(patterns.row(0), x);
    for (idx, pattern) in patterns.rows().enumerate().skip(1) {
        let act = dot(pattern, x);
        if act.abs() > best_act.abs() {
            best = idx;
            best_act = act;
        }
    }
    (best, best_act)
}

/// Noise variance `sigma^2_mu` of a polarity-invariant fit.
///
/// `(sum ||x||^2 - sum (pattern[a_t] . x_t)^2) / (n * (C - 1))`. With a
/// single channel the denominator falls back to `n`.
pub fn noise_variance(
    rows: impl Iterator<Item = impl AsRef<[f64]>>,
    patterns: &PatternSet,
    assignment: &[usize],
) -> f64 {
    let mut total_sq = 0.0;
    let mut explained_sq = 0.0;
    let mut n = 0usize;
    for (row, &label) in rows.zip(assignment) {
        let row = row.as_ref();
        total_sq += dot(row, row);
        let act = dot(patterns.row(label), row);
        explained_sq += act * act;
        n += 1;
    }
    let dof = patterns.n_channels().saturating_sub(1).max(1);
    let denom = (n.max(1) * dof) as f64;
    (total_sq - explained_sq).abs() / denom
}
