// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Polarity-invariant ("modified") k-means after Pascual-Marqui et al. (1995).
//!
//! A sample and its sign-inverted copy belong to the same class, so samples
//! are assigned by maximal absolute activation and each map is updated to the
//! first principal direction of its members rather than their mean.

use crate::init::{sample_distinct_rows, seeded_rng};
use crate::linalg::principal_direction;
use crate::model::{ClusterFit, Clusterer, FitRequest, assign_by_activation, validate_fit_inputs};
use ms_core::linalg::normalize_in_place;
use ms_core::{FitDiagnostics, MsError, PatternSet, TrainingData};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModifiedKMeans {
    /// Update each map as the activation-weighted sum of its members instead
    /// of solving for the principal direction.
    pub optimize: bool,
}

impl ModifiedKMeans {
    pub const fn new(optimize: bool) -> Self {
        Self { optimize }
    }

    fn update_maps(
        &self,
        data: &TrainingData,
        patterns: &PatternSet,
        assignment: &[usize],
        activation: &[f64],
    ) -> Result<PatternSet, MsError> {
        let n_channels = data.n_channels();
        let mut values = Vec::with_capacity(patterns.values().len());

        for state in 0..patterns.k() {
            let previous = patterns.row(state);
            let members = || {
                assignment
                    .iter()
                    .enumerate()
                    .filter(move |(_, label)| **label == state)
                    .map(|(t, _)| t)
            };
            if members().next().is_none() {
                // Empty class keeps its map so the set stays full rank.
                values.extend_from_slice(previous);
                continue;
            }

            let map = if self.optimize {
                let mut weighted = vec![0.0; n_channels];
                for t in members() {
                    for (w, x) in weighted.iter_mut().zip(data.row(t)) {
                        *w += activation[t] * x;
                    }
                }
                if normalize_in_place(&mut weighted) == 0.0 {
                    previous.to_vec()
                } else {
                    weighted
                }
            } else {
                principal_direction(members().map(|t| data.row(t)), n_channels, previous)?
            };
            values.extend_from_slice(&map);
        }

        PatternSet::from_rows_normalized(values, patterns.k(), n_channels)
    }
}

impl Clusterer for ModifiedKMeans {
    fn name(&self) -> &'static str {
        "kmod"
    }

    fn fit(&self, data: &TrainingData, request: &FitRequest) -> Result<ClusterFit, MsError> {
        validate_fit_inputs(data, request)?;

        let n_channels = data.n_channels();
        let mut rng = seeded_rng(request.seed);
        let init = sample_distinct_rows(data, request.k, &mut rng)?;
        let mut values = Vec::with_capacity(request.k * n_channels);
        for idx in init {
            values.extend_from_slice(data.row(idx));
        }
        let initial = PatternSet::from_rows_normalized(values, request.k, n_channels)?;
        self.fit_from(data, initial, request)
    }
}

impl ModifiedKMeans {
    /// Iterates from the given initial maps until the residual settles.
    pub(crate) fn fit_from(
        &self,
        data: &TrainingData,
        mut patterns: PatternSet,
        request: &FitRequest,
    ) -> Result<ClusterFit, MsError> {
        let n_channels = data.n_channels();
        let data_sum_sq: f64 = data.values().iter().map(|v| v * v).sum();
        let dof = n_channels.saturating_sub(1).max(1);
        let denom = (data.n_rows() * dof) as f64;

        let mut prev_residual = f64::INFINITY;
        let mut residual = f64::INFINITY;
        let mut assignment = Vec::new();
        let mut iterations = 0usize;
        let mut converged = false;

        while iterations < request.max_iterations {
            iterations += 1;

            let (labels, activation) = assign_by_activation(data, &patterns);
            patterns = self.update_maps(data, &patterns, &labels, &activation)?;

            let (labels, activation) = assign_by_activation(data, &patterns);
            let act_sum_sq: f64 = activation.iter().map(|a| a * a).sum();
            residual = (data_sum_sq - act_sum_sq).abs() / denom;
            assignment = labels;

            if !residual.is_finite() {
                return Err(MsError::numerical_issue(format!(
                    "kmod residual became non-finite at iteration {iterations}"
                )));
            }
            if (prev_residual - residual).abs() <= request.threshold * residual {
                converged = true;
                break;
            }
            prev_residual = residual;
        }

        if !converged {
            return Err(MsError::convergence_failure(format!(
                "kmod did not converge within max_iterations={} (seed={}, last residual={residual})",
                request.max_iterations, request.seed
            )));
        }

        tracing::debug!(
            seed = request.seed,
            k = request.k,
            iterations,
            residual,
            "modified k-means converged"
        );

        Ok(ClusterFit {
            assignment,
            patterns,
            diagnostics: FitDiagnostics {
                residual,
                iterations,
                converged,
                ..FitDiagnostics::default()
            },
        })
    }
}
