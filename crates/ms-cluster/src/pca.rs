// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Principal components of the channel covariance as microstate maps.

use crate::linalg::{covariance, symmetric_eigen};
use crate::model::{
    ClusterFit, Clusterer, FitRequest, assign_by_activation, noise_variance, validate_fit_inputs,
};
use ms_core::{FitDiagnostics, MsError, PatternSet, TrainingData};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pca;

impl Clusterer for Pca {
    fn name(&self) -> &'static str {
        "pca"
    }

    fn is_randomized(&self) -> bool {
        false
    }

    fn fit(&self, data: &TrainingData, request: &FitRequest) -> Result<ClusterFit, MsError> {
        validate_fit_inputs(data, request)?;

        let k = request.k;
        let n_channels = data.n_channels();
        if k > n_channels {
            return Err(MsError::degenerate_input(format!(
                "pca yields at most n_channels={n_channels} components; requested k={k}"
            )));
        }

        let (cov, _) = covariance(data.values(), data.n_rows(), n_channels);
        let eigen = symmetric_eigen(&cov, n_channels)?;

        let total: f64 = eigen.values.iter().map(|v| v.max(0.0)).sum();
        let explained: Vec<f64> = eigen.values[..k]
            .iter()
            .map(|v| if total > 0.0 { v.max(0.0) / total } else { 0.0 })
            .collect();

        let mut values = Vec::with_capacity(k * n_channels);
        for i in 0..k {
            values.extend_from_slice(eigen.vector(i));
        }
        let patterns = PatternSet::from_rows_normalized(values, k, n_channels)?;
        let (assignment, _) = assign_by_activation(data, &patterns);
        let residual = noise_variance(data.rows(), &patterns, &assignment);

        tracing::debug!(k, sweeps = eigen.sweeps, residual, "pca decomposition finished");

        Ok(ClusterFit {
            assignment,
            patterns,
            diagnostics: FitDiagnostics {
                residual,
                iterations: eigen.sweeps,
                converged: true,
                total_explained_variance: Some(explained.iter().sum()),
                explained_variance: Some(explained),
            },
        })
    }
}
