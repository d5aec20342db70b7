// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Plain Lloyd k-means on raw sample vectors.

use crate::init::{sample_distinct_rows, seeded_rng};
use crate::model::{ClusterFit, Clusterer, FitRequest, noise_variance, validate_fit_inputs};
use ms_core::linalg::squared_distance;
use ms_core::{FitDiagnostics, MsError, PatternSet, TrainingData};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KMeans;

fn nearest_centroid(centroids: &[f64], n_channels: usize, x: &[f64]) -> (usize, f64) {
    let mut best = 0usize;
    let mut best_dist = f64::INFINITY;
    for (idx, centroid) in centroids.chunks_exact(n_channels).enumerate() {
        let dist = squared_distance(centroid, x);
        if dist < best_dist {
            best = idx;
            best_dist = dist;
        }
    }
    (best, best_dist)
}

impl Clusterer for KMeans {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn fit(&self, data: &TrainingData, request: &FitRequest) -> Result<ClusterFit, MsError> {
        validate_fit_inputs(data, request)?;

        let k = request.k;
        let n_channels = data.n_channels();
        let mut rng = seeded_rng(request.seed);
        let mut centroids = Vec::with_capacity(k * n_channels);
        for idx in sample_distinct_rows(data, k, &mut rng)? {
            centroids.extend_from_slice(data.row(idx));
        }

        let mut assignment = vec![0usize; data.n_rows()];
        let mut prev_inertia = f64::INFINITY;
        let mut iterations = 0usize;
        let mut converged = false;

        while iterations < request.max_iterations {
            iterations += 1;

            let mut inertia = 0.0;
            for (slot, row) in assignment.iter_mut().zip(data.rows()) {
                let (label, dist) = nearest_centroid(&centroids, n_channels, row);
                *slot = label;
                inertia += dist;
            }

            let mut sums = vec![0.0; k * n_channels];
            let mut counts = vec![0usize; k];
            for (&label, row) in assignment.iter().zip(data.rows()) {
                counts[label] += 1;
                for (s, x) in sums[label * n_channels..(label + 1) * n_channels]
                    .iter_mut()
                    .zip(row)
                {
                    *s += x;
                }
            }
            for (state, &count) in counts.iter().enumerate() {
                // An empty cluster keeps its previous centroid.
                if count == 0 {
                    continue;
                }
                let range = state * n_channels..(state + 1) * n_channels;
                for (c, s) in centroids[range.clone()].iter_mut().zip(&sums[range]) {
                    *c = s / count as f64;
                }
            }

            if !inertia.is_finite() {
                return Err(MsError::numerical_issue(format!(
                    "kmeans inertia became non-finite at iteration {iterations}"
                )));
            }
            if (prev_inertia - inertia).abs() <= request.threshold * inertia {
                converged = true;
                break;
            }
            prev_inertia = inertia;
        }

        if !converged {
            return Err(MsError::convergence_failure(format!(
                "kmeans did not converge within max_iterations={} (seed={})",
                request.max_iterations, request.seed
            )));
        }

        // Final labels match the centroids being returned.
        for (slot, row) in assignment.iter_mut().zip(data.rows()) {
            *slot = nearest_centroid(&centroids, n_channels, row).0;
        }

        let patterns = PatternSet::from_rows_normalized(centroids, k, n_channels)?;
        let residual = noise_variance(data.rows(), &patterns, &assignment);

        tracing::debug!(seed = request.seed, k, iterations, residual, "kmeans converged");

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
