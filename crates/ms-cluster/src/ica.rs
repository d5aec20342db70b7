// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Symmetric FastICA with the log-cosh contrast.
//!
//! The training rows are centered and whitened onto their leading `k`
//! principal components. The unmixing matrix starts from a seeded uniform
//! draw and is symmetrically decorrelated after every fixed-point update.
//! Microstate maps are the mixing columns mapped back to channel space.

use crate::init::seeded_rng;
use crate::linalg::{covariance, symmetric_eigen};
use crate::model::{
    ClusterFit, Clusterer, FitRequest, assign_by_activation, noise_variance, validate_fit_inputs,
};
use ms_core::linalg::dot;
use ms_core::{FitDiagnostics, MsError, PatternSet, TrainingData};
use rand::Rng;

const RANK_TOLERANCE: f64 = 1e-12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ica;

/// `(W W^T)^(-1/2) W` for a row-major `k x k` matrix.
fn symmetric_decorrelation(w: &[f64], k: usize) -> Result<Vec<f64>, MsError> {
    let mut gram = vec![0.0; k * k];
    for i in 0..k {
        for j in 0..k {
            gram[i * k + j] = dot(&w[i * k..(i + 1) * k], &w[j * k..(j + 1) * k]);
        }
    }
    let eigen = symmetric_eigen(&gram, k)?;
    if eigen.values.iter().any(|&v| v <= 0.0 || !v.is_finite()) {
        return Err(MsError::numerical_issue(
            "ica unmixing matrix lost rank during decorrelation",
        ));
    }

    let mut inv_sqrt = vec![0.0; k * k];
    for l in 0..k {
        let scale = 1.0 / eigen.values[l].sqrt();
        let e = eigen.vector(l);
        for i in 0..k {
            for j in 0..k {
                inv_sqrt[i * k + j] += e[i] * scale * e[j];
            }
        }
    }

    let mut out = vec![0.0; k * k];
    for i in 0..k {
        for j in 0..k {
            out[i * k + j] = (0..k).map(|l| inv_sqrt[i * k + l] * w[l * k + j]).sum();
        }
    }
    Ok(out)
}

impl Clusterer for Ica {
    fn name(&self) -> &'static str {
        "ica"
    }

    fn fit(&self, data: &TrainingData, request: &FitRequest) -> Result<ClusterFit, MsError> {
        validate_fit_inputs(data, request)?;

        let k = request.k;
        let n_rows = data.n_rows();
        let n_channels = data.n_channels();
        if k > n_channels {
            return Err(MsError::degenerate_input(format!(
                "ica yields at most n_channels={n_channels} components; requested k={k}"
            )));
        }

        let (cov, means) = covariance(data.values(), n_rows, n_channels);
        let eigen = symmetric_eigen(&cov, n_channels)?;
        let leading = eigen.values[0];
        if let Some(j) = (0..k).find(|&j| eigen.values[j] <= RANK_TOLERANCE * leading.max(0.0)) {
            return Err(MsError::degenerate_input(format!(
                "ica needs {k} non-degenerate components; component {j} has variance {}",
                eigen.values[j]
            )));
        }
        let scales: Vec<f64> = eigen.values[..k].iter().map(|v| v.sqrt()).collect();

        // Whitened rows, row-major n_rows x k.
        let mut centered = vec![0.0; n_channels];
        let mut white = Vec::with_capacity(n_rows * k);
        for row in data.rows() {
            for (c, (x, m)) in centered.iter_mut().zip(row.iter().zip(&means)) {
                *c = x - m;
            }
            for j in 0..k {
                white.push(dot(&centered, eigen.vector(j)) / scales[j]);
            }
        }

        let mut rng = seeded_rng(request.seed);
        let init: Vec<f64> = (0..k * k).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut w = symmetric_decorrelation(&init, k)?;

        let n = n_rows as f64;
        let mut iterations = 0usize;
        let mut converged = false;
        let mut lim = f64::INFINITY;
        while iterations < request.max_iterations {
            iterations += 1;

            let mut next = vec![0.0; k * k];
            for i in 0..k {
                let wi = &w[i * k..(i + 1) * k];
                let mut mean_deriv = 0.0;
                for z in white.chunks_exact(k) {
                    let g = dot(wi, z).tanh();
                    mean_deriv += 1.0 - g * g;
                    for (slot, zj) in next[i * k..(i + 1) * k].iter_mut().zip(z) {
                        *slot += g * zj;
                    }
                }
                mean_deriv /= n;
                for (slot, wij) in next[i * k..(i + 1) * k].iter_mut().zip(wi) {
                    *slot = *slot / n - mean_deriv * wij;
                }
            }
            let next = symmetric_decorrelation(&next, k)?;

            lim = (0..k)
                .map(|i| (dot(&next[i * k..(i + 1) * k], &w[i * k..(i + 1) * k]).abs() - 1.0).abs())
                .fold(0.0, f64::max);
            w = next;
            if lim < request.threshold {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(MsError::convergence_failure(format!(
                "ica did not converge within max_iterations={} (seed={}, last change={lim})",
                request.max_iterations, request.seed
            )));
        }

        let mut values = vec![0.0; k * n_channels];
        for i in 0..k {
            let map = &mut values[i * n_channels..(i + 1) * n_channels];
            for j in 0..k {
                let weight = scales[j] * w[i * k + j];
                for (m, e) in map.iter_mut().zip(eigen.vector(j)) {
                    *m += weight * e;
                }
            }
        }
        let patterns = PatternSet::from_rows_normalized(values, k, n_channels)?;
        let (assignment, _) = assign_by_activation(data, &patterns);
        let residual = noise_variance(data.rows(), &patterns, &assignment);

        tracing::debug!(seed = request.seed, k, iterations, residual, "fastica converged");

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
