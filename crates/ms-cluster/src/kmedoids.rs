// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! k-medoids with alternating assignment and medoid updates.

use crate::init::{sample_distinct_rows, seeded_rng};
use crate::model::{ClusterFit, Clusterer, FitRequest, noise_variance, validate_fit_inputs};
use ms_core::linalg::squared_distance;
use ms_core::{FitDiagnostics, MsError, PatternSet, TrainingData};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KMedoids;

fn assign(data: &TrainingData, medoids: &[usize], assignment: &mut [usize]) {
    for (slot, row) in assignment.iter_mut().zip(data.rows()) {
        let mut best = 0usize;
        let mut best_dist = f64::INFINITY;
        for (idx, &m) in medoids.iter().enumerate() {
            let dist = squared_distance(data.row(m), row);
            if dist < best_dist {
                best = idx;
                best_dist = dist;
            }
        }
        *slot = best;
    }
}

/// Member minimizing the summed Euclidean distance to its cluster.
fn best_medoid(data: &TrainingData, members: &[usize], current: usize) -> usize {
    let cost = |candidate: usize| -> f64 {
        members
            .iter()
            .map(|&m| squared_distance(data.row(candidate), data.row(m)).sqrt())
            .sum()
    };
    let mut best = current;
    let mut best_cost = cost(current);
    for &candidate in members {
        let c = cost(candidate);
        if c < best_cost {
            best = candidate;
            best_cost = c;
        }
    }
    best
}

impl Clusterer for KMedoids {
    fn name(&self) -> &'static str {
        "kmedoids"
    }

    fn fit(&self, data: &TrainingData, request: &FitRequest) -> Result<ClusterFit, MsError> {
        validate_fit_inputs(data, request)?;

        let k = request.k;
        let mut rng = seeded_rng(request.seed);
        let mut medoids = sample_distinct_rows(data, k, &mut rng)?;
        let mut assignment = vec![0usize; data.n_rows()];
        let mut iterations = 0usize;
        let mut converged = false;

        while iterations < request.max_iterations {
            iterations += 1;
            assign(data, &medoids, &mut assignment);

            let mut next = medoids.clone();
            for (state, slot) in next.iter_mut().enumerate() {
                let members: Vec<usize> = assignment
                    .iter()
                    .enumerate()
                    .filter(|(_, label)| **label == state)
                    .map(|(t, _)| t)
                    .collect();
                if !members.is_empty() {
                    *slot = best_medoid(data, &members, *slot);
                }
            }

            if next == medoids {
                converged = true;
                break;
            }
            medoids = next;
        }

        if !converged {
            return Err(MsError::convergence_failure(format!(
                "kmedoids did not converge within max_iterations={} (seed={})",
                request.max_iterations, request.seed
            )));
        }

        let n_channels = data.n_channels();
        let mut values = Vec::with_capacity(k * n_channels);
        for &m in &medoids {
            values.extend_from_slice(data.row(m));
        }
        let patterns = PatternSet::from_rows_normalized(values, k, n_channels)?;
        let residual = noise_variance(data.rows(), &patterns, &assignment);

        tracing::debug!(seed = request.seed, k, iterations, residual, "kmedoids converged");

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
