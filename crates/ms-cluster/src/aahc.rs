// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Atomize and agglomerate hierarchical clustering (Murray et al., 2008).
//!
//! Every distinct training sample starts as its own cluster. The cluster with
//! the lowest explained variance is dissolved and its members move to the
//! cluster they correlate with best, until `k` clusters remain. No random
//! draws are involved; the seed is ignored.

use crate::linalg::principal_direction;
use crate::model::{
    ClusterFit, Clusterer, FitRequest, best_pattern, noise_variance, validate_fit_inputs,
};
use ms_core::linalg::{mean, normalize_in_place, pearson};
use ms_core::{FitDiagnostics, MsError, PatternSet, TrainingData};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Aahc;

struct Cluster {
    map: Vec<f64>,
    members: Vec<usize>,
}

fn population_std(row: &[f64]) -> f64 {
    let m = mean(row);
    (row.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / row.len() as f64).sqrt()
}

fn squared_correlation(a: &[f64], b: &[f64]) -> f64 {
    pearson(a, b).map_or(0.0, |r| r * r)
}

/// One cluster per distinct non-zero row, in order of first occurrence.
/// Zero rows carry no topography and are returned separately.
fn atomize(data: &TrainingData) -> (Vec<Cluster>, Vec<usize>) {
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut by_value: BTreeMap<Vec<u64>, usize> = BTreeMap::new();
    let mut zero_rows = Vec::new();

    for (t, row) in data.rows().enumerate() {
        let mut map = row.to_vec();
        if normalize_in_place(&mut map) == 0.0 {
            zero_rows.push(t);
            continue;
        }
        // Adding 0.0 folds -0.0 onto 0.0 so equal rows share a key.
        let key: Vec<u64> = row.iter().map(|v| (v + 0.0).to_bits()).collect();
        match by_value.get(&key) {
            Some(&idx) => clusters[idx].members.push(t),
            None => {
                by_value.insert(key, clusters.len());
                clusters.push(Cluster {
                    map,
                    members: vec![t],
                });
            }
        }
    }
    (clusters, zero_rows)
}

impl Clusterer for Aahc {
    fn name(&self) -> &'static str {
        "aahc"
    }

    fn is_randomized(&self) -> bool {
        false
    }

    fn fit(&self, data: &TrainingData, request: &FitRequest) -> Result<ClusterFit, MsError> {
        validate_fit_inputs(data, request)?;

        let k = request.k;
        let n_channels = data.n_channels();
        let (mut clusters, zero_rows) = atomize(data);
        if clusters.len() < k {
            return Err(MsError::degenerate_input(format!(
                "aahc needs k={k} distinct non-zero samples; found {}",
                clusters.len()
            )));
        }

        let weights: Vec<f64> = data
            .rows()
            .map(|row| {
                let s = population_std(row);
                s * s
            })
            .collect();

        let mut merges = 0usize;
        while clusters.len() > k {
            let mut worst = 0usize;
            let mut worst_gev = f64::INFINITY;
            for (idx, cluster) in clusters.iter().enumerate() {
                let gev: f64 = cluster
                    .members
                    .iter()
                    .map(|&t| weights[t] * squared_correlation(data.row(t), &cluster.map))
                    .sum();
                if gev < worst_gev {
                    worst = idx;
                    worst_gev = gev;
                }
            }

            let dissolved = clusters.remove(worst);
            let mut touched = vec![false; clusters.len()];
            for t in dissolved.members {
                let row = data.row(t);
                let mut best = 0usize;
                let mut best_r2 = f64::NEG_INFINITY;
                for (idx, cluster) in clusters.iter().enumerate() {
                    let r2 = squared_correlation(row, &cluster.map);
                    if r2 > best_r2 {
                        best = idx;
                        best_r2 = r2;
                    }
                }
                clusters[best].members.push(t);
                touched[best] = true;
            }

            for (cluster, _) in clusters.iter_mut().zip(&touched).filter(|(_, t)| **t) {
                cluster.map = principal_direction(
                    cluster.members.iter().map(|&t| data.row(t)),
                    n_channels,
                    &cluster.map,
                )?;
            }
            merges += 1;
        }

        let mut assignment = vec![0usize; data.n_rows()];
        let mut values = Vec::with_capacity(k * n_channels);
        for (idx, cluster) in clusters.iter().enumerate() {
            values.extend_from_slice(&cluster.map);
            for &t in &cluster.members {
                assignment[t] = idx;
            }
        }
        let patterns = PatternSet::from_rows_normalized(values, k, n_channels)?;
        for t in zero_rows {
            assignment[t] = best_pattern(&patterns, data.row(t)).0;
        }
        let residual = noise_variance(data.rows(), &patterns, &assignment);

        tracing::debug!(k, merges, residual, "aahc agglomeration finished");

        Ok(ClusterFit {
            assignment,
            patterns,
            diagnostics: FitDiagnostics {
                residual,
                iterations: merges,
                converged: true,
                ..FitDiagnostics::default()
            },
        })
    }
}
