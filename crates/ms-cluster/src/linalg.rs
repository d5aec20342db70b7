// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ms_core::MsError;
use ms_core::linalg::{dot, normalize_in_place};

const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_TOLERANCE: f64 = 1e-14;
const POWER_MAX_ITERATIONS: usize = 500;
const POWER_TOLERANCE: f64 = 1e-12;

/// Eigen-decomposition of a symmetric matrix, eigenvalues sorted descending.
#[derive(Clone, Debug, PartialEq)]
pub struct SymmetricEigen {
    pub values: Vec<f64>,
    /// Row-major; row `i` is the eigenvector for `values[i]`.
    pub vectors: Vec<f64>,
    pub n: usize,
    pub sweeps: usize,
}

impl SymmetricEigen {
    pub fn vector(&self, i: usize) -> &[f64] {
        &self.vectors[i * self.n..(i + 1) * self.n]
    }
}

/// Cyclic Jacobi eigen-decomposition of a row-major symmetric `n x n` matrix.
pub fn symmetric_eigen(matrix: &[f64], n: usize) -> Result<SymmetricEigen, MsError> {
    if matrix.len() != n * n {
        return Err(MsError::invalid_input(format!(
            "symmetric_eigen expects {n}x{n} values; got {}",
            matrix.len()
        )));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(MsError::numerical_issue(
            "symmetric_eigen input contains non-finite values",
        ));
    }

    let mut a = matrix.to_vec();
    // v holds eigenvectors as columns while rotating.
    let mut v = vec![0.0; n * n];
    for i in 0..n {
        v[i * n + i] = 1.0;
    }

    let scale: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);
    let mut sweeps = 0usize;
    while sweeps < JACOBI_MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[p * n + q] * a[p * n + q];
            }
        }
        if off.sqrt() <= JACOBI_TOLERANCE * scale {
            break;
        }
        sweeps += 1;

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p * n + q];
                if apq == 0.0 {
                    continue;
                }
                let app = a[p * n + p];
                let aqq = a[q * n + q];
                let theta = (aqq - app) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[k * n + p];
                    let akq = a[k * n + q];
                    a[k * n + p] = c * akp - s * akq;
                    a[k * n + q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[p * n + k];
                    let aqk = a[q * n + k];
                    a[p * n + k] = c * apk - s * aqk;
                    a[q * n + k] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[k * n + p];
                    let vkq = v[k * n + q];
                    v[k * n + p] = c * vkp - s * vkq;
                    v[k * n + q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[j * n + j].total_cmp(&a[i * n + i]).then(i.cmp(&j)));

    let mut values = Vec::with_capacity(n);
    let mut vectors = Vec::with_capacity(n * n);
    for &col in &order {
        values.push(a[col * n + col]);
        for row in 0..n {
            vectors.push(v[row * n + col]);
        }
    }

    Ok(SymmetricEigen {
        values,
        vectors,
        n,
        sweeps,
    })
}

/// Unit-norm leading eigenvector of `sum_i x_i x_i^T` over `rows`.
///
/// Runs power iteration from `start`; falls back to a full Jacobi solve when
/// the iteration collapses onto the null space.
pub fn principal_direction<'r>(
    rows: impl Iterator<Item = &'r [f64]>,
    n_channels: usize,
    start: &[f64],
) -> Result<Vec<f64>, MsError> {
    let mut scatter = vec![0.0; n_channels * n_channels];
    for row in rows {
        for i in 0..n_channels {
            let xi = row[i];
            if xi == 0.0 {
                continue;
            }
            for j in 0..n_channels {
                scatter[i * n_channels + j] += xi * row[j];
            }
        }
    }

    let mut current = start.to_vec();
    if normalize_in_place(&mut current) == 0.0 {
        current.iter_mut().for_each(|v| *v = 1.0);
        normalize_in_place(&mut current);
    }

    let mut next = vec![0.0; n_channels];
    for _ in 0..POWER_MAX_ITERATIONS {
        for (i, slot) in next.iter_mut().enumerate() {
            *slot = dot(&scatter[i * n_channels..(i + 1) * n_channels], &current);
        }
        let norm = normalize_in_place(&mut next);
        if norm == 0.0 || !norm.is_finite() {
            return leading_eigenvector(&scatter, n_channels);
        }
        // Power iteration preserves sign for PSD matrices; compare directly.
        let delta: f64 = next
            .iter()
            .zip(&current)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        std::mem::swap(&mut current, &mut next);
        if delta < POWER_TOLERANCE {
            return Ok(current);
        }
    }

    // Slow power convergence means nearly tied top eigenvalues; settle it exactly.
    leading_eigenvector(&scatter, n_channels)
}

fn leading_eigenvector(matrix: &[f64], n: usize) -> Result<Vec<f64>, MsError> {
    let eigen = symmetric_eigen(matrix, n)?;
    let mut top = eigen.vector(0).to_vec();
    if normalize_in_place(&mut top) == 0.0 {
        return Err(MsError::degenerate_input(
            "scatter matrix has no leading direction",
        ));
    }
    Ok(top)
}

/// Row-major channel covariance of row-major `data` (`n_rows x n_channels`).
///
/// Returns the covariance (normalized by `n_rows`) and the column means.
pub fn covariance(data: &[f64], n_rows: usize, n_channels: usize) -> (Vec<f64>, Vec<f64>) {
    let mut means = vec![0.0; n_channels];
    for row in data.chunks_exact(n_channels) {
        for (m, x) in means.iter_mut().zip(row) {
            *m += x;
        }
    }
    let denom = n_rows.max(1) as f64;
    means.iter_mut().for_each(|m| *m /= denom);

    let mut cov = vec![0.0; n_channels * n_channels];
    let mut centered = vec![0.0; n_channels];
    for row in data.chunks_exact(n_channels) {
        for (c, (x, m)) in centered.iter_mut().zip(row.iter().zip(&means)) {
            *c = x - m;
        }
        for i in 0..n_channels {
            for j in i..n_channels {
                cov[i * n_channels + j] += centered[i] * centered[j];
            }
        }
    }
    for i in 0..n_channels {
        for j in i..n_channels {
            let v = cov[i * n_channels + j] / denom;
            cov[i * n_channels + j] = v;
            cov[j * n_channels + i] = v;
        }
    }
    (cov, means)
}
