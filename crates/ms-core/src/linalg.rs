// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Small dense vector helpers shared by the clustering and scoring crates.

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn l2_norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Scales `a` to unit L2 norm in place and returns the original norm.
///
/// Leaves `a` untouched when its norm is zero or non-finite.
pub fn normalize_in_place(a: &mut [f64]) -> f64 {
    let norm = l2_norm(a);
    if norm > 0.0 && norm.is_finite() {
        for v in a.iter_mut() {
            *v /= norm;
        }
    }
    norm
}

pub fn mean(a: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.iter().sum::<f64>() / a.len() as f64
}

/// Pearson correlation of two equally sized vectors.
///
/// Returns `None` when either vector has zero variance, where the
/// correlation is undefined.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    debug_assert_eq!(a.len(), b.len());
    let mean_a = mean(a);
    let mean_b = mean(b);
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    if denom > 0.0 && denom.is_finite() {
        Some((cov / denom).clamp(-1.0, 1.0))
    } else {
        None
    }
}

pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
