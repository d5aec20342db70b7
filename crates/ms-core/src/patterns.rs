// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::MsError;
use crate::linalg::normalize_in_place;

/// Sign alignment between a sample and its assigned pattern.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
}

impl Polarity {
    /// Polarity of an activation; exactly zero resolves to `Positive`.
    #[inline]
    pub fn of(activation: f64) -> Self {
        if activation < 0.0 {
            Self::Negative
        } else {
            Self::Positive
        }
    }

    pub const fn sign(self) -> i8 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }
}

/// Row-major (k x channels) set of spatial patterns.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PatternSet {
    values: Vec<f64>,
    k: usize,
    n_channels: usize,
}

impl PatternSet {
    /// Builds a pattern set from raw rows, scaling each row to unit L2 norm.
    pub fn from_rows_normalized(
        mut values: Vec<f64>,
        k: usize,
        n_channels: usize,
    ) -> Result<Self, MsError> {
        validate_shape(values.len(), k, n_channels)?;
        for (idx, row) in values.chunks_exact_mut(n_channels).enumerate() {
            let norm = normalize_in_place(row);
            if !norm.is_finite() {
                return Err(MsError::numerical_issue(format!(
                    "pattern row {idx} has non-finite norm"
                )));
            }
            if norm == 0.0 {
                return Err(MsError::degenerate_input(format!(
                    "pattern row {idx} has zero norm and cannot be normalized"
                )));
            }
        }
        Ok(Self {
            values,
            k,
            n_channels,
        })
    }

    /// Builds a pattern set from rows that are used as given.
    pub fn from_rows(values: Vec<f64>, k: usize, n_channels: usize) -> Result<Self, MsError> {
        validate_shape(values.len(), k, n_channels)?;
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(MsError::invalid_input(format!(
                "pattern values must be finite; index {idx} is {}",
                values[idx]
            )));
        }
        Ok(Self {
            values,
            k,
            n_channels,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n_channels..(i + 1) * self.n_channels]
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.n_channels)
    }

    /// Returns a new set whose row `i` is row `order[i]` of `self`.
    ///
    /// `order` must be a permutation of `0..k`.
    pub fn reorder(&self, order: &[usize]) -> Result<Self, MsError> {
        validate_permutation(order, self.k)?;
        let mut values = Vec::with_capacity(self.values.len());
        for &src in order {
            values.extend_from_slice(self.row(src));
        }
        Ok(Self {
            values,
            k: self.k,
            n_channels: self.n_channels,
        })
    }
}

fn validate_shape(len: usize, k: usize, n_channels: usize) -> Result<(), MsError> {
    if k == 0 {
        return Err(MsError::invalid_input("pattern set requires k >= 1"));
    }
    if n_channels == 0 {
        return Err(MsError::invalid_input("pattern set requires n_channels >= 1"));
    }
    let expected = k
        .checked_mul(n_channels)
        .ok_or_else(|| MsError::invalid_input("k*n_channels overflow"))?;
    if len != expected {
        return Err(MsError::invalid_input(format!(
            "pattern value length mismatch: got {len}, expected {expected} (k={k}, n_channels={n_channels})"
        )));
    }
    Ok(())
}

/// Checks that `order` is a permutation of `0..k`.
pub fn validate_permutation(order: &[usize], k: usize) -> Result<(), MsError> {
    if order.len() != k {
        return Err(MsError::invalid_input(format!(
            "permutation length mismatch: got {}, expected {k}",
            order.len()
        )));
    }
    let mut seen = vec![false; k];
    for &idx in order {
        if idx >= k || seen[idx] {
            return Err(MsError::invalid_input(format!(
                "order is not a permutation of 0..{k}: {order:?}"
            )));
        }
        seen[idx] = true;
    }
    Ok(())
}
