// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::gfp::gfp_peaks;
use ms_core::MsError;
use std::fmt;

/// Which samples the clustering fit is trained on.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TrainSelection {
    /// Local maxima of the strength series.
    #[default]
    GfpPeaks,
    All,
    /// This many samples, evenly spread over the recording.
    Count(usize),
    /// This fraction of the samples, evenly spread; in (0, 1].
    Ratio(f64),
}

impl TrainSelection {
    pub fn validate(&self) -> Result<(), MsError> {
        match *self {
            Self::Count(0) => Err(MsError::invalid_configuration(
                "TrainSelection::Count must be >= 1; got 0",
            )),
            Self::Ratio(ratio) if !(ratio.is_finite() && ratio > 0.0 && ratio <= 1.0) => {
                Err(MsError::invalid_configuration(format!(
                    "TrainSelection::Ratio must lie in (0, 1]; got {ratio}"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TrainSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GfpPeaks => f.write_str("gfp_peaks"),
            Self::All => f.write_str("all"),
            Self::Count(n) => write!(f, "count({n})"),
            Self::Ratio(r) => write!(f, "ratio({r})"),
        }
    }
}

/// `count` indices spread evenly over `[0, n_samples)`, first and last included.
fn evenly_spaced(n_samples: usize, count: usize) -> Vec<usize> {
    if count == 1 {
        return vec![0];
    }
    (0..count)
        .map(|i| i * (n_samples - 1) / (count - 1))
        .collect()
}

pub(crate) fn select_train_indices(
    selection: TrainSelection,
    gfp: &[f64],
    min_peak_distance: usize,
) -> Result<Vec<usize>, MsError> {
    let n_samples = gfp.len();
    match selection {
        TrainSelection::GfpPeaks => {
            let peaks = gfp_peaks(gfp, min_peak_distance);
            if peaks.is_empty() {
                return Err(MsError::degenerate_input(format!(
                    "strength series of {n_samples} samples has no local maxima to train on"
                )));
            }
            Ok(peaks)
        }
        TrainSelection::All => Ok((0..n_samples).collect()),
        TrainSelection::Count(count) => {
            if count > n_samples {
                return Err(MsError::invalid_input(format!(
                    "cannot select {count} training samples from n_samples={n_samples}"
                )));
            }
            Ok(evenly_spaced(n_samples, count))
        }
        TrainSelection::Ratio(ratio) => {
            let count = ((ratio * n_samples as f64).round() as usize).clamp(1, n_samples);
            Ok(evenly_spaced(n_samples, count))
        }
    }
}
