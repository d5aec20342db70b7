// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ms_core::{MsError, SignalView};
use std::fmt;
use std::str::FromStr;

/// Norm used to summarize the spatial spread of a sample.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GfpMethod {
    /// Mean absolute deviation from the channel mean.
    #[default]
    L1,
    /// Population standard deviation across channels.
    L2,
}

impl GfpMethod {
    pub const fn name(self) -> &'static str {
        match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
        }
    }
}

impl fmt::Display for GfpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GfpMethod {
    type Err = MsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "l1" => Ok(Self::L1),
            "l2" => Ok(Self::L2),
            _ => Err(MsError::invalid_configuration(format!(
                "unknown gfp method '{raw}'; expected one of: l1, l2"
            ))),
        }
    }
}

/// Global field power of every sample.
pub fn global_field_power(signal: &SignalView<'_>, method: GfpMethod) -> Vec<f64> {
    let n_channels = signal.n_channels;
    let mut sample = vec![0.0; n_channels];
    let mut out = Vec::with_capacity(signal.n_samples);
    for t in 0..signal.n_samples {
        signal.sample_into(t, &mut sample);
        let mean = sample.iter().sum::<f64>() / n_channels as f64;
        let value = match method {
            GfpMethod::L1 => sample.iter().map(|v| (v - mean).abs()).sum::<f64>() / n_channels as f64,
            GfpMethod::L2 => {
                (sample.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n_channels as f64)
                    .sqrt()
            }
        };
        out.push(value);
    }
    out
}

/// Local maxima of `gfp`, thinned so that kept peaks are at least
/// `min_distance` samples apart. A flat top of equal samples, strictly higher
/// than both neighbours, counts once at its middle sample (the left one of
/// the two middles for even widths). Higher peaks win; equal heights keep the
/// earlier sample. Returned indices are ascending.
pub fn gfp_peaks(gfp: &[f64], min_distance: usize) -> Vec<usize> {
    let mut peaks = Vec::new();
    let mut t = 1;
    while t + 1 < gfp.len() {
        if gfp[t - 1] < gfp[t] {
            let mut end = t;
            while end + 1 < gfp.len() && gfp[end + 1] == gfp[t] {
                end += 1;
            }
            if end + 1 < gfp.len() && gfp[end + 1] < gfp[t] {
                peaks.push((t + end) / 2);
            }
            t = end + 1;
        } else {
            t += 1;
        }
    }
    if min_distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    let mut by_height = peaks;
    by_height.sort_by(|&a, &b| gfp[b].total_cmp(&gfp[a]).then(a.cmp(&b)));
    let mut kept: Vec<usize> = Vec::with_capacity(by_height.len());
    for &t in &by_height {
        if kept.iter().all(|&k| k.abs_diff(t) >= min_distance) {
            kept.push(t);
        }
    }
    kept.sort_unstable();
    kept
}
