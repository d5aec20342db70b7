// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Upstream signal preparation: optional per-channel standardization, the
//! GFP strength series and the training sample selection consumed by
//! segmentation.

pub mod gfp;
pub mod train;

pub use gfp::{GfpMethod, gfp_peaks, global_field_power};
pub use train::TrainSelection;

use ms_core::{CleaningDiagnostics, MemoryLayout, MsError, SegmentInput, SignalView};
use std::borrow::Cow;

const DEFAULT_MIN_PEAK_DISTANCE: usize = 1;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PrepareConfig {
    pub train: TrainSelection,
    pub gfp_method: GfpMethod,
    /// z-score every channel across time before computing GFP.
    pub standardize: bool,
    /// Minimum spacing, in samples, between retained GFP peaks.
    pub min_peak_distance: usize,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            train: TrainSelection::default(),
            gfp_method: GfpMethod::default(),
            standardize: false,
            min_peak_distance: DEFAULT_MIN_PEAK_DISTANCE,
        }
    }
}

impl PrepareConfig {
    pub fn validate(&self) -> Result<(), MsError> {
        self.train.validate()?;
        if self.min_peak_distance == 0 {
            return Err(MsError::invalid_configuration(
                "PrepareConfig.min_peak_distance must be >= 1; got 0",
            ));
        }
        Ok(())
    }
}

/// Owned output of preparation. Values are stored channel-major.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedSignal {
    values: Vec<f64>,
    n_channels: usize,
    n_samples: usize,
    train_indices: Vec<usize>,
    strength: Vec<f64>,
    cleaning: CleaningDiagnostics,
}

impl PreparedSignal {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn train_indices(&self) -> &[usize] {
        &self.train_indices
    }

    pub fn strength(&self) -> &[f64] {
        &self.strength
    }

    pub fn cleaning(&self) -> &CleaningDiagnostics {
        &self.cleaning
    }

    pub fn as_view(&self) -> Result<SignalView<'_>, MsError> {
        SignalView::from_f64(
            &self.values,
            self.n_channels,
            self.n_samples,
            MemoryLayout::ChannelMajor,
        )
    }

    /// Borrows the prepared signal as segmentation input.
    pub fn input(&self) -> Result<SegmentInput<'_>, MsError> {
        Ok(SegmentInput::new(self.as_view()?, &self.train_indices, &self.strength)?
            .with_cleaning(&self.cleaning))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Preparer {
    config: PrepareConfig,
}

impl Preparer {
    pub fn new(config: PrepareConfig) -> Result<Self, MsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PrepareConfig {
        &self.config
    }

    pub fn apply(&self, signal: &SignalView<'_>) -> Result<PreparedSignal, MsError> {
        let n_channels = signal.n_channels;
        let n_samples = signal.n_samples;
        let mut values = Vec::with_capacity(n_channels * n_samples);
        for channel in 0..n_channels {
            for t in 0..n_samples {
                let v = signal.value(channel, t);
                if !v.is_finite() {
                    return Err(MsError::invalid_input(format!(
                        "signal must be finite; channel {channel} sample {t} is {v}"
                    )));
                }
                values.push(v);
            }
        }

        let mut notes = vec![];
        if self.config.standardize {
            for channel in standardize_channels(&mut values, n_channels, n_samples) {
                notes.push(format!(
                    "channel {channel} has zero variance; centered without scaling"
                ));
            }
        }

        let view = SignalView::from_f64(&values, n_channels, n_samples, MemoryLayout::ChannelMajor)?;
        let strength = global_field_power(&view, self.config.gfp_method);
        let train_indices = train::select_train_indices(
            self.config.train,
            &strength,
            self.config.min_peak_distance,
        )?;
        if matches!(self.config.train, TrainSelection::GfpPeaks) {
            notes.push(format!(
                "min_peak_distance={}",
                self.config.min_peak_distance
            ));
        }

        tracing::debug!(
            n_channels,
            n_samples,
            n_train = train_indices.len(),
            gfp_method = self.config.gfp_method.name(),
            standardized = self.config.standardize,
            "signal prepared"
        );

        let cleaning = CleaningDiagnostics {
            gfp_method: Cow::Borrowed(self.config.gfp_method.name()),
            train: self.config.train.to_string(),
            n_train: train_indices.len(),
            standardized: self.config.standardize,
            notes,
        };

        Ok(PreparedSignal {
            values,
            n_channels,
            n_samples,
            train_indices,
            strength,
            cleaning,
        })
    }
}

/// Prepares `signal` with `config` in one call.
pub fn prepare(signal: &SignalView<'_>, config: &PrepareConfig) -> Result<PreparedSignal, MsError> {
    Preparer::new(config.clone())?.apply(signal)
}

/// z-scores each channel of a channel-major buffer in place. Returns the
/// channels whose variance was zero; those are only centered.
fn standardize_channels(values: &mut [f64], n_channels: usize, n_samples: usize) -> Vec<usize> {
    let mut flat = vec![];
    for channel in 0..n_channels {
        let row = &mut values[channel * n_samples..(channel + 1) * n_samples];
        let mean = row.iter().sum::<f64>() / n_samples as f64;
        let var = row.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n_samples as f64;
        let sd = var.sqrt();
        if sd > 0.0 {
            row.iter_mut().for_each(|v| *v = (*v - mean) / sd);
        } else {
            row.iter_mut().for_each(|v| *v -= mean);
            flat.push(channel);
        }
    }
    flat
}

/// Signal preparation namespace.
pub fn crate_name() -> &'static str {
    let _ = ms_core::crate_name();
    "ms-prepare"
}
