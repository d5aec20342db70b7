// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::diagnostics::CleaningDiagnostics;
use crate::error::MsError;
use crate::signal::SignalView;

/// Read-only inputs of one segmentation: the signal, the training indices and
/// the per-sample strength series, as handed over by signal preparation.
#[derive(Clone, Copy, Debug)]
pub struct SegmentInput<'a> {
    pub signal: SignalView<'a>,
    pub train_indices: &'a [usize],
    pub strength: &'a [f64],
    pub cleaning: Option<&'a CleaningDiagnostics>,
}

impl<'a> SegmentInput<'a> {
    pub fn new(
        signal: SignalView<'a>,
        train_indices: &'a [usize],
        strength: &'a [f64],
    ) -> Result<Self, MsError> {
        let input = Self {
            signal,
            train_indices,
            strength,
            cleaning: None,
        };
        input.validate()?;
        Ok(input)
    }

    pub fn with_cleaning(mut self, cleaning: &'a CleaningDiagnostics) -> Self {
        self.cleaning = Some(cleaning);
        self
    }

    pub fn validate(&self) -> Result<(), MsError> {
        let n_samples = self.signal.n_samples;
        if self.strength.len() != n_samples {
            return Err(MsError::invalid_input(format!(
                "strength length {} does not match n_samples={n_samples}",
                self.strength.len()
            )));
        }
        if let Some((t, v)) = self
            .strength
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(MsError::invalid_input(format!(
                "strength must be finite and non-negative; sample {t} is {v}"
            )));
        }
        for t in 0..n_samples {
            for channel in 0..self.signal.n_channels {
                let v = self.signal.value(channel, t);
                if !v.is_finite() {
                    return Err(MsError::invalid_input(format!(
                        "signal must be finite; channel {channel} at sample {t} is {v}"
                    )));
                }
            }
        }
        if self.train_indices.is_empty() {
            return Err(MsError::invalid_input(
                "train_indices must contain at least one sample",
            ));
        }
        if let Some(&idx) = self.train_indices.iter().find(|&&idx| idx >= n_samples) {
            return Err(MsError::invalid_input(format!(
                "train index {idx} out of range for n_samples={n_samples}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SegmentInput;
    use crate::{CleaningDiagnostics, MemoryLayout, SignalView};

    fn view(values: &[f64]) -> SignalView<'_> {
        SignalView::from_f64(values, 2, 3, MemoryLayout::ChannelMajor).expect("view should build")
    }

    #[test]
    fn accepts_consistent_inputs_and_attaches_cleaning() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let cleaning = CleaningDiagnostics::default();
        let input = SegmentInput::new(view(&values), &[0, 2], &[0.5, 1.0, 0.2])
            .expect("input should be valid")
            .with_cleaning(&cleaning);
        assert!(input.cleaning.is_some());
    }

    #[test]
    fn rejects_bad_strength_and_indices() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let err = SegmentInput::new(view(&values), &[0], &[1.0, 1.0]).expect_err("short strength");
        assert!(err.to_string().contains("strength length 2"));

        let err = SegmentInput::new(view(&values), &[0], &[1.0, -1.0, 1.0])
            .expect_err("negative strength");
        assert!(err.to_string().contains("non-negative"));

        let err = SegmentInput::new(view(&values), &[3], &[1.0; 3]).expect_err("index out of range");
        assert!(err.to_string().contains("train index 3 out of range"));

        let err = SegmentInput::new(view(&values), &[], &[1.0; 3]).expect_err("empty train set");
        assert!(err.to_string().contains("at least one sample"));
    }

    #[test]
    fn non_finite_signal_outside_training_set_is_invalid_input() {
        let mut values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        values[2] = f64::NAN;
        let err = SegmentInput::new(view(&values), &[0, 1], &[1.0; 3]).expect_err("nan sample");
        assert!(matches!(err, crate::MsError::InvalidInput(_)), "{err}");
        assert!(err.to_string().contains("channel 0 at sample 2 is NaN"));

        values[2] = f64::INFINITY;
        let err = SegmentInput::new(view(&values), &[0], &[1.0; 3]).expect_err("infinite sample");
        assert!(err.to_string().contains("signal must be finite"));
    }
}
