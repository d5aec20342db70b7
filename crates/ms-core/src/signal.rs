// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::MsError;

/// Borrowed numeric data view over either f32 or f64 values.
#[derive(Clone, Copy, Debug)]
pub enum DTypeView<'a> {
    F32(&'a [f32]),
    F64(&'a [f64]),
}

impl DTypeView<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::F32(slice) => slice.len(),
            Self::F64(slice) => slice.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn get_f64(&self, idx: usize) -> f64 {
        match self {
            Self::F32(slice) => f64::from(slice[idx]),
            Self::F64(slice) => slice[idx],
        }
    }
}

/// Memory layout of a (channels x samples) signal buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryLayout {
    /// Row-major channels x samples: one contiguous row per channel.
    ChannelMajor,
    /// Column-major: one contiguous channel vector per sample.
    SampleMajor,
    Strided {
        channel_stride: isize,
        sample_stride: isize,
    },
}

/// Zero-copy view over a multichannel signal shaped (channels x samples).
#[derive(Clone, Copy, Debug)]
pub struct SignalView<'a> {
    pub values: DTypeView<'a>,
    pub n_channels: usize,
    pub n_samples: usize,
    pub layout: MemoryLayout,
}

impl<'a> SignalView<'a> {
    /// Constructs a validated `SignalView`.
    pub fn new(
        values: DTypeView<'a>,
        n_channels: usize,
        n_samples: usize,
        layout: MemoryLayout,
    ) -> Result<Self, MsError> {
        if n_channels == 0 {
            return Err(MsError::invalid_input("n_channels must be >= 1"));
        }
        if n_samples == 0 {
            return Err(MsError::invalid_input("n_samples must be >= 1"));
        }

        let expected_len = n_channels.checked_mul(n_samples).ok_or_else(|| {
            MsError::invalid_input("n_channels*n_samples overflow while validating shape")
        })?;

        match layout {
            MemoryLayout::ChannelMajor | MemoryLayout::SampleMajor => {
                if values.len() != expected_len {
                    return Err(MsError::invalid_input(format!(
                        "value length mismatch: got {}, expected {expected_len} (n_channels={n_channels}, n_samples={n_samples})",
                        values.len()
                    )));
                }
            }
            MemoryLayout::Strided {
                channel_stride,
                sample_stride,
            } => {
                if channel_stride == 0 || sample_stride == 0 {
                    return Err(MsError::invalid_input(format!(
                        "Strided layout requires non-zero strides: channel_stride={channel_stride}, sample_stride={sample_stride}"
                    )));
                }
                validate_strided_corners(
                    values.len(),
                    n_channels,
                    n_samples,
                    channel_stride,
                    sample_stride,
                )?;
            }
        }

        Ok(Self {
            values,
            n_channels,
            n_samples,
            layout,
        })
    }

    /// Convenience constructor for f32-backed data.
    pub fn from_f32(
        values: &'a [f32],
        n_channels: usize,
        n_samples: usize,
        layout: MemoryLayout,
    ) -> Result<Self, MsError> {
        Self::new(DTypeView::F32(values), n_channels, n_samples, layout)
    }

    /// Convenience constructor for f64-backed data.
    pub fn from_f64(
        values: &'a [f64],
        n_channels: usize,
        n_samples: usize,
        layout: MemoryLayout,
    ) -> Result<Self, MsError> {
        Self::new(DTypeView::F64(values), n_channels, n_samples, layout)
    }

    #[inline]
    fn linear_index(&self, channel: usize, t: usize) -> usize {
        match self.layout {
            MemoryLayout::ChannelMajor => channel * self.n_samples + t,
            MemoryLayout::SampleMajor => t * self.n_channels + channel,
            MemoryLayout::Strided {
                channel_stride,
                sample_stride,
            } => {
                // Corners were validated on construction, so every interior
                // index is in range and non-negative.
                let idx = channel as isize * channel_stride + t as isize * sample_stride;
                idx as usize
            }
        }
    }

    /// Returns the value at (`channel`, `t`).
    ///
    /// Panics if either index is out of range.
    #[inline]
    pub fn value(&self, channel: usize, t: usize) -> f64 {
        assert!(
            channel < self.n_channels && t < self.n_samples,
            "signal index out of range: channel={channel}, t={t}"
        );
        self.values.get_f64(self.linear_index(channel, t))
    }

    /// Copies the channel vector of sample `t` into `out`.
    ///
    /// `out` must hold exactly `n_channels` values.
    pub fn sample_into(&self, t: usize, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.n_channels);
        for (channel, slot) in out.iter_mut().enumerate() {
            *slot = self.value(channel, t);
        }
    }

    /// Returns the channel vector of sample `t` as an owned vector.
    pub fn sample(&self, t: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.n_channels];
        self.sample_into(t, &mut out);
        out
    }

    /// Sum of squared values across all channels and samples.
    pub fn total_energy(&self) -> f64 {
        let mut total = 0.0;
        for t in 0..self.n_samples {
            for channel in 0..self.n_channels {
                let v = self.value(channel, t);
                total += v * v;
            }
        }
        total
    }
}

fn validate_strided_corners(
    len: usize,
    n_channels: usize,
    n_samples: usize,
    channel_stride: isize,
    sample_stride: isize,
) -> Result<(), MsError> {
    let last_channel = isize::try_from(n_channels - 1).map_err(|_| {
        MsError::invalid_input(format!(
            "n_channels={n_channels} does not fit into isize for strided access"
        ))
    })?;
    let last_sample = isize::try_from(n_samples - 1).map_err(|_| {
        MsError::invalid_input(format!(
            "n_samples={n_samples} does not fit into isize for strided access"
        ))
    })?;

    for channel in [0, last_channel] {
        for t in [0, last_sample] {
            let idx = channel
                .checked_mul(channel_stride)
                .and_then(|left| t.checked_mul(sample_stride).and_then(|right| left.checked_add(right)))
                .ok_or_else(|| {
                    MsError::invalid_input(format!(
                        "strided index overflow at channel={channel}, t={t}, channel_stride={channel_stride}, sample_stride={sample_stride}"
                    ))
                })?;
            let idx_usize = usize::try_from(idx).map_err(|_| {
                MsError::invalid_input(format!(
                    "strided index negative at channel={channel}, t={t}: idx={idx}"
                ))
            })?;
            if idx_usize >= len {
                return Err(MsError::invalid_input(format!(
                    "strided index out of bounds at channel={channel}, t={t}: idx={idx_usize}, len={len}"
                )));
            }
        }
    }
    Ok(())
}

/// Owned (subset x channels) row-major matrix of training samples.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingData {
    values: Vec<f64>,
    n_rows: usize,
    n_channels: usize,
}

impl TrainingData {
    /// Gathers the samples named by `indices` out of `signal`.
    pub fn gather(signal: &SignalView<'_>, indices: &[usize]) -> Result<Self, MsError> {
        if indices.is_empty() {
            return Err(MsError::invalid_input(
                "training index set must contain at least one sample",
            ));
        }
        if let Some((pos, &idx)) = indices
            .iter()
            .enumerate()
            .find(|(_, idx)| **idx >= signal.n_samples)
        {
            return Err(MsError::invalid_input(format!(
                "training index out of range at position {pos}: index={idx}, n_samples={}",
                signal.n_samples
            )));
        }

        let n_channels = signal.n_channels;
        let mut values = vec![0.0; indices.len() * n_channels];
        for (row, &t) in values.chunks_exact_mut(n_channels).zip(indices) {
            signal.sample_into(t, row);
        }

        Ok(Self {
            values,
            n_rows: indices.len(),
            n_channels,
        })
    }

    /// Builds training data from an already row-major buffer.
    pub fn from_rows(values: Vec<f64>, n_rows: usize, n_channels: usize) -> Result<Self, MsError> {
        if n_rows == 0 || n_channels == 0 {
            return Err(MsError::invalid_input(format!(
                "training data must be non-empty: n_rows={n_rows}, n_channels={n_channels}"
            )));
        }
        let expected = n_rows
            .checked_mul(n_channels)
            .ok_or_else(|| MsError::invalid_input("n_rows*n_channels overflow"))?;
        if values.len() != expected {
            return Err(MsError::invalid_input(format!(
                "training value length mismatch: got {}, expected {expected}",
                values.len()
            )));
        }
        Ok(Self {
            values,
            n_rows,
            n_channels,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
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

    /// Number of pairwise-distinct rows (exact comparison).
    pub fn distinct_rows(&self) -> usize {
        // -0.0 and 0.0 compare equal, so both map to the same key.
        let mut keys: Vec<Vec<u64>> = self
            .rows()
            .map(|row| {
                row.iter()
                    .map(|v| if *v == 0.0 { 0 } else { v.to_bits() })
                    .collect()
            })
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }
}
