// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Deterministic synthetic recordings shared by the benchmarks.

use ms_core::{MemoryLayout, MsError, PatternSet, SignalView};

fn lcg_next(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

fn unit_noise(state: &mut u64) -> f64 {
    (lcg_next(state) >> 11) as f64 / (1u64 << 53) as f64 - 0.5
}

/// Channel-major recording that switches between `n_maps` random
/// topographies every `dwell` samples, with sign flips and additive noise.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticRecording {
    pub values: Vec<f64>,
    pub n_channels: usize,
    pub n_samples: usize,
    pub maps: PatternSet,
}

impl SyntheticRecording {
    pub fn generate(
        n_channels: usize,
        n_samples: usize,
        n_maps: usize,
        dwell: usize,
        seed: u64,
    ) -> Result<Self, MsError> {
        if dwell == 0 {
            return Err(MsError::invalid_configuration("dwell must be >= 1"));
        }
        let mut state = seed ^ 0x9e37_79b9_7f4a_7c15;
        let raw: Vec<f64> = (0..n_maps * n_channels)
            .map(|_| unit_noise(&mut state))
            .collect();
        let maps = PatternSet::from_rows_normalized(raw, n_maps, n_channels)?;

        let mut values = vec![0.0; n_channels * n_samples];
        for t in 0..n_samples {
            let block = t / dwell;
            let map = maps.row(block % n_maps);
            let phase = (t % dwell) as f64 / dwell as f64;
            let sign = if block % 2 == 0 { 1.0 } else { -1.0 };
            let gain = sign * (0.1 + (std::f64::consts::PI * phase).sin());
            for (c, m) in map.iter().enumerate() {
                values[c * n_samples + t] = gain * m + 0.05 * unit_noise(&mut state);
            }
        }

        Ok(Self {
            values,
            n_channels,
            n_samples,
            maps,
        })
    }

    pub fn view(&self) -> Result<SignalView<'_>, MsError> {
        SignalView::from_f64(
            &self.values,
            self.n_channels,
            self.n_samples,
            MemoryLayout::ChannelMajor,
        )
    }
}
