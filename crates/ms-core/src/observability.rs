// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Receives coarse progress updates in `[0, 1]`.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, fraction: f32);
}

/// Receives named scalar measurements emitted during a segmentation.
pub trait TelemetrySink: Send + Sync {
    fn record_scalar(&self, key: &'static str, value: f64);
}
