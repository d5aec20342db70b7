// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::observability::{ProgressSink, TelemetrySink};
use crate::repro::ReproMode;

/// Execution context passed through segmentation calls.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub repro_mode: ReproMode,
    pub progress: Option<&'a dyn ProgressSink>,
    pub telemetry: Option<&'a dyn TelemetrySink>,
}

impl Default for ExecutionContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ExecutionContext<'a> {
    /// Creates a context with safe defaults and no optional hooks.
    pub fn new() -> Self {
        Self {
            repro_mode: ReproMode::Balanced,
            progress: None,
            telemetry: None,
        }
    }

    /// Sets the reproducibility mode.
    pub fn with_repro_mode(mut self, repro_mode: ReproMode) -> Self {
        self.repro_mode = repro_mode;
        self
    }

    /// Sets an optional progress sink.
    pub fn with_progress_sink(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Sets an optional telemetry sink.
    pub fn with_telemetry_sink(mut self, telemetry: &'a dyn TelemetrySink) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Emits clamped progress to the sink, if configured.
    pub fn report_progress(&self, fraction: f32) {
        if !fraction.is_finite() {
            return;
        }

        if let Some(sink) = self.progress {
            sink.on_progress(fraction.clamp(0.0, 1.0));
        }
    }

    /// Emits a scalar telemetry value to the sink, if configured.
    pub fn record_scalar(&self, key: &'static str, value: f64) {
        if let Some(sink) = self.telemetry {
            sink.record_scalar(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionContext;
    use crate::observability::{ProgressSink, TelemetrySink};
    use crate::repro::ReproMode;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockProgressSink {
        values: Mutex<Vec<f32>>,
    }

    impl ProgressSink for MockProgressSink {
        fn on_progress(&self, fraction: f32) {
            self.values
                .lock()
                .expect("progress mutex should lock")
                .push(fraction);
        }
    }

    #[derive(Default)]
    struct MockTelemetrySink {
        values: Mutex<Vec<(&'static str, f64)>>,
    }

    impl TelemetrySink for MockTelemetrySink {
        fn record_scalar(&self, key: &'static str, value: f64) {
            self.values
                .lock()
                .expect("telemetry mutex should lock")
                .push((key, value));
        }
    }

    #[test]
    fn execution_context_new_sets_expected_defaults() {
        let ctx = ExecutionContext::new();
        assert_eq!(ctx.repro_mode, ReproMode::Balanced);
        assert!(ctx.progress.is_none());
        assert!(ctx.telemetry.is_none());
    }

    #[test]
    fn report_progress_clamps_and_skips_non_finite() {
        let sink = MockProgressSink::default();
        let ctx = ExecutionContext::new().with_progress_sink(&sink);

        ctx.report_progress(-0.5);
        ctx.report_progress(0.25);
        ctx.report_progress(1.5);
        ctx.report_progress(f32::NAN);

        let values = sink.values.lock().expect("progress mutex should lock");
        assert_eq!(*values, vec![0.0, 0.25, 1.0]);
    }

    #[test]
    fn record_scalar_forwards_to_sink_and_is_noop_without_one() {
        let sink = MockTelemetrySink::default();
        let ctx = ExecutionContext::new()
            .with_repro_mode(ReproMode::Strict)
            .with_telemetry_sink(&sink);
        ctx.record_scalar("segment.selector.best_gev", 0.75);

        ExecutionContext::new().record_scalar("ignored", 1.0);

        let values = sink.values.lock().expect("telemetry mutex should lock");
        assert_eq!(*values, vec![("segment.selector.best_gev", 0.75)]);
        assert_eq!(ctx.repro_mode, ReproMode::Strict);
    }
}
