// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod diagnostics;
pub mod error;
pub mod execution_context;
pub mod input;
pub mod linalg;
pub mod observability;
pub mod patterns;
pub mod repro;
pub mod results;
pub mod signal;

pub use diagnostics::{
    CleaningDiagnostics, DIAGNOSTICS_SCHEMA_VERSION, Diagnostics, FitDiagnostics, RunStats,
};
pub use error::MsError;
pub use execution_context::ExecutionContext;
pub use input::SegmentInput;
pub use observability::{ProgressSink, TelemetrySink};
pub use patterns::{PatternSet, Polarity, validate_permutation};
pub use repro::ReproMode;
pub use results::{AlgorithmDiagnostics, MicrostateResult};
pub use signal::{DTypeView, MemoryLayout, SignalView, TrainingData};

/// Core shared types and traits for microseg.
pub fn crate_name() -> &'static str {
    "ms-core"
}
