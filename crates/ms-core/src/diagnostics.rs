// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::repro::ReproMode;
use std::borrow::Cow;

/// Diagnostics schema version for segmentation run metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Counters summarizing the multi-run selection.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub runs_requested: usize,
    pub runs_completed: usize,
    pub runs_failed: usize,
    pub selected_run: Option<usize>,
}

/// Structured diagnostics captured from a segmentation call.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostics {
    pub n_samples: usize,
    pub n_channels: usize,
    pub n_train: usize,
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub runtime_ms: Option<u64>,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
    pub algorithm: Cow<'static, str>,
    pub criterion: Option<Cow<'static, str>>,
    pub seed: Option<u64>,
    pub repro_mode: ReproMode,
    pub thread_count: Option<usize>,
    pub run_stats: Option<RunStats>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            n_samples: 0,
            n_channels: 0,
            n_train: 0,
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            runtime_ms: None,
            notes: vec![],
            warnings: vec![],
            algorithm: Cow::Borrowed(""),
            criterion: None,
            seed: None,
            repro_mode: ReproMode::Balanced,
            thread_count: None,
            run_stats: None,
        }
    }
}

/// Diagnostics reported by a clustering primitive for one fit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitDiagnostics {
    /// Noise variance of the fit (`sigma^2_mu`); lower is better.
    pub residual: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Variance explained by each component, for decomposition methods.
    pub explained_variance: Option<Vec<f64>>,
    pub total_explained_variance: Option<f64>,
}

/// Diagnostics handed down by the signal preparation stage.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CleaningDiagnostics {
    pub gfp_method: Cow<'static, str>,
    pub train: String,
    pub n_train: usize,
    pub standardized: bool,
    pub notes: Vec<String>,
}
