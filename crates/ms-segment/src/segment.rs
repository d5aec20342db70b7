// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Top-level segmentation entry point.

use crate::canonical::{Canonicalizer, PrevalenceOrder};
use crate::quality::cross_validation_criterion;
use crate::selector::{SelectionCriterion, SelectionPlan, run_once, select_best};
use ms_cluster::{
    BuiltinClusterer, ClusterMethod, Clusterer, DEFAULT_MAX_ITERATIONS, DEFAULT_THRESHOLD,
    FitRequest,
};
use ms_core::{
    AlgorithmDiagnostics, Diagnostics, ExecutionContext, MicrostateResult, MsError, SegmentInput,
    TrainingData,
};
use rand::RngCore;
use rand::rngs::OsRng;
use std::borrow::Cow;
use std::time::Instant;

/// Segmentation parameters.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentConfig {
    pub n_microstates: usize,
    pub method: ClusterMethod,
    pub criterion: SelectionCriterion,
    /// Only used when the method is multi-run.
    pub n_runs: usize,
    pub max_iterations: usize,
    pub threshold: f64,
    /// `None` draws a seed from OS entropy; the drawn value is recorded.
    pub seed: Option<u64>,
    pub optimize: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            n_microstates: 4,
            method: ClusterMethod::default(),
            criterion: SelectionCriterion::default(),
            n_runs: 10,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            threshold: DEFAULT_THRESHOLD,
            seed: None,
            optimize: false,
        }
    }
}

impl SegmentConfig {
    pub fn validate(&self) -> Result<(), MsError> {
        if self.n_microstates == 0 {
            return Err(MsError::invalid_configuration(
                "SegmentConfig.n_microstates must be >= 1; got 0",
            ));
        }
        if self.n_runs == 0 {
            return Err(MsError::invalid_configuration(
                "SegmentConfig.n_runs must be >= 1; got 0",
            ));
        }
        self.fit_request(0).validate()
    }

    fn fit_request(&self, seed: u64) -> FitRequest {
        FitRequest {
            k: self.n_microstates,
            seed,
            max_iterations: self.max_iterations,
            threshold: self.threshold,
        }
    }

    fn plan(&self, seed: u64) -> SelectionPlan {
        SelectionPlan {
            k: self.n_microstates,
            n_runs: self.n_runs,
            criterion: self.criterion,
            seed,
            max_iterations: self.max_iterations,
            threshold: self.threshold,
        }
    }
}

/// Runs clustering, assignment, selection and canonicalization end to end.
#[derive(Clone, Debug)]
pub struct Segmenter {
    config: SegmentConfig,
}

impl Segmenter {
    pub fn new(config: SegmentConfig) -> Result<Self, MsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Segments with the configured built-in method, multi-run when the
    /// method is, and labels canonicalized by prevalence.
    pub fn segment(
        &self,
        input: &SegmentInput<'_>,
        ctx: &ExecutionContext<'_>,
    ) -> Result<MicrostateResult, MsError> {
        let clusterer =
            BuiltinClusterer::new(self.config.method).with_optimize(self.config.optimize);
        self.segment_with(
            input,
            &clusterer,
            self.config.method.is_multi_run(),
            &PrevalenceOrder,
            ctx,
        )
    }

    /// Segments with any clustering primitive and canonicalizer.
    ///
    /// `multi_run` selects the Run Selector path; otherwise the clusterer is
    /// fitted exactly once with the top-level seed.
    pub fn segment_with(
        &self,
        input: &SegmentInput<'_>,
        clusterer: &dyn Clusterer,
        multi_run: bool,
        canonicalizer: &dyn Canonicalizer,
        ctx: &ExecutionContext<'_>,
    ) -> Result<MicrostateResult, MsError> {
        self.config.validate()?;
        input.validate()?;

        let started_at = Instant::now();
        let signal = &input.signal;
        let mut notes = vec![];
        let mut warnings = vec![];

        let seed = match self.config.seed {
            Some(seed) => seed,
            None => {
                let drawn = OsRng.next_u64();
                notes.push(format!("seed={drawn} drawn from OS entropy"));
                drawn
            }
        };

        tracing::debug!(
            method = clusterer.name(),
            k = self.config.n_microstates,
            n_runs = if multi_run { self.config.n_runs } else { 1 },
            criterion = self.config.criterion.name(),
            seed,
            n_samples = signal.n_samples,
            n_channels = signal.n_channels,
            "segmenting signal"
        );

        let train = TrainingData::gather(signal, input.train_indices)?;

        let (candidate, run_stats) = if multi_run {
            let outcome = select_best(
                signal,
                input.strength,
                &train,
                clusterer,
                &self.config.plan(seed),
                ctx,
            )?;
            notes.push(format!(
                "selected run {} of {} (seed={}, criterion={})",
                outcome.best.run_index,
                self.config.n_runs,
                outcome.best.seed,
                self.config.criterion
            ));
            warnings.extend(outcome.warnings);
            (outcome.best, Some(outcome.stats))
        } else {
            let candidate = run_once(
                signal,
                input.strength,
                &train,
                clusterer,
                &self.config.fit_request(seed),
                0,
                ctx,
            )?;
            ctx.report_progress(1.0);
            (candidate, None)
        };

        let cross_validation =
            match cross_validation_criterion(signal, &candidate.patterns, &candidate.assignment) {
                Ok(cv) => Some(cv),
                Err(MsError::InvalidInput(reason)) => {
                    notes.push(format!("cross-validation undefined: {reason}"));
                    None
                }
                Err(err) => return Err(err),
            };

        let relabeled = canonicalizer.canonicalize(&candidate.assignment, &candidate.patterns)?;
        let gev_per_pattern = relabeled.reorder_values(&candidate.quality.gev_per_pattern)?;
        notes.push(format!(
            "canonicalization={}, order={:?}",
            canonicalizer.name(),
            relabeled.order
        ));

        let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        ctx.record_scalar("segment.runtime_ms", runtime_ms as f64);

        let diagnostics = Diagnostics {
            n_samples: signal.n_samples,
            n_channels: signal.n_channels,
            n_train: train.n_rows(),
            runtime_ms: Some(runtime_ms),
            notes,
            warnings,
            algorithm: Cow::Borrowed(clusterer.name()),
            criterion: multi_run.then(|| Cow::Borrowed(self.config.criterion.name())),
            seed: Some(seed),
            repro_mode: ctx.repro_mode,
            thread_count: Some(thread_count(ctx)),
            run_stats,
            ..Diagnostics::default()
        };

        let algorithm_diagnostics = AlgorithmDiagnostics {
            method: Cow::Borrowed(clusterer.name()),
            fit: candidate.fit,
            run_index: multi_run.then_some(candidate.run_index),
            run_seed: clusterer.is_randomized().then_some(candidate.seed),
            cross_validation,
        };

        MicrostateResult::new(
            relabeled.patterns,
            relabeled.assignment,
            candidate.polarity,
            candidate.quality.gev,
            gev_per_pattern,
            input.strength.to_vec(),
            algorithm_diagnostics,
            input.cleaning.cloned().unwrap_or_default(),
            diagnostics,
        )
    }
}

#[cfg(feature = "rayon")]
fn thread_count(ctx: &ExecutionContext<'_>) -> usize {
    if ctx.repro_mode.allows_parallel() {
        rayon::current_num_threads()
    } else {
        1
    }
}

#[cfg(not(feature = "rayon"))]
fn thread_count(_ctx: &ExecutionContext<'_>) -> usize {
    1
}
