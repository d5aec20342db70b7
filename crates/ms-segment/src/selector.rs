// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Multi-run selection: repeat a randomized fit over derived seeds and keep
//! the best candidate.
//!
//! Runs are independent. Outcomes are reduced in run-index order with
//! strict-inequality replacement, so the earliest run wins ties whether the
//! runs executed sequentially or on the rayon pool.

use crate::assign::backfit;
use crate::quality::{QualityRecord, strength_energy};
use ms_cluster::{Clusterer, DEFAULT_MAX_ITERATIONS, DEFAULT_THRESHOLD, FitRequest};
use ms_core::{
    ExecutionContext, FitDiagnostics, MsError, PatternSet, Polarity, RunStats, SignalView,
    TrainingData,
};
use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Per-run seeds are drawn without replacement from `[0, n_runs * SEED_SPAN)`.
const SEED_SPAN: usize = 1000;

/// Rule used to compare candidates across runs.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SelectionCriterion {
    /// Highest aggregate GEV over the full signal.
    #[default]
    Gev,
    /// Lowest fit residual on the training subset.
    Cv,
}

impl SelectionCriterion {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gev => "gev",
            Self::Cv => "cv",
        }
    }
}

impl fmt::Display for SelectionCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SelectionCriterion {
    type Err = MsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gev" => Ok(Self::Gev),
            "cv" => Ok(Self::Cv),
            _ => Err(MsError::invalid_configuration(format!(
                "unknown selection criterion '{raw}'; expected one of: gev, cv"
            ))),
        }
    }
}

/// Derives `n_runs` pairwise-distinct run seeds from one top-level seed.
///
/// Pure: the same `(seed, n_runs)` always yields the same sequence.
pub fn derive_run_seeds(seed: u64, n_runs: usize) -> Result<Vec<u64>, MsError> {
    if n_runs == 0 {
        return Err(MsError::invalid_configuration("n_runs must be >= 1; got 0"));
    }
    let span = n_runs.checked_mul(SEED_SPAN).ok_or_else(|| {
        MsError::invalid_configuration(format!("n_runs={n_runs} is too large to derive seeds"))
    })?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Ok(index::sample(&mut rng, span, n_runs)
        .into_iter()
        .map(|s| s as u64)
        .collect())
}

/// One completed run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RunCandidate {
    pub run_index: usize,
    pub seed: u64,
    pub patterns: PatternSet,
    pub assignment: Vec<usize>,
    pub polarity: Vec<Polarity>,
    pub quality: QualityRecord,
    pub fit: FitDiagnostics,
}

impl RunCandidate {
    /// Whether `self` should replace `best`. Equal scores never replace.
    pub fn improves_on(&self, best: &RunCandidate, criterion: SelectionCriterion) -> bool {
        match criterion {
            SelectionCriterion::Gev => self.quality.gev > best.quality.gev,
            SelectionCriterion::Cv => self.fit.residual < best.fit.residual,
        }
    }
}

/// Parameters shared by every run of a selection.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionPlan {
    pub k: usize,
    pub n_runs: usize,
    pub criterion: SelectionCriterion,
    pub seed: u64,
    pub max_iterations: usize,
    pub threshold: f64,
}

impl Default for SelectionPlan {
    fn default() -> Self {
        Self {
            k: 4,
            n_runs: 10,
            criterion: SelectionCriterion::Gev,
            seed: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl SelectionPlan {
    pub fn validate(&self) -> Result<(), MsError> {
        if self.n_runs == 0 {
            return Err(MsError::invalid_configuration(
                "SelectionPlan.n_runs must be >= 1; got 0",
            ));
        }
        self.fit_request(self.seed).validate()
    }

    fn fit_request(&self, seed: u64) -> FitRequest {
        FitRequest {
            k: self.k,
            seed,
            max_iterations: self.max_iterations,
            threshold: self.threshold,
        }
    }
}

/// Winner of a selection plus bookkeeping over all runs.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionOutcome {
    pub best: RunCandidate,
    pub stats: RunStats,
    /// One entry per skipped run.
    pub warnings: Vec<String>,
}

/// Fits `clusterer` once with `request` and scores the patterns on the full
/// signal.
pub(crate) fn run_once(
    signal: &SignalView<'_>,
    strength: &[f64],
    train: &TrainingData,
    clusterer: &dyn Clusterer,
    request: &FitRequest,
    run_index: usize,
    ctx: &ExecutionContext<'_>,
) -> Result<RunCandidate, MsError> {
    let fit = clusterer.fit(train, request)?;
    if fit.patterns.k() != request.k || fit.patterns.n_channels() != signal.n_channels {
        return Err(MsError::invalid_input(format!(
            "clusterer '{}' returned a {}x{} pattern set; expected {}x{}",
            clusterer.name(),
            fit.patterns.k(),
            fit.patterns.n_channels(),
            request.k,
            signal.n_channels
        )));
    }
    let scored = backfit(signal, &fit.patterns, strength, ctx)?;
    Ok(RunCandidate {
        run_index,
        seed: request.seed,
        patterns: fit.patterns,
        assignment: scored.assignment,
        polarity: scored.polarity,
        quality: scored.quality,
        fit: fit.diagnostics,
    })
}

/// Runs `plan.n_runs` seeded fits and keeps the best candidate.
///
/// A run whose error is run-local (convergence, degenerate or numerical
/// failure) is skipped with a warning. Any other error aborts the selection.
/// Fails with `ConvergenceFailure` only when no run succeeded.
pub fn select_best(
    signal: &SignalView<'_>,
    strength: &[f64],
    train: &TrainingData,
    clusterer: &dyn Clusterer,
    plan: &SelectionPlan,
    ctx: &ExecutionContext<'_>,
) -> Result<SelectionOutcome, MsError> {
    plan.validate()?;
    if strength.len() != signal.n_samples {
        return Err(MsError::invalid_input(format!(
            "strength length {} does not match n_samples={}",
            strength.len(),
            signal.n_samples
        )));
    }
    // Checked once so a zero-energy series is not reported as n failed runs.
    strength_energy(strength)?;
    let distinct = train.distinct_rows();
    if plan.k > distinct {
        return Err(MsError::degenerate_input(format!(
            "requested k={} clusters but the training subset has only {distinct} distinct samples (n_rows={})",
            plan.k,
            train.n_rows()
        )));
    }

    let seeds = derive_run_seeds(plan.seed, plan.n_runs)?;
    let execute = |(run_index, &seed): (usize, &u64)| {
        run_once(
            signal,
            strength,
            train,
            clusterer,
            &plan.fit_request(seed),
            run_index,
            ctx,
        )
    };

    #[cfg(feature = "rayon")]
    let outcomes: Vec<Result<RunCandidate, MsError>> = if ctx.repro_mode.allows_parallel() {
        let outcomes = seeds.par_iter().enumerate().map(execute).collect();
        ctx.report_progress(1.0);
        outcomes
    } else {
        run_sequential(&seeds, execute, ctx)
    };
    #[cfg(not(feature = "rayon"))]
    let outcomes = run_sequential(&seeds, execute, ctx);

    let mut best: Option<RunCandidate> = None;
    let mut stats = RunStats {
        runs_requested: plan.n_runs,
        ..RunStats::default()
    };
    let mut warnings = vec![];
    let mut last_error: Option<MsError> = None;

    for (run_index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(candidate) => {
                stats.runs_completed += 1;
                tracing::debug!(
                    run_index,
                    seed = candidate.seed,
                    gev = candidate.quality.gev,
                    residual = candidate.fit.residual,
                    "run completed"
                );
                best = match best {
                    Some(current) if !candidate.improves_on(&current, plan.criterion) => {
                        Some(current)
                    }
                    _ => Some(candidate),
                };
            }
            Err(err) if err.is_run_local() => {
                stats.runs_failed += 1;
                let seed = seeds[run_index];
                tracing::warn!(run_index, seed, error = %err, "run skipped");
                warnings.push(format!("run {run_index} (seed={seed}) skipped: {err}"));
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    ctx.record_scalar("segment.selector.failed_runs", stats.runs_failed as f64);

    let Some(best) = best else {
        let cause = last_error.map_or_else(String::new, |err| format!("; last error: {err}"));
        return Err(MsError::convergence_failure(format!(
            "all {} runs failed{cause}",
            plan.n_runs
        )));
    };

    stats.selected_run = Some(best.run_index);
    ctx.record_scalar("segment.selector.best_gev", best.quality.gev);
    tracing::info!(
        run_index = best.run_index,
        seed = best.seed,
        gev = best.quality.gev,
        residual = best.fit.residual,
        criterion = plan.criterion.name(),
        runs_failed = stats.runs_failed,
        "selected best run"
    );

    Ok(SelectionOutcome {
        best,
        stats,
        warnings,
    })
}

fn run_sequential<F>(
    seeds: &[u64],
    execute: F,
    ctx: &ExecutionContext<'_>,
) -> Vec<Result<RunCandidate, MsError>>
where
    F: Fn((usize, &u64)) -> Result<RunCandidate, MsError>,
{
    let n_runs = seeds.len();
    seeds
        .iter()
        .enumerate()
        .map(|item| {
            let outcome = execute(item);
            ctx.report_progress((item.0 + 1) as f32 / n_runs as f32);
            outcome
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        RunCandidate, SelectionCriterion, SelectionPlan, derive_run_seeds, run_once, select_best,
    };
    use crate::assign::backfit;
    use ms_cluster::{ClusterFit, Clusterer, FitRequest, ModifiedKMeans};
    use ms_core::{
        ExecutionContext, FitDiagnostics, MemoryLayout, MsError, PatternSet, ProgressSink,
        ReproMode, SignalView, TelemetrySink, TrainingData,
    };
    use std::sync::Mutex;

    const A: [f64; 4] = [0.5, -0.5, 0.5, -0.5];
    const B: [f64; 4] = [0.5, 0.5, -0.5, -0.5];

    /// Sample-major signal alternating between +/-A and +/-B with varying gain.
    fn two_state_signal() -> (Vec<f64>, Vec<f64>) {
        let mut values = Vec::new();
        let mut strength = Vec::new();
        for t in 0..24 {
            let map = if (t / 3) % 2 == 0 { A } else { B };
            let sign = if t % 2 == 0 { 1.0 } else { -1.0 };
            let gain = 1.0 + (t % 3) as f64;
            values.extend(map.iter().map(|v| sign * gain * v));
            strength.push(gain);
        }
        (values, strength)
    }

    fn view(values: &[f64]) -> SignalView<'_> {
        SignalView::from_f64(values, 4, values.len() / 4, MemoryLayout::SampleMajor)
            .expect("view should build")
    }

    fn train_all(signal: &SignalView<'_>) -> TrainingData {
        let indices: Vec<usize> = (0..signal.n_samples).collect();
        TrainingData::gather(signal, &indices).expect("gather should succeed")
    }

    /// Returns `[A, B]` or `[B, A]` depending on seed parity, optionally
    /// failing for one seed.
    struct ScriptedClusterer {
        fail_seed: Option<u64>,
        fail_with_invalid_input: bool,
    }

    impl ScriptedClusterer {
        fn ok() -> Self {
            Self {
                fail_seed: None,
                fail_with_invalid_input: false,
            }
        }
    }

    impl Clusterer for ScriptedClusterer {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn fit(&self, data: &TrainingData, request: &FitRequest) -> Result<ClusterFit, MsError> {
            if self.fail_seed == Some(request.seed) {
                if self.fail_with_invalid_input {
                    return Err(MsError::invalid_input("scripted hard failure"));
                }
                return Err(MsError::convergence_failure(format!(
                    "scripted failure for seed={}",
                    request.seed
                )));
            }
            let rows = if request.seed % 2 == 0 { [A, B] } else { [B, A] };
            let patterns = PatternSet::from_rows(rows.concat(), 2, 4)?;
            Ok(ClusterFit {
                assignment: vec![0; data.n_rows()],
                patterns,
                diagnostics: FitDiagnostics {
                    residual: 0.5,
                    converged: true,
                    ..FitDiagnostics::default()
                },
            })
        }
    }

    /// Fails every fit.
    struct AlwaysFails;

    impl Clusterer for AlwaysFails {
        fn name(&self) -> &'static str {
            "always-fails"
        }

        fn fit(&self, _data: &TrainingData, request: &FitRequest) -> Result<ClusterFit, MsError> {
            Err(MsError::convergence_failure(format!("seed={}", request.seed)))
        }
    }

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<f32>>,
        scalars: Mutex<Vec<(&'static str, f64)>>,
    }

    impl ProgressSink for Recorder {
        fn on_progress(&self, fraction: f32) {
            self.progress.lock().expect("progress lock").push(fraction);
        }
    }

    impl TelemetrySink for Recorder {
        fn record_scalar(&self, key: &'static str, value: f64) {
            self.scalars.lock().expect("scalars lock").push((key, value));
        }
    }

    fn plan(n_runs: usize, seed: u64) -> SelectionPlan {
        SelectionPlan {
            k: 2,
            n_runs,
            seed,
            ..SelectionPlan::default()
        }
    }

    #[test]
    fn derived_seeds_are_distinct_bounded_and_reproducible() {
        let seeds = derive_run_seeds(42, 50).expect("seeds");
        assert_eq!(seeds.len(), 50);
        assert!(seeds.iter().all(|&s| s < 50_000));
        let mut sorted = seeds.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 50);
        assert_eq!(seeds, derive_run_seeds(42, 50).expect("seeds"));
        assert_ne!(seeds, derive_run_seeds(43, 50).expect("seeds"));

        let err = derive_run_seeds(1, 0).expect_err("zero runs");
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn criterion_parses_known_names_only() {
        assert_eq!("GEV".parse::<SelectionCriterion>().expect("gev"), SelectionCriterion::Gev);
        assert_eq!("cv".parse::<SelectionCriterion>().expect("cv"), SelectionCriterion::Cv);
        let err = "aic".parse::<SelectionCriterion>().expect_err("unknown criterion");
        assert!(err.to_string().contains("expected one of: gev, cv"));
    }

    #[test]
    fn single_run_equals_direct_backfit() {
        let (values, strength) = two_state_signal();
        let signal = view(&values);
        let train = train_all(&signal);
        let clusterer = ModifiedKMeans::default();
        let ctx = ExecutionContext::new();

        let outcome =
            select_best(&signal, &strength, &train, &clusterer, &plan(1, 9), &ctx).expect("select");
        let seed = derive_run_seeds(9, 1).expect("seeds")[0];
        let fit = clusterer
            .fit(&train, &FitRequest::new(2, seed))
            .expect("direct fit");
        let direct = backfit(&signal, &fit.patterns, &strength, &ctx).expect("backfit");

        assert_eq!(outcome.best.patterns, fit.patterns);
        assert_eq!(outcome.best.assignment, direct.assignment);
        assert_eq!(outcome.best.polarity, direct.polarity);
        assert_eq!(outcome.best.quality, direct.quality);
        assert_eq!(outcome.stats.selected_run, Some(0));
    }

    #[test]
    fn equal_scores_keep_the_first_run() {
        let (values, strength) = two_state_signal();
        let signal = view(&values);
        let train = train_all(&signal);
        let ctx = ExecutionContext::new();

        let seeds = derive_run_seeds(3, 6).expect("seeds");
        let outcome = select_best(
            &signal,
            &strength,
            &train,
            &ScriptedClusterer::ok(),
            &plan(6, 3),
            &ctx,
        )
        .expect("select");

        // Every run reaches the same GEV with permuted rows; run 0 survives.
        assert_eq!(outcome.best.run_index, 0);
        assert_eq!(outcome.best.seed, seeds[0]);
        let expected_first = if seeds[0] % 2 == 0 { A } else { B };
        assert_eq!(outcome.best.patterns.row(0), &expected_first);
        assert!((outcome.best.quality.gev - 1.0).abs() < 1e-12);
    }

    #[test]
    fn selection_is_monotonic_and_deterministic() {
        let (values, strength) = two_state_signal();
        let signal = view(&values);
        let train = train_all(&signal);
        let clusterer = ModifiedKMeans::default();
        let ctx = ExecutionContext::new();
        let plan = plan(5, 17);

        let first = select_best(&signal, &strength, &train, &clusterer, &plan, &ctx).expect("select");
        let second = select_best(&signal, &strength, &train, &clusterer, &plan, &ctx).expect("select");
        assert_eq!(first, second);

        let strict = ctx.with_repro_mode(ReproMode::Strict);
        let sequential =
            select_best(&signal, &strength, &train, &clusterer, &plan, &strict).expect("select");
        assert_eq!(first, sequential);

        for (run_index, &seed) in derive_run_seeds(plan.seed, plan.n_runs)
            .expect("seeds")
            .iter()
            .enumerate()
        {
            if let Ok(candidate) = run_once(
                &signal,
                &strength,
                &train,
                &clusterer,
                &FitRequest::new(2, seed),
                run_index,
                &ctx,
            ) {
                assert!(first.best.quality.gev >= candidate.quality.gev);
            }
        }
    }

    #[test]
    fn cv_criterion_prefers_lower_residual() {
        let base = RunCandidate {
            run_index: 0,
            seed: 1,
            patterns: PatternSet::from_rows(A.to_vec(), 1, 4).expect("patterns"),
            assignment: vec![],
            polarity: vec![],
            quality: Default::default(),
            fit: FitDiagnostics {
                residual: 0.4,
                ..FitDiagnostics::default()
            },
        };
        let mut better = base.clone();
        better.fit.residual = 0.3;
        better.quality.gev = -1.0;
        assert!(better.improves_on(&base, SelectionCriterion::Cv));
        assert!(!better.improves_on(&base, SelectionCriterion::Gev));
        assert!(!base.clone().improves_on(&base, SelectionCriterion::Cv));
    }

    #[test]
    fn failed_runs_are_skipped_and_reported() {
        let (values, strength) = two_state_signal();
        let signal = view(&values);
        let train = train_all(&signal);
        let recorder = Recorder::default();
        let ctx = ExecutionContext::new()
            .with_repro_mode(ReproMode::Strict)
            .with_progress_sink(&recorder)
            .with_telemetry_sink(&recorder);

        let seeds = derive_run_seeds(5, 4).expect("seeds");
        let clusterer = ScriptedClusterer {
            fail_seed: Some(seeds[0]),
            fail_with_invalid_input: false,
        };
        let outcome =
            select_best(&signal, &strength, &train, &clusterer, &plan(4, 5), &ctx).expect("select");

        assert_eq!(outcome.stats.runs_requested, 4);
        assert_eq!(outcome.stats.runs_failed, 1);
        assert_eq!(outcome.stats.runs_completed, 3);
        assert_eq!(outcome.stats.selected_run, Some(1));
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("run 0"));

        let progress = recorder.progress.lock().expect("progress lock").clone();
        assert_eq!(progress, vec![0.25, 0.5, 0.75, 1.0]);
        let scalars = recorder.scalars.lock().expect("scalars lock").clone();
        assert!(scalars.contains(&("segment.selector.failed_runs", 1.0)));
        assert!(scalars.iter().any(|(key, _)| *key == "segment.selector.best_gev"));
    }

    #[test]
    fn all_runs_failing_is_a_convergence_failure() {
        let (values, strength) = two_state_signal();
        let signal = view(&values);
        let train = train_all(&signal);
        let err = select_best(
            &signal,
            &strength,
            &train,
            &AlwaysFails,
            &plan(3, 0),
            &ExecutionContext::new(),
        )
        .expect_err("nothing succeeded");
        assert!(err.to_string().contains("convergence failure"));
        assert!(err.to_string().contains("all 3 runs failed"));
    }

    #[test]
    fn hard_errors_abort_selection() {
        let (values, strength) = two_state_signal();
        let signal = view(&values);
        let train = train_all(&signal);
        let seeds = derive_run_seeds(2, 3).expect("seeds");
        let clusterer = ScriptedClusterer {
            fail_seed: Some(seeds[1]),
            fail_with_invalid_input: true,
        };
        let err = select_best(
            &signal,
            &strength,
            &train,
            &clusterer,
            &plan(3, 2),
            &ExecutionContext::new(),
        )
        .expect_err("invalid input propagates");
        assert!(err.to_string().contains("scripted hard failure"));
    }

    #[test]
    fn zero_energy_strength_fails_before_any_run() {
        let (values, _) = two_state_signal();
        let signal = view(&values);
        let train = train_all(&signal);
        let err = select_best(
            &signal,
            &[0.0; 24],
            &train,
            &ScriptedClusterer::ok(),
            &plan(2, 0),
            &ExecutionContext::new(),
        )
        .expect_err("zero energy");
        assert!(err.to_string().contains("degenerate input"));
    }

    #[test]
    fn too_few_distinct_training_samples_fail_before_any_run() {
        let (values, strength) = two_state_signal();
        let signal = view(&values);
        let train = TrainingData::gather(&signal, &[0, 0, 0]).expect("gather should succeed");
        let recorder = Recorder::default();
        let ctx = ExecutionContext::new().with_telemetry_sink(&recorder);
        let err = select_best(
            &signal,
            &strength,
            &train,
            &ModifiedKMeans::default(),
            &plan(10, 1),
            &ctx,
        )
        .expect_err("one distinct row cannot support k=2");
        assert!(matches!(err, MsError::DegenerateInput(_)), "{err}");
        assert!(err.to_string().contains("only 1 distinct samples"));
        assert!(recorder.scalars.lock().expect("scalars lock").is_empty());
    }
}
