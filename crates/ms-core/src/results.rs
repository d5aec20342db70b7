// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::diagnostics::{CleaningDiagnostics, Diagnostics, FitDiagnostics};
use crate::patterns::{PatternSet, Polarity};
use crate::MsError;
use std::borrow::Cow;

/// Diagnostics of the clustering fit that produced the final patterns.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AlgorithmDiagnostics {
    pub method: Cow<'static, str>,
    pub fit: FitDiagnostics,
    /// Index of the selected run; `None` on the single-run path.
    pub run_index: Option<usize>,
    pub run_seed: Option<u64>,
    /// Cross-validation criterion over the full signal, when defined.
    pub cross_validation: Option<f64>,
}

/// Final output of a microstate segmentation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct MicrostateResult {
    pub patterns: PatternSet,
    pub assignment: Vec<usize>,
    pub polarity: Vec<Polarity>,
    pub gev: f64,
    pub gev_per_pattern: Vec<f64>,
    pub strength: Vec<f64>,
    pub algorithm_diagnostics: AlgorithmDiagnostics,
    pub cleaning_diagnostics: CleaningDiagnostics,
    pub diagnostics: Diagnostics,
}

impl MicrostateResult {
    /// Assembles a result after checking the cross-field invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        patterns: PatternSet,
        assignment: Vec<usize>,
        polarity: Vec<Polarity>,
        gev: f64,
        gev_per_pattern: Vec<f64>,
        strength: Vec<f64>,
        algorithm_diagnostics: AlgorithmDiagnostics,
        cleaning_diagnostics: CleaningDiagnostics,
        diagnostics: Diagnostics,
    ) -> Result<Self, MsError> {
        let n = assignment.len();
        if polarity.len() != n || strength.len() != n {
            return Err(MsError::invalid_input(format!(
                "result length mismatch: assignment={n}, polarity={}, strength={}",
                polarity.len(),
                strength.len()
            )));
        }
        if gev_per_pattern.len() != patterns.k() {
            return Err(MsError::invalid_input(format!(
                "gev_per_pattern length {} does not match k={}",
                gev_per_pattern.len(),
                patterns.k()
            )));
        }
        if let Some((t, &label)) = assignment
            .iter()
            .enumerate()
            .find(|(_, label)| **label >= patterns.k())
        {
            return Err(MsError::invalid_input(format!(
                "assignment at sample {t} is {label}, outside [0, {})",
                patterns.k()
            )));
        }

        Ok(Self {
            patterns,
            assignment,
            polarity,
            gev,
            gev_per_pattern,
            strength,
            algorithm_diagnostics,
            cleaning_diagnostics,
            diagnostics,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.assignment.len()
    }

    pub fn k(&self) -> usize {
        self.patterns.k()
    }

    /// Fraction of samples assigned to each pattern.
    pub fn coverage(&self) -> Vec<f64> {
        let mut counts = vec![0usize; self.k()];
        for &label in &self.assignment {
            counts[label] += 1;
        }
        let n = self.n_samples().max(1) as f64;
        counts.into_iter().map(|c| c as f64 / n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{AlgorithmDiagnostics, MicrostateResult};
    use crate::{CleaningDiagnostics, Diagnostics, PatternSet, Polarity};

    fn patterns() -> PatternSet {
        PatternSet::from_rows(vec![1.0, 0.0, 0.0, 1.0], 2, 2).expect("patterns should be valid")
    }

    fn build(assignment: Vec<usize>, polarity: Vec<Polarity>) -> Result<MicrostateResult, crate::MsError> {
        let n = assignment.len();
        MicrostateResult::new(
            patterns(),
            assignment,
            polarity,
            0.9,
            vec![0.5, 0.4],
            vec![1.0; n],
            AlgorithmDiagnostics::default(),
            CleaningDiagnostics::default(),
            Diagnostics::default(),
        )
    }

    #[test]
    fn new_accepts_consistent_fields_and_reports_coverage() {
        let result = build(
            vec![0, 1, 1, 1],
            vec![Polarity::Positive, Polarity::Negative, Polarity::Positive, Polarity::Positive],
        )
        .expect("result should be valid");
        assert_eq!(result.n_samples(), 4);
        assert_eq!(result.k(), 2);
        assert_eq!(result.coverage(), vec![0.25, 0.75]);
    }

    #[test]
    fn new_rejects_out_of_range_labels() {
        let err = build(vec![0, 2], vec![Polarity::Positive; 2]).expect_err("label 2 must fail");
        assert!(err.to_string().contains("outside [0, 2)"));
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let err = build(vec![0, 1], vec![Polarity::Positive]).expect_err("polarity mismatch");
        assert!(err.to_string().contains("result length mismatch"));
    }
}
