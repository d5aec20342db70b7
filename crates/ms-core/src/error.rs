// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Error type shared by every microseg crate.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MsError {
    /// Input data violates a shape, length, or index invariant.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A configuration value or name was rejected before any computation ran.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A clustering primitive failed to converge or aborted for a seed.
    #[error("convergence failure: {0}")]
    ConvergenceFailure(String),

    /// The data cannot support the requested decomposition.
    ///
    /// Raised for example when `k` exceeds the number of distinct training
    /// samples or the strength series carries no energy.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// A non-finite value appeared in an intermediate result.
    #[error("numerical issue: {0}")]
    NumericalIssue(String),
}

impl MsError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn convergence_failure(msg: impl Into<String>) -> Self {
        Self::ConvergenceFailure(msg.into())
    }

    pub fn degenerate_input(msg: impl Into<String>) -> Self {
        Self::DegenerateInput(msg.into())
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    /// Returns true for errors that are scoped to a single seeded run.
    ///
    /// The run selector skips such runs instead of aborting the selection.
    pub fn is_run_local(&self) -> bool {
        matches!(
            self,
            Self::ConvergenceFailure(_) | Self::DegenerateInput(_) | Self::NumericalIssue(_)
        )
    }
}
