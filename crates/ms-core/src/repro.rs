// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Reproducibility mode used to control determinism/performance trade-offs.
///
/// `Strict` keeps every loop sequential. The other modes allow parallel
/// execution where the reduction order is fixed, so their outputs match
/// `Strict` bit for bit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReproMode {
    Strict,
    #[default]
    Balanced,
    /// Same schedule as `Balanced`; no code path trades accuracy for speed.
    Fast,
}

impl ReproMode {
    pub fn allows_parallel(self) -> bool {
        self != Self::Strict
    }
}
