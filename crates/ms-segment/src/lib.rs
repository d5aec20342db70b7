// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod assign;
pub mod canonical;
pub mod quality;
pub mod segment;
pub mod selector;

pub use assign::{Backfit, assign_samples, backfit};
pub use canonical::{Canonicalizer, IdentityOrder, PrevalenceOrder, Relabeling};
pub use ms_cluster::{BuiltinClusterer, ClusterMethod, Clusterer, FitRequest};
pub use ms_core::{ExecutionContext, MicrostateResult, MsError, ReproMode, SegmentInput};
pub use quality::{QualityRecord, cross_validation_criterion, global_explained_variance};
pub use segment::{SegmentConfig, Segmenter};
pub use selector::{
    RunCandidate, SelectionCriterion, SelectionOutcome, SelectionPlan, derive_run_seeds,
    select_best,
};

/// Microstate segmentation engine for microseg.
pub fn crate_name() -> &'static str {
    let _ = (ms_core::crate_name(), ms_cluster::crate_name());
    "ms-segment"
}
