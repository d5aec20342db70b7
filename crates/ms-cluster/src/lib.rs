// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod aahc;
pub mod ica;
mod init;
pub mod kmeans;
pub mod kmedoids;
pub mod kmod;
pub mod linalg;
pub mod method;
pub mod model;
pub mod pca;

pub use aahc::Aahc;
pub use ica::Ica;
pub use kmeans::KMeans;
pub use kmedoids::KMedoids;
pub use kmod::ModifiedKMeans;
pub use method::{BuiltinClusterer, ClusterMethod};
pub use model::{
    ClusterFit, Clusterer, DEFAULT_MAX_ITERATIONS, DEFAULT_THRESHOLD, FitRequest,
    assign_by_activation, best_pattern, noise_variance, validate_fit_inputs,
};

/// Clustering primitives for microseg.
pub fn crate_name() -> &'static str {
    "ms-cluster"
}
