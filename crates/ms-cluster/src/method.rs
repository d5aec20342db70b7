// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::aahc::Aahc;
use crate::ica::Ica;
use crate::kmeans::KMeans;
use crate::kmedoids::KMedoids;
use crate::kmod::ModifiedKMeans;
use crate::model::{ClusterFit, Clusterer, FitRequest};
use crate::pca::Pca;
use ms_core::{MsError, TrainingData};
use std::fmt;
use std::str::FromStr;

/// Closed set of built-in clustering methods.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClusterMethod {
    KMeans,
    #[default]
    ModifiedKMeans,
    KMedoids,
    Pca,
    Ica,
    Aahc,
}

impl ClusterMethod {
    pub const ALL: [ClusterMethod; 6] = [
        Self::KMeans,
        Self::ModifiedKMeans,
        Self::KMedoids,
        Self::Pca,
        Self::Ica,
        Self::Aahc,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::KMeans => "kmeans",
            Self::ModifiedKMeans => "kmod",
            Self::KMedoids => "kmedoids",
            Self::Pca => "pca",
            Self::Ica => "ica",
            Self::Aahc => "aahc",
        }
    }

    /// Only polarity-invariant k-means is repeated over seeds and selected.
    pub const fn is_multi_run(self) -> bool {
        matches!(self, Self::ModifiedKMeans)
    }

    /// Whether the fit depends on `FitRequest::seed`.
    pub const fn is_randomized(self) -> bool {
        matches!(
            self,
            Self::KMeans | Self::ModifiedKMeans | Self::KMedoids | Self::Ica
        )
    }
}

impl fmt::Display for ClusterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClusterMethod {
    type Err = MsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "kmod" | "kmods" | "kmeans modified" | "modified kmeans" => Ok(Self::ModifiedKMeans),
            "kmeans" => Ok(Self::KMeans),
            "kmedoids" => Ok(Self::KMedoids),
            "pca" => Ok(Self::Pca),
            "ica" => Ok(Self::Ica),
            "aahc" => Ok(Self::Aahc),
            _ => Err(MsError::invalid_configuration(format!(
                "unknown clustering method '{raw}'; expected one of: kmod, kmeans, kmedoids, pca, ica, aahc"
            ))),
        }
    }
}

/// Dispatches a [`ClusterMethod`] to its implementation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuiltinClusterer {
    pub method: ClusterMethod,
    /// Forwarded to polarity-invariant k-means; ignored by other methods.
    pub optimize: bool,
}

impl BuiltinClusterer {
    pub const fn new(method: ClusterMethod) -> Self {
        Self {
            method,
            optimize: false,
        }
    }

    pub const fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }
}

impl Clusterer for BuiltinClusterer {
    fn name(&self) -> &'static str {
        self.method.name()
    }

    fn fit(&self, data: &TrainingData, request: &FitRequest) -> Result<ClusterFit, MsError> {
        match self.method {
            ClusterMethod::KMeans => KMeans.fit(data, request),
            ClusterMethod::ModifiedKMeans => ModifiedKMeans::new(self.optimize).fit(data, request),
            ClusterMethod::KMedoids => KMedoids.fit(data, request),
            ClusterMethod::Pca => Pca.fit(data, request),
            ClusterMethod::Ica => Ica.fit(data, request),
            ClusterMethod::Aahc => Aahc.fit(data, request),
        }
    }

    fn is_randomized(&self) -> bool {
        self.method.is_randomized()
    }
}
