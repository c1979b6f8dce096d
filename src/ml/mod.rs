// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clustering model: feature scaling, k-means, and run-type labels.

pub mod kmeans;
pub mod labels;
pub mod scaler;

pub use kmeans::KMeansModel;
pub use labels::{run_type, CLUSTER_LABELS};
pub use scaler::StandardScaler;

/// Number of run-type clusters.
pub const NUM_CLUSTERS: usize = 4;
/// Fixed seed so repeated training runs are deterministic.
pub const RANDOM_SEED: u64 = 42;
/// Lloyd iteration cap.
pub const MAX_ITERATIONS: usize = 300;
