// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cluster index to run-type label mapping.
//!
//! This is the single authoritative map; every component that turns a
//! cluster index into a label goes through it. The ordering is tied to
//! the artifacts produced by the current trainer, so retraining with a
//! different seed or feature set requires revisiting it.

/// Run-type labels indexed by cluster.
pub const CLUSTER_LABELS: [&str; 4] = [
    "Low-Intensity Run",
    "Medium-Distance Steady Run",
    "Marathon Prep",
    "Long Tempo Run",
];

/// Human-readable run type for a cluster index.
pub fn run_type(cluster: usize) -> &'static str {
    CLUSTER_LABELS
        .get(cluster)
        .copied()
        .unwrap_or("Unknown Run Type")
}
