// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage clients: Firestore document store and Postgres warehouse.

pub mod firestore;
pub mod warehouse;

pub use firestore::FirestoreStore;
pub use warehouse::Warehouse;

/// Firestore collection names.
pub mod collections {
    /// Inbound webhook payloads, stored verbatim, never mutated.
    pub const RAW_EVENTS: &str = "raw_events";
    /// Raw detailed-activity payloads, keyed per (athlete, activity).
    pub const RAW_ACTIVITIES: &str = "raw_activities";
    /// Raw laps payloads, keyed per (athlete, activity).
    pub const RAW_LAPS: &str = "raw_laps";
    /// Per-athlete OAuth token records.
    pub const TOKENS: &str = "tokens";
    /// Serialized model artifacts (scaler, k-means), fixed document IDs.
    pub const MODEL_ARTIFACTS: &str = "model_artifacts";
}
