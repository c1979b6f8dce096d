// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ETL flow: raw JSON documents to warehouse tables.
//!
//! A linear four-step flow per (athlete, activity): extract the two
//! raw documents, transform each into a flat typed frame, and upsert
//! both frames into the warehouse by composite key. Every step is
//! idempotent given the same input documents.

pub mod frame;
pub mod transform;

#[cfg(test)]
pub mod fixtures;

use serde_json::Value;

use crate::db::{FirestoreStore, Warehouse};
use crate::error::{AppError, Result};

pub const ACTIVITIES_TABLE: &str = "activities";
pub const LAPS_TABLE: &str = "laps";

/// Composite upsert key for the activities table.
pub const ACTIVITY_KEY: &[&str] = &["athlete_id", "id"];
/// Composite upsert key for the laps table.
pub const LAP_KEY: &[&str] = &["athlete_id", "activity_id", "id"];

/// Run the full flow for one (athlete, activity) pair.
pub async fn run_flow(
    store: &FirestoreStore,
    warehouse: &Warehouse,
    athlete_id: u64,
    activity_id: u64,
) -> Result<()> {
    tracing::info!(athlete_id, activity_id, "Starting ETL flow");

    let (activity, laps) = extract(store, athlete_id, activity_id).await?;

    let activity_frame = transform::transform_activity(&activity)?;
    let laps_frame = transform::transform_laps(&laps)?;

    warehouse
        .merge_frame(ACTIVITIES_TABLE, ACTIVITY_KEY, &activity_frame)
        .await?;
    warehouse.merge_frame(LAPS_TABLE, LAP_KEY, &laps_frame).await?;

    tracing::info!(
        athlete_id,
        activity_id,
        laps = laps_frame.len(),
        "ETL flow complete"
    );
    Ok(())
}

/// Extract step: read both raw documents, failing if either is absent.
async fn extract(
    store: &FirestoreStore,
    athlete_id: u64,
    activity_id: u64,
) -> Result<(Value, Value)> {
    let activity = store
        .get_raw_activity(athlete_id, activity_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "raw activity for athlete {} activity {}",
                athlete_id, activity_id
            ))
        })?;

    let laps = store
        .get_raw_laps(athlete_id, activity_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "raw laps for athlete {} activity {}",
                athlete_id, activity_id
            ))
        })?;

    Ok((activity.payload, laps.payload))
}
