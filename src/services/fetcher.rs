// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity fetch stage.
//!
//! Handles the fetch task queued by the webhook route:
//! 1. Fetch the detailed activity and its laps from Strava
//! 2. Store each raw payload that arrived
//! 3. Queue the ETL flow if anything was stored
//! 4. Queue a run-type prediction if the activity itself arrived

use crate::db::FirestoreStore;
use crate::error::{AppError, Result};
use crate::models::ActivityFeatures;
use crate::services::{EtlTriggerPayload, PredictionPayload, StravaService, TasksService};
use std::sync::Arc;

/// Result of fetching one activity's payloads.
///
/// The two fetches are independent: a failed laps call does not block
/// the activity payload from being stored and processed, and vice versa.
#[derive(Debug, Clone, Copy)]
pub struct FetchOutcome {
    pub activity_stored: bool,
    pub laps_stored: bool,
}

/// Fetches raw activity data and hands off to the downstream stages.
pub struct ActivityFetcher {
    strava: StravaService,
    store: FirestoreStore,
    tasks: Arc<TasksService>,
    api_url: String,
}

impl ActivityFetcher {
    pub fn new(
        strava: StravaService,
        store: FirestoreStore,
        tasks: Arc<TasksService>,
        api_url: String,
    ) -> Self {
        Self {
            strava,
            store,
            tasks,
            api_url,
        }
    }

    /// Fetch and store one activity's payloads, then queue downstream work.
    ///
    /// Errors only when neither payload could be fetched; partial results
    /// are stored and reported in the outcome.
    pub async fn fetch_activity(
        &self,
        athlete_id: u64,
        activity_id: u64,
        aspect_type: &str,
    ) -> Result<FetchOutcome> {
        tracing::info!(athlete_id, activity_id, aspect_type, "Fetching activity");

        let activity_payload = match self.strava.get_activity_raw(athlete_id, activity_id).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(
                    athlete_id,
                    activity_id,
                    error = %e,
                    "Activity fetch failed"
                );
                None
            }
        };

        let laps_payload = match self.strava.get_laps_raw(athlete_id, activity_id).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(athlete_id, activity_id, error = %e, "Laps fetch failed");
                None
            }
        };

        if activity_payload.is_none() && laps_payload.is_none() {
            return Err(AppError::StravaApi(format!(
                "Both fetches failed for activity {}",
                activity_id
            )));
        }

        let mut outcome = FetchOutcome {
            activity_stored: false,
            laps_stored: false,
        };

        if let Some(payload) = &activity_payload {
            self.store
                .set_raw_activity(athlete_id, activity_id, payload.clone())
                .await?;
            outcome.activity_stored = true;
        }

        if let Some(payload) = &laps_payload {
            self.store
                .set_raw_laps(athlete_id, activity_id, payload.clone())
                .await?;
            outcome.laps_stored = true;
        }

        // Hand off to ETL; a task-queue failure here is logged but does not
        // fail the fetch, since the raw payloads are safely stored and the
        // ETL can be re-triggered through the admin route.
        let etl_payload = EtlTriggerPayload {
            athlete_id,
            activity_id,
            activity_success: outcome.activity_stored,
            laps_success: outcome.laps_stored,
        };
        if let Err(e) = self.tasks.queue_etl(&self.api_url, etl_payload).await {
            tracing::warn!(athlete_id, activity_id, error = %e, "Failed to queue ETL task");
        }

        // Prediction runs off the activity payload alone; skip it when the
        // feature set is incomplete rather than predicting on junk.
        if let Some(payload) = &activity_payload {
            match ActivityFeatures::from_raw_activity(payload).require_complete() {
                Ok(features) => {
                    let predict_payload = PredictionPayload {
                        athlete_id,
                        activity_id,
                        features,
                    };
                    if let Err(e) = self
                        .tasks
                        .queue_prediction(&self.api_url, predict_payload)
                        .await
                    {
                        tracing::warn!(
                            athlete_id,
                            activity_id,
                            error = %e,
                            "Failed to queue prediction task"
                        );
                    }
                }
                Err(e) => {
                    tracing::info!(
                        athlete_id,
                        activity_id,
                        reason = %e,
                        "Skipping prediction, feature set incomplete"
                    );
                }
            }
        }

        tracing::info!(
            athlete_id,
            activity_id,
            activity_stored = outcome.activity_stored,
            laps_stored = outcome.laps_stored,
            "Fetch complete"
        );

        Ok(outcome)
    }
}
