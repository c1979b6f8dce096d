// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clustering feature projection of an activity.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The numeric subset of an activity used for run-type clustering.
///
/// Fields are optional at the wire level because a fetched activity may
/// lack any of them (e.g. no heart-rate data means no suffer score);
/// prediction requires all three.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityFeatures {
    pub distance: Option<f64>,
    pub moving_time: Option<f64>,
    pub suffer_score: Option<f64>,
}

impl ActivityFeatures {
    /// Extract the feature subset from a raw activity payload.
    pub fn from_raw_activity(activity: &serde_json::Value) -> Self {
        Self {
            distance: activity.get("distance").and_then(|v| v.as_f64()),
            moving_time: activity.get("moving_time").and_then(|v| v.as_f64()),
            suffer_score: activity.get("suffer_score").and_then(|v| v.as_f64()),
        }
    }

    /// Return the complete feature vector, or an error naming the first
    /// missing field.
    pub fn require_complete(&self) -> Result<[f64; 3], AppError> {
        let distance = self
            .distance
            .ok_or_else(|| AppError::BadRequest("missing feature: distance".to_string()))?;
        let moving_time = self
            .moving_time
            .ok_or_else(|| AppError::BadRequest("missing feature: moving_time".to_string()))?;
        let suffer_score = self
            .suffer_score
            .ok_or_else(|| AppError::BadRequest("missing feature: suffer_score".to_string()))?;
        Ok([distance, moving_time, suffer_score])
    }
}
