// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook event payload and raw document envelope.

use serde::{Deserialize, Serialize};

/// Strava webhook event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub object_type: String, // "activity" or "athlete"
    pub object_id: u64,
    pub aspect_type: String, // "create", "update", "delete"
    pub owner_id: u64,
}

/// Envelope for raw JSON payloads stored in Firestore.
///
/// Firestore documents must be maps, so array payloads (laps) are
/// wrapped rather than stored at the top level. The payload itself is
/// never mutated after storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub payload: serde_json::Value,
    pub stored_at: String,
}

impl RawDocument {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
