// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.
//!
//! Strava retries any non-200 response, so the event handler stores
//! what it can, queues the fetch, and answers 200 even when the payload
//! is malformed.

use crate::models::WebhookEvent;
use crate::services::tasks::FetchActivityPayload;
use crate::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.challenge")]
    challenge: String,
    #[serde(rename = "hub.verify_token")]
    verify_token: String,
}

/// Verification response.
#[derive(Serialize, Default)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    if params.mode == "subscribe" && params.verify_token == state.config.webhook_verify_token {
        tracing::info!("Webhook subscription verified");
        (
            StatusCode::OK,
            Json(VerifyResponse {
                challenge: params.challenge,
            }),
        )
    } else {
        tracing::warn!(
            mode = %params.mode,
            "Webhook verification failed: invalid token"
        );
        (StatusCode::FORBIDDEN, Json(VerifyResponse::default()))
    }
}

/// Document-id components for a raw delivery. Falls back to "unknown"
/// when a field is absent or not numeric, so malformed deliveries are
/// still kept on record.
fn delivery_ids(payload: &serde_json::Value) -> (String, String) {
    let field = |name: &str| {
        payload
            .get(name)
            .and_then(|v| v.as_u64())
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    };
    (field("owner_id"), field("object_id"))
}

/// Handle incoming webhook events (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    tracing::info!(payload = %payload, "Webhook event received (raw)");

    // Store every delivery verbatim before any parsing or filtering:
    // a payload we cannot parse today can still be replayed later.
    let (owner, object) = delivery_ids(&payload);
    if let Err(e) = state
        .store
        .store_raw_event(&owner, &object, payload.clone())
        .await
    {
        tracing::error!(error = %e, "Failed to store raw event");
    }

    let event: WebhookEvent = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse webhook event");
            return StatusCode::OK; // Still return 200 to Strava to avoid retries
        }
    };

    tracing::info!(
        object_type = %event.object_type,
        object_id = event.object_id,
        aspect_type = %event.aspect_type,
        owner_id = event.owner_id,
        "Webhook event parsed successfully"
    );

    match (event.object_type.as_str(), event.aspect_type.as_str()) {
        ("activity", "create") | ("activity", "update") => {
            let payload = FetchActivityPayload {
                athlete_id: event.owner_id,
                activity_id: event.object_id,
                aspect_type: event.aspect_type.clone(),
            };

            if let Err(e) = state
                .tasks
                .queue_fetch_activity(&state.config.api_url, payload)
                .await
            {
                tracing::error!(error = %e, "Failed to queue activity fetch");
            }
        }
        _ => {
            tracing::debug!(
                object_type = %event.object_type,
                aspect_type = %event.aspect_type,
                "Ignoring unhandled event type"
            );
        }
    }

    // Always return 200 OK quickly (Strava requirement)
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delivery_ids_reads_owner_and_object() {
        let payload = json!({
            "object_type": "activity",
            "object_id": 555,
            "aspect_type": "create",
            "owner_id": 42
        });
        assert_eq!(
            delivery_ids(&payload),
            ("42".to_string(), "555".to_string())
        );
    }

    #[test]
    fn delivery_ids_falls_back_for_missing_or_garbage_fields() {
        let payload = json!({"unexpected": "shape"});
        assert_eq!(
            delivery_ids(&payload),
            ("unknown".to_string(), "unknown".to_string())
        );

        let payload = json!({"owner_id": "not-a-number", "object_id": 7});
        assert_eq!(delivery_ids(&payload), ("unknown".to_string(), "7".to_string()));
    }
}
