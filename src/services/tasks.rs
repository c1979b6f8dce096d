// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks service connecting the pipeline stages.
//!
//! Each stage hands off to the next by queueing an HTTP push task back
//! at this service's /tasks/* endpoints:
//! - webhook receipt queues an activity fetch
//! - a completed fetch queues the ETL flow
//! - a fetched activity queues a run-type prediction
//!
//! Uses the official google-cloud-tasks-v2 SDK.

use crate::error::AppError;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Payload sent to the fetch-activity task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchActivityPayload {
    pub athlete_id: u64,
    pub activity_id: u64,
    /// Webhook aspect that triggered the fetch ("create" or "update").
    pub aspect_type: String,
}

/// Payload sent to the ETL task after raw payloads are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlTriggerPayload {
    pub athlete_id: u64,
    pub activity_id: u64,
    /// Whether the detailed-activity fetch succeeded.
    pub activity_success: bool,
    /// Whether the laps fetch succeeded.
    pub laps_success: bool,
}

/// Payload sent to the prediction task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionPayload {
    pub athlete_id: u64,
    pub activity_id: u64,
    /// Raw (unscaled) feature vector: distance, moving time, suffer score.
    pub features: [f64; 3],
}

/// Cloud Tasks client wrapper.
pub struct TasksService {
    project_id: String,
    location: String,
    queue_name: String,
}

impl TasksService {
    pub fn new(project_id: &str, region: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            queue_name: crate::config::PIPELINE_QUEUE_NAME.to_string(),
        }
    }

    /// Queue a fetch for a single activity.
    pub async fn queue_fetch_activity(
        &self,
        service_url: &str,
        payload: FetchActivityPayload,
    ) -> Result<()> {
        self.queue_task(service_url, "/tasks/fetch-activity", &payload)
            .await
    }

    /// Queue the ETL flow for a fetched activity.
    pub async fn queue_etl(&self, service_url: &str, payload: EtlTriggerPayload) -> Result<()> {
        self.queue_task(service_url, "/tasks/run-etl", &payload)
            .await
    }

    /// Queue a run-type prediction for a fetched activity.
    pub async fn queue_prediction(
        &self,
        service_url: &str,
        payload: PredictionPayload,
    ) -> Result<()> {
        self.queue_task(service_url, "/tasks/predict", &payload)
            .await
    }

    /// Generic task queuing helper.
    async fn queue_task<T: Serialize>(
        &self,
        service_url: &str,
        endpoint: &str,
        payload: &T,
    ) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, OidcToken, Task};

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks client error: {}", e)))?;

        let queue_path = format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        );

        let body = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON error: {}", e)))?;

        let http_request = HttpRequest::default()
            .set_url(format!("{}{}", service_url, endpoint))
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(body))
            .set_headers(std::collections::HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]))
            .set_oidc_token(
                OidcToken::default()
                    .set_service_account_email(format!(
                        "runpulse-api@{}.iam.gserviceaccount.com",
                        self.project_id
                    ))
                    .set_audience(service_url.to_string()),
            );

        let task = Task::default().set_http_request(http_request);

        let _response = client
            .create_task()
            .set_parent(queue_path)
            .set_task(task)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks create error: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_round_trip_as_json() {
        let fetch = FetchActivityPayload {
            athlete_id: 1,
            activity_id: 2,
            aspect_type: "create".to_string(),
        };
        let json = serde_json::to_string(&fetch).unwrap();
        let back: FetchActivityPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.athlete_id, 1);
        assert_eq!(back.activity_id, 2);
        assert_eq!(back.aspect_type, "create");

        let etl = EtlTriggerPayload {
            athlete_id: 1,
            activity_id: 2,
            activity_success: true,
            laps_success: false,
        };
        let json = serde_json::to_string(&etl).unwrap();
        let back: EtlTriggerPayload = serde_json::from_str(&json).unwrap();
        assert!(back.activity_success);
        assert!(!back.laps_success);
    }

    #[test]
    fn prediction_payload_keeps_feature_order() {
        let payload = PredictionPayload {
            athlete_id: 1,
            activity_id: 2,
            features: [12000.0, 3600.0, 55.0],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["features"][0], 12000.0);
        assert_eq!(json["features"][1], 3600.0);
        assert_eq!(json["features"][2], 55.0);
    }
}
