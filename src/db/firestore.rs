// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Token records (per-athlete OAuth token pairs)
//! - Raw documents (webhook events, activity and laps payloads)
//! - Model artifacts (serialized scaler and k-means model)

use serde::{de::DeserializeOwned, Serialize};

use crate::db::collections;
use crate::error::AppError;
use crate::ml::{KMeansModel, StandardScaler};
use crate::models::{RawDocument, TokenRecord};

/// Fixed artifact document IDs; new versions overwrite in place.
const SCALER_ARTIFACT_ID: &str = "scaler";
const KMEANS_ARTIFACT_ID: &str = "kmeans";

/// Firestore document store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Storage(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Storage("Store not connected (offline mode)".to_string()))
    }

    // ─── Generic Document Helpers ────────────────────────────────

    async fn get_doc<T>(&self, collection: &str, doc_id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(doc_id)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }

    async fn set_doc<T>(&self, collection: &str, doc_id: &str, object: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(doc_id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(())
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get the token record for an athlete.
    pub async fn get_token(&self, athlete_id: u64) -> Result<Option<TokenRecord>, AppError> {
        self.get_doc(collections::TOKENS, &athlete_id.to_string())
            .await
    }

    /// Store a token record, replacing any previous one (last writer wins).
    pub async fn set_token(&self, record: &TokenRecord) -> Result<(), AppError> {
        self.set_doc(
            collections::TOKENS,
            &record.athlete_id.to_string(),
            record,
        )
        .await
    }

    // ─── Raw Event Operations ────────────────────────────────────

    /// Store an inbound webhook payload verbatim, with a generated,
    /// timestamped document ID. Events are write-once; duplicates get
    /// distinct IDs. The ID components arrive as strings so deliveries
    /// with missing fields can still be stored under a fallback.
    pub async fn store_raw_event(
        &self,
        athlete: &str,
        object: &str,
        payload: serde_json::Value,
    ) -> Result<String, AppError> {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let doc_id = format!("event_{}_{}_{}", athlete, object, timestamp);

        self.set_doc(
            collections::RAW_EVENTS,
            &doc_id,
            &RawDocument::new(payload),
        )
        .await?;

        tracing::info!(doc_id = %doc_id, "Raw event stored");
        Ok(doc_id)
    }

    // ─── Raw Activity / Laps Operations ──────────────────────────

    fn activity_doc_id(athlete_id: u64, activity_id: u64) -> String {
        format!("athlete_{}_activity_{}", athlete_id, activity_id)
    }

    /// Store a raw detailed-activity payload, overwriting on refetch.
    pub async fn set_raw_activity(
        &self,
        athlete_id: u64,
        activity_id: u64,
        payload: serde_json::Value,
    ) -> Result<(), AppError> {
        self.set_doc(
            collections::RAW_ACTIVITIES,
            &Self::activity_doc_id(athlete_id, activity_id),
            &RawDocument::new(payload),
        )
        .await
    }

    /// Get a stored raw activity payload.
    pub async fn get_raw_activity(
        &self,
        athlete_id: u64,
        activity_id: u64,
    ) -> Result<Option<RawDocument>, AppError> {
        self.get_doc(
            collections::RAW_ACTIVITIES,
            &Self::activity_doc_id(athlete_id, activity_id),
        )
        .await
    }

    /// Store a raw laps payload, overwriting on refetch.
    pub async fn set_raw_laps(
        &self,
        athlete_id: u64,
        activity_id: u64,
        payload: serde_json::Value,
    ) -> Result<(), AppError> {
        self.set_doc(
            collections::RAW_LAPS,
            &Self::activity_doc_id(athlete_id, activity_id),
            &RawDocument::new(payload),
        )
        .await
    }

    /// Get a stored raw laps payload.
    pub async fn get_raw_laps(
        &self,
        athlete_id: u64,
        activity_id: u64,
    ) -> Result<Option<RawDocument>, AppError> {
        self.get_doc(
            collections::RAW_LAPS,
            &Self::activity_doc_id(athlete_id, activity_id),
        )
        .await
    }

    // ─── Model Artifact Operations ───────────────────────────────

    /// Persist the fitted scaler, overwriting the previous version.
    pub async fn set_scaler(&self, scaler: &StandardScaler) -> Result<(), AppError> {
        self.set_doc(collections::MODEL_ARTIFACTS, SCALER_ARTIFACT_ID, scaler)
            .await
    }

    /// Load the persisted scaler.
    pub async fn get_scaler(&self) -> Result<Option<StandardScaler>, AppError> {
        self.get_doc(collections::MODEL_ARTIFACTS, SCALER_ARTIFACT_ID)
            .await
    }

    /// Persist the fitted k-means model, overwriting the previous version.
    pub async fn set_kmeans(&self, model: &KMeansModel) -> Result<(), AppError> {
        self.set_doc(collections::MODEL_ARTIFACTS, KMEANS_ARTIFACT_ID, model)
            .await
    }

    /// Load the persisted k-means model.
    pub async fn get_kmeans(&self) -> Result<Option<KMeansModel>, AppError> {
        self.get_doc(collections::MODEL_ARTIFACTS, KMEANS_ARTIFACT_ID)
            .await
    }
}
