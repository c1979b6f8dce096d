// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client and token lifecycle.
//!
//! Tokens are validated reactively: before handing out an access token
//! we probe the API with a cheap `/athlete` call, and only when Strava
//! rejects it do we spend the refresh grant. No expiry bookkeeping is
//! kept locally, so a token revoked out-of-band is caught on the next
//! probe rather than trusted until a stored timestamp runs out.

use crate::error::AppError;
use serde::Deserialize;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://www.strava.com/api/v3".to_string(),
            oauth_url: "https://www.strava.com/oauth/token".to_string(),
            client_id,
            client_secret,
        }
    }

    /// Client pointed at a stub server (test builds only).
    #[cfg(test)]
    pub fn with_urls(
        client_id: String,
        client_secret: String,
        base_url: String,
        oauth_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            oauth_url,
            client_id,
            client_secret,
        }
    }

    /// Get the authenticated athlete profile.
    ///
    /// Used as the validity probe: a 401 here means the access token is
    /// stale and a refresh is needed.
    pub async fn get_athlete(&self, access_token: &str) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/athlete", self.base_url);
        self.get_json(&url, access_token).await
    }

    /// Get a detailed activity by ID, as the raw JSON payload.
    ///
    /// The payload is stored verbatim before any transformation, so the
    /// client does not impose a typed schema here.
    pub async fn get_activity_raw(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        self.get_json(&url, access_token).await
    }

    /// Get the laps of an activity, as the raw JSON array.
    pub async fn get_laps_raw(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/activities/{}/laps", self.base_url, activity_id);
        self.get_json(&url, access_token).await
    }

    /// Update an activity's description.
    pub async fn update_activity_description(
        &self,
        access_token: &str,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);

        let body = serde_json::json!({
            "description": description
        });

        let response = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response(response).await?;
        Ok(())
    }

    /// Redeem a refresh token for a new token pair.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.oauth_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Exchange an authorization code for tokens (OAuth callback).
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(&self.oauth_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token exchange failed");
            return Err(AppError::StravaApi(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("Failed to parse token response: {}", e)))
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Rate limit - should trigger Cloud Tasks retry
        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
        }

        Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
            }

            return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub athlete: OAuthAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthAthlete {
    pub id: u64,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::FirestoreStore;
use crate::models::TokenRecord;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// High-level Strava service that manages token lifecycle and API calls.
///
/// Token access is serialized per athlete: two tasks arriving for the
/// same athlete take turns through the refresh lock, so at most one of
/// them spends the refresh grant and the other sees the updated record.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    store: FirestoreStore,
    /// Per-athlete mutex to serialize probe-and-refresh.
    refresh_locks: RefreshLocks,
}

impl StravaService {
    /// Create a new Strava service.
    ///
    /// The `refresh_locks` map should be shared across all `StravaService`
    /// instances in the process.
    pub fn new(
        client_id: String,
        client_secret: String,
        store: FirestoreStore,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            client: StravaClient::new(client_id, client_secret),
            store,
            refresh_locks,
        }
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a working access token for the given athlete.
    ///
    /// 1. Acquire the athlete's refresh lock
    /// 2. Load the stored token record (404 if the athlete never connected)
    /// 3. Probe the API with the stored access token
    /// 4. On rejection, redeem the refresh token and persist the new pair
    ///
    /// A refresh rejection means the athlete revoked access; the caller
    /// gets `TokenRefresh` and should treat the athlete as disconnected.
    pub async fn get_access_token(&self, athlete_id: u64) -> Result<String, AppError> {
        let lock = self
            .refresh_locks
            .entry(athlete_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        let record = self
            .store
            .get_token(athlete_id)
            .await?
            .ok_or(AppError::MissingToken(athlete_id))?;

        // Probe: a cheap /athlete call tells us whether the access token
        // is still accepted without consuming the refresh grant.
        match self.client.get_athlete(&record.access_token).await {
            Ok(_) => return Ok(record.access_token),
            Err(e) if e.is_token_error() => {
                tracing::info!(athlete_id, "Access token rejected, refreshing");
            }
            Err(e) => return Err(e),
        }

        let refreshed = self
            .client
            .refresh_token(&record.refresh_token)
            .await
            .map_err(|e| AppError::TokenRefresh(athlete_id, e.to_string()))?;

        let updated = TokenRecord {
            athlete_id,
            access_token: refreshed.access_token.clone(),
            refresh_token: refreshed.refresh_token,
        };
        self.store.set_token(&updated).await?;

        tracing::info!(athlete_id, "Token refreshed and stored");
        Ok(refreshed.access_token)
    }

    // ─── OAuth ───────────────────────────────────────────────────────────────

    /// Build the Strava authorization URL the athlete is redirected to.
    pub fn authorize_url(&self, redirect_uri: &str) -> String {
        format!(
            "https://www.strava.com/oauth/authorize?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope=activity:read_all,activity:write",
            self.client.client_id, redirect_uri
        )
    }

    /// Handle OAuth callback: exchange the code and store the token pair.
    ///
    /// Returns the athlete ID of the newly connected athlete.
    pub async fn handle_oauth_callback(&self, code: &str) -> Result<u64, AppError> {
        let response = self.client.exchange_code(code).await?;
        let athlete_id = response.athlete.id;

        let record = TokenRecord {
            athlete_id,
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        };
        self.store.set_token(&record).await?;

        tracing::info!(
            athlete_id,
            firstname = response.athlete.firstname.as_deref().unwrap_or(""),
            "OAuth callback handled, tokens stored"
        );

        Ok(athlete_id)
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// Fetch a detailed activity as raw JSON.
    pub async fn get_activity_raw(
        &self,
        athlete_id: u64,
        activity_id: u64,
    ) -> Result<serde_json::Value, AppError> {
        let access_token = self.get_access_token(athlete_id).await?;
        self.client
            .get_activity_raw(&access_token, activity_id)
            .await
    }

    /// Fetch an activity's laps as raw JSON.
    pub async fn get_laps_raw(
        &self,
        athlete_id: u64,
        activity_id: u64,
    ) -> Result<serde_json::Value, AppError> {
        let access_token = self.get_access_token(athlete_id).await?;
        self.client.get_laps_raw(&access_token, activity_id).await
    }

    /// Update an activity's description.
    pub async fn update_activity_description(
        &self,
        athlete_id: u64,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let access_token = self.get_access_token(athlete_id).await?;
        self.client
            .update_activity_description(&access_token, activity_id, description)
            .await
    }
}
