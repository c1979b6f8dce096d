// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth connection routes.
//!
//! Single-athlete connect flow: /auth/connect redirects to Strava's
//! consent screen, /auth/callback exchanges the code and stores the
//! token pair.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/connect", get(connect))
        .route("/auth/callback", get(callback))
}

/// Start OAuth flow - redirect to Strava authorization.
async fn connect(State(state): State<Arc<AppState>>) -> Redirect {
    let url = state.strava.authorize_url(&state.config.redirect_uri);
    Redirect::temporary(&url)
}

/// Query parameters Strava sends to the callback.
#[derive(Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    /// Set to "access_denied" when the athlete refuses consent.
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct CallbackResponse {
    athlete_id: u64,
    connected: bool,
}

/// Complete OAuth flow - exchange the code and store tokens.
async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth callback returned an error");
        return Err(AppError::BadRequest(format!("OAuth denied: {}", error)));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing OAuth code".to_string()))?;

    let athlete_id = state.strava.handle_oauth_callback(&code).await?;

    Ok(Json(CallbackResponse {
        athlete_id,
        connected: true,
    }))
}
