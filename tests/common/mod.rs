// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use runpulse::config::Config;
use runpulse::db::{FirestoreStore, Warehouse};
use runpulse::routes::create_router;
use runpulse::services::{StravaService, TasksService};
use runpulse::AppState;
use std::sync::Arc;

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    // The Cloud Tasks client's HTTP stack requires a process-wide rustls
    // crypto provider; install one before any handler can build a client.
    static CRYPTO_PROVIDER: std::sync::Once = std::sync::Once::new();
    CRYPTO_PROVIDER.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });

    let config = Config::test_default();
    let store = FirestoreStore::new_mock();
    let warehouse = Warehouse::new_mock();
    let tasks = Arc::new(TasksService::new(&config.gcp_project_id, &config.gcp_region));

    let refresh_locks = Arc::new(dashmap::DashMap::new());
    let strava = StravaService::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
        store.clone(),
        refresh_locks,
    );

    let state = Arc::new(AppState {
        config,
        store,
        warehouse,
        strava,
        tasks,
    });

    (create_router(state.clone()), state)
}
