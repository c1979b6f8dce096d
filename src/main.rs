// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runpulse API Server
//!
//! Receives Strava webhook events, fetches activity detail, runs the
//! ETL flow into the warehouse, and labels runs by training intensity.

use runpulse::{
    config::Config,
    db::{FirestoreStore, Warehouse},
    services::{StravaService, TasksService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Runpulse API");

    // Initialize Firestore document store
    let store = FirestoreStore::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize warehouse connection pool
    let warehouse = Warehouse::connect(&config.warehouse_url)
        .await
        .expect("Failed to connect to warehouse");
    tracing::info!("Warehouse connection pool ready");

    // Initialize Cloud Tasks service
    let tasks = Arc::new(TasksService::new(&config.gcp_project_id, &config.gcp_region));
    tracing::info!(
        project = %config.gcp_project_id,
        "Cloud Tasks service initialized"
    );

    // Per-athlete refresh locks are shared across all requests so that
    // concurrent invocations for the same athlete serialize their refresh.
    let refresh_locks = Arc::new(dashmap::DashMap::new());

    // Initialize Strava service
    let strava = StravaService::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
        store.clone(),
        refresh_locks,
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        warehouse,
        strava,
        tasks,
    });

    // Build router
    let app = runpulse::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("runpulse=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
