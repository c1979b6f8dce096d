// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runpulse: personal training analytics for Strava activities.
//!
//! This crate receives Strava webhook events, fetches activity and lap
//! detail, loads it into a Postgres warehouse through a small ETL flow,
//! and labels runs by training intensity with a k-means model.

#![recursion_limit = "256"]

pub mod config;
pub mod db;
pub mod error;
pub mod etl;
pub mod ml;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::{FirestoreStore, Warehouse};
use services::{StravaService, TasksService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: FirestoreStore,
    pub warehouse: Warehouse,
    pub strava: StravaService,
    pub tasks: Arc<TasksService>,
}
