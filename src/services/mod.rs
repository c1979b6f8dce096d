// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Service layer: Strava API access, task queueing, and the pipeline
//! stages (fetch, train, predict) that run behind the task endpoints.

pub mod fetcher;
pub mod predictor;
pub mod strava;
pub mod tasks;
pub mod trainer;

pub use fetcher::{ActivityFetcher, FetchOutcome};
pub use predictor::Predictor;
pub use strava::{RefreshLocks, StravaClient, StravaService};
pub use tasks::{EtlTriggerPayload, FetchActivityPayload, PredictionPayload, TasksService};
pub use trainer::{train, TrainOutcome};
