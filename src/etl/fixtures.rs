// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared JSON fixtures for transform tests, shaped like real Strava
//! detailed-activity and laps responses.

use serde_json::{json, Value};

/// A detailed activity payload covering every allow-listed column.
pub fn activity() -> Value {
    json!({
        "resource_state": 3,
        "name": "Morning Run",
        "distance": 8012.5,
        "moving_time": 2400,
        "elapsed_time": 2451,
        "total_elevation_gain": 86.0,
        "type": "Run",
        "sport_type": "Run",
        "workout_type": 0,
        "id": 10891234567u64,
        "start_date": "2024-03-08T14:12:04Z",
        "start_date_local": "2024-03-08T06:12:04Z",
        "timezone": "(GMT-08:00) America/Los_Angeles",
        "achievement_count": 2,
        "kudos_count": 5,
        "comment_count": 0,
        "athlete_count": 1,
        "photo_count": 0,
        "trainer": false,
        "commute": false,
        "manual": false,
        "private": false,
        "visibility": "everyone",
        "flagged": false,
        "gear_id": "g12345",
        "start_latlng": [37.77, -122.41],
        "end_latlng": [37.78, -122.42],
        "average_speed": 3.338,
        "max_speed": 4.2,
        "average_cadence": 82.1,
        "average_watts": 245.3,
        "max_watts": 402.0,
        "weighted_average_watts": 250.0,
        "kilojoules": 588.7,
        "device_watts": true,
        "has_heartrate": true,
        "average_heartrate": 148.2,
        "max_heartrate": 176.0,
        "elev_high": 112.4,
        "elev_low": 26.4,
        "upload_id": 11573891234u64,
        "upload_id_str": "11573891234",
        "external_id": "garmin_ping_312345678901",
        "pr_count": 1,
        "total_photo_count": 0,
        "suffer_score": 55.0,
        "calories": 612.0,
        "perceived_exertion": 6.0,
        "prefer_perceived_exertion": false,
        "device_name": "Garmin Forerunner 255",
        "embed_token": "abc123embed",
        "athlete": {
            "id": 9876543,
            "resource_state": 1
        },
        "gear": {
            "primary": true,
            "name": "Pegasus 40",
            "distance": 412345.0
        },
        // Not on the allow-list; the transform must drop it
        "segment_efforts": []
    })
}

/// A two-lap payload covering every allow-listed lap column.
pub fn laps() -> Value {
    let lap = |index: i64, split: i64| {
        json!({
            "id": 38000000000u64 + index as u64,
            "resource_state": 2,
            "name": format!("Lap {}", index),
            "elapsed_time": 1225,
            "moving_time": 1200,
            "start_date": "2024-03-08T14:12:04Z",
            "start_date_local": "2024-03-08T06:12:04Z",
            "distance": 4006.2,
            "average_speed": 3.34,
            "max_speed": 4.1,
            "lap_index": index,
            "split": split,
            "start_index": 0,
            "end_index": 1200,
            "total_elevation_gain": 43.0,
            "average_cadence": 82.0,
            "device_watts": true,
            "average_watts": 243.0,
            "average_heartrate": 147.0,
            "max_heartrate": 171.0,
            "pace_zone": 2,
            "activity": {
                "id": 10891234567u64,
                "visibility": "everyone",
                "resource_state": 1
            },
            "athlete": {
                "id": 9876543,
                "resource_state": 1
            }
        })
    };

    json!([lap(1, 1), lap(2, 2)])
}
