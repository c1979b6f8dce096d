// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transform steps: raw Strava JSON to flat, typed warehouse frames.
//!
//! Each transform flattens the payload, selects a fixed column
//! allow-list, coerces dates and declared numeric fields, and appends a
//! few derived columns. Anything not on the allow-list is dropped;
//! anything on the allow-list but absent from the payload is an error.

use serde_json::Value;

use crate::error::AppError;
use crate::etl::frame::{
    flatten_json, float_cell, infer_cell, int_cell, select_columns, timestamp_cell, Cell, Frame,
};

/// Activity columns kept in the warehouse, in load order.
/// Nested fields appear under their flattened names (`athlete_id` etc.).
pub const ACTIVITY_COLUMNS: &[&str] = &[
    "resource_state",
    "name",
    "distance",
    "moving_time",
    "elapsed_time",
    "total_elevation_gain",
    "type",
    "sport_type",
    "workout_type",
    "id",
    "start_date",
    "start_date_local",
    "timezone",
    "achievement_count",
    "kudos_count",
    "comment_count",
    "athlete_count",
    "photo_count",
    "trainer",
    "commute",
    "manual",
    "private",
    "visibility",
    "flagged",
    "gear_id",
    "start_latlng",
    "end_latlng",
    "average_speed",
    "max_speed",
    "average_cadence",
    "average_watts",
    "max_watts",
    "weighted_average_watts",
    "kilojoules",
    "device_watts",
    "has_heartrate",
    "average_heartrate",
    "max_heartrate",
    "elev_high",
    "elev_low",
    "upload_id",
    "upload_id_str",
    "external_id",
    "pr_count",
    "total_photo_count",
    "suffer_score",
    "calories",
    "perceived_exertion",
    "prefer_perceived_exertion",
    "device_name",
    "embed_token",
    "athlete_id",
    "gear_primary",
    "gear_name",
    "gear_distance",
];

/// Columns derived from the activity payload during transform.
pub const ACTIVITY_DERIVED_COLUMNS: &[&str] =
    &["elevation_change", "day_of_week", "hour", "month"];

const ACTIVITY_DATE_COLUMNS: &[&str] = &["start_date", "start_date_local"];

const ACTIVITY_INT_COLUMNS: &[&str] = &[
    "resource_state",
    "moving_time",
    "elapsed_time",
    "workout_type",
    "id",
    "achievement_count",
    "kudos_count",
    "comment_count",
    "athlete_count",
    "photo_count",
    "upload_id",
    "pr_count",
    "total_photo_count",
    "athlete_id",
];

const ACTIVITY_FLOAT_COLUMNS: &[&str] = &[
    "distance",
    "total_elevation_gain",
    "average_speed",
    "max_speed",
    "average_cadence",
    "average_watts",
    "max_watts",
    "weighted_average_watts",
    "kilojoules",
    "average_heartrate",
    "max_heartrate",
    "elev_high",
    "elev_low",
    "suffer_score",
    "calories",
    "perceived_exertion",
    "gear_distance",
];

/// Lap columns kept in the warehouse, in load order.
pub const LAP_COLUMNS: &[&str] = &[
    "id",
    "resource_state",
    "name",
    "elapsed_time",
    "moving_time",
    "start_date",
    "start_date_local",
    "distance",
    "average_speed",
    "max_speed",
    "lap_index",
    "split",
    "start_index",
    "end_index",
    "total_elevation_gain",
    "average_cadence",
    "device_watts",
    "average_watts",
    "average_heartrate",
    "max_heartrate",
    "pace_zone",
    "activity_id",
    "activity_visibility",
    "activity_resource_state",
    "athlete_id",
    "athlete_resource_state",
];

/// Columns derived from each lap during transform.
pub const LAP_DERIVED_COLUMNS: &[&str] = &["start_day", "start_hour", "start_weekday"];

const LAP_DATE_COLUMNS: &[&str] = &["start_date", "start_date_local"];

const LAP_INT_COLUMNS: &[&str] = &[
    "id",
    "resource_state",
    "elapsed_time",
    "moving_time",
    "lap_index",
    "split",
    "start_index",
    "end_index",
    "pace_zone",
    "activity_id",
    "activity_resource_state",
    "athlete_id",
    "athlete_resource_state",
];

const LAP_FLOAT_COLUMNS: &[&str] = &[
    "distance",
    "average_speed",
    "max_speed",
    "total_elevation_gain",
    "average_cadence",
    "average_watts",
    "average_heartrate",
    "max_heartrate",
];

/// Transform a raw activity payload into a one-row frame.
pub fn transform_activity(activity: &Value) -> Result<Frame, AppError> {
    tracing::debug!("Transforming activity payload");

    let mut columns: Vec<String> = ACTIVITY_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(ACTIVITY_DERIVED_COLUMNS.iter().map(|c| c.to_string()));
    let mut frame = Frame::new(columns);

    let row = build_row(
        activity,
        ACTIVITY_COLUMNS,
        ACTIVITY_DATE_COLUMNS,
        ACTIVITY_INT_COLUMNS,
        ACTIVITY_FLOAT_COLUMNS,
        derive_activity_columns,
    )?;
    frame.push_row(row);

    tracing::debug!(
        columns = frame.columns().len(),
        "Transformed activity into frame"
    );
    Ok(frame)
}

/// Transform a raw laps payload (a JSON array) into a frame with one
/// row per lap.
pub fn transform_laps(laps: &Value) -> Result<Frame, AppError> {
    let laps = laps
        .as_array()
        .ok_or_else(|| AppError::BadRequest("laps payload is not an array".to_string()))?;
    tracing::debug!(laps = laps.len(), "Transforming laps payload");

    let mut columns: Vec<String> = LAP_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(LAP_DERIVED_COLUMNS.iter().map(|c| c.to_string()));
    let mut frame = Frame::new(columns);

    for lap in laps {
        let row = build_row(
            lap,
            LAP_COLUMNS,
            LAP_DATE_COLUMNS,
            LAP_INT_COLUMNS,
            LAP_FLOAT_COLUMNS,
            derive_lap_columns,
        )?;
        frame.push_row(row);
    }

    tracing::debug!(rows = frame.len(), "Transformed laps into frame");
    Ok(frame)
}

/// Flatten, select, coerce, and derive one row.
fn build_row(
    payload: &Value,
    allow_list: &[&'static str],
    date_columns: &[&str],
    int_columns: &[&str],
    float_columns: &[&str],
    derive: fn(&[(&'static str, Cell)]) -> Vec<Cell>,
) -> Result<Vec<Cell>, AppError> {
    let flat = flatten_json(payload);
    let selected = select_columns(&flat, allow_list)?;

    let mut named: Vec<(&'static str, Cell)> = Vec::with_capacity(selected.len());
    for (name, value) in selected {
        let cell = if date_columns.contains(&name) {
            timestamp_cell(name, value)?
        } else if int_columns.contains(&name) {
            int_cell(name, value)?
        } else if float_columns.contains(&name) {
            float_cell(name, value)?
        } else {
            infer_cell(value)
        };
        named.push((name, cell));
    }

    let mut row: Vec<Cell> = named.iter().map(|(_, c)| c.clone()).collect();
    row.extend(derive(&named));
    Ok(row)
}

fn cell_for<'a>(named: &'a [(&'static str, Cell)], name: &str) -> &'a Cell {
    named
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, c)| c)
        .unwrap_or(&Cell::Null)
}

/// elevation_change, day_of_week, hour, month.
fn derive_activity_columns(named: &[(&'static str, Cell)]) -> Vec<Cell> {
    let elevation_change = match (
        cell_for(named, "elev_high").as_f64(),
        cell_for(named, "elev_low").as_f64(),
    ) {
        (Some(high), Some(low)) => Cell::Float(high - low),
        _ => Cell::Null,
    };

    let local = cell_for(named, "start_date_local").as_timestamp();
    let day_of_week = local
        .map(|ts| Cell::Text(ts.format("%A").to_string()))
        .unwrap_or(Cell::Null);
    let hour = local
        .map(|ts| Cell::Int(i64::from(chrono::Timelike::hour(&ts))))
        .unwrap_or(Cell::Null);
    let month = local
        .map(|ts| Cell::Text(ts.format("%B").to_string()))
        .unwrap_or(Cell::Null);

    vec![elevation_change, day_of_week, hour, month]
}

/// start_day, start_hour, start_weekday (Monday = 0).
fn derive_lap_columns(named: &[(&'static str, Cell)]) -> Vec<Cell> {
    use chrono::{Datelike, Timelike};

    let local = cell_for(named, "start_date_local").as_timestamp();
    let start_day = local
        .map(|ts| Cell::Int(i64::from(ts.day())))
        .unwrap_or(Cell::Null);
    let start_hour = local
        .map(|ts| Cell::Int(i64::from(ts.hour())))
        .unwrap_or(Cell::Null);
    let start_weekday = local
        .map(|ts| Cell::Int(i64::from(ts.weekday().num_days_from_monday())))
        .unwrap_or(Cell::Null);

    vec![start_day, start_hour, start_weekday]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::fixtures;

    #[test]
    fn activity_frame_has_exactly_allow_listed_plus_derived_columns() {
        let frame = transform_activity(&fixtures::activity()).unwrap();

        let expected = ACTIVITY_COLUMNS.len() + ACTIVITY_DERIVED_COLUMNS.len();
        assert_eq!(frame.columns().len(), expected);
        assert_eq!(frame.len(), 1);

        // Allow-listed columns appear in declared order
        assert_eq!(frame.columns()[0], "resource_state");
        assert_eq!(frame.columns()[9], "id");
        // Column not on the allow-list is dropped
        assert!(frame.column_index("segment_efforts").is_none());
    }

    #[test]
    fn activity_elevation_change_is_high_minus_low() {
        let frame = transform_activity(&fixtures::activity()).unwrap();

        let high = frame.get(0, "elev_high").unwrap().as_f64().unwrap();
        let low = frame.get(0, "elev_low").unwrap().as_f64().unwrap();
        let change = frame.get(0, "elevation_change").unwrap().as_f64().unwrap();
        assert!((change - (high - low)).abs() < 1e-9);
    }

    #[test]
    fn activity_dates_are_parsed_and_time_features_derived() {
        let frame = transform_activity(&fixtures::activity()).unwrap();

        // Fixture start_date_local is 2024-03-08T06:12:04Z, a Friday
        assert!(frame.get(0, "start_date").unwrap().as_timestamp().is_some());
        assert_eq!(
            frame.get(0, "day_of_week").unwrap(),
            &Cell::Text("Friday".to_string())
        );
        assert_eq!(frame.get(0, "hour").unwrap(), &Cell::Int(6));
        assert_eq!(
            frame.get(0, "month").unwrap(),
            &Cell::Text("March".to_string())
        );
    }

    #[test]
    fn activity_numerics_are_coerced() {
        let frame = transform_activity(&fixtures::activity()).unwrap();

        assert!(matches!(frame.get(0, "moving_time").unwrap(), Cell::Int(_)));
        assert!(matches!(frame.get(0, "distance").unwrap(), Cell::Float(_)));
        assert!(matches!(frame.get(0, "athlete_id").unwrap(), Cell::Int(_)));
    }

    #[test]
    fn activity_missing_required_column_fails() {
        let mut raw = fixtures::activity();
        raw.as_object_mut().unwrap().remove("suffer_score");

        let err = transform_activity(&raw).unwrap_err();
        assert!(err.to_string().contains("suffer_score"));
    }

    #[test]
    fn laps_frame_has_one_row_per_lap() {
        let frame = transform_laps(&fixtures::laps()).unwrap();

        assert_eq!(frame.len(), 2);
        assert_eq!(
            frame.columns().len(),
            LAP_COLUMNS.len() + LAP_DERIVED_COLUMNS.len()
        );
    }

    #[test]
    fn lap_weekday_counts_from_monday() {
        let frame = transform_laps(&fixtures::laps()).unwrap();

        // Fixture laps start on a Friday
        assert_eq!(frame.get(0, "start_weekday").unwrap(), &Cell::Int(4));
        assert_eq!(frame.get(0, "start_day").unwrap(), &Cell::Int(8));
        assert_eq!(frame.get(0, "start_hour").unwrap(), &Cell::Int(6));
    }

    #[test]
    fn laps_payload_must_be_an_array() {
        let err = transform_laps(&serde_json::json!({"id": 1})).unwrap_err();
        assert!(err.to_string().contains("not an array"));
    }
}
