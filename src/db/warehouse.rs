// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Postgres warehouse client.
//!
//! Implements the load side of the pipeline:
//! - staged MERGE upserts by composite key (stage into a temp table,
//!   MERGE into the destination: update on match, insert otherwise)
//! - widening-only schema evolution (new columns observed in a frame
//!   are added to the destination, existing columns never change)
//! - the clustering queries used by the trainer and the labelers

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use std::collections::HashSet;

use crate::error::AppError;
use crate::etl::frame::{Cell, Frame};

pub const CLUSTERING_DATA_TABLE: &str = "clustering_data";
pub const CLUSTERING_LABELS_TABLE: &str = "clustering_labels";

/// Warehouse connection pool.
#[derive(Clone)]
pub struct Warehouse {
    pool: Option<PgPool>,
    /// Fixed clustering feature rows served instead of querying
    /// (test builds only).
    #[cfg(test)]
    fake_features: Option<Vec<[f64; 3]>>,
}

impl Warehouse {
    /// Connect to the warehouse.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| AppError::Warehouse(format!("Failed to connect: {}", e)))?;

        Ok(Self {
            pool: Some(pool),
            #[cfg(test)]
            fake_features: None,
        })
    }

    /// Create a mock warehouse for testing (offline mode).
    ///
    /// All operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            pool: None,
            #[cfg(test)]
            fake_features: None,
        }
    }

    /// Warehouse serving a fixed clustering feature set (test builds
    /// only). Every other operation still errors as offline.
    #[cfg(test)]
    pub fn new_fake(features: Vec<[f64; 3]>) -> Self {
        Self {
            pool: None,
            fake_features: Some(features),
        }
    }

    fn pool(&self) -> Result<&PgPool, AppError> {
        self.pool.as_ref().ok_or_else(|| {
            AppError::Warehouse("Warehouse not connected (offline mode)".to_string())
        })
    }

    // ─── Frame Loading ───────────────────────────────────────────

    /// Upsert a frame into `table` by the given composite key.
    ///
    /// Creates the destination if needed, widens its schema with any
    /// new columns, stages the rows into a temp table, and MERGEs the
    /// stage into the destination on the key columns.
    pub async fn merge_frame(
        &self,
        table: &str,
        key_columns: &[&str],
        frame: &Frame,
    ) -> Result<(), AppError> {
        if frame.is_empty() {
            tracing::debug!(table, "Skipping merge of empty frame");
            return Ok(());
        }

        let pool = self.pool()?;
        let types = column_types(frame);

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| AppError::Warehouse(e.to_string()))?;

        // Destination: create if missing, then widen with new columns
        sqlx::query(&build_create_table_sql(table, frame.columns(), &types))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Warehouse(format!("create {}: {}", table, e)))?;

        let existing: HashSet<String> = sqlx::query(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1",
        )
        .bind(table)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::Warehouse(format!("columns of {}: {}", table, e)))?
        .into_iter()
        .map(|row| row.get::<String, _>(0))
        .collect();

        for (column, ty) in frame.columns().iter().zip(&types) {
            if !existing.contains(column) {
                tracing::info!(table, column = %column, "Widening schema with new column");
                sqlx::query(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    quote_ident(table),
                    quote_ident(column),
                    ty.sql_name()
                ))
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Warehouse(format!("widen {}: {}", table, e)))?;
            }
        }

        // Stage
        let stage = format!("stage_{}", table);
        sqlx::query(&build_create_stage_sql(&stage, frame.columns(), &types))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Warehouse(format!("create stage: {}", e)))?;

        let insert_sql = build_insert_sql(&stage, frame.columns());
        for row in frame.rows() {
            let mut query = sqlx::query(&insert_sql);
            for (cell, ty) in row.iter().zip(&types) {
                query = bind_cell(query, cell, *ty);
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Warehouse(format!("stage insert: {}", e)))?;
        }

        // Merge stage into destination on the composite key
        let merge_sql = build_merge_sql(table, &stage, frame.columns(), key_columns);
        sqlx::query(&merge_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Warehouse(format!("merge into {}: {}", table, e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Warehouse(e.to_string()))?;

        tracing::info!(table, rows = frame.len(), "Merged frame into warehouse");
        Ok(())
    }

    // ─── Clustering Queries ──────────────────────────────────────

    /// Rebuild `clustering_data` from the activities table
    /// (truncate-load): runs longer than 100 meters, projected onto
    /// the feature columns.
    pub async fn rebuild_clustering_data(&self) -> Result<u64, AppError> {
        let pool = self.pool()?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS clustering_data (\
             id BIGINT, \
             distance DOUBLE PRECISION, \
             moving_time DOUBLE PRECISION, \
             suffer_score DOUBLE PRECISION)",
        )
        .execute(pool)
        .await
        .map_err(|e| AppError::Warehouse(e.to_string()))?;

        sqlx::query("TRUNCATE clustering_data")
            .execute(pool)
            .await
            .map_err(|e| AppError::Warehouse(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO clustering_data (id, distance, moving_time, suffer_score) \
             SELECT id, distance::double precision, moving_time::double precision, \
                    suffer_score::double precision \
             FROM activities WHERE distance > 100",
        )
        .execute(pool)
        .await
        .map_err(|e| AppError::Warehouse(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Read the full clustering feature set.
    ///
    /// Rows with a NULL feature are excluded; the scaler and k-means
    /// fit cannot take missing values.
    pub async fn clustering_features(&self) -> Result<Vec<[f64; 3]>, AppError> {
        #[cfg(test)]
        if let Some(features) = &self.fake_features {
            return Ok(features.clone());
        }

        let pool = self.pool()?;

        let rows = sqlx::query(
            "SELECT distance, moving_time, suffer_score FROM clustering_data \
             WHERE distance IS NOT NULL \
               AND moving_time IS NOT NULL \
               AND suffer_score IS NOT NULL",
        )
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::Warehouse(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                [
                    row.get::<f64, _>(0),
                    row.get::<f64, _>(1),
                    row.get::<f64, _>(2),
                ]
            })
            .collect())
    }

    /// Read every clustering row eligible for labeling, with its ID.
    pub async fn label_rows(&self) -> Result<Vec<LabelRow>, AppError> {
        let pool = self.pool()?;

        let rows = sqlx::query(
            "SELECT id, distance, moving_time, suffer_score FROM clustering_data \
             WHERE distance IS NOT NULL \
               AND moving_time IS NOT NULL \
               AND suffer_score IS NOT NULL",
        )
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::Warehouse(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| LabelRow {
                id: row.get::<i64, _>(0),
                features: [
                    row.get::<f64, _>(1),
                    row.get::<f64, _>(2),
                    row.get::<f64, _>(3),
                ],
            })
            .collect())
    }

    /// The most recent activity row with its clustering features.
    pub async fn latest_activity(&self) -> Result<Option<LatestRun>, AppError> {
        let pool = self.pool()?;

        let row = sqlx::query(
            "SELECT id, start_date, distance::double precision, \
                    moving_time::double precision, suffer_score::double precision \
             FROM activities ORDER BY start_date DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::Warehouse(e.to_string()))?;

        Ok(row.map(|row| LatestRun {
            id: row.get::<i64, _>(0),
            start_date: row.get::<DateTime<Utc>, _>(1),
            distance: row.get::<Option<f64>, _>(2),
            moving_time: row.get::<Option<f64>, _>(3),
            suffer_score: row.get::<Option<f64>, _>(4),
        }))
    }
}

/// One clustering row read back for labeling.
#[derive(Debug, Clone)]
pub struct LabelRow {
    pub id: i64,
    pub features: [f64; 3],
}

/// The most recent activity projected onto the clustering features.
#[derive(Debug, Clone)]
pub struct LatestRun {
    pub id: i64,
    pub start_date: DateTime<Utc>,
    pub distance: Option<f64>,
    pub moving_time: Option<f64>,
    pub suffer_score: Option<f64>,
}

// ─── SQL Building ────────────────────────────────────────────────

/// SQL column types a frame cell can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Bool,
    BigInt,
    Double,
    Text,
    Timestamp,
}

impl SqlType {
    fn sql_name(self) -> &'static str {
        match self {
            SqlType::Bool => "BOOLEAN",
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Text => "TEXT",
            SqlType::Timestamp => "TIMESTAMPTZ",
        }
    }
}

/// Infer each column's SQL type from its first non-null cell.
/// All-null columns default to TEXT.
pub fn column_types(frame: &Frame) -> Vec<SqlType> {
    (0..frame.columns().len())
        .map(|idx| {
            frame
                .rows()
                .iter()
                .find_map(|row| match &row[idx] {
                    Cell::Null => None,
                    Cell::Bool(_) => Some(SqlType::Bool),
                    Cell::Int(_) => Some(SqlType::BigInt),
                    Cell::Float(_) => Some(SqlType::Double),
                    Cell::Text(_) => Some(SqlType::Text),
                    Cell::Timestamp(_) => Some(SqlType::Timestamp),
                })
                .unwrap_or(SqlType::Text)
        })
        .collect()
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn build_create_table_sql(table: &str, columns: &[String], types: &[SqlType]) -> String {
    let defs = columns
        .iter()
        .zip(types)
        .map(|(c, t)| format!("{} {}", quote_ident(c), t.sql_name()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_ident(table), defs)
}

fn build_create_stage_sql(stage: &str, columns: &[String], types: &[SqlType]) -> String {
    let defs = columns
        .iter()
        .zip(types)
        .map(|(c, t)| format!("{} {}", quote_ident(c), t.sql_name()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TEMP TABLE {} ({}) ON COMMIT DROP",
        quote_ident(stage),
        defs
    )
}

fn build_insert_sql(stage: &str, columns: &[String]) -> String {
    let placeholders = (1..=columns.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(stage),
        column_list(columns),
        placeholders
    )
}

/// MERGE the stage into the destination: match on the composite key,
/// update every non-key column on match, insert the whole row
/// otherwise. The second load of the same key wins.
pub fn build_merge_sql(
    table: &str,
    stage: &str,
    columns: &[String],
    key_columns: &[&str],
) -> String {
    let on = key_columns
        .iter()
        .map(|k| format!("t.{} = s.{}", quote_ident(k), quote_ident(k)))
        .collect::<Vec<_>>()
        .join(" AND ");

    let updates = columns
        .iter()
        .filter(|c| !key_columns.contains(&c.as_str()))
        .map(|c| format!("{} = s.{}", quote_ident(c), quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");

    let insert_values = columns
        .iter()
        .map(|c| format!("s.{}", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "MERGE INTO {table} AS t USING {stage} AS s ON {on} \
         WHEN MATCHED THEN UPDATE SET {updates} \
         WHEN NOT MATCHED THEN INSERT ({columns}) VALUES ({insert_values})",
        table = quote_ident(table),
        stage = quote_ident(stage),
        on = on,
        updates = updates,
        columns = column_list(columns),
        insert_values = insert_values,
    )
}

/// Bind one cell, using the column's type for NULLs so Postgres can
/// infer the placeholder type.
fn bind_cell<'q>(
    query: Query<'q, Postgres, PgArguments>,
    cell: &'q Cell,
    ty: SqlType,
) -> Query<'q, Postgres, PgArguments> {
    match cell {
        Cell::Bool(b) => query.bind(*b),
        Cell::Int(i) => query.bind(*i),
        Cell::Float(f) => query.bind(*f),
        Cell::Text(s) => query.bind(s.as_str()),
        Cell::Timestamp(ts) => query.bind(*ts),
        Cell::Null => match ty {
            SqlType::Bool => query.bind(None::<bool>),
            SqlType::BigInt => query.bind(None::<i64>),
            SqlType::Double => query.bind(None::<f64>),
            SqlType::Text => query.bind(None::<String>),
            SqlType::Timestamp => query.bind(None::<DateTime<Utc>>),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        let mut frame = Frame::new(vec![
            "athlete_id".to_string(),
            "id".to_string(),
            "distance".to_string(),
            "name".to_string(),
        ]);
        frame.push_row(vec![
            Cell::Int(7),
            Cell::Int(100),
            Cell::Float(8012.5),
            Cell::Text("Morning Run".to_string()),
        ]);
        frame.push_row(vec![
            Cell::Int(7),
            Cell::Int(101),
            Cell::Null,
            Cell::Text("Evening Run".to_string()),
        ]);
        frame
    }

    #[test]
    fn column_types_from_first_non_null_cell() {
        let frame = sample_frame();
        let types = column_types(&frame);
        assert_eq!(
            types,
            vec![
                SqlType::BigInt,
                SqlType::BigInt,
                SqlType::Double,
                SqlType::Text
            ]
        );
    }

    #[test]
    fn all_null_column_defaults_to_text() {
        let mut frame = Frame::new(vec!["a".to_string()]);
        frame.push_row(vec![Cell::Null]);
        assert_eq!(column_types(&frame), vec![SqlType::Text]);
    }

    #[test]
    fn create_table_sql_quotes_identifiers() {
        let frame = sample_frame();
        let sql = build_create_table_sql("activities", frame.columns(), &column_types(&frame));
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"activities\""));
        assert!(sql.contains("\"distance\" DOUBLE PRECISION"));
    }

    #[test]
    fn merge_sql_matches_on_every_key_column() {
        let frame = sample_frame();
        let sql = build_merge_sql(
            "activities",
            "stage_activities",
            frame.columns(),
            &["athlete_id", "id"],
        );

        assert!(sql.contains("ON t.\"athlete_id\" = s.\"athlete_id\" AND t.\"id\" = s.\"id\""));
    }

    #[test]
    fn merge_sql_updates_only_non_key_columns() {
        let frame = sample_frame();
        let sql = build_merge_sql(
            "activities",
            "stage_activities",
            frame.columns(),
            &["athlete_id", "id"],
        );

        let update_clause = sql
            .split("WHEN MATCHED THEN UPDATE SET ")
            .nth(1)
            .unwrap()
            .split(" WHEN NOT MATCHED")
            .next()
            .unwrap();
        assert!(update_clause.contains("\"distance\" = s.\"distance\""));
        assert!(update_clause.contains("\"name\" = s.\"name\""));
        assert!(!update_clause.contains("\"athlete_id\" ="));
        assert!(!update_clause.contains("\"id\" ="));
    }

    #[test]
    fn merge_sql_inserts_full_row_when_unmatched() {
        let frame = sample_frame();
        let sql = build_merge_sql(
            "laps",
            "stage_laps",
            frame.columns(),
            &["athlete_id", "id"],
        );

        assert!(sql.contains(
            "WHEN NOT MATCHED THEN INSERT (\"athlete_id\", \"id\", \"distance\", \"name\") \
             VALUES (s.\"athlete_id\", s.\"id\", s.\"distance\", s.\"name\")"
        ));
    }

    #[test]
    fn insert_sql_has_one_placeholder_per_column() {
        let frame = sample_frame();
        let sql = build_insert_sql("stage_activities", frame.columns());
        assert!(sql.ends_with("VALUES ($1, $2, $3, $4)"));
    }

    #[tokio::test]
    async fn mock_warehouse_rejects_operations() {
        let warehouse = Warehouse::new_mock();
        let err = warehouse.clustering_features().await.unwrap_err();
        assert!(err.to_string().contains("offline"));
    }
}
