//! SQLite persistence for prediction records.

use crate::{classify::NutrientStatus, model::NutrientPrediction};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ndvi REAL NOT NULL,
    chlorophyll REAL NOT NULL,
    latitude REAL,
    longitude REAL,
    day_of_year INTEGER,
    nitrogen REAL NOT NULL,
    phosphorus REAL NOT NULL,
    potassium REAL NOT NULL,
    nitrogen_status TEXT NOT NULL,
    phosphorus_status TEXT NOT NULL,
    potassium_status TEXT NOT NULL,
    nitrogen_confidence REAL,
    phosphorus_confidence REAL,
    potassium_confidence REAL,
    created_at TEXT NOT NULL,
    field_id VARCHAR(100),
    notes TEXT
);
CREATE INDEX IF NOT EXISTS idx_predictions_created_at ON predictions (created_at);
CREATE INDEX IF NOT EXISTS idx_predictions_field_id ON predictions (field_id);
"#;

const SELECT_COLUMNS: &str = "id, ndvi, chlorophyll, latitude, longitude, day_of_year, \
     nitrogen, phosphorus, potassium, nitrogen_status, phosphorus_status, potassium_status, \
     nitrogen_confidence, phosphorus_confidence, potassium_confidence, created_at, field_id, notes";

/// A stored prediction row.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PredictionRecord {
    pub id: i64,
    pub ndvi: f64,
    pub chlorophyll: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub day_of_year: Option<i64>,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub nitrogen_status: NutrientStatus,
    pub phosphorus_status: NutrientStatus,
    pub potassium_status: NutrientStatus,
    pub nitrogen_confidence: Option<f64>,
    pub phosphorus_confidence: Option<f64>,
    pub potassium_confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub field_id: Option<String>,
    pub notes: Option<String>,
}

/// Validated inputs plus the model output, ready to be written in one go.
#[derive(Debug, Clone)]
pub struct NewPrediction<'a> {
    pub ndvi: f64,
    pub chlorophyll: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub day_of_year: Option<i64>,
    pub result: &'a NutrientPrediction,
    pub field_id: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Nutrient columns of the rows inside a statistics window.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct NutrientRow {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database and make sure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database cannot be opened.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. It lives as long as its one connection, so
    /// that connection is never recycled.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for stmt in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Insert one prediction inside a transaction and return the stored row.
    /// Dropping the transaction on an error path rolls it back.
    pub async fn insert(&self, p: &NewPrediction<'_>) -> Result<PredictionRecord, sqlx::Error> {
        let r = p.result;
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, PredictionRecord>(&format!(
            "INSERT INTO predictions (
                ndvi, chlorophyll, latitude, longitude, day_of_year,
                nitrogen, phosphorus, potassium,
                nitrogen_status, phosphorus_status, potassium_status,
                nitrogen_confidence, phosphorus_confidence, potassium_confidence,
                created_at, field_id, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {SELECT_COLUMNS}"
        ))
        .bind(p.ndvi)
        .bind(p.chlorophyll)
        .bind(p.latitude)
        .bind(p.longitude)
        .bind(p.day_of_year)
        .bind(r.predictions.nitrogen)
        .bind(r.predictions.phosphorus)
        .bind(r.predictions.potassium)
        .bind(r.status.nitrogen)
        .bind(r.status.phosphorus)
        .bind(r.status.potassium)
        .bind(r.confidence.nitrogen)
        .bind(r.confidence.phosphorus)
        .bind(r.confidence.potassium)
        .bind(Utc::now())
        .bind(p.field_id)
        .bind(p.notes)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Rows created at or after `since`, newest first, at most `limit`.
    pub async fn history(
        &self,
        since: DateTime<Utc>,
        limit: i64,
        field_id: Option<&str>,
    ) -> Result<Vec<PredictionRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM predictions
             WHERE created_at >= ? AND (? IS NULL OR field_id = ?)
             ORDER BY created_at DESC, id DESC
             LIMIT ?"
        );
        sqlx::query_as::<_, PredictionRecord>(&sql)
            .bind(since)
            .bind(field_id)
            .bind(field_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn nutrient_values_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<NutrientRow>, sqlx::Error> {
        sqlx::query_as::<_, NutrientRow>(
            "SELECT nitrogen, phosphorus, potassium FROM predictions WHERE created_at >= ?",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM predictions")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Overwrite a row's timestamp to seed history windows in tests.
    #[cfg(any(test, feature = "test-support"))]
    pub async fn set_created_at(&self, id: i64, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE predictions SET created_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
