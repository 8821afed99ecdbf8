//! Nutrient (N/P/K) estimation service for sugarcane fields.
//!
//! Sensor readings (NDVI, chlorophyll, optional location and day of year) are
//! scaled, passed through three pre-fitted regressors, banded against fixed
//! agronomic thresholds and stored in SQLite.

pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod regressor;
pub mod routes;
pub mod scaler;
pub mod stats;
pub mod types;

pub use classify::{classify, classify_named, Nutrient, NutrientStatus};
pub use config::AppConfig;
pub use db::Store;
pub use error::{ApiError, ModelError};
pub use model::{ModelManager, NutrientPrediction};
pub use routes::{router, AppState};
