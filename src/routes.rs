use crate::{
    classify::Nutrient,
    db::{NewPrediction, NutrientRow, Store},
    error::ApiError,
    model::ModelManager,
    stats::Summary,
    types::{
        HealthResponse, HistoryResponse, PredictInput, PredictResponse, RecordView,
        StatisticsResponse,
    },
};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, sync::Arc};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 1000;
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub models: Arc<ModelManager>,
    pub store: Store,
}

impl AppState {
    pub fn new(models: ModelManager, store: Store) -> Self {
        Self { models: Arc::new(models), store }
    }
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/predict", post(predict))
        .route("/api/history", get(history))
        .route("/api/statistics", get(statistics))
        .route("/api/model-info", get(model_info))
        .fallback(not_found)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

// ---------- Query helpers ----------

/// Parse a non-negative integer query parameter, falling back to `default`.
///
/// Negative values take the default too: a negative `limit` does not mean
/// "unlimited" and a negative `days` does not mean an empty window.
fn int_param(params: &HashMap<String, String>, key: &str, default: i64) -> i64 {
    params
        .get(key)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .unwrap_or(default)
}

/// Start of a trailing window of `days` days ending now.
pub fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

// ---------- Handlers ----------

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    tracing::info!("health check");
    let db_ok = state.store.ping().await;
    Json(HealthResponse {
        status: if db_ok { "healthy" } else { "degraded" },
        message: "Backend is running",
        timestamp: Utc::now().to_rfc3339(),
        database: if db_ok { "connected" } else { "disconnected" },
    })
}

async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<PredictResponse>), ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::validation("No data provided"));
    }
    let raw: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("Invalid input format: {e}")))?;
    tracing::info!(payload = %raw, "received prediction request");

    let input = PredictInput::from_json(&raw)?;

    let result = state.models.predict(
        input.ndvi,
        input.chlorophyll,
        input.latitude,
        input.longitude,
        input.day_of_year,
    )?;

    let record = state
        .store
        .insert(&NewPrediction {
            ndvi: input.ndvi,
            chlorophyll: input.chlorophyll,
            latitude: input.latitude,
            longitude: input.longitude,
            day_of_year: input.day_of_year,
            result: &result,
            field_id: input.field_id.as_deref(),
            notes: input.notes.as_deref(),
        })
        .await
        .map_err(ApiError::Persistence)?;
    tracing::info!(id = record.id, "prediction saved");

    Ok((StatusCode::CREATED, Json(PredictResponse::new(&record, &input, result))))
}

async fn history(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<HistoryResponse>, ApiError> {
    // there is no unlimited value; large limits clamp to the cap
    let limit = int_param(&params, "limit", DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
    let days = int_param(&params, "days", DEFAULT_WINDOW_DAYS);
    let field_id = params.get("field_id").map(String::as_str).filter(|f| !f.is_empty());
    tracing::info!(limit, days, ?field_id, "history request");

    let rows = state
        .store
        .history(window_start(Utc::now(), days), limit, field_id)
        .await?;
    tracing::info!(count = rows.len(), "history rows found");

    Ok(Json(HistoryResponse {
        success: true,
        count: rows.len(),
        limit,
        days,
        data: rows.iter().map(RecordView::from).collect(),
    }))
}

async fn statistics(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let days = int_param(&params, "days", DEFAULT_WINDOW_DAYS);
    let rows = state
        .store
        .nutrient_values_since(window_start(Utc::now(), days))
        .await?;

    let summarize = |n: Nutrient| {
        let values: Vec<f64> = rows.iter().map(|r: &NutrientRow| match n {
            Nutrient::Nitrogen => r.nitrogen,
            Nutrient::Phosphorus => r.phosphorus,
            Nutrient::Potassium => r.potassium,
        }).collect();
        Summary::of(&values).map(|s| s.rounded(2))
    };

    let body = match (
        summarize(Nutrient::Nitrogen),
        summarize(Nutrient::Phosphorus),
        summarize(Nutrient::Potassium),
    ) {
        (Some(nitrogen), Some(phosphorus), Some(potassium)) => StatisticsResponse::Summary {
            success: true,
            count: rows.len(),
            nitrogen,
            phosphorus,
            potassium,
        },
        _ => StatisticsResponse::Empty {
            success: true,
            count: 0,
            message: "No predictions in this period",
        },
    };
    Ok(Json(body))
}

async fn model_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.models.info())
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn int_params_fall_back_to_default() {
        let params: HashMap<String, String> = [
            ("limit", "abc"),
            ("days", "-3"),
            ("other", "7"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(int_param(&params, "limit", 50), 50);
        assert_eq!(int_param(&params, "days", 30), 30);
        assert_eq!(int_param(&params, "other", 1), 7);
        assert_eq!(int_param(&params, "missing", 9), 9);
    }

    #[test]
    fn window_start_subtracts_days() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        assert_eq!(window_start(now, 30), Utc.with_ymd_and_hms(2026, 9, 19, 12, 0, 0).unwrap());
        assert_eq!(window_start(now, 0), now);
        assert_eq!(window_start(now, i64::MAX), DateTime::<Utc>::MIN_UTC);
    }
}
