use crate::{
    classify::NutrientStatus,
    db::PredictionRecord,
    error::ApiError,
    model::{NutrientPrediction, PerNutrient},
    stats::{round_to, Summary},
};
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_FIELD_ID: &str = "UNKNOWN";
pub const MAX_FIELD_ID_LEN: usize = 100;

// ---------- Request ----------

/// A validated `POST /api/predict` body.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictInput {
    pub ndvi: f64,
    pub chlorophyll: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub day_of_year: Option<i64>,
    pub field_id: Option<String>,
    pub notes: Option<String>,
}

impl PredictInput {
    /// Parse and range-check a raw JSON body.
    ///
    /// Numbers may arrive as JSON numbers or numeric strings; an explicit
    /// `null` on an optional field counts as absent.
    pub fn from_json(body: &Value) -> Result<Self, ApiError> {
        let obj = match body.as_object() {
            Some(o) if !o.is_empty() => o,
            _ => return Err(ApiError::validation("No data provided")),
        };
        if !obj.contains_key("ndvi") || !obj.contains_key("chlorophyll") {
            return Err(ApiError::validation("Missing required fields: ndvi, chlorophyll"));
        }

        let ndvi = required_f64(obj, "ndvi")?;
        let chlorophyll = required_f64(obj, "chlorophyll")?;
        let latitude = optional(obj, "latitude", as_f64)?;
        let longitude = optional(obj, "longitude", as_f64)?;
        let day_of_year = optional(obj, "day_of_year", as_i64)?;
        let field_id = match obj.get("field_id") {
            None => Some(DEFAULT_FIELD_ID.to_string()),
            Some(v) => as_text(v),
        };
        let notes = match obj.get("notes") {
            None => Some(String::new()),
            Some(v) => as_text(v),
        };

        if !(0.0..=1.0).contains(&ndvi) {
            return Err(ApiError::validation("NDVI must be between 0 and 1"));
        }
        if chlorophyll < 0.0 {
            return Err(ApiError::validation("Chlorophyll must be non-negative"));
        }
        if field_id.as_ref().is_some_and(|f| f.chars().count() > MAX_FIELD_ID_LEN) {
            return Err(ApiError::validation(format!(
                "field_id must be at most {MAX_FIELD_ID_LEN} characters"
            )));
        }

        Ok(Self { ndvi, chlorophyll, latitude, longitude, day_of_year, field_id, notes })
    }
}

fn invalid(key: &str, what: &str, v: &Value) -> ApiError {
    ApiError::validation(format!("Invalid input format: {key} must be {what}, got {v}"))
}

fn as_f64(key: &str, v: &Value) -> Result<f64, ApiError> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(x) if x.is_finite() => Ok(x),
        _ => Err(invalid(key, "a number", v)),
    }
}

fn as_i64(key: &str, v: &Value) -> Result<i64, ApiError> {
    let parsed = match v {
        // floats truncate toward zero; strings must be integral
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && f.abs() < 1e15).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(key, "an integer", v))
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn required_f64(obj: &Map<String, Value>, key: &str) -> Result<f64, ApiError> {
    match obj.get(key) {
        Some(v) => as_f64(key, v),
        None => Err(ApiError::validation("Missing required fields: ndvi, chlorophyll")),
    }
}

fn optional<T>(
    obj: &Map<String, Value>,
    key: &str,
    parse: fn(&str, &Value) -> Result<T, ApiError>,
) -> Result<Option<T>, ApiError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse(key, v).map(Some),
    }
}

// ---------- Responses ----------

#[derive(Debug, Serialize)]
pub struct PredictInputsEcho {
    pub ndvi: f64,
    pub chlorophyll: f64,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub prediction_id: i64,
    pub timestamp: String,
    pub inputs: PredictInputsEcho,
    pub predictions: PerNutrient<f64>,
    pub status: PerNutrient<NutrientStatus>,
    pub confidence: PerNutrient<f64>,
    pub message: &'static str,
}

impl PredictResponse {
    pub fn new(record: &PredictionRecord, input: &PredictInput, result: NutrientPrediction) -> Self {
        Self {
            success: true,
            prediction_id: record.id,
            timestamp: record.created_at.to_rfc3339(),
            inputs: PredictInputsEcho { ndvi: input.ndvi, chlorophyll: input.chlorophyll },
            predictions: result.predictions,
            status: result.status,
            confidence: result.confidence,
            message: "Prediction completed successfully",
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RecordInputs {
    pub ndvi: f64,
    pub chlorophyll: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub day_of_year: Option<i64>,
}

/// Stored row as returned by the history endpoint, values rounded for display.
#[derive(Debug, Serialize, PartialEq)]
pub struct RecordView {
    pub id: i64,
    pub inputs: RecordInputs,
    pub predictions: PerNutrient<f64>,
    pub status: PerNutrient<NutrientStatus>,
    pub confidence: PerNutrient<Option<f64>>,
    pub created_at: String,
    pub field_id: Option<String>,
    pub notes: Option<String>,
}

impl From<&PredictionRecord> for RecordView {
    fn from(r: &PredictionRecord) -> Self {
        let round4 = |v: Option<f64>| v.map(|x| round_to(x, 4));
        Self {
            id: r.id,
            inputs: RecordInputs {
                ndvi: round_to(r.ndvi, 4),
                chlorophyll: round_to(r.chlorophyll, 2),
                latitude: round4(r.latitude),
                longitude: round4(r.longitude),
                day_of_year: r.day_of_year,
            },
            predictions: PerNutrient {
                nitrogen: round_to(r.nitrogen, 2),
                phosphorus: round_to(r.phosphorus, 2),
                potassium: round_to(r.potassium, 2),
            },
            status: PerNutrient {
                nitrogen: r.nitrogen_status,
                phosphorus: r.phosphorus_status,
                potassium: r.potassium_status,
            },
            confidence: PerNutrient {
                nitrogen: round4(r.nitrogen_confidence),
                phosphorus: round4(r.phosphorus_confidence),
                potassium: round4(r.potassium_confidence),
            },
            created_at: r.created_at.to_rfc3339(),
            field_id: r.field_id.clone(),
            notes: r.notes.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub count: usize,
    pub limit: i64,
    pub days: i64,
    pub data: Vec<RecordView>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StatisticsResponse {
    Empty {
        success: bool,
        count: usize,
        message: &'static str,
    },
    Summary {
        success: bool,
        count: usize,
        nitrogen: Summary,
        phosphorus: Summary,
        potassium: Summary,
    },
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub database: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn msg(body: Value) -> String {
        PredictInput::from_json(&body).unwrap_err().to_string()
    }

    #[test]
    fn parses_full_payload() {
        let input = PredictInput::from_json(&json!({
            "ndvi": 0.75, "chlorophyll": "35.5", "latitude": 19.1136,
            "longitude": 72.8697, "day_of_year": 150, "field_id": "FIELD_001"
        }))
        .unwrap();
        assert_eq!(input.ndvi, 0.75);
        assert_eq!(input.chlorophyll, 35.5);
        assert_eq!(input.latitude, Some(19.1136));
        assert_eq!(input.day_of_year, Some(150));
        assert_eq!(input.field_id.as_deref(), Some("FIELD_001"));
        assert_eq!(input.notes.as_deref(), Some(""));
    }

    #[test]
    fn defaults_and_nulls() {
        let input = PredictInput::from_json(&json!({
            "ndvi": 0, "chlorophyll": 0, "latitude": null, "notes": null
        }))
        .unwrap();
        assert_eq!(input.latitude, None);
        assert_eq!(input.field_id.as_deref(), Some(DEFAULT_FIELD_ID));
        assert_eq!(input.notes, None);
    }

    #[test]
    fn validation_messages() {
        assert_eq!(msg(json!({})), "No data provided");
        assert_eq!(msg(json!(null)), "No data provided");
        assert_eq!(msg(json!([1, 2])), "No data provided");
        assert_eq!(msg(json!({"ndvi": 0.5})), "Missing required fields: ndvi, chlorophyll");
        assert_eq!(msg(json!({"ndvi": 1.01, "chlorophyll": 3})), "NDVI must be between 0 and 1");
        assert_eq!(msg(json!({"ndvi": -0.1, "chlorophyll": 3})), "NDVI must be between 0 and 1");
        assert_eq!(
            msg(json!({"ndvi": 0.5, "chlorophyll": -0.01})),
            "Chlorophyll must be non-negative"
        );
        assert!(msg(json!({"ndvi": "abc", "chlorophyll": 3})).starts_with("Invalid input format"));
        assert!(msg(json!({"ndvi": true, "chlorophyll": 3})).starts_with("Invalid input format"));
        assert!(msg(json!({"ndvi": 0.5, "chlorophyll": 3, "day_of_year": "150.5"}))
            .starts_with("Invalid input format"));
        assert!(msg(json!({"ndvi": 0.5, "chlorophyll": 3, "day_of_year": 1e20}))
            .starts_with("Invalid input format"));
    }

    #[test]
    fn ndvi_bounds_are_inclusive() {
        assert!(PredictInput::from_json(&json!({"ndvi": 0.0, "chlorophyll": 1})).is_ok());
        assert!(PredictInput::from_json(&json!({"ndvi": 1.0, "chlorophyll": 1})).is_ok());
    }

    #[test]
    fn integral_float_day_is_accepted() {
        let input =
            PredictInput::from_json(&json!({"ndvi": 0.5, "chlorophyll": 3, "day_of_year": 200.0}))
                .unwrap();
        assert_eq!(input.day_of_year, Some(200));
    }

    #[test]
    fn fractional_day_is_truncated() {
        let input =
            PredictInput::from_json(&json!({"ndvi": 0.5, "chlorophyll": 3, "day_of_year": 150.7}))
                .unwrap();
        assert_eq!(input.day_of_year, Some(150));
        let input =
            PredictInput::from_json(&json!({"ndvi": 0.5, "chlorophyll": 3, "day_of_year": -2.9}))
                .unwrap();
        assert_eq!(input.day_of_year, Some(-2));
    }

    #[test]
    fn long_field_id_is_rejected() {
        let long = "x".repeat(MAX_FIELD_ID_LEN + 1);
        let m = msg(json!({"ndvi": 0.5, "chlorophyll": 3, "field_id": long}));
        assert!(m.contains("field_id"));
    }

    #[test]
    fn record_view_rounds_values() {
        let rec = PredictionRecord {
            id: 7,
            ndvi: 0.123456,
            chlorophyll: 35.555,
            latitude: Some(19.113612),
            longitude: None,
            day_of_year: Some(150),
            nitrogen: 101.2345,
            phosphorus: 30.0,
            potassium: 210.499,
            nitrogen_status: NutrientStatus::Adequate,
            phosphorus_status: NutrientStatus::Adequate,
            potassium_status: NutrientStatus::Adequate,
            nitrogen_confidence: Some(0.85),
            phosphorus_confidence: None,
            potassium_confidence: Some(0.85),
            created_at: Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap(),
            field_id: Some("F1".into()),
            notes: None,
        };
        let v = serde_json::to_value(RecordView::from(&rec)).unwrap();
        assert_eq!(v["inputs"]["ndvi"], json!(0.1235));
        assert_eq!(v["inputs"]["latitude"], json!(19.1136));
        assert_eq!(v["inputs"]["longitude"], Value::Null);
        assert_eq!(v["predictions"]["nitrogen"], json!(101.23));
        assert_eq!(v["predictions"]["potassium"], json!(210.5));
        assert_eq!(v["status"]["nitrogen"], json!("Adequate"));
        assert_eq!(v["confidence"]["phosphorus"], Value::Null);
        assert_eq!(v["created_at"], json!("2026-10-19T10:00:00+00:00"));
    }

    #[test]
    fn empty_statistics_shape() {
        let v = serde_json::to_value(StatisticsResponse::Empty {
            success: true,
            count: 0,
            message: "No predictions in this period",
        })
        .unwrap();
        assert_eq!(v, json!({"success": true, "count": 0, "message": "No predictions in this period"}));
    }
}
