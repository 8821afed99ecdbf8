use serde::{Deserialize, Serialize};
use std::fmt;

/// The three nutrients estimated per reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nutrient {
    Nitrogen,
    Phosphorus,
    Potassium,
}

impl Nutrient {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nitrogen => "nitrogen",
            Self::Phosphorus => "phosphorus",
            Self::Potassium => "potassium",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nitrogen" => Some(Self::Nitrogen),
            "phosphorus" => Some(Self::Phosphorus),
            "potassium" => Some(Self::Potassium),
            _ => None,
        }
    }

    /// `(low, high)` band edges; values in `[low, high]` are adequate.
    pub fn thresholds(self) -> (f64, f64) {
        match self {
            Self::Nitrogen => (50.0, 150.0),
            Self::Phosphorus => (20.0, 40.0),
            Self::Potassium => (150.0, 300.0),
        }
    }
}

/// Status band of a nutrient estimate. Stored as text in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum NutrientStatus {
    Deficient,
    Adequate,
    Excess,
    Unknown,
}

impl NutrientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deficient => "Deficient",
            Self::Adequate => "Adequate",
            Self::Excess => "Excess",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for NutrientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band a value for a known nutrient.
pub fn classify(value: f64, nutrient: Nutrient) -> NutrientStatus {
    let (low, high) = nutrient.thresholds();
    if value < low {
        NutrientStatus::Deficient
    } else if value > high {
        NutrientStatus::Excess
    } else {
        NutrientStatus::Adequate
    }
}

/// Band a value by nutrient name; unrecognised names yield `Unknown`.
pub fn classify_named(value: f64, nutrient: &str) -> NutrientStatus {
    match Nutrient::from_name(nutrient) {
        Some(n) => classify(value, n),
        None => NutrientStatus::Unknown,
    }
}
