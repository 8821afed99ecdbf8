use crate::{
    classify::{classify, Nutrient, NutrientStatus},
    error::ModelError,
    regressor::Regressor,
    scaler::FeatureScaler,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const NITROGEN_FILE: &str = "model_nitrogen_rf.json";
pub const PHOSPHORUS_FILE: &str = "model_phosphorus_svr.json";
pub const POTASSIUM_FILE: &str = "model_potassium_xgb.json";
pub const SCALER_FILE: &str = "scaler_features.json";

/// Placeholder until the exported models carry calibrated scores.
pub const FIXED_CONFIDENCE: f64 = 0.85;

const REQUIRED_FILES: [(&str, &str); 4] = [
    ("nitrogen", NITROGEN_FILE),
    ("phosphorus", PHOSPHORUS_FILE),
    ("potassium", POTASSIUM_FILE),
    ("features_scaler", SCALER_FILE),
];

/// One value per nutrient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerNutrient<T> {
    pub nitrogen: T,
    pub phosphorus: T,
    pub potassium: T,
}

impl<T: Copy> PerNutrient<T> {
    pub fn splat(v: T) -> Self {
        Self { nitrogen: v, phosphorus: v, potassium: v }
    }

    pub fn map<U, F: Fn(Nutrient, T) -> U>(&self, f: F) -> PerNutrient<U> {
        PerNutrient {
            nitrogen: f(Nutrient::Nitrogen, self.nitrogen),
            phosphorus: f(Nutrient::Phosphorus, self.phosphorus),
            potassium: f(Nutrient::Potassium, self.potassium),
        }
    }
}

/// Output of one successful pass through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientPrediction {
    pub predictions: PerNutrient<f64>,
    pub status: PerNutrient<NutrientStatus>,
    pub confidence: PerNutrient<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub models_dir: PathBuf,
    pub files: Vec<String>,
    pub kinds: PerNutrient<&'static str>,
    pub n_features: usize,
}

/// Holds the three nutrient regressors and the shared feature scaler.
pub struct ModelManager {
    models_dir: PathBuf,
    nitrogen: Regressor,
    phosphorus: Regressor,
    potassium: Regressor,
    scaler: FeatureScaler,
}

impl ModelManager {
    /// Load every artifact from `models_dir`, failing on the first problem.
    ///
    /// # Errors
    ///
    /// [`ModelError::MissingFiles`] lists every absent artifact; read, parse and
    /// structural problems are reported for the first offending file.
    pub fn load(models_dir: impl AsRef<Path>) -> Result<Self, ModelError> {
        let dir = models_dir.as_ref();
        let models_dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        tracing::info!(dir = %models_dir.display(), exists = dir.exists(), "model directory");

        let missing: Vec<String> = REQUIRED_FILES
            .iter()
            .filter(|(_, file)| !dir.join(file).is_file())
            .map(|(key, file)| format!("{key} ({file})"))
            .collect();
        if !missing.is_empty() {
            let err = ModelError::MissingFiles(missing);
            tracing::error!("{err}");
            return Err(err);
        }

        let nitrogen = load_regressor(&dir.join(NITROGEN_FILE))?;
        tracing::info!(kind = nitrogen.kind(), "loaded nitrogen model");
        let phosphorus = load_regressor(&dir.join(PHOSPHORUS_FILE))?;
        tracing::info!(kind = phosphorus.kind(), "loaded phosphorus model");
        let potassium = load_regressor(&dir.join(POTASSIUM_FILE))?;
        tracing::info!(kind = potassium.kind(), "loaded potassium model");

        let scaler: FeatureScaler = read_json(&dir.join(SCALER_FILE))?;
        scaler.validate()?;
        tracing::info!(n_features = scaler.n_features(), "loaded feature scaler");

        Self::from_parts(models_dir, nitrogen, phosphorus, potassium, scaler)
    }

    pub fn from_parts(
        models_dir: PathBuf,
        nitrogen: Regressor,
        phosphorus: Regressor,
        potassium: Regressor,
        scaler: FeatureScaler,
    ) -> Result<Self, ModelError> {
        for (name, m) in [("nitrogen", &nitrogen), ("phosphorus", &phosphorus), ("potassium", &potassium)] {
            m.validate()?;
            if m.n_features() != scaler.n_features() {
                return Err(ModelError::Invalid(format!(
                    "{name} model expects {} features, scaler has {}",
                    m.n_features(),
                    scaler.n_features()
                )));
            }
        }
        Ok(Self { models_dir, nitrogen, phosphorus, potassium, scaler })
    }

    /// `[ndvi, chlorophyll]` plus each optional feature that is present, in order.
    pub fn assemble_features(
        ndvi: f64,
        chlorophyll: f64,
        latitude: Option<f64>,
        longitude: Option<f64>,
        day_of_year: Option<i64>,
    ) -> Vec<f64> {
        let mut x = Vec::with_capacity(5);
        x.push(ndvi);
        x.push(chlorophyll);
        x.extend(latitude);
        x.extend(longitude);
        x.extend(day_of_year.map(|d| d as f64));
        x
    }

    /// Run the full pipeline on one reading.
    pub fn predict(
        &self,
        ndvi: f64,
        chlorophyll: f64,
        latitude: Option<f64>,
        longitude: Option<f64>,
        day_of_year: Option<i64>,
    ) -> Result<NutrientPrediction, ModelError> {
        let x = Self::assemble_features(ndvi, chlorophyll, latitude, longitude, day_of_year);
        tracing::debug!(features = ?x, "features prepared");

        let scaled = self.scaler.transform(&x).map_err(|e| {
            tracing::error!(error = %e, "feature scaling failed");
            e
        })?;
        tracing::debug!(scaled = ?scaled, "features scaled");

        let predictions = PerNutrient {
            nitrogen: self.nitrogen.predict(&scaled)?,
            phosphorus: self.phosphorus.predict(&scaled)?,
            potassium: self.potassium.predict(&scaled)?,
        };
        tracing::info!(
            "predictions: N={:.2}, P={:.2}, K={:.2}",
            predictions.nitrogen, predictions.phosphorus, predictions.potassium
        );

        let status = predictions.map(|n, v| classify(v, n));
        tracing::info!(
            "status: N={}, P={}, K={}",
            status.nitrogen, status.phosphorus, status.potassium
        );

        Ok(NutrientPrediction {
            predictions,
            status,
            confidence: PerNutrient::splat(FIXED_CONFIDENCE),
        })
    }

    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            models_dir: self.models_dir.clone(),
            files: REQUIRED_FILES.iter().map(|(_, f)| f.to_string()).collect(),
            kinds: PerNutrient {
                nitrogen: self.nitrogen.kind(),
                phosphorus: self.phosphorus.kind(),
                potassium: self.potassium.kind(),
            },
            n_features: self.n_features(),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let txt = fs::read_to_string(path).map_err(|source| ModelError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&txt).map_err(|source| ModelError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_regressor(path: &Path) -> Result<Regressor, ModelError> {
    let m: Regressor = read_json(path)?;
    m.validate()?;
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regressor::{GradientBoosting, Kernel, RandomForest, RegressionTree, Svr};

    fn manager(n_features: usize) -> ModelManager {
        ModelManager::from_parts(
            PathBuf::from("mem"),
            Regressor::RandomForest(RandomForest {
                n_features,
                trees: vec![RegressionTree::leaf(100.0), RegressionTree::leaf(20.0)],
            }),
            Regressor::Svr(Svr {
                n_features,
                kernel: Kernel::Linear,
                support_vectors: vec![vec![1.0; n_features]],
                dual_coef: vec![0.0],
                intercept: 45.0,
            }),
            Regressor::GradientBoosting(GradientBoosting {
                n_features,
                base_score: 100.0,
                learning_rate: 1.0,
                trees: vec![RegressionTree::leaf(0.0)],
            }),
            FeatureScaler::new(vec![0.0; n_features], vec![1.0; n_features]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn assembles_optional_features_in_order() {
        assert_eq!(
            ModelManager::assemble_features(0.7, 30.0, Some(19.1), None, Some(150)),
            vec![0.7, 30.0, 19.1, 150.0]
        );
        assert_eq!(ModelManager::assemble_features(0.7, 30.0, None, None, None), vec![0.7, 30.0]);
    }

    #[test]
    fn predicts_and_classifies_all_three() {
        let m = manager(2);
        let out = m.predict(0.6, 35.0, None, None, None).unwrap();
        assert_eq!(out.predictions.nitrogen, 60.0);
        assert_eq!(out.predictions.phosphorus, 45.0);
        assert_eq!(out.predictions.potassium, 100.0);
        assert_eq!(out.status.nitrogen, NutrientStatus::Adequate);
        assert_eq!(out.status.phosphorus, NutrientStatus::Excess);
        assert_eq!(out.status.potassium, NutrientStatus::Deficient);
        assert_eq!(out.confidence, PerNutrient::splat(FIXED_CONFIDENCE));
    }

    #[test]
    fn feature_count_must_match_scaler() {
        let m = manager(5);
        let err = m.predict(0.6, 35.0, Some(1.0), None, None).unwrap_err();
        assert!(matches!(err, ModelError::FeatureMismatch { got: 3, expected: 5 }));
    }

    #[test]
    fn model_and_scaler_widths_must_agree() {
        let res = ModelManager::from_parts(
            PathBuf::from("mem"),
            Regressor::RandomForest(RandomForest { n_features: 3, trees: vec![RegressionTree::leaf(1.0)] }),
            Regressor::RandomForest(RandomForest { n_features: 2, trees: vec![RegressionTree::leaf(1.0)] }),
            Regressor::RandomForest(RandomForest { n_features: 2, trees: vec![RegressionTree::leaf(1.0)] }),
            FeatureScaler::new(vec![0.0; 2], vec![1.0; 2]).unwrap(),
        );
        assert!(matches!(res, Err(ModelError::Invalid(_))));
    }

    #[test]
    fn missing_directory_lists_all_files() {
        let dir = std::env::temp_dir().join("nutrient_predictor_no_such_dir");
        let err = ModelManager::load(&dir).err().unwrap();
        match err {
            ModelError::MissingFiles(files) => {
                assert_eq!(files.len(), 4);
                assert_eq!(files[0], "nitrogen (model_nitrogen_rf.json)");
                assert_eq!(files[3], "features_scaler (scaler_features.json)");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
