use crate::error::ModelError;
use serde::Deserialize;

/// Standard scaler exported from the training pipeline: `(x - mean) / scale`.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl FeatureScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        let s = Self { mean, scale };
        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.mean.is_empty() {
            return Err(ModelError::Invalid("scaler has no features".into()));
        }
        if self.mean.len() != self.scale.len() {
            return Err(ModelError::Invalid(format!(
                "scaler mean/scale length mismatch: {} vs {}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err(ModelError::Invalid("scaler contains non-finite values".into()));
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        if x.len() != self.n_features() {
            return Err(ModelError::FeatureMismatch {
                got: x.len(),
                expected: self.n_features(),
            });
        }
        Ok(x.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| {
                // constant features were fitted with zero variance
                let s = if *s == 0.0 { 1.0 } else { *s };
                (v - m) / s
            })
            .collect())
    }
}
