//! Pre-fitted regressors exported to JSON.
//!
//! Inference only: trees are stored in parallel-array form (one entry per
//! node, negative `feature` marks a leaf) and kernel machines as support
//! vectors with dual coefficients. Each artifact is tagged with its `kind`.

use crate::error::ModelError;
use serde::Deserialize;

/// One regression tree in parallel-array form.
#[derive(Debug, Clone, Deserialize)]
pub struct RegressionTree {
    feature: Vec<i32>,
    threshold: Vec<f64>,
    left: Vec<i32>,
    right: Vec<i32>,
    value: Vec<f64>,
}

impl RegressionTree {
    pub fn from_arrays(
        feature: Vec<i32>,
        threshold: Vec<f64>,
        left: Vec<i32>,
        right: Vec<i32>,
        value: Vec<f64>,
    ) -> Self {
        Self { feature, threshold, left, right, value }
    }

    /// A single-node tree that always predicts `value`.
    pub fn leaf(value: f64) -> Self {
        Self::from_arrays(vec![-2], vec![0.0], vec![-1], vec![-1], vec![value])
    }

    fn n_nodes(&self) -> usize {
        self.feature.len()
    }

    /// Children must point forward so traversal always terminates.
    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        let n = self.n_nodes();
        if n == 0 {
            return Err(ModelError::Invalid("tree has no nodes".into()));
        }
        if self.threshold.len() != n || self.left.len() != n || self.right.len() != n || self.value.len() != n {
            return Err(ModelError::Invalid("inconsistent tree array lengths".into()));
        }
        for i in 0..n {
            let f = self.feature[i];
            if f < 0 {
                continue;
            }
            if f as usize >= n_features {
                return Err(ModelError::Invalid(format!(
                    "node {i} splits on feature {f}, model has {n_features}"
                )));
            }
            for child in [self.left[i], self.right[i]] {
                if child <= i as i32 || child as usize >= n {
                    return Err(ModelError::Invalid(format!(
                        "node {i} has invalid child index {child}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Walk from the root; `x[feature] <= threshold` goes left.
    #[allow(clippy::cast_sign_loss)]
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            let f = self.feature[idx];
            if f < 0 {
                return self.value[idx];
            }
            let v = x.get(f as usize).copied().unwrap_or(0.0);
            idx = if v <= self.threshold[idx] {
                self.left[idx] as usize
            } else {
                self.right[idx] as usize
            };
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl RandomForest {
    fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("empty forest".into()));
        }
        self.trees.iter().try_for_each(|t| t.validate(self.n_features))
    }

    /// Mean of the trees' leaf values.
    pub fn predict(&self, x: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        sum / self.trees.len() as f64
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
    Poly { gamma: f64, coef0: f64, degree: i32 },
}

impl Kernel {
    fn eval(&self, a: &[f64], b: &[f64]) -> f64 {
        match *self {
            Self::Linear => dot(a, b),
            Self::Rbf { gamma } => {
                let d2: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * d2).exp()
            }
            Self::Poly { gamma, coef0, degree } => (gamma * dot(a, b) + coef0).powi(degree),
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Epsilon-SVR decision function: `Σ dual_coef[i] * K(sv[i], x) + intercept`.
#[derive(Debug, Clone, Deserialize)]
pub struct Svr {
    pub n_features: usize,
    pub kernel: Kernel,
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coef: Vec<f64>,
    pub intercept: f64,
}

impl Svr {
    fn validate(&self) -> Result<(), ModelError> {
        if self.support_vectors.len() != self.dual_coef.len() {
            return Err(ModelError::Invalid(format!(
                "{} support vectors but {} dual coefficients",
                self.support_vectors.len(),
                self.dual_coef.len()
            )));
        }
        if let Some(sv) = self.support_vectors.iter().find(|sv| sv.len() != self.n_features) {
            return Err(ModelError::Invalid(format!(
                "support vector of width {}, model has {} features",
                sv.len(),
                self.n_features
            )));
        }
        Ok(())
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, a)| a * self.kernel.eval(sv, x))
            .sum::<f64>()
            + self.intercept
    }
}

fn default_learning_rate() -> f64 {
    1.0
}

/// Additive boosted trees: `base_score + learning_rate * Σ tree(x)`.
#[derive(Debug, Clone, Deserialize)]
pub struct GradientBoosting {
    pub n_features: usize,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("boosted model has no trees".into()));
        }
        self.trees.iter().try_for_each(|t| t.validate(self.n_features))
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        let residual: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        self.base_score + self.learning_rate * residual
    }
}

/// Any supported pre-fitted regressor.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Regressor {
    RandomForest(RandomForest),
    Svr(Svr),
    GradientBoosting(GradientBoosting),
}

impl Regressor {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RandomForest(_) => "random_forest",
            Self::Svr(_) => "svr",
            Self::GradientBoosting(_) => "gradient_boosting",
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Self::RandomForest(m) => m.n_features,
            Self::Svr(m) => m.n_features,
            Self::GradientBoosting(m) => m.n_features,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_features() == 0 {
            return Err(ModelError::Invalid(format!("{} declares zero features", self.kind())));
        }
        match self {
            Self::RandomForest(m) => m.validate(),
            Self::Svr(m) => m.validate(),
            Self::GradientBoosting(m) => m.validate(),
        }
    }

    /// Predict a single scaled sample.
    pub fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        if x.len() != self.n_features() {
            return Err(ModelError::FeatureMismatch {
                got: x.len(),
                expected: self.n_features(),
            });
        }
        let y = match self {
            Self::RandomForest(m) => m.predict(x),
            Self::Svr(m) => m.predict(x),
            Self::GradientBoosting(m) => m.predict(x),
        };
        if !y.is_finite() {
            return Err(ModelError::NonFinite { model: self.kind() });
        }
        Ok(y)
    }
}
