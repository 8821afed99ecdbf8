use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

/// Round half away from zero to `dp` decimal places.
pub fn round_to(v: f64, dp: i32) -> f64 {
    let k = 10f64.powi(dp);
    (v * k).round() / k
}

impl Summary {
    /// Mean, extremes and population standard deviation; `None` when empty.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { mean, min, max, std: var.sqrt() })
    }

    pub fn rounded(self, dp: i32) -> Self {
        Self {
            mean: round_to(self.mean, dp),
            min: round_to(self.min, dp),
            max: round_to(self.max, dp),
            std: round_to(self.std, dp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_std() {
        let s = Summary::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(s.mean, 5.0);
        assert_eq!(s.std, 2.0);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
    }

    #[test]
    fn single_value_has_zero_spread() {
        let s = Summary::of(&[42.0]).unwrap();
        assert_eq!(s, Summary { mean: 42.0, min: 42.0, max: 42.0, std: 0.0 });
    }

    #[test]
    fn empty_is_none() {
        assert!(Summary::of(&[]).is_none());
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(0.75559, 4), 0.7556);
        let s = Summary::of(&[1.0, 2.0, 2.0]).unwrap().rounded(2);
        assert_eq!(s.mean, 1.67);
        assert_eq!(s.std, 0.47);
    }
}
