//! Feature scaling applied before classification

use serde::{Deserialize, Serialize};

/// Affine feature normalisation fitted offline.
pub trait FeatureScaler: Send + Sync {
    /// Scale one feature vector
    fn transform(&self, features: &[f64]) -> Vec<f64>;

    /// Number of features the scaler was fitted on, if fixed
    fn n_features(&self) -> Option<usize> {
        None
    }
}

/// Per-feature standardisation `(x - mean) / scale`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-feature centre
    pub mean: Vec<f64>,
    /// Per-feature scale; zero is treated as 1
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Create a scaler from fitted parameters
    #[must_use]
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self { mean, scale }
    }

    /// True if `mean` and `scale` have the same length
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.mean.len() == self.scale.len()
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&m, &s))| {
                let s = if s == 0.0 { 1.0 } else { s };
                (x - m) / s
            })
            .collect()
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.mean.len())
    }
}

/// Pass-through scaler
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityScaler;

impl FeatureScaler for IdentityScaler {
    fn transform(&self, features: &[f64]) -> Vec<f64> {
        features.to_vec()
    }
}
