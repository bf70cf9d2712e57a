//! Pretrained discriminant classifiers
//!
//! Both classifiers are binary: the decision function `f(x)` selects
//! `classes[1]` when positive and `classes[0]` otherwise.

use serde::{Deserialize, Serialize};

/// Maps a scaled feature vector to a raw class code.
pub trait StateClassifier: Send + Sync {
    /// Predict the class code for one input vector
    fn predict(&self, features: &[f64]) -> i64;

    /// Number of features the classifier expects, if fixed
    fn n_features(&self) -> Option<usize> {
        None
    }
}

/// Support vector kernel function
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Kernel {
    /// `<u, v>`
    Linear,
    /// `exp(-gamma * |u - v|²)`
    Rbf {
        /// Kernel coefficient
        gamma: f64,
    },
    /// `(gamma * <u, v> + coef0)^degree`
    Poly {
        /// Polynomial degree
        degree: i32,
        /// Kernel coefficient
        gamma: f64,
        /// Independent term
        coef0: f64,
    },
}

impl Kernel {
    /// Evaluate the kernel on two vectors
    #[must_use]
    pub fn evaluate(&self, u: &[f64], v: &[f64]) -> f64 {
        match *self {
            Self::Linear => dot(u, v),
            Self::Rbf { gamma } => {
                let dist_sq: f64 = u.iter().zip(v).map(|(a, b)| (a - b) * (a - b)).sum();
                (-gamma * dist_sq).exp()
            }
            Self::Poly { degree, gamma, coef0 } => (gamma * dot(u, v) + coef0).powi(degree),
        }
    }
}

fn dot(u: &[f64], v: &[f64]) -> f64 {
    u.iter().zip(v).map(|(a, b)| a * b).sum()
}

fn decide(classes: [i64; 2], decision: f64) -> i64 {
    if decision > 0.0 {
        classes[1]
    } else {
        classes[0]
    }
}

/// Binary kernel SVM with exported support vectors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SvmClassifier {
    /// Kernel function
    pub kernel: Kernel,
    /// Support vectors, one row per vector
    pub support_vectors: Vec<Vec<f64>>,
    /// Dual coefficients `αᵢ yᵢ`, one per support vector
    pub dual_coef: Vec<f64>,
    /// Decision function bias
    pub intercept: f64,
    /// Class codes `[negative, positive]`
    pub classes: [i64; 2],
}

impl SvmClassifier {
    /// Decision function value `Σ αᵢ K(svᵢ, x) + b`
    #[must_use]
    pub fn decision_function(&self, features: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, alpha)| alpha * self.kernel.evaluate(sv, features))
            .sum::<f64>()
            + self.intercept
    }

    /// True if every support vector has the same width and one coefficient
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.support_vectors.len() == self.dual_coef.len()
            && self
                .support_vectors
                .windows(2)
                .all(|pair| pair[0].len() == pair[1].len())
    }
}

impl StateClassifier for SvmClassifier {
    fn predict(&self, features: &[f64]) -> i64 {
        decide(self.classes, self.decision_function(features))
    }

    fn n_features(&self) -> Option<usize> {
        self.support_vectors.first().map(Vec::len)
    }
}

/// Linear discriminant `w·x + b`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearClassifier {
    /// Weight per feature
    pub coef: Vec<f64>,
    /// Bias
    pub intercept: f64,
    /// Class codes `[negative, positive]`
    pub classes: [i64; 2],
}

impl LinearClassifier {
    /// Decision function value
    #[must_use]
    pub fn decision_function(&self, features: &[f64]) -> f64 {
        dot(&self.coef, features) + self.intercept
    }
}

impl StateClassifier for LinearClassifier {
    fn predict(&self, features: &[f64]) -> i64 {
        decide(self.classes, self.decision_function(features))
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coef.len())
    }
}
