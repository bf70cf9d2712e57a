//! Loading of pre-fitted scaler and classifier artifacts
//!
//! Both artifacts are JSON documents exported by the offline training step.
//! They are loaded once at startup; any failure aborts the session, there is
//! no fallback classifier.
//!
//! ```json
//! // scaler.json
//! { "mean": [..5], "scale": [..5] }
//!
//! // svm_model.json
//! { "kernel": { "type": "rbf", "gamma": 0.2 },
//!   "support_vectors": [[..5], ..], "dual_coef": [..], "intercept": 0.1,
//!   "classes": [0, 1] }
//!
//! // or a linear model
//! { "coef": [..5], "intercept": 0.1, "classes": [0, 1] }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use eegdrive_core::types::{Band, FeatureVector, StateLabel};

use super::classifier::{LinearClassifier, StateClassifier, SvmClassifier};
use super::scaler::{FeatureScaler, StandardScaler};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading model artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Artifact file could not be read
    #[error("Failed to read artifact {path}: {source}")]
    Io {
        /// Artifact path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Artifact file is not valid JSON for its model type
    #[error("Failed to parse artifact {path}: {source}")]
    Parse {
        /// Artifact path
        path: PathBuf,
        /// Underlying parse error
        source: serde_json::Error,
    },

    /// Artifact was fitted on a different number of features
    #[error("{artifact} expects {found} features, pipeline produces {expected}")]
    Dimension {
        /// Artifact kind
        artifact: &'static str,
        /// Features produced by the pipeline
        expected: usize,
        /// Features the artifact was fitted on
        found: usize,
    },

    /// Artifact parameters are internally inconsistent
    #[error("Inconsistent {artifact}: {reason}")]
    Inconsistent {
        /// Artifact kind
        artifact: &'static str,
        /// Description of the issue
        reason: &'static str,
    },
}

/// Result type for artifact operations.
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Classifier artifact, discriminated by its fields
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifierArtifact {
    Svm(SvmClassifier),
    Linear(LinearClassifier),
}

/// Loaded scaler + classifier pair.
pub struct ClassifierModel {
    scaler: Box<dyn FeatureScaler>,
    classifier: Box<dyn StateClassifier>,
}

impl std::fmt::Debug for ClassifierModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierModel")
            .field("scaler_features", &self.scaler.n_features())
            .field("classifier_features", &self.classifier.n_features())
            .finish()
    }
}

impl ClassifierModel {
    /// Combine an already constructed scaler and classifier
    #[must_use]
    pub fn new(scaler: Box<dyn FeatureScaler>, classifier: Box<dyn StateClassifier>) -> Self {
        Self { scaler, classifier }
    }

    /// Load and validate both artifacts.
    ///
    /// # Errors
    ///
    /// Returns an [`ArtifactError`] if either file cannot be read or parsed,
    /// or if either model does not take exactly [`Band::COUNT`] features.
    pub fn load(scaler_path: &Path, classifier_path: &Path) -> ArtifactResult<Self> {
        let scaler: StandardScaler = read_json(scaler_path)?;
        if !scaler.is_consistent() {
            return Err(ArtifactError::Inconsistent {
                artifact: "scaler",
                reason: "mean and scale lengths differ",
            });
        }
        check_dimension("scaler", scaler.n_features())?;

        let classifier: Box<dyn StateClassifier> = match read_json(classifier_path)? {
            ClassifierArtifact::Svm(svm) => {
                if svm.support_vectors.is_empty() {
                    return Err(ArtifactError::Inconsistent {
                        artifact: "classifier",
                        reason: "no support vectors",
                    });
                }
                if !svm.is_consistent() {
                    return Err(ArtifactError::Inconsistent {
                        artifact: "classifier",
                        reason: "support vectors and dual coefficients disagree",
                    });
                }
                Box::new(svm)
            }
            ClassifierArtifact::Linear(linear) => Box::new(linear),
        };
        check_dimension("classifier", classifier.n_features())?;

        tracing::info!(
            "Loaded classifier artifacts from {} and {}",
            scaler_path.display(),
            classifier_path.display()
        );

        Ok(Self { scaler: Box::new(scaler), classifier })
    }

    /// Scale and classify one feature vector
    pub fn classify(&self, features: &FeatureVector) -> StateLabel {
        let scaled = self.scaler.transform(features.as_slice());
        StateLabel::from_class_code(self.classifier.predict(&scaled))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> ArtifactResult<T> {
    let text = fs::read_to_string(path)
        .map_err(|source| ArtifactError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text)
        .map_err(|source| ArtifactError::Parse { path: path.to_path_buf(), source })
}

fn check_dimension(artifact: &'static str, found: Option<usize>) -> ArtifactResult<()> {
    match found {
        Some(n) if n != Band::COUNT => {
            Err(ArtifactError::Dimension { artifact, expected: Band::COUNT, found: n })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write temp file");
        file
    }

    const SCALER: &str = r#"{"mean":[0,0,0,0,0],"scale":[1,1,1,1,1]}"#;

    #[test]
    fn test_load_svm_and_classify() {
        let scaler = write_temp(SCALER);
        let model = write_temp(
            r#"{"kernel":{"type":"linear"},
                "support_vectors":[[0,0,1,0,0]],"dual_coef":[-1.0],
                "intercept":0.5,"classes":[0,1]}"#,
        );
        let model = ClassifierModel::load(scaler.path(), model.path()).expect("valid artifacts");

        // f = -alpha + 0.5
        let quiet = FeatureVector::new([0.0, 0.0, 0.1, 0.0, 0.0]);
        assert_eq!(model.classify(&quiet), StateLabel::Quiescent);
        let busy = FeatureVector::new([0.0, 0.0, 2.0, 0.0, 0.0]);
        assert_eq!(model.classify(&busy), StateLabel::Active);
    }

    #[test]
    fn test_load_linear_model() {
        let scaler = write_temp(SCALER);
        let model = write_temp(r#"{"coef":[1,1,1,1,1],"intercept":-1.0,"classes":[0,1]}"#);
        let model = ClassifierModel::load(scaler.path(), model.path()).expect("valid artifacts");

        // Zero vector is classified deterministically
        let zero = FeatureVector::default();
        assert_eq!(model.classify(&zero), StateLabel::Active);
        assert_eq!(model.classify(&zero), StateLabel::Active);
    }

    #[test]
    fn test_unknown_class_code() {
        let scaler = write_temp(SCALER);
        let model = write_temp(r#"{"coef":[0,0,0,0,0],"intercept":1.0,"classes":[0,7]}"#);
        let model = ClassifierModel::load(scaler.path(), model.path()).expect("valid artifacts");
        assert_eq!(model.classify(&FeatureVector::default()), StateLabel::Unknown(7));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let scaler = write_temp(r#"{"mean":[0,0],"scale":[1,1]}"#);
        let model = write_temp(r#"{"coef":[1,1,1,1,1],"intercept":0,"classes":[0,1]}"#);
        let err = ClassifierModel::load(scaler.path(), model.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Dimension { artifact: "scaler", found: 2, .. }));

        let scaler = write_temp(SCALER);
        let model = write_temp(r#"{"coef":[1,1,1],"intercept":0,"classes":[0,1]}"#);
        let err = ClassifierModel::load(scaler.path(), model.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Dimension { artifact: "classifier", .. }));
    }

    #[test]
    fn test_missing_and_malformed_artifacts() {
        let scaler = write_temp(SCALER);
        let err = ClassifierModel::load(scaler.path(), Path::new("/nonexistent/svm.json"))
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));

        let model = write_temp("not json");
        let err = ClassifierModel::load(scaler.path(), model.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Parse { .. }));
    }

    #[test]
    fn test_inconsistent_svm_rejected() {
        let scaler = write_temp(SCALER);
        let model = write_temp(
            r#"{"kernel":{"type":"linear"},"support_vectors":[[0,0,0,0,0]],
                "dual_coef":[1.0,2.0],"intercept":0,"classes":[0,1]}"#,
        );
        let err = ClassifierModel::load(scaler.path(), model.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Inconsistent { .. }));
    }
}
