//! Machine learning inference for state decoding
//!
//! Provides band power feature extraction and inference with pre-fitted
//! scaler and classifier artifacts. Training happens offline; the pipeline
//! only consumes the exported parameters.

pub mod artifact;
pub mod classifier;
pub mod features;
pub mod scaler;

pub use artifact::{ArtifactError, ArtifactResult, ClassifierModel};
pub use classifier::{Kernel, LinearClassifier, StateClassifier, SvmClassifier};
pub use features::FeatureExtractor;
pub use scaler::{FeatureScaler, IdentityScaler, StandardScaler};
