//! eegdrive Native - Host signal processing, inference and network units
//!
//! This crate provides the host side of the eegdrive pipeline:
//! - Signal processing (baseline removal, Butterworth bandpass, Welch PSD)
//! - Band power feature extraction and classifier inference
//! - Sensor ingestion and actuator control over TCP
//! - Session context, best-effort session log and the controlling loop
//!
//! # Modules
//!
//! - [`bridge`]: Shared sample buffer, ingestion collector, actuation server
//! - [`processing`]: Signal processing pipelines
//! - [`ml`]: Feature extraction and model artifacts
//! - [`session`]: Per-session state and the analysis loop
//! - [`config`]: TOML pipeline configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod bridge;
pub mod config;
pub mod ml;
pub mod processing;
pub mod session;

// Re-export key types
pub use bridge::{
    sample_buffer, ActuationMessage, ActuationServer, IngestionCollector, SampleReader,
    SampleWriter,
};
pub use config::{ConfigError, PipelineConfig};
pub use ml::{ClassifierModel, FeatureExtractor};
pub use session::{Pipeline, PipelineSnapshot, SessionContext, SessionLog};
