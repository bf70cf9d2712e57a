//! Pipeline configuration
//!
//! Loaded from an optional TOML file; every section and field has a default,
//! so an empty file (or no file) yields a runnable configuration.
//!
//! ```toml
//! [sensor]
//! address = "127.0.0.1:5001"
//!
//! [actuator]
//! bind = "0.0.0.0:12345"
//! backlog = 16
//! tokens = { active = "m", quiescent = "m" }
//!
//! [analysis]
//! sample_rate_hz = 1000.0
//! poll_interval_ms = 1000
//! window_seconds = 1.0
//! welch_window_seconds = 0.8
//! filter_order = 2
//! stall_ticks = 5
//!
//! [artifacts]
//! scaler = "scaler.json"
//! classifier = "svm_model.json"
//!
//! [session]
//! log_dir = "."
//!
//! [channels]
//! capacity = 32
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use eegdrive_core::error::ProcessingError;
use eegdrive_core::protocol::TokenTable;
use eegdrive_core::types::Band;

use crate::processing::filters::BandpassFilter;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`PipelineConfig`]
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Config path
        path: PathBuf,
        /// Underlying parse error
        source: toml::de::Error,
    },

    /// A band filter cannot be realised with the analysis settings
    #[error("{band} band filter: {source}")]
    Filter {
        /// Band name
        band: &'static str,
        /// Filter design error
        source: ProcessingError,
    },

    /// A value is out of range
    #[error("Invalid {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Description of the issue
        reason: &'static str,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

// ============================================================================
// Sections
// ============================================================================

/// Sensor connection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Sensor TCP address
    pub address: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self { address: "127.0.0.1:5001".to_string() }
    }
}

/// Actuation server settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Listener bind address
    pub bind: String,
    /// Labels held while no actuator is connected
    pub backlog: usize,
    /// Label to token mapping
    pub tokens: TokenTable,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:12345".to_string(),
            backlog: 16,
            tokens: TokenTable::default(),
        }
    }
}

/// Analysis loop settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Nominal sample rate in Hz
    pub sample_rate_hz: f64,
    /// Tick cadence in milliseconds
    pub poll_interval_ms: u64,
    /// Analysis window length in whole seconds
    pub window_seconds: f64,
    /// Welch segment length in seconds
    pub welch_window_seconds: f64,
    /// Butterworth prototype order
    pub filter_order: usize,
    /// Ticks without buffer growth before a stall is reported
    pub stall_ticks: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 1000.0,
            poll_interval_ms: 1000,
            window_seconds: 1.0,
            welch_window_seconds: 0.8,
            filter_order: 2,
            stall_ticks: 5,
        }
    }
}

impl AnalysisConfig {
    /// Tick cadence
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Model artifact paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Scaler JSON path
    pub scaler: PathBuf,
    /// Classifier JSON path
    pub classifier: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            scaler: PathBuf::from("scaler.json"),
            classifier: PathBuf::from("svm_model.json"),
        }
    }
}

/// Session log settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory receiving session files
    pub log_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { log_dir: PathBuf::from(".") }
    }
}

/// Inter-unit channel settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Capacity of each bounded channel
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { capacity: 32 }
    }
}

/// Complete pipeline configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sensor connection
    pub sensor: SensorConfig,
    /// Actuation server
    pub actuator: ActuatorConfig,
    /// Analysis loop
    pub analysis: AnalysisConfig,
    /// Model artifacts
    pub artifacts: ArtifactConfig,
    /// Session logging
    pub session: SessionConfig,
    /// Channels
    pub channels: ChannelConfig,
}

impl PipelineConfig {
    /// Load from `path`, or defaults if `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`] if the file
    /// cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse from TOML text
    ///
    /// # Errors
    ///
    /// Returns the TOML error for invalid input.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Check that the configuration describes a runnable pipeline.
    ///
    /// Tokens are validated when parsed; this checks numeric ranges and that
    /// every catalogue band filter is realisable at the sample rate.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        let analysis = &self.analysis;

        if !(analysis.sample_rate_hz.is_finite() && analysis.sample_rate_hz > 0.0) {
            return Err(ConfigError::Invalid {
                field: "analysis.sample_rate_hz",
                reason: "must be positive",
            });
        }
        if analysis.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "analysis.poll_interval_ms",
                reason: "must be non-zero",
            });
        }
        if !(analysis.window_seconds.is_finite() && analysis.window_seconds > 0.0) {
            return Err(ConfigError::Invalid {
                field: "analysis.window_seconds",
                reason: "must be positive",
            });
        }
        if !(analysis.welch_window_seconds.is_finite() && analysis.welch_window_seconds > 0.0) {
            return Err(ConfigError::Invalid {
                field: "analysis.welch_window_seconds",
                reason: "must be positive",
            });
        }
        if self.channels.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "channels.capacity",
                reason: "must be non-zero",
            });
        }

        for band in Band::ALL {
            BandpassFilter::for_band(analysis.filter_order, band, analysis.sample_rate_hz)
                .map_err(|source| ConfigError::Filter { band: band.name(), source })?;
        }

        Ok(())
    }
}
