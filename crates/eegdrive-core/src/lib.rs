//! eegdrive Core - `no_std` compatible types and wire protocol
//!
//! This crate provides the foundational types shared by every unit of the
//! eegdrive pipeline. It is designed to work in `no_std` environments (with
//! `alloc`) as well as `std` environments.
//!
//! # Modules
//!
//! - [`types`]: Band catalogue, feature vectors, labels, control commands
//! - [`error`]: Error types for processing and protocol handling
//! - [`protocol`]: Sensor sample framing and actuator control tokens
//!
//! # Features
//!
//! - `std`: Enable standard library support (`std::error::Error` impls)
//!
//! # Example
//!
//! ```rust
//! use eegdrive_core::types::{Band, FeatureVector};
//!
//! let mut features = FeatureVector::default();
//! features.set(Band::Alpha, 12.5);
//!
//! assert_eq!(features.get(Band::Alpha), 12.5);
//! assert_eq!(features.dominant_band(), Some(Band::Alpha));
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod protocol;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ProcessingError, ProtocolError};
pub use protocol::{ActuatorToken, DecodeStats, SampleDecoder, TokenTable};
pub use types::{
    AnalysisWindow, Band, BandDefinition, ControlCommand, FeatureVector, StateLabel,
    BAND_CATALOGUE,
};
