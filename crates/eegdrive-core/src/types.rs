//! Core types for the eegdrive pipeline
//!
//! This module provides the data model shared by every pipeline unit:
//! - The fixed EEG band catalogue
//! - Analysis window bounds over the shared sample buffer
//! - Feature vectors (absolute band powers in catalogue order)
//! - Classification labels and control commands

use core::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, ProtocolError};

// ============================================================================
// Band Catalogue
// ============================================================================

/// Standard EEG frequency bands, in catalogue order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    /// Delta: 2-4 Hz (deep sleep)
    Delta,
    /// Theta: 4-8 Hz (drowsiness, memory)
    Theta,
    /// Alpha: 8-14 Hz (relaxed, eyes closed)
    Alpha,
    /// Beta: 14-30 Hz (active thinking, motor planning)
    Beta,
    /// Gamma: 30-100 Hz (cognitive processing)
    Gamma,
}

impl Band {
    /// Number of bands in the catalogue
    pub const COUNT: usize = 5;

    /// All bands in catalogue order
    pub const ALL: [Self; Self::COUNT] =
        [Self::Delta, Self::Theta, Self::Alpha, Self::Beta, Self::Gamma];

    /// Get the frequency range for this band (low, high) in Hz
    #[inline]
    #[must_use]
    pub const fn range_hz(self) -> (f64, f64) {
        let def = self.definition();
        (def.low_hz, def.high_hz)
    }

    /// Get the immutable definition of this band
    #[inline]
    #[must_use]
    pub const fn definition(self) -> BandDefinition {
        BAND_CATALOGUE[self.index()]
    }

    /// Position of this band within a [`FeatureVector`]
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Delta => 0,
            Self::Theta => 1,
            Self::Alpha => 2,
            Self::Beta => 3,
            Self::Gamma => 4,
        }
    }

    /// Get the band name
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.definition().name
    }
}

/// An immutable frequency band definition.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct BandDefinition {
    /// Display name
    pub name: &'static str,
    /// Lower edge in Hz (inclusive)
    pub low_hz: f64,
    /// Upper edge in Hz (inclusive)
    pub high_hz: f64,
}

/// The fixed band catalogue used to build every feature vector.
pub const BAND_CATALOGUE: [BandDefinition; Band::COUNT] = [
    BandDefinition { name: "Delta", low_hz: 2.0, high_hz: 4.0 },
    BandDefinition { name: "Theta", low_hz: 4.0, high_hz: 8.0 },
    BandDefinition { name: "Alpha", low_hz: 8.0, high_hz: 14.0 },
    BandDefinition { name: "Beta", low_hz: 14.0, high_hz: 30.0 },
    BandDefinition { name: "Gamma", low_hz: 30.0, high_hz: 100.0 },
];

// ============================================================================
// Analysis Window
// ============================================================================

/// A closed-open time interval `[t_start, t_end)` in seconds.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    /// Start of the window in seconds from stream start
    pub t_start: f64,
    /// End of the window in seconds from stream start (exclusive)
    pub t_end: f64,
}

impl AnalysisWindow {
    /// Create a window, validating `0 <= t_start <= t_end`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::InvalidWindow`] for negative, inverted or
    /// non-finite bounds.
    pub fn new(t_start: f64, t_end: f64) -> Result<Self, ProcessingError> {
        if !t_start.is_finite() || !t_end.is_finite() {
            return Err(ProcessingError::InvalidWindow { reason: "bounds must be finite" });
        }
        if t_start < 0.0 {
            return Err(ProcessingError::InvalidWindow { reason: "start must not be negative" });
        }
        if t_end < t_start {
            return Err(ProcessingError::InvalidWindow { reason: "end must not precede start" });
        }
        Ok(Self { t_start, t_end })
    }

    /// Window covering the most recently completed whole seconds of a buffer.
    ///
    /// `t_end` is the number of completed seconds in `buffer_len` samples and
    /// `t_start` trails it by `window_seconds`, clamped to zero at stream
    /// start. A buffer shorter than one second yields the empty window
    /// `[0, 0)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn latest(buffer_len: usize, sample_rate: f64, window_seconds: f64) -> Self {
        if sample_rate <= 0.0 {
            return Self { t_start: 0.0, t_end: 0.0 };
        }
        // Truncation toward zero is floor for non-negative values
        let t_end = (buffer_len as f64 / sample_rate) as u64 as f64;
        let t_start = (t_end - window_seconds).max(0.0);
        Self { t_start, t_end }
    }

    /// Duration in seconds
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.t_end - self.t_start
    }

    /// Sample index range `[start, end)` at `sample_rate`, clamped to `len`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample_range(&self, sample_rate: f64, len: usize) -> Range<usize> {
        let end = ((self.t_end * sample_rate) as usize).min(len);
        let start = ((self.t_start * sample_rate) as usize).min(end);
        start..end
    }
}

// ============================================================================
// Feature Vector
// ============================================================================

/// Absolute band powers for one analysis window, in catalogue order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    powers: [f64; Band::COUNT],
}

impl FeatureVector {
    /// Create from powers in catalogue order
    #[must_use]
    pub const fn new(powers: [f64; Band::COUNT]) -> Self {
        Self { powers }
    }

    /// Power of one band
    #[inline]
    #[must_use]
    pub const fn get(&self, band: Band) -> f64 {
        self.powers[band.index()]
    }

    /// Set the power of one band
    #[inline]
    pub fn set(&mut self, band: Band, power: f64) {
        self.powers[band.index()] = power;
    }

    /// Powers as a slice in catalogue order
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.powers
    }

    /// Powers as an array in catalogue order
    #[inline]
    #[must_use]
    pub const fn to_array(&self) -> [f64; Band::COUNT] {
        self.powers
    }

    /// Total power across all bands
    #[must_use]
    pub fn total(&self) -> f64 {
        self.powers.iter().sum()
    }

    /// Band with strictly the highest power, or `None` on a tie for first
    #[must_use]
    pub fn dominant_band(&self) -> Option<Band> {
        let mut best = Band::Delta;
        let mut tied = false;
        for band in Band::ALL.into_iter().skip(1) {
            let (p, top) = (self.get(band), self.get(best));
            if p > top {
                best = band;
                tied = false;
            } else if p == top {
                tied = true;
            }
        }
        if tied {
            None
        } else {
            Some(best)
        }
    }
}

// ============================================================================
// Classification Label
// ============================================================================

/// Discrete mental/motor state decided by the classifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateLabel {
    /// Motor intent detected ("move", class code 0)
    Active,
    /// No motor intent ("stop", class code 1)
    Quiescent,
    /// Any other class code emitted by the classifier
    Unknown(i64),
}

impl StateLabel {
    /// Class code the classifier emits for [`StateLabel::Active`]
    pub const ACTIVE_CODE: i64 = 0;
    /// Class code the classifier emits for [`StateLabel::Quiescent`]
    pub const QUIESCENT_CODE: i64 = 1;

    /// Map a raw classifier output to a label
    #[must_use]
    pub const fn from_class_code(code: i64) -> Self {
        match code {
            Self::ACTIVE_CODE => Self::Active,
            Self::QUIESCENT_CODE => Self::Quiescent,
            other => Self::Unknown(other),
        }
    }

    /// Raw class code for this label
    #[must_use]
    pub const fn class_code(self) -> i64 {
        match self {
            Self::Active => Self::ACTIVE_CODE,
            Self::Quiescent => Self::QUIESCENT_CODE,
            Self::Unknown(code) => code,
        }
    }

    /// Label name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Quiescent => "quiescent",
            Self::Unknown(_) => "unknown",
        }
    }
}

// ============================================================================
// Control Commands
// ============================================================================

/// Session control command sent from the operator to the ingestion unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlCommand {
    /// Begin a new recording epoch and forward samples
    Start,
    /// Suspend forwarding without closing the sensor connection
    Stop,
    /// Close the connection and end the session
    Terminate,
}

impl ControlCommand {
    /// Parse a command token.
    ///
    /// Accepts `start`, `stop`, `terminate` (case-insensitive, surrounding
    /// whitespace ignored) and the legacy digit tokens `0`, `1`, `2`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownCommand`] for anything else.
    pub fn from_token(token: &str) -> Result<Self, ProtocolError> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("start") || token == "0" {
            Ok(Self::Start)
        } else if token.eq_ignore_ascii_case("stop") || token == "1" {
            Ok(Self::Stop)
        } else if token.eq_ignore_ascii_case("terminate") || token == "2" {
            Ok(Self::Terminate)
        } else {
            Err(ProtocolError::UnknownCommand)
        }
    }

    /// Canonical token for this command
    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Terminate => "terminate",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
