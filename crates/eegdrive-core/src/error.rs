//! Error types for the eegdrive pipeline
//!
//! These errors work in `no_std` environments. They carry enough context to
//! be logged by the host units without requiring heap allocation.

use core::fmt;

// ============================================================================
// Processing Errors
// ============================================================================

/// Errors from signal conditioning and spectral processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingError {
    /// Statistic requested over a window with no samples
    EmptyWindow,
    /// Filter configuration cannot be realised
    InvalidFilterConfig {
        /// Description of the issue
        reason: &'static str,
    },
    /// Analysis window bounds are invalid
    InvalidWindow {
        /// Description of the issue
        reason: &'static str,
    },
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyWindow => write!(f, "Empty analysis window: no samples to average"),
            Self::InvalidFilterConfig { reason } => {
                write!(f, "Invalid filter config: {reason}")
            }
            Self::InvalidWindow { reason } => write!(f, "Invalid analysis window: {reason}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProcessingError {}

// ============================================================================
// Protocol Errors
// ============================================================================

/// Errors in the command and token protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Command token not in {start, stop, terminate}
    UnknownCommand,
    /// Actuator token is not a single printable ASCII byte
    InvalidToken {
        /// Length of the rejected token in bytes
        length: usize,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "Unknown control command"),
            Self::InvalidToken { length } => {
                write!(f, "Invalid actuator token: expected 1 printable ASCII byte, got {length} bytes")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProtocolError {}
