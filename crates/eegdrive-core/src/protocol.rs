//! Wire protocol for sensor ingestion and actuator control
//!
//! Two small text protocols are spoken by the pipeline:
//!
//! - **Sensor → host**: newline-terminated ASCII lines, each carrying one or
//!   more decimal samples separated by commas, semicolons or whitespace.
//!   [`SampleDecoder`] reassembles lines across partial socket reads.
//! - **Host → actuator**: one printable ASCII byte followed by `\n` per
//!   decision. [`TokenTable`] maps labels to [`ActuatorToken`]s.
//!
//! ```text
//! sensor:   "12.5,13.1\n-4.0\n"   ->  [12.5, 13.1, -4.0]
//! actuator: StateLabel::Active    ->  b"m\n"
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::StateLabel;

// ============================================================================
// Sample Framing
// ============================================================================

/// Maximum accepted line length; longer lines are discarded.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Counters describing one [`SampleDecoder::feed`] call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Samples decoded
    pub samples: usize,
    /// Complete lines consumed
    pub lines: usize,
    /// Fields that did not parse as finite floats
    pub malformed: usize,
    /// Lines dropped for exceeding [`MAX_LINE_LEN`]
    pub oversized: usize,
}

/// Incremental line decoder for the sensor sample stream.
#[derive(Debug, Default)]
pub struct SampleDecoder {
    line: Vec<u8>,
    /// Currently skipping the tail of an oversized line
    discarding: bool,
}

impl SampleDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes buffered from an incomplete trailing line
    #[must_use]
    pub fn pending(&self) -> usize {
        self.line.len()
    }

    /// Feed raw bytes, appending every sample from completed lines to `out`.
    ///
    /// Bytes after the last newline are kept until the next call.
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<f64>) -> DecodeStats {
        let mut stats = DecodeStats::default();
        let mut rest = bytes;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.discarding {
                self.discarding = false;
                self.line.clear();
                continue;
            }

            if self.line.len() + head.len() > MAX_LINE_LEN {
                self.line.clear();
                stats.oversized += 1;
                continue;
            }

            if self.line.is_empty() {
                decode_line(head, out, &mut stats);
            } else {
                self.line.extend_from_slice(head);
                decode_line(&self.line, out, &mut stats);
                self.line.clear();
            }
            stats.lines += 1;
        }

        if !self.discarding {
            self.line.extend_from_slice(rest);
            if self.line.len() > MAX_LINE_LEN {
                self.line.clear();
                self.discarding = true;
                stats.oversized += 1;
            }
        }

        stats
    }
}

fn decode_line(line: &[u8], out: &mut Vec<f64>, stats: &mut DecodeStats) {
    let Ok(text) = core::str::from_utf8(line) else {
        stats.malformed += 1;
        return;
    };

    for field in text
        .split(|c: char| c == ',' || c == ';' || c.is_ascii_whitespace())
        .filter(|f| !f.is_empty())
    {
        match field.parse::<f64>() {
            Ok(value) if value.is_finite() => {
                out.push(value);
                stats.samples += 1;
            }
            _ => stats.malformed += 1,
        }
    }
}

// ============================================================================
// Actuator Tokens
// ============================================================================

/// Single-byte control token written to the actuator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "char")]
pub struct ActuatorToken(u8);

impl ActuatorToken {
    /// Motion token (`"m"`)
    pub const MOTION: Self = Self(b'm');
    /// Halt token (`"s"`)
    pub const HALT: Self = Self(b's');

    /// Create from a printable, non-space ASCII byte
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        if byte.is_ascii_graphic() {
            Some(Self(byte))
        } else {
            None
        }
    }

    /// Parse a one-character token string.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidToken`] unless `token` is exactly one
    /// printable ASCII byte.
    pub fn parse(token: &str) -> Result<Self, ProtocolError> {
        match token.as_bytes() {
            [byte] => Self::from_byte(*byte).ok_or(ProtocolError::InvalidToken { length: 1 }),
            other => Err(ProtocolError::InvalidToken { length: other.len() }),
        }
    }

    /// Wire encoding: token byte followed by `\n`
    #[must_use]
    pub const fn encode(self) -> [u8; 2] {
        [self.0, b'\n']
    }
}

impl TryFrom<String> for ActuatorToken {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ActuatorToken> for char {
    fn from(token: ActuatorToken) -> Self {
        char::from(token.0)
    }
}

/// Fixed lookup from classification label to actuator token.
///
/// Labels without a token are not forwarded.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenTable {
    /// Token for [`StateLabel::Active`]
    pub active: Option<ActuatorToken>,
    /// Token for [`StateLabel::Quiescent`]
    pub quiescent: Option<ActuatorToken>,
}

impl Default for TokenTable {
    /// Both decisions drive the actuator with the motion token.
    fn default() -> Self {
        Self {
            active: Some(ActuatorToken::MOTION),
            quiescent: Some(ActuatorToken::MOTION),
        }
    }
}

impl TokenTable {
    /// Token for a label, `None` if the label is not forwarded
    #[must_use]
    pub const fn token_for(&self, label: StateLabel) -> Option<ActuatorToken> {
        match label {
            StateLabel::Active => self.active,
            StateLabel::Quiescent => self.quiescent,
            StateLabel::Unknown(_) => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_decode_single_and_multi_value_lines() {
        let mut decoder = SampleDecoder::new();
        let mut out = Vec::new();
        let stats = decoder.feed(b"1.5\n2.0, 3.25;4\r\n-7e1 8\n", &mut out);

        assert_eq!(out, vec![1.5, 2.0, 3.25, 4.0, -70.0, 8.0]);
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.samples, 6);
        assert_eq!(stats.malformed, 0);
    }

    #[test]
    fn test_decode_across_partial_reads() {
        let mut decoder = SampleDecoder::new();
        let mut out = Vec::new();

        decoder.feed(b"12.", &mut out);
        assert!(out.is_empty());
        assert_eq!(decoder.pending(), 3);

        decoder.feed(b"5\n-3", &mut out);
        assert_eq!(out, vec![12.5]);

        decoder.feed(b".0\n", &mut out);
        assert_eq!(out, vec![12.5, -3.0]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decode_skips_malformed_fields() {
        let mut decoder = SampleDecoder::new();
        let mut out = Vec::new();
        let stats = decoder.feed(b"1.0,abc,NaN,inf,2.0\n\n", &mut out);

        assert_eq!(out, vec![1.0, 2.0]);
        assert_eq!(stats.malformed, 3);
        assert_eq!(stats.lines, 2);
    }

    #[test]
    fn test_decode_discards_oversized_line() {
        let mut decoder = SampleDecoder::new();
        let mut out = Vec::new();
        let long = vec![b'1'; MAX_LINE_LEN + 1];

        let stats = decoder.feed(&long, &mut out);
        assert_eq!(stats.oversized, 1);
        assert_eq!(decoder.pending(), 0);

        decoder.feed(b"111\n5.0\n", &mut out);
        assert_eq!(out, vec![5.0]);
    }

    #[test]
    fn test_decode_discards_oversized_line_in_one_read() {
        let mut decoder = SampleDecoder::new();
        let mut out = Vec::new();
        let mut bytes = vec![b'0'; MAX_LINE_LEN + 100];
        bytes.extend_from_slice(b"1\n5.0\n");

        let stats = decoder.feed(&bytes, &mut out);
        assert_eq!(stats.oversized, 1);
        assert_eq!(stats.lines, 1);
        assert_eq!(out, vec![5.0]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decode_discards_line_completed_past_limit() {
        let mut decoder = SampleDecoder::new();
        let mut out = Vec::new();

        let stats = decoder.feed(&vec![b'0'; MAX_LINE_LEN - 10], &mut out);
        assert_eq!(stats.oversized, 0);

        let mut tail = vec![b'0'; 100];
        tail.extend_from_slice(b"1\n");
        let stats = decoder.feed(&tail, &mut out);
        assert_eq!(stats.oversized, 1);
        assert!(out.is_empty());

        decoder.feed(b"5.0\n", &mut out);
        assert_eq!(out, vec![5.0]);
    }

    #[test]
    fn test_decode_accepts_line_at_limit() {
        let mut decoder = SampleDecoder::new();
        let mut out = Vec::new();
        let mut bytes = vec![b'0'; MAX_LINE_LEN - 1];
        bytes.extend_from_slice(b"1\n");

        let stats = decoder.feed(&bytes, &mut out);
        assert_eq!(stats.oversized, 0);
        assert_eq!(out, vec![1.0]);
    }

    #[test]
    fn test_token_encoding() {
        assert_eq!(ActuatorToken::MOTION.encode(), *b"m\n");
        assert_eq!(ActuatorToken::parse("s"), Ok(ActuatorToken::HALT));
        assert_eq!(ActuatorToken::parse("ms"), Err(ProtocolError::InvalidToken { length: 2 }));
        assert!(ActuatorToken::parse(" ").is_err());
    }

    #[test]
    fn test_default_token_table() {
        let table = TokenTable::default();
        assert_eq!(table.token_for(StateLabel::Active), Some(ActuatorToken::MOTION));
        assert_eq!(table.token_for(StateLabel::Quiescent), Some(ActuatorToken::MOTION));
        assert_eq!(table.token_for(StateLabel::Unknown(3)), None);
    }

    #[test]
    fn test_token_table_serde() {
        let table: TokenTable = serde_json::from_str(r#"{"active":"m","quiescent":"s"}"#)
            .expect("valid table");
        assert_eq!(table.quiescent, Some(ActuatorToken::HALT));

        let bad: Result<TokenTable, _> = serde_json::from_str(r#"{"active":"move"}"#);
        assert!(bad.is_err());
    }
}
