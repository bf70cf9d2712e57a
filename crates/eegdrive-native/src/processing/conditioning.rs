//! Baseline conditioning of raw sample windows
//!
//! Removes the DC offset of the analysis window before filtering.

use eegdrive_core::error::ProcessingError;
use eegdrive_core::types::AnalysisWindow;

/// Arithmetic mean of a slice.
///
/// # Errors
///
/// Returns [`ProcessingError::EmptyWindow`] for an empty slice.
#[allow(clippy::cast_precision_loss)]
pub fn mean(samples: &[f64]) -> Result<f64, ProcessingError> {
    if samples.is_empty() {
        return Err(ProcessingError::EmptyWindow);
    }
    Ok(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Select `[t_start, t_end)` from `samples` and subtract its mean.
///
/// Sample indices are `floor(t * sample_rate)`, clamped to the sample count.
/// An empty index range yields an empty vector.
///
/// # Errors
///
/// Returns [`ProcessingError::InvalidWindow`] if the bounds are negative,
/// inverted or not finite.
pub fn baseline_shift(
    samples: &[f64],
    t_start: f64,
    t_end: f64,
    sample_rate: f64,
) -> Result<Vec<f64>, ProcessingError> {
    let window = AnalysisWindow::new(t_start, t_end)?;
    let range = window.sample_range(sample_rate, samples.len());
    Ok(remove_baseline(samples[range].to_vec()))
}

/// Subtract the mean of `samples` in place. Empty input is returned as is.
#[must_use]
pub fn remove_baseline(mut samples: Vec<f64>) -> Vec<f64> {
    if let Ok(offset) = mean(&samples) {
        for s in &mut samples {
            *s -= offset;
        }
    }
    samples
}
