//! Feature extraction for state classification
//!
//! Extracts absolute band powers from a baseline-shifted analysis window.
//! Every band runs its own filter → Welch PSD → integration chain over the
//! same input; no filtered signal is shared between bands.

use eegdrive_core::error::ProcessingError;
use eegdrive_core::types::{Band, FeatureVector};

use crate::processing::fft::WelchEstimator;
use crate::processing::filters::BandpassFilter;

/// Per-band processing chain
struct BandPipeline {
    band: Band,
    filter: BandpassFilter,
    welch: WelchEstimator,
}

/// Band power feature extractor
pub struct FeatureExtractor {
    pipelines: Vec<BandPipeline>,
}

impl FeatureExtractor {
    /// Create a new feature extractor
    ///
    /// # Arguments
    ///
    /// * `filter_order` - Butterworth prototype order for every band
    /// * `welch_window_seconds` - Welch segment length in seconds
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::InvalidFilterConfig`] if any catalogue band
    /// cannot be realised at `sample_rate`.
    pub fn new(
        filter_order: usize,
        welch_window_seconds: f64,
        sample_rate: f64,
    ) -> Result<Self, ProcessingError> {
        let pipelines = Band::ALL
            .into_iter()
            .map(|band| {
                Ok(BandPipeline {
                    band,
                    filter: BandpassFilter::for_band(filter_order, band, sample_rate)?,
                    welch: WelchEstimator::new(welch_window_seconds, sample_rate),
                })
            })
            .collect::<Result<Vec<_>, ProcessingError>>()?;

        Ok(Self { pipelines })
    }

    /// Extract band powers from a conditioned window.
    ///
    /// Filters start from zero state on every call. An empty window yields
    /// an all-zero feature vector.
    pub fn extract(&mut self, window: &[f64]) -> FeatureVector {
        let mut features = FeatureVector::default();

        for pipeline in &mut self.pipelines {
            pipeline.filter.reset();
            let filtered = pipeline.filter.process(window);
            let spectrum = pipeline.welch.estimate(&filtered);
            let (low, high) = pipeline.band.range_hz();
            features.set(pipeline.band, spectrum.band_power(low, high));
        }

        features
    }
}
