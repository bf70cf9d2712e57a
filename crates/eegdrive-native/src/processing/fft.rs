//! FFT-based spectral analysis
//!
//! Welch power spectral density estimation and absolute band power
//! integration.
//!
//! The estimate follows the common `welch` conventions: periodic Hann window,
//! 50 % segment overlap, per-segment mean removal, one-sided density scaling
//! in units²/Hz, and a plain mean across segments.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// One-sided power spectral density estimate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PowerSpectrum {
    /// Frequency of each bin in Hz
    pub freqs: Vec<f64>,
    /// Power density of each bin (units²/Hz)
    pub power: Vec<f64>,
}

impl PowerSpectrum {
    /// Number of frequency bins
    #[must_use]
    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    /// True if the spectrum has no bins
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    /// Absolute power between `low_hz` and `high_hz`, see [`band_power`]
    #[must_use]
    pub fn band_power(&self, low_hz: f64, high_hz: f64) -> f64 {
        band_power(&self.freqs, &self.power, low_hz, high_hz)
    }
}

/// Welch PSD estimator with a cached FFT plan.
pub struct WelchEstimator {
    sample_rate: f64,
    nperseg: usize,
    planner: FftPlanner<f64>,
    /// Plan and window for the most recent segment length
    cached: Option<(usize, Arc<dyn Fft<f64>>, Vec<f64>)>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl WelchEstimator {
    /// Create a new estimator
    ///
    /// # Arguments
    ///
    /// * `window_seconds` - Segment length in seconds
    /// * `sample_rate` - Sample rate in Hz
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(window_seconds: f64, sample_rate: f64) -> Self {
        let nperseg = ((window_seconds * sample_rate) as usize).max(1);
        Self {
            sample_rate,
            nperseg,
            planner: FftPlanner::new(),
            cached: None,
            buffer: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Estimate the PSD of `samples`.
    ///
    /// Inputs shorter than one segment are analysed as a single segment of
    /// their own length. Empty input yields an empty spectrum.
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate(&mut self, samples: &[f64]) -> PowerSpectrum {
        if samples.is_empty() {
            return PowerSpectrum::default();
        }

        let nperseg = self.nperseg.min(samples.len());
        let noverlap = nperseg / 2;
        let step = nperseg - noverlap;
        let n_segments = (samples.len() - noverlap) / step;
        let n_freqs = nperseg / 2 + 1;

        let (fft, window) = self.plan(nperseg);
        let scale = 1.0 / (self.sample_rate * window.iter().map(|w| w * w).sum::<f64>());

        self.buffer.resize(nperseg, Complex::new(0.0, 0.0));
        self.scratch.resize(fft.get_inplace_scratch_len(), Complex::new(0.0, 0.0));

        let mut power = vec![0.0; n_freqs];
        for seg in 0..n_segments {
            let segment = &samples[seg * step..seg * step + nperseg];
            let mean = segment.iter().sum::<f64>() / nperseg as f64;

            for ((slot, &s), &w) in self.buffer.iter_mut().zip(segment).zip(window.iter()) {
                *slot = Complex::new((s - mean) * w, 0.0);
            }
            fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

            for (acc, c) in power.iter_mut().zip(&self.buffer[..n_freqs]) {
                *acc += c.norm_sqr() * scale;
            }
        }

        // One-sided: fold negative frequencies, except DC and Nyquist
        let fold_end = if nperseg % 2 == 0 { n_freqs - 1 } else { n_freqs };
        for p in power.iter_mut().take(fold_end).skip(1) {
            *p *= 2.0;
        }
        for p in &mut power {
            *p /= n_segments as f64;
        }

        let freqs = (0..n_freqs)
            .map(|k| k as f64 * self.sample_rate / nperseg as f64)
            .collect();

        PowerSpectrum { freqs, power }
    }

    fn plan(&mut self, nperseg: usize) -> (Arc<dyn Fft<f64>>, Vec<f64>) {
        match &self.cached {
            Some((len, fft, window)) if *len == nperseg => (Arc::clone(fft), window.clone()),
            _ => {
                let fft = self.planner.plan_fft_forward(nperseg);
                let window = hann_window(nperseg);
                self.cached = Some((nperseg, Arc::clone(&fft), window.clone()));
                (fft, window)
            }
        }
    }
}

/// Welch PSD estimate with segments of `window_seconds * sample_rate` samples.
#[must_use]
pub fn power_spectrum(samples: &[f64], window_seconds: f64, sample_rate: f64) -> PowerSpectrum {
    WelchEstimator::new(window_seconds, sample_rate).estimate(samples)
}

/// Absolute power in `[low_hz, high_hz]` by trapezoidal integration.
///
/// The integration step is the spacing of the first two bins (1.0 with fewer
/// than two bins). Bins outside the band are ignored; an empty intersection
/// integrates to zero. The result is rounded to two decimals.
#[must_use]
pub fn band_power(freqs: &[f64], power: &[f64], low_hz: f64, high_hz: f64) -> f64 {
    let freq_res = match freqs {
        [f0, f1, ..] => f1 - f0,
        _ => 1.0,
    };

    let selected: Vec<f64> = freqs
        .iter()
        .zip(power)
        .filter(|(&f, _)| f >= low_hz && f <= high_hz)
        .map(|(_, &p)| p)
        .collect();

    let area: f64 = selected
        .windows(2)
        .map(|pair| (pair[0] + pair[1]) / 2.0 * freq_res)
        .sum();

    round2(area)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generate periodic Hann window coefficients
#[allow(clippy::cast_precision_loss)]
fn hann_window(size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eegdrive_core::types::Band;
    use proptest::prelude::*;

    fn sine(freq_hz: f64, amplitude: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq_hz * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_welch_bins_and_resolution() {
        let spectrum = power_spectrum(&vec![0.0; 1000], 0.8, 1000.0);
        assert_eq!(spectrum.len(), 401);
        assert!((spectrum.freqs[1] - 1.25).abs() < 1e-12);
        assert!((spectrum.freqs[400] - 500.0).abs() < 1e-9);
        assert!(spectrum.power.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_welch_parseval() {
        // Integrated density of a sine recovers its variance A²/2
        let samples = sine(50.0, 2.0, 1000.0, 4000);
        let spectrum = power_spectrum(&samples, 1.0, 1000.0);
        let df = spectrum.freqs[1] - spectrum.freqs[0];
        let total: f64 = spectrum.power.iter().sum::<f64>() * df;
        assert!((total - 2.0).abs() < 0.05, "total = {total}");
    }

    #[test]
    fn test_welch_peak_at_signal_frequency() {
        let samples = sine(10.0, 1.0, 1000.0, 1000);
        let spectrum = power_spectrum(&samples, 0.8, 1000.0);
        let peak = spectrum
            .power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| spectrum.freqs[i])
            .expect("non-empty spectrum");
        assert!((peak - 10.0).abs() <= 1.25);

        let alpha = spectrum.band_power(8.0, 14.0);
        let (low, high) = Band::Beta.range_hz();
        assert!(alpha > spectrum.band_power(low, high));
    }

    #[test]
    fn test_short_input_single_segment() {
        let samples = sine(10.0, 1.0, 1000.0, 300);
        let spectrum = power_spectrum(&samples, 0.8, 1000.0);
        assert_eq!(spectrum.len(), 151);
        assert!(spectrum.power.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(power_spectrum(&[], 0.8, 1000.0).is_empty());

        let one = power_spectrum(&[3.0], 0.8, 1000.0);
        assert_eq!(one.freqs, vec![0.0]);
        assert_eq!(one.power, vec![0.0]);
    }

    #[test]
    fn test_band_power_trapezoid() {
        let freqs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let power = [1.0, 2.0, 3.0, 4.0, 5.0];
        // Bins 1..=3: (2+3)/2 + (3+4)/2
        assert!((band_power(&freqs, &power, 1.0, 3.0) - 6.0).abs() < 1e-12);
        // Single bin has no area
        assert_eq!(band_power(&freqs, &power, 2.0, 2.0), 0.0);
    }

    #[test]
    fn test_band_power_empty_intersection() {
        let freqs = [0.0, 1.25, 2.5];
        let power = [1.0, 1.0, 1.0];
        assert_eq!(band_power(&freqs, &power, 30.0, 100.0), 0.0);
        assert_eq!(band_power(&[], &[], 8.0, 14.0), 0.0);
    }

    #[test]
    fn test_band_power_default_resolution() {
        // Fewer than two bins: resolution falls back to 1.0
        assert_eq!(band_power(&[5.0], &[2.0], 0.0, 10.0), 0.0);
    }

    #[test]
    fn test_band_power_rounding() {
        let freqs = [0.0, 1.0];
        let power = [0.1234, 0.1234];
        assert_eq!(band_power(&freqs, &power, 0.0, 1.0), 0.12);
    }

    proptest! {
        #[test]
        fn prop_band_power_non_negative(power in prop::collection::vec(0.0f64..1e3, 2..200),
                                        low in 0.0f64..100.0, width in 0.0f64..200.0) {
            let freqs: Vec<f64> = (0..power.len()).map(|k| k as f64 * 1.25).collect();
            prop_assert!(band_power(&freqs, &power, low, low + width) >= 0.0);
        }

        #[test]
        fn prop_band_power_monotonic_in_width(power in prop::collection::vec(0.0f64..1e3, 2..200),
                                              low in 0.0f64..100.0, width in 0.0f64..100.0,
                                              extra in 0.0f64..100.0) {
            let freqs: Vec<f64> = (0..power.len()).map(|k| k as f64 * 1.25).collect();
            let narrow = band_power(&freqs, &power, low, low + width);
            let wide = band_power(&freqs, &power, low, low + width + extra);
            prop_assert!(wide >= narrow);
        }
    }
}
