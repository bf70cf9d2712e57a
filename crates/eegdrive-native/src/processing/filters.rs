//! Digital filters for EEG processing
//!
//! Provides floating-point Butterworth bandpass filters built as cascades of
//! second-order sections. Filtering is single-pass and causal (no zero-phase
//! forward/backward pass), so a filtered window carries the filter's start-up
//! transient exactly like the live device stream would.

use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

use eegdrive_core::error::ProcessingError;
use eegdrive_core::types::Band;

/// Imaginary parts below this are treated as real poles when pairing.
const REAL_POLE_EPS: f64 = 1e-10;

/// Second-order section coefficients
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoeffs {
    /// Numerator coefficients [b0, b1, b2]
    pub b: [f64; 3],
    /// Denominator coefficients [a0=1, a1, a2]
    pub a: [f64; 3],
}

/// Second-order biquad filter section (transposed direct form II)
#[derive(Clone, Debug)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    /// State: [s1, s2]
    state: [f64; 2],
}

impl Biquad {
    /// Create a new biquad section with given coefficients
    #[must_use]
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self { coeffs, state: [0.0, 0.0] }
    }

    /// Section coefficients
    #[must_use]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Process a single sample
    pub fn filter(&mut self, input: f64) -> f64 {
        let BiquadCoeffs { b, a } = self.coeffs;
        let output = b[0] * input + self.state[0];

        self.state[0] = b[1] * input - a[1] * output + self.state[1];
        self.state[1] = b[2] * input - a[2] * output;

        output
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.state = [0.0, 0.0];
    }
}

/// Butterworth bandpass filter.
///
/// An `order`-th order lowpass prototype is transformed to a bandpass of
/// order `2 * order`, then discretised with the bilinear transform after
/// prewarping both cutoffs. The result is stored as `order` biquad sections.
#[derive(Clone, Debug)]
pub struct BandpassFilter {
    sections: Vec<Biquad>,
}

impl BandpassFilter {
    /// Design a bandpass filter for a frequency range
    ///
    /// # Arguments
    ///
    /// * `order` - Prototype order (the bandpass has order `2 * order`)
    /// * `low_hz` - Lower cutoff in Hz
    /// * `high_hz` - Upper cutoff in Hz
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::InvalidFilterConfig`] if `order` is zero,
    /// a parameter is not finite, `low_hz <= 0`, `low_hz >= high_hz`, or
    /// `high_hz` is at or above Nyquist.
    pub fn new(
        order: usize,
        low_hz: f64,
        high_hz: f64,
        sample_rate: f64,
    ) -> Result<Self, ProcessingError> {
        validate(order, low_hz, high_hz, sample_rate)?;

        let nyquist = sample_rate / 2.0;
        let (poles, gain) = design_zpk(order, low_hz / nyquist, high_hz / nyquist);
        let mut sections = pair_sections(&poles);

        // Overall gain rides on the first section's numerator
        if let Some(first) = sections.first_mut() {
            for b in &mut first.coeffs.b {
                *b *= gain;
            }
        }

        Ok(Self { sections })
    }

    /// Design a bandpass filter for a catalogue EEG band
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::InvalidFilterConfig`] if the band cannot be
    /// realised at `sample_rate`.
    pub fn for_band(order: usize, band: Band, sample_rate: f64) -> Result<Self, ProcessingError> {
        let (low, high) = band.range_hz();
        Self::new(order, low, high, sample_rate)
    }

    /// Second-order sections in processing order
    #[must_use]
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Process a single sample
    pub fn filter(&mut self, input: f64) -> f64 {
        self.sections.iter_mut().fold(input, |x, section| section.filter(x))
    }

    /// Filter a block of samples, continuing from the current state
    #[must_use]
    pub fn process(&mut self, samples: &[f64]) -> Vec<f64> {
        samples.iter().map(|&s| self.filter(s)).collect()
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

/// Apply a Butterworth bandpass filter to a window from zero initial state.
///
/// # Errors
///
/// Returns [`ProcessingError::InvalidFilterConfig`] for an unrealisable
/// design, see [`BandpassFilter::new`].
pub fn filtered(
    samples: &[f64],
    low_hz: f64,
    high_hz: f64,
    order: usize,
    sample_rate: f64,
) -> Result<Vec<f64>, ProcessingError> {
    let mut filter = BandpassFilter::new(order, low_hz, high_hz, sample_rate)?;
    Ok(filter.process(samples))
}

fn validate(order: usize, low_hz: f64, high_hz: f64, sample_rate: f64) -> Result<(), ProcessingError> {
    if order == 0 {
        return Err(ProcessingError::InvalidFilterConfig { reason: "order must be at least 1" });
    }
    if !(low_hz.is_finite() && high_hz.is_finite() && sample_rate.is_finite()) {
        return Err(ProcessingError::InvalidFilterConfig { reason: "parameters must be finite" });
    }
    if sample_rate <= 0.0 {
        return Err(ProcessingError::InvalidFilterConfig { reason: "sample rate must be positive" });
    }
    if low_hz <= 0.0 {
        return Err(ProcessingError::InvalidFilterConfig { reason: "low cutoff must be positive" });
    }
    if low_hz >= high_hz {
        return Err(ProcessingError::InvalidFilterConfig {
            reason: "low cutoff must be below high cutoff",
        });
    }
    if high_hz >= sample_rate / 2.0 {
        return Err(ProcessingError::InvalidFilterConfig {
            reason: "high cutoff must be below Nyquist",
        });
    }
    Ok(())
}

/// Digital poles and gain of the bandpass design.
///
/// `wn_low`/`wn_high` are cutoffs normalised to Nyquist. The zeros are fixed:
/// `order` at z = 1 and `order` at z = -1.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
fn design_zpk(order: usize, wn_low: f64, wn_high: f64) -> (Vec<Complex64>, f64) {
    // Bilinear transform with fs = 2 in normalised units
    let fs2 = 4.0;
    let warp = |wn: f64| fs2 * (PI * wn / 2.0).tan();
    let (w1, w2) = (warp(wn_low), warp(wn_high));
    let bw = w2 - w1;
    let wo = (w1 * w2).sqrt();

    let n = order as f64;
    let mut analog = Vec::with_capacity(2 * order);
    for k in 0..order {
        // Prototype poles on the left half of the unit circle
        let m = 2.0 * k as f64 - n + 1.0;
        let p = -Complex64::from_polar(1.0, PI * m / (2.0 * n));

        let p_lp = p * (bw / 2.0);
        let disc = (p_lp * p_lp - wo * wo).sqrt();
        analog.push(p_lp + disc);
        analog.push(p_lp - disc);
    }

    // Analog gain bw^order, zeros at the origin map to z = 1
    let mut gain = Complex64::new(bw.powi(order as i32) * fs2.powi(order as i32), 0.0);
    let mut poles = Vec::with_capacity(analog.len());
    for p in analog {
        gain /= fs2 - p;
        poles.push((fs2 + p) / (fs2 - p));
    }

    (poles, gain.re)
}

/// Group digital poles into conjugate (or real) pairs, one biquad per pair.
fn pair_sections(poles: &[Complex64]) -> Vec<Biquad> {
    // (z - 1)(z + 1) for every section
    let b = [1.0, 0.0, -1.0];

    let mut sections: Vec<Biquad> = poles
        .iter()
        .filter(|p| p.im > REAL_POLE_EPS)
        .map(|p| Biquad::new(BiquadCoeffs { b, a: [1.0, -2.0 * p.re, p.norm_sqr()] }))
        .collect();

    let mut reals: Vec<f64> = poles
        .iter()
        .filter(|p| p.im.abs() <= REAL_POLE_EPS)
        .map(|p| p.re)
        .collect();
    reals.sort_by(f64::total_cmp);

    for pair in reals.chunks_exact(2) {
        let (r1, r2) = (pair[0], pair[1]);
        sections.push(Biquad::new(BiquadCoeffs { b, a: [1.0, -(r1 + r2), r1 * r2] }));
    }

    sections
}
