//! Signal processing pipelines
//!
//! This module provides signal processing for the analysis window:
//! - [`conditioning`]: Window selection and baseline removal
//! - [`filters`]: Butterworth bandpass filtering (IIR, second-order sections)
//! - [`fft`]: Welch spectral analysis and band power

pub mod conditioning;
pub mod fft;
pub mod filters;
