//! Per-session analysis context
//!
//! [`SessionContext`] owns the band pipelines, the loaded model, a reader on
//! the shared buffer and the session log. One call to
//! [`SessionContext::tick`] turns the latest analysis window into a label.

use serde::Serialize;

use eegdrive_core::error::ProcessingError;
use eegdrive_core::types::{AnalysisWindow, FeatureVector, StateLabel};

use crate::bridge::buffer::SampleReader;
use crate::config::AnalysisConfig;
use crate::ml::artifact::ClassifierModel;
use crate::ml::features::FeatureExtractor;
use crate::processing::conditioning::remove_baseline;

use super::log::SessionLog;

/// Output of one analysis tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TickResult {
    /// Buffer length observed at the start of the tick
    pub buffer_len: usize,
    /// Window that was analysed
    pub window: AnalysisWindow,
    /// Band powers of the window
    pub features: FeatureVector,
    /// Classification decision
    pub label: StateLabel,
}

/// State owned by the analysis loop.
pub struct SessionContext {
    reader: SampleReader,
    extractor: FeatureExtractor,
    model: ClassifierModel,
    log: SessionLog,
    sample_rate: f64,
    window_seconds: f64,
}

impl SessionContext {
    /// Build the context, designing every band filter once.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::InvalidFilterConfig`] if a band filter
    /// cannot be realised with `config`.
    pub fn new(
        config: &AnalysisConfig,
        reader: SampleReader,
        model: ClassifierModel,
        log: SessionLog,
    ) -> Result<Self, ProcessingError> {
        let extractor = FeatureExtractor::new(
            config.filter_order,
            config.welch_window_seconds,
            config.sample_rate_hz,
        )?;
        Ok(Self {
            reader,
            extractor,
            model,
            log,
            sample_rate: config.sample_rate_hz,
            window_seconds: config.window_seconds,
        })
    }

    /// Committed buffer length
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.reader.len()
    }

    /// Session log
    #[must_use]
    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Session log, for opening and closing epochs
    pub fn log_mut(&mut self) -> &mut SessionLog {
        &mut self.log
    }

    /// Analyse the latest window. `None` while the buffer is empty.
    pub fn tick(&mut self) -> Option<TickResult> {
        let buffer_len = self.reader.len();
        if buffer_len == 0 {
            return None;
        }

        let window = AnalysisWindow::latest(buffer_len, self.sample_rate, self.window_seconds);
        let samples = self.reader.slice(window.sample_range(self.sample_rate, buffer_len));
        let conditioned = remove_baseline(samples);

        let features = self.extractor.extract(&conditioned);
        let label = self.model.classify(&features);

        if self.log.is_recording() {
            self.log.append(&features);
        }

        tracing::debug!(
            "Tick [{:.0}, {:.0}) s over {} samples: {:?} -> {}",
            window.t_start,
            window.t_end,
            buffer_len,
            features.to_array(),
            label.name()
        );

        Some(TickResult { buffer_len, window, features, label })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::buffer::sample_buffer;
    use crate::ml::classifier::LinearClassifier;
    use crate::ml::scaler::IdentityScaler;
    use eegdrive_core::types::Band;
    use std::f64::consts::PI;

    /// Quiescent when alpha power exceeds 0.1
    fn alpha_model() -> ClassifierModel {
        ClassifierModel::new(
            Box::new(IdentityScaler),
            Box::new(LinearClassifier {
                coef: vec![0.0, 0.0, 1.0, 0.0, 0.0],
                intercept: -0.1,
                classes: [0, 1],
            }),
        )
    }

    fn context(reader: SampleReader, log: SessionLog) -> SessionContext {
        SessionContext::new(&AnalysisConfig::default(), reader, alpha_model(), log)
            .expect("default config is realisable")
    }

    #[test]
    fn test_empty_buffer_skips_tick() {
        let (_writer, reader) = sample_buffer();
        let mut ctx = context(reader, SessionLog::new("."));
        assert_eq!(ctx.tick(), None);
    }

    #[test]
    fn test_alpha_sine_through_pipeline() {
        let (mut writer, reader) = sample_buffer();
        let samples: Vec<f64> = (0..10_000)
            .map(|i| (2.0 * PI * 10.0 * f64::from(i) / 1000.0).sin())
            .collect();
        writer.append(&samples);

        let mut ctx = context(reader, SessionLog::new("."));
        let result = ctx.tick().expect("non-empty buffer");

        assert_eq!(result.buffer_len, 10_000);
        assert_eq!((result.window.t_start, result.window.t_end), (9.0, 10.0));
        assert_eq!(result.features.dominant_band(), Some(Band::Alpha));
        assert_eq!(result.label, StateLabel::Quiescent);
    }

    #[test]
    fn test_zero_window_is_deterministic() {
        let (mut writer, reader) = sample_buffer();
        writer.append(&vec![0.0; 1000]);

        let mut ctx = context(reader, SessionLog::new("."));
        let first = ctx.tick().expect("non-empty buffer");
        let second = ctx.tick().expect("non-empty buffer");

        assert_eq!(first.features.to_array(), [0.0; Band::COUNT]);
        assert_eq!(first.label, StateLabel::Active);
        assert_eq!(first, second);
    }

    #[test]
    fn test_short_buffer_classifies_empty_window() {
        let (mut writer, reader) = sample_buffer();
        writer.append(&[1.0; 400]);

        let mut ctx = context(reader, SessionLog::new("."));
        let result = ctx.tick().expect("non-empty buffer");
        assert_eq!(result.window.duration(), 0.0);
        assert_eq!(result.features, FeatureVector::default());
    }

    #[test]
    fn test_recording_appends_features() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut writer, reader) = sample_buffer();
        writer.append(&vec![0.0; 2000]);

        let mut ctx = context(reader, SessionLog::new(dir.path()));
        ctx.tick();
        let name = ctx.log_mut().open_epoch().to_string();
        ctx.tick();
        ctx.tick();
        ctx.log_mut().close_epoch();
        ctx.tick();

        let text = std::fs::read_to_string(dir.path().join(name)).expect("read");
        assert_eq!(text.lines().count(), 2);
    }
}
