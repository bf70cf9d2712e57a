//! Controlling loop
//!
//! Runs [`SessionContext::tick`] at a fixed cadence, forwards each label to
//! the actuation server, publishes a [`PipelineSnapshot`] for dashboards and
//! routes operator commands to the ingestion collector.
//!
//! The loop never awaits a peer: every send is a `try_send`, so a stalled
//! or dead unit cannot block analysis.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use eegdrive_core::types::{ControlCommand, FeatureVector, StateLabel};

use crate::bridge::actuation::ActuationMessage;
use crate::config::AnalysisConfig;

use super::context::SessionContext;
use super::log::PLACEHOLDER_FILE_NAME;

/// Latest pipeline output, published after every tick and command.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    /// Ticks that produced a result
    pub ticks: u64,
    /// Buffer length at the last tick
    pub buffer_len: usize,
    /// Band powers of the last tick
    pub features: Option<FeatureVector>,
    /// Label of the last tick
    pub label: Option<StateLabel>,
    /// Current session file name
    pub session_file: String,
    /// True while a recording epoch is active
    pub recording: bool,
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self {
            ticks: 0,
            buffer_len: 0,
            features: None,
            label: None,
            session_file: PLACEHOLDER_FILE_NAME.to_string(),
            recording: false,
        }
    }
}

/// Counters reported when the loop ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    /// Ticks that produced a result
    pub ticks: u64,
    /// Labels queued for the actuator
    pub labels_sent: u64,
    /// Labels dropped on a full or closed actuation queue
    pub labels_dropped: u64,
}

/// Reports once per episode of a non-growing buffer while recording.
#[derive(Debug)]
struct StallDetector {
    threshold: u32,
    last_len: usize,
    idle_ticks: u32,
    reported: bool,
}

impl StallDetector {
    fn new(threshold: u32) -> Self {
        Self { threshold, last_len: 0, idle_ticks: 0, reported: false }
    }

    /// Returns `true` when a new stall episode begins
    fn observe(&mut self, len: usize, recording: bool) -> bool {
        if len > self.last_len || !recording {
            self.last_len = len;
            self.idle_ticks = 0;
            self.reported = false;
            return false;
        }
        self.idle_ticks = self.idle_ticks.saturating_add(1);
        if self.threshold > 0 && self.idle_ticks >= self.threshold && !self.reported {
            self.reported = true;
            return true;
        }
        false
    }
}

/// Fixed-cadence analysis loop.
pub struct Pipeline {
    context: SessionContext,
    ingestion: mpsc::Sender<ControlCommand>,
    actuation: mpsc::Sender<ActuationMessage>,
    snapshots: watch::Sender<PipelineSnapshot>,
    poll_interval: Duration,
    stall: StallDetector,
    snapshot: PipelineSnapshot,
    summary: PipelineSummary,
}

impl Pipeline {
    /// Create the loop, returning it with a snapshot receiver
    pub fn new(
        context: SessionContext,
        config: &AnalysisConfig,
        ingestion: mpsc::Sender<ControlCommand>,
        actuation: mpsc::Sender<ActuationMessage>,
    ) -> (Self, watch::Receiver<PipelineSnapshot>) {
        let (snapshots, rx) = watch::channel(PipelineSnapshot::default());
        let pipeline = Self {
            context,
            ingestion,
            actuation,
            snapshots,
            poll_interval: config.poll_interval(),
            stall: StallDetector::new(config.stall_ticks),
            snapshot: PipelineSnapshot::default(),
            summary: PipelineSummary::default(),
        };
        (pipeline, rx)
    }

    /// Run until a `terminate` token arrives or the command channel closes.
    ///
    /// `user_commands` carries raw operator tokens; unrecognised tokens are
    /// logged and ignored.
    pub async fn run(mut self, mut user_commands: mpsc::Receiver<String>) -> PipelineSummary {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Analysis loop running every {:?}", self.poll_interval);

        loop {
            tokio::select! {
                biased;

                token = user_commands.recv() => {
                    let Some(token) = token else {
                        tracing::info!("Operator channel closed");
                        self.handle_command(ControlCommand::Terminate);
                        break;
                    };
                    match ControlCommand::from_token(&token) {
                        Ok(command) => {
                            if !self.handle_command(command) {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("Ignoring operator input {:?}: {}", token.trim(), e),
                    }
                }

                _ = interval.tick() => self.on_tick(),
            }
        }

        tracing::info!("Analysis loop stopped: {:?}", self.summary);
        self.summary
    }

    fn on_tick(&mut self) {
        let recording = self.context.log().is_recording();
        if self.stall.observe(self.context.buffer_len(), recording) {
            tracing::warn!(
                "Sample buffer has not grown for {} ticks (len {})",
                self.stall.idle_ticks,
                self.context.buffer_len()
            );
        }

        let Some(result) = self.context.tick() else {
            return;
        };
        self.summary.ticks += 1;

        match self.actuation.try_send(ActuationMessage::Label(result.label)) {
            Ok(()) => self.summary.labels_sent += 1,
            Err(TrySendError::Full(_)) => {
                self.summary.labels_dropped += 1;
                tracing::warn!("Actuation queue full, dropping {} label", result.label.name());
            }
            Err(TrySendError::Closed(_)) => {
                self.summary.labels_dropped += 1;
                tracing::debug!("Actuation server gone, dropping {} label", result.label.name());
            }
        }

        self.snapshot.ticks = self.summary.ticks;
        self.snapshot.buffer_len = result.buffer_len;
        self.snapshot.features = Some(result.features);
        self.snapshot.label = Some(result.label);
        self.publish();
    }

    /// Apply an operator command. Returns `false` once the loop must end.
    fn handle_command(&mut self, command: ControlCommand) -> bool {
        tracing::info!("Operator command: {}", command.as_token());

        let delivered = match self.ingestion.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::error!("Ingestion queue full, {} not delivered", command.as_token());
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("Ingestion gone, {} not delivered", command.as_token());
                false
            }
        };

        // A new epoch opens only if the collector will start forwarding
        match command {
            ControlCommand::Start if delivered => {
                let log = self.context.log_mut();
                log.close_epoch();
                log.open_epoch();
            }
            ControlCommand::Start => {}
            ControlCommand::Stop | ControlCommand::Terminate => self.context.log_mut().close_epoch(),
        }

        let keep_running = command != ControlCommand::Terminate;
        if !keep_running {
            if let Err(e) = self.actuation.try_send(ActuationMessage::Terminate) {
                tracing::warn!("Could not deliver terminate to actuation: {}", e);
            }
        }

        self.publish();
        keep_running
    }

    fn publish(&mut self) {
        let log = self.context.log();
        self.snapshot.session_file = log.file_name().to_string();
        self.snapshot.recording = log.is_recording();
        self.snapshots.send_replace(self.snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::buffer::sample_buffer;
    use crate::ml::artifact::ClassifierModel;
    use crate::ml::classifier::LinearClassifier;
    use crate::ml::scaler::IdentityScaler;
    use crate::session::log::SessionLog;

    fn config() -> AnalysisConfig {
        AnalysisConfig { poll_interval_ms: 10, stall_ticks: 2, ..AnalysisConfig::default() }
    }

    fn model() -> ClassifierModel {
        ClassifierModel::new(
            Box::new(IdentityScaler),
            Box::new(LinearClassifier { coef: vec![0.0; 5], intercept: 1.0, classes: [0, 1] }),
        )
    }

    #[test]
    fn test_stall_detector_reports_once() {
        let mut stall = StallDetector::new(2);
        assert!(!stall.observe(100, true));
        assert!(!stall.observe(100, true));
        assert!(stall.observe(100, true));
        assert!(!stall.observe(100, true));
        // Growth ends the episode
        assert!(!stall.observe(200, true));
        assert!(!stall.observe(200, true));
        assert!(stall.observe(200, true));
        // Not recording: never a stall
        assert!(!stall.observe(200, false));
        assert!(!stall.observe(200, false));
        assert!(!stall.observe(200, false));
    }

    #[tokio::test]
    async fn test_pipeline_routes_commands_and_labels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut writer, reader) = sample_buffer();
        writer.append(&vec![0.0; 2000]);

        let cfg = config();
        let ctx = SessionContext::new(&cfg, reader, model(), SessionLog::new(dir.path()))
            .expect("context");
        let (ing_tx, mut ing_rx) = mpsc::channel(8);
        let (act_tx, mut act_rx) = mpsc::channel(8);
        let (pipeline, mut snapshots) = Pipeline::new(ctx, &cfg, ing_tx, act_tx);
        let (user_tx, user_rx) = mpsc::channel(8);
        let handle = tokio::spawn(pipeline.run(user_rx));

        user_tx.send("start".to_string()).await.expect("send");
        assert_eq!(ing_rx.recv().await, Some(ControlCommand::Start));

        let label = act_rx.recv().await.expect("label");
        assert_eq!(label, ActuationMessage::Label(StateLabel::Quiescent));

        snapshots
            .wait_for(|s| s.ticks > 0 && s.recording)
            .await
            .expect("snapshot published");
        let snapshot = snapshots.borrow().clone();
        assert!(snapshot.session_file.starts_with("datas_"));
        assert_eq!(snapshot.buffer_len, 2000);
        assert_eq!(snapshot.features, Some(FeatureVector::default()));

        user_tx.send("bogus".to_string()).await.expect("send");
        user_tx.send("terminate".to_string()).await.expect("send");

        let summary = handle.await.expect("join");
        assert!(summary.ticks >= 1);
        assert_eq!(ing_rx.recv().await, Some(ControlCommand::Terminate));

        // Drain remaining labels until the terminate marker
        loop {
            match act_rx.recv().await {
                Some(ActuationMessage::Terminate) | None => break,
                Some(ActuationMessage::Label(_)) => {}
            }
        }
        assert_eq!(snapshots.borrow().session_file, PLACEHOLDER_FILE_NAME);
    }

    #[tokio::test]
    async fn test_undelivered_start_keeps_epoch_closed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_writer, reader) = sample_buffer();
        let cfg = config();
        let ctx = SessionContext::new(&cfg, reader, model(), SessionLog::new(dir.path()))
            .expect("context");
        let (ing_tx, mut ing_rx) = mpsc::channel(1);
        let (act_tx, _act_rx) = mpsc::channel(8);
        ing_tx.try_send(ControlCommand::Stop).expect("fill queue");

        let (mut pipeline, snapshots) = Pipeline::new(ctx, &cfg, ing_tx, act_tx);
        assert!(pipeline.handle_command(ControlCommand::Start));
        assert!(!snapshots.borrow().recording);
        assert_eq!(snapshots.borrow().session_file, PLACEHOLDER_FILE_NAME);

        assert_eq!(ing_rx.recv().await, Some(ControlCommand::Stop));
        assert!(pipeline.handle_command(ControlCommand::Start));
        assert!(snapshots.borrow().recording);
        assert_eq!(ing_rx.recv().await, Some(ControlCommand::Start));
    }

    #[tokio::test]
    async fn test_pipeline_survives_dead_peers() {
        let (_writer, reader) = sample_buffer();
        let cfg = config();
        let ctx = SessionContext::new(&cfg, reader, model(), SessionLog::new("."))
            .expect("context");
        let (ing_tx, ing_rx) = mpsc::channel(1);
        let (act_tx, act_rx) = mpsc::channel(1);
        drop(ing_rx);
        drop(act_rx);

        let (pipeline, _snapshots) = Pipeline::new(ctx, &cfg, ing_tx, act_tx);
        let (user_tx, user_rx) = mpsc::channel(8);
        let handle = tokio::spawn(pipeline.run(user_rx));

        user_tx.send("stop".to_string()).await.expect("send");
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(user_tx);

        let summary = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop ended")
            .expect("join");
        assert_eq!(summary.ticks, 0);
    }
}
