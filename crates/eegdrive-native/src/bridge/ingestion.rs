//! Streaming ingestion collector
//!
//! Owns the TCP connection to the sensing device. Every inbound line is
//! decoded into samples; while a recording epoch is active they are appended
//! to the shared buffer, otherwise they are drained and discarded.
//!
//! The socket read and the command channel are awaited together, so a
//! collector blocked on a silent sensor still reacts to `Terminate`
//! immediately.
//!
//! ```rust,ignore
//! let (writer, reader) = sample_buffer();
//! let (cmd_tx, cmd_rx) = mpsc::channel(32);
//!
//! let collector = IngestionCollector::connect("127.0.0.1:5001", writer, cmd_rx).await?;
//! let handle = tokio::spawn(collector.run());
//!
//! cmd_tx.send(ControlCommand::Start).await?;
//! // ... reader.len() grows ...
//! cmd_tx.send(ControlCommand::Terminate).await?;
//! let summary = handle.await??;
//! ```

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use eegdrive_core::protocol::SampleDecoder;
use eegdrive_core::types::ControlCommand;

use super::buffer::SampleWriter;

/// Socket read chunk size
const READ_CHUNK: usize = 4096;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that end the ingestion collector.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Connection to the sensor could not be established
    #[error("Failed to connect to sensor at {addr}: {source}")]
    Connect {
        /// Sensor address
        addr: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Read from the sensor socket failed
    #[error("Sensor read error: {0}")]
    Io(#[from] std::io::Error),

    /// Sensor closed the connection
    #[error("Sensor disconnected")]
    Disconnected,
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

// ============================================================================
// Collector
// ============================================================================

/// Whether decoded samples are kept.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum CollectorState {
    /// Connected, draining the socket, samples discarded
    Suspended,
    /// Samples appended to the shared buffer
    Forwarding,
}

/// Counters reported when the collector ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestionSummary {
    /// Samples appended to the buffer
    pub forwarded: usize,
    /// Samples decoded while suspended
    pub discarded: usize,
    /// Fields that failed to decode
    pub malformed: usize,
    /// Recording epochs started
    pub epochs: u32,
}

/// Sensor read loop and sole writer of the shared sample buffer.
pub struct IngestionCollector<S = TcpStream> {
    stream: S,
    writer: SampleWriter,
    commands: mpsc::Receiver<ControlCommand>,
    decoder: SampleDecoder,
    state: CollectorState,
    summary: IngestionSummary,
}

impl IngestionCollector<TcpStream> {
    /// Connect to the sensor at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestionError::Connect`] if the connection fails.
    pub async fn connect(
        addr: &str,
        writer: SampleWriter,
        commands: mpsc::Receiver<ControlCommand>,
    ) -> IngestionResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| IngestionError::Connect { addr: addr.to_string(), source })?;
        tracing::info!("Connected to sensor at {}", addr);
        Ok(Self::from_stream(stream, writer, commands))
    }
}

impl<S: AsyncRead + Unpin> IngestionCollector<S> {
    /// Wrap an already connected stream
    pub fn from_stream(
        stream: S,
        writer: SampleWriter,
        commands: mpsc::Receiver<ControlCommand>,
    ) -> Self {
        Self {
            stream,
            writer,
            commands,
            decoder: SampleDecoder::new(),
            state: CollectorState::Suspended,
            summary: IngestionSummary::default(),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Counters so far
    #[must_use]
    pub fn summary(&self) -> IngestionSummary {
        self.summary
    }

    /// Apply a control command. Returns `false` once the collector must end.
    pub fn apply(&mut self, command: ControlCommand) -> bool {
        match command {
            ControlCommand::Start => {
                self.summary.epochs += 1;
                self.state = CollectorState::Forwarding;
                tracing::info!("Recording epoch {} started", self.summary.epochs);
                true
            }
            ControlCommand::Stop => {
                if self.state == CollectorState::Forwarding {
                    tracing::info!("Recording epoch {} stopped", self.summary.epochs);
                }
                self.state = CollectorState::Suspended;
                true
            }
            ControlCommand::Terminate => {
                tracing::info!("Ingestion terminating");
                false
            }
        }
    }

    /// Run until terminated or the sensor disconnects.
    ///
    /// A closed command channel counts as `Terminate`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestionError::Disconnected`] on EOF and
    /// [`IngestionError::Io`] on a read failure.
    pub async fn run(mut self) -> IngestionResult<IngestionSummary> {
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut decoded = Vec::with_capacity(READ_CHUNK);

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    let keep_running = match command {
                        Some(command) => self.apply(command),
                        None => {
                            tracing::info!("Command channel closed, ingestion terminating");
                            false
                        }
                    };
                    if !keep_running {
                        return Ok(self.summary);
                    }
                }

                read = self.stream.read(&mut chunk) => {
                    match read {
                        Ok(0) => {
                            tracing::error!("Sensor closed the connection: {:?}", self.summary);
                            return Err(IngestionError::Disconnected);
                        }
                        Ok(n) => {
                            decoded.clear();
                            self.ingest(&chunk[..n], &mut decoded);
                        }
                        Err(e) => {
                            tracing::error!("Sensor read failed: {}", e);
                            return Err(IngestionError::Io(e));
                        }
                    }
                }
            }
        }
    }

    fn ingest(&mut self, bytes: &[u8], decoded: &mut Vec<f64>) {
        let stats = self.decoder.feed(bytes, decoded);

        if stats.malformed > 0 || stats.oversized > 0 {
            tracing::debug!(
                "Skipped {} malformed fields and {} oversized lines",
                stats.malformed,
                stats.oversized
            );
        }
        self.summary.malformed += stats.malformed;

        match self.state {
            CollectorState::Forwarding => {
                self.writer.append(decoded);
                self.summary.forwarded += decoded.len();
            }
            CollectorState::Suspended => self.summary.discarded += decoded.len(),
        }
    }
}
