//! eegdrive Application
//!
//! Unified entry point for the eegdrive pipeline: sensor ingestion, band
//! power analysis, state classification and actuator control.
//!
//! # Usage
//!
//! ```bash
//! # Full pipeline with defaults (sensor 127.0.0.1:5001, actuator :12345)
//! eegdrive run
//!
//! # With a config file and overrides
//! eegdrive --config eegdrive.toml run --sensor 10.0.0.5:5001
//!
//! # Bench setup without hardware
//! eegdrive mock-sensor --bind 127.0.0.1:5001
//! eegdrive mock-actuator --connect 127.0.0.1:12345
//! ```
//!
//! While `run` is active, type `start`, `stop` or `terminate` on stdin.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use eegdrive_native::bridge::{sample_buffer, ActuationServer, IngestionCollector, SampleWriter};
use eegdrive_native::config::PipelineConfig;
use eegdrive_native::ml::ClassifierModel;
use eegdrive_native::session::{Pipeline, PipelineSnapshot, SessionContext, SessionLog};

use eegdrive_core::types::ControlCommand;

/// Bound on the final join of each unit
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// eegdrive Application
#[derive(Parser, Debug)]
#[command(name = "eegdrive")]
#[command(author, version, about = "EEG band power state decoding and actuator control", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Pipeline configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline (default if no subcommand)
    Run {
        /// Sensor address, overrides `sensor.address`
        #[arg(long)]
        sensor: Option<String>,

        /// Actuator listener address, overrides `actuator.bind`
        #[arg(long)]
        actuator_bind: Option<String>,
    },

    /// Serve a synthetic sample stream
    MockSensor {
        /// Bind address
        #[arg(short, long, default_value = "127.0.0.1:5001")]
        bind: String,

        /// Sine frequency in Hz
        #[arg(long, default_value = "10.0")]
        frequency: f64,

        /// Sample rate in Hz
        #[arg(long, default_value = "1000.0")]
        sample_rate: f64,

        /// Amplitude in µV
        #[arg(long, default_value = "50.0")]
        amplitude: f64,
    },

    /// Connect to the actuation server and print received tokens
    MockActuator {
        /// Actuation server address
        #[arg(short, long, default_value = "127.0.0.1:12345")]
        connect: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("eegdrive v{}", env!("CARGO_PKG_VERSION"));

    let rt = Runtime::new()?;
    let result = rt.block_on(async move {
        match cli.command {
            None => run_pipeline(cli.config, None, None).await,
            Some(Commands::Run { sensor, actuator_bind }) => {
                run_pipeline(cli.config, sensor, actuator_bind).await
            }
            Some(Commands::MockSensor { bind, frequency, sample_rate, amplitude }) => {
                run_mock_sensor(&bind, frequency, sample_rate, amplitude).await
            }
            Some(Commands::MockActuator { connect }) => run_mock_actuator(&connect).await,
        }
    });

    // Stdin is read on a blocking thread that cannot be cancelled
    rt.shutdown_timeout(Duration::from_millis(200));
    result
}

/// Run the full pipeline until `terminate` or Ctrl-C
async fn run_pipeline(
    config_path: Option<PathBuf>,
    sensor: Option<String>,
    actuator_bind: Option<String>,
) -> anyhow::Result<()> {
    let mut config = PipelineConfig::load(config_path.as_deref())?;
    if let Some(sensor) = sensor {
        config.sensor.address = sensor;
    }
    if let Some(bind) = actuator_bind {
        config.actuator.bind = bind;
    }
    config.validate()?;

    let model = ClassifierModel::load(&config.artifacts.scaler, &config.artifacts.classifier)
        .context("loading classifier artifacts")?;

    let capacity = config.channels.capacity;
    let (writer, reader) = sample_buffer();
    let (ingestion_tx, ingestion_rx) = mpsc::channel(capacity);
    let (actuation_tx, actuation_rx) = mpsc::channel(capacity);
    let (user_tx, user_rx) = mpsc::channel::<String>(capacity);

    let server =
        ActuationServer::bind(&config.actuator.bind, config.actuator.tokens, config.actuator.backlog)
            .await?;
    let actuation = tokio::spawn(async move {
        match server.run(actuation_rx).await {
            Ok(summary) => info!("Actuation finished: {:?}", summary),
            Err(e) => error!("Actuation failed: {}", e),
        }
    });

    let ingestion = tokio::spawn(run_ingestion(config.sensor.address.clone(), writer, ingestion_rx));

    let context = SessionContext::new(
        &config.analysis,
        reader,
        model,
        SessionLog::new(config.session.log_dir.clone()),
    )?;
    let (pipeline, snapshots) = Pipeline::new(context, &config.analysis, ingestion_tx, actuation_tx);
    let mut analysis = tokio::spawn(pipeline.run(user_rx));

    tokio::spawn(report_snapshots(snapshots));
    tokio::spawn(read_operator_input(user_tx.clone()));

    info!("Type start, stop or terminate");

    tokio::select! {
        summary = &mut analysis => {
            info!("Analysis finished: {:?}", summary?);
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupted, terminating");
            if user_tx.send(ControlCommand::Terminate.as_token().to_string()).await.is_err() {
                warn!("Analysis loop already stopped");
            }
            info!("Analysis finished: {:?}", analysis.await?);
        }
    }
    drop(user_tx);

    join_unit("ingestion", ingestion).await;
    join_unit("actuation", actuation).await;
    Ok(())
}

async fn run_ingestion(
    address: String,
    writer: SampleWriter,
    commands: mpsc::Receiver<ControlCommand>,
) {
    let collector = match IngestionCollector::connect(&address, writer, commands).await {
        Ok(collector) => collector,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    match collector.run().await {
        Ok(summary) => info!("Ingestion finished: {:?}", summary),
        Err(e) => error!("Ingestion failed: {}", e),
    }
}

async fn join_unit(name: &str, handle: JoinHandle<()>) {
    let abort = handle.abort_handle();
    match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("{} task failed: {}", name, e),
        Err(_) => {
            warn!("{} did not stop within {:?}, aborting", name, JOIN_TIMEOUT);
            abort.abort();
        }
    }
}

/// Forward stdin lines as operator tokens
async fn read_operator_input(user_tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                if user_tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                info!("Operator input closed");
                break;
            }
            Err(e) => {
                warn!("Operator input error: {}", e);
                break;
            }
        }
    }
}

/// Log every published tick result
async fn report_snapshots(mut snapshots: watch::Receiver<PipelineSnapshot>) {
    let mut last_tick = 0;
    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        if snapshot.ticks == last_tick {
            continue;
        }
        last_tick = snapshot.ticks;
        if let (Some(features), Some(label)) = (snapshot.features, snapshot.label) {
            info!(
                "[{}] {} | {:?} | {}",
                snapshot.ticks,
                label.name(),
                features.to_array(),
                snapshot.session_file
            );
        }
    }
}

/// Stream a synthetic sine to each client that connects
async fn run_mock_sensor(
    bind: &str,
    frequency: f64,
    sample_rate: f64,
    amplitude: f64,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("Mock sensor on {} ({} Hz sine at {} Hz)", bind, frequency, sample_rate);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                info!("Client connected from {}", peer);
                tokio::spawn(async move {
                    if let Err(e) = stream_samples(stream, frequency, sample_rate, amplitude).await {
                        info!("Client {} disconnected: {}", peer, e);
                    }
                });
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                return Ok(());
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
async fn stream_samples(
    mut stream: TcpStream,
    frequency: f64,
    sample_rate: f64,
    amplitude: f64,
) -> std::io::Result<()> {
    const BATCH_PERIOD: Duration = Duration::from_millis(10);
    let per_batch = ((sample_rate * BATCH_PERIOD.as_secs_f64()).round() as usize).max(1);

    let mut interval = tokio::time::interval(BATCH_PERIOD);
    let mut n: u64 = 0;

    loop {
        interval.tick().await;
        let batch = synthetic_batch(n, per_batch, frequency, sample_rate, amplitude);
        n += per_batch as u64;
        stream.write_all(batch.as_bytes()).await?;
    }
}

/// `count` sample lines of a noisy sine, starting at sample index `start`
#[allow(clippy::cast_precision_loss)]
fn synthetic_batch(start: u64, count: usize, frequency: f64, sample_rate: f64, amplitude: f64) -> String {
    use std::f64::consts::PI;

    let mut batch = String::with_capacity(count * 10);
    for n in start..start + count as u64 {
        let t = n as f64 / sample_rate;
        let signal = (2.0 * PI * frequency * t).sin();
        let noise = (n as f64 * 0.123).sin() * 0.1; // Pseudo-noise
        batch.push_str(&format!("{:.3}\n", (signal + noise) * amplitude));
    }
    batch
}

/// Print every token received from the actuation server
async fn run_mock_actuator(addr: &str) -> anyhow::Result<()> {
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to actuation server at {addr}"))?;
    info!("Connected to actuation server at {}", addr);

    let mut buf = [0u8; 64];
    loop {
        tokio::select! {
            read = stream.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    info!("Actuation server closed the connection");
                    return Ok(());
                }
                for token in buf[..n].iter().filter(|b| **b != b'\n') {
                    info!("Token: {:?}", char::from(*token));
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_batch_lines() {
        let batch = synthetic_batch(0, 10, 10.0, 1000.0, 50.0);
        let values: Vec<f64> = batch
            .lines()
            .map(|line| line.parse().expect("decimal sample"))
            .collect();

        assert_eq!(values.len(), 10);
        assert!(batch.ends_with('\n'));
        assert_eq!(values[0], 0.0);
        assert!(values.iter().all(|v| v.abs() <= 55.0));
    }

    #[test]
    fn test_synthetic_batch_continues_from_start() {
        let whole = synthetic_batch(0, 20, 10.0, 1000.0, 50.0);
        let split = synthetic_batch(0, 10, 10.0, 1000.0, 50.0) + &synthetic_batch(10, 10, 10.0, 1000.0, 50.0);
        assert_eq!(whole, split);
    }
}
