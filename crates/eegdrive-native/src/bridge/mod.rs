//! Network bridges and the shared sample buffer
//!
//! This module provides the long-lived I/O units of a session:
//! - [`buffer`]: Single-writer, multi-reader shared sample buffer
//! - [`ingestion`]: TCP client reading samples from the sensing device
//! - [`actuation`]: TCP server forwarding decisions to the actuator
//!
//! Each unit runs as its own tokio task and is driven through a bounded
//! `mpsc` channel of typed messages.

pub mod actuation;
pub mod buffer;
pub mod ingestion;

pub use actuation::{
    ActuationError, ActuationMessage, ActuationResult, ActuationServer, ActuationSummary,
    ServerState,
};
pub use buffer::{sample_buffer, SampleReader, SampleWriter};
pub use ingestion::{
    CollectorState, IngestionCollector, IngestionError, IngestionResult, IngestionSummary,
};
