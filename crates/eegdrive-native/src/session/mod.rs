//! Session state and the controlling loop
//!
//! - [`context`]: Everything one analysis tick needs, passed by `&mut`
//! - [`log`]: Best-effort per-epoch feature log
//! - [`pipeline`]: Fixed-cadence loop driving ticks and routing commands

pub mod context;
pub mod log;
pub mod pipeline;

pub use context::{SessionContext, TickResult};
pub use log::SessionLog;
pub use pipeline::{Pipeline, PipelineSnapshot, PipelineSummary};
