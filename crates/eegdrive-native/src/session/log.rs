//! Best-effort session log
//!
//! While a recording epoch is active every tick's feature vector is appended
//! to `datas_%Y-%m-%d_%H-%M-%S.txt` as one line of `,\t`-separated band
//! powers. Failures are reported through `tracing` and never propagate.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;

use eegdrive_core::types::FeatureVector;

/// File name published while no epoch is active
pub const PLACEHOLDER_FILE_NAME: &str = "datas.txt";

/// Session file name format (local time of the `start` command)
const FILE_NAME_FORMAT: &str = "datas_%Y-%m-%d_%H-%M-%S.txt";

/// Append-only log of the current recording epoch.
#[derive(Debug)]
pub struct SessionLog {
    dir: PathBuf,
    epoch: Option<Epoch>,
}

#[derive(Debug)]
struct Epoch {
    name: String,
    /// `None` once the file failed to open or write
    file: Option<File>,
}

impl SessionLog {
    /// Create a log writing into `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), epoch: None }
    }

    /// Begin a new epoch named after the current local time
    pub fn open_epoch(&mut self) -> &str {
        let name = Local::now().format(FILE_NAME_FORMAT).to_string();
        self.open_named(name)
    }

    fn open_named(&mut self, name: String) -> &str {
        let path = self.dir.join(&name);
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                tracing::info!("Recording to {}", path.display());
                Some(file)
            }
            Err(e) => {
                tracing::warn!("Cannot open session file {}: {}", path.display(), e);
                None
            }
        };
        &self.epoch.insert(Epoch { name, file }).name
    }

    /// End the current epoch, if any
    pub fn close_epoch(&mut self) {
        if let Some(epoch) = self.epoch.take() {
            tracing::info!("Closed session file {}", epoch.name);
        }
    }

    /// True while an epoch is active
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.epoch.is_some()
    }

    /// Current session file name, or [`PLACEHOLDER_FILE_NAME`]
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.epoch.as_ref().map_or(PLACEHOLDER_FILE_NAME, |e| e.name.as_str())
    }

    /// Append one feature vector to the active epoch
    pub fn append(&mut self, features: &FeatureVector) {
        let Some(epoch) = self.epoch.as_mut() else {
            return;
        };
        let Some(file) = epoch.file.as_mut() else {
            return;
        };

        let line = features
            .as_slice()
            .iter()
            .map(|p| format!("{p:.2}"))
            .collect::<Vec<_>>()
            .join(",\t");

        if let Err(e) = writeln!(file, "{line}") {
            tracing::warn!("Session log write to {} failed, logging disabled: {}", epoch.name, e);
            epoch.file = None;
        }
    }
}
