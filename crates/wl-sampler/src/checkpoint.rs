use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wl_core::errors::ErrorInfo;
use wl_core::{SchemaVersion, WlError};

use crate::config::RunConfig;
use crate::histogram::HistogramState;
use crate::metrics::RunCounters;

/// Serializable snapshot of a run: everything the engine needs to resume,
/// plus a reference to the physical system's own restart artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotPayload {
    /// Schema version of the snapshot format.
    pub schema_version: SchemaVersion,
    /// Configuration snapshot associated with the run.
    pub config: RunConfig,
    /// Master seed used to derive per-step substreams.
    pub master_seed: u64,
    /// `ln f` in effect when the snapshot was written.
    pub log_factor: f64,
    /// Run counters at snapshot time.
    pub counters: RunCounters,
    /// Observable of the committed walker state.
    pub current_energy: f64,
    /// Histogram and DOS state.
    pub histogram: HistogramState,
    /// Label of the physical system driving the run.
    pub system_label: String,
    /// Restart artifact the physical system wrote alongside this snapshot.
    pub system_restart: Option<PathBuf>,
    /// ISO-8601 timestamp recording when the snapshot was written.
    pub created_at: String,
}

impl SnapshotPayload {
    /// Restores the payload from disk.
    pub fn load(path: &Path) -> Result<Self, WlError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("snapshot-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("snapshot-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Writes the payload to disk.
    pub fn store(&self, path: &Path) -> Result<(), WlError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                WlError::Serde(
                    ErrorInfo::new("snapshot-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("snapshot-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("snapshot-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Path of the checkpoint written at the end of an annealing iteration.
pub fn iteration_path(root: &Path, iteration: u64) -> PathBuf {
    root.join(format!("ckpt_iter_{iteration:03}.json"))
}

/// Path of the rolling wall-clock backup checkpoint.
pub fn backup_path(root: &Path) -> PathBuf {
    root.join("ckpt_backup.json")
}

/// Path of the snapshot written when the run converges.
pub fn final_path(root: &Path) -> PathBuf {
    root.join("ckpt_final.json")
}
