use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wl_core::errors::ErrorInfo;
use wl_core::{RunProvenance, WlError};

use crate::config::RunConfig;

/// Structured manifest describing a completed sampling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Label of the physical system that drove the run.
    pub system_label: String,
    /// Provenance (config hash, seed, timestamp) tying the artifacts together.
    pub provenance: RunProvenance,
    /// Completed annealing iterations.
    pub iterations: u64,
    /// Total sampling steps executed.
    pub total_steps: u64,
    /// Metrics file produced during the run (relative to run directory).
    pub metrics_file: Option<PathBuf>,
    /// Normalized DOS export (relative to run directory).
    pub dos_file: Option<PathBuf>,
    /// Final histogram export (relative to run directory).
    pub histogram_file: Option<PathBuf>,
    /// Checkpoint files generated during the run (relative order preserved).
    pub checkpoints: Vec<PathBuf>,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), WlError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                WlError::Serde(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, WlError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
