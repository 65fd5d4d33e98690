use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use wl_core::errors::ErrorInfo;
use wl_core::WlError;

/// YAML-configurable parameters governing a sampling run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Energy window partitioned into equal-width bins.
    pub window: WindowConfig,
    /// Modification-factor annealing schedule.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Flatness test and stagnation policy.
    #[serde(default)]
    pub flatness: FlatnessConfig,
    /// Checkpointing behaviour.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
    /// Whether this walker is the designated reporter performing all I/O.
    ///
    /// Non-reporter walkers execute the identical state machine but skip every
    /// filesystem side effect.
    #[serde(default = "default_reporter")]
    pub reporter: bool,
}

fn default_reporter() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            schedule: ScheduleConfig::default(),
            flatness: FlatnessConfig::default(),
            checkpoint: CheckpointConfig::default(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
            reporter: default_reporter(),
        }
    }
}

impl RunConfig {
    /// Parses a configuration from a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, WlError> {
        let config: RunConfig = serde_yaml::from_str(contents).map_err(|err| {
            WlError::Config(ErrorInfo::new("config-parse", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, WlError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            WlError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Checks the configuration for degenerate windows and schedules.
    pub fn validate(&self) -> Result<(), WlError> {
        self.window.validate()?;
        self.schedule.validate()?;
        self.flatness.validate()
    }
}

/// Fixed equal-width partition of the observable range `[emin, emax)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowConfig {
    /// Lower edge of the sampled window (inclusive).
    pub emin: f64,
    /// Upper edge of the sampled window (exclusive).
    pub emax: f64,
    /// Number of equal-width bins.
    #[serde(default = "default_bins")]
    pub bins: usize,
}

fn default_bins() -> usize {
    100
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            emin: 0.0,
            emax: 1.0,
            bins: default_bins(),
        }
    }
}

impl WindowConfig {
    fn validate(&self) -> Result<(), WlError> {
        if !self.emin.is_finite() || !self.emax.is_finite() || self.emax <= self.emin {
            return Err(WlError::Config(
                ErrorInfo::new("window-degenerate", "energy window must satisfy emin < emax")
                    .with_context("emin", self.emin.to_string())
                    .with_context("emax", self.emax.to_string()),
            ));
        }
        if self.bins == 0 {
            return Err(WlError::Config(ErrorInfo::new(
                "window-no-bins",
                "energy window requires at least one bin",
            )));
        }
        Ok(())
    }
}

/// Modification-factor annealing schedule, held in log space.
///
/// The stored quantity is `ln f`: the additive log-DOS increment per visit.
/// Annealing divides it by `reducer`, so `reducer = 2` is the conventional
/// square-root schedule `f -> sqrt(f)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    /// Initial `ln f` (1.0 corresponds to `f = e`).
    #[serde(default = "default_log_factor_initial")]
    pub log_factor_initial: f64,
    /// Terminal `ln f`; the run converges once `ln f` drops to this value.
    #[serde(default = "default_log_factor_final")]
    pub log_factor_final: f64,
    /// Divisor applied to `ln f` at every annealing iteration.
    #[serde(default = "default_reducer")]
    pub reducer: f64,
}

fn default_log_factor_initial() -> f64 {
    1.0
}

fn default_log_factor_final() -> f64 {
    1e-8
}

fn default_reducer() -> f64 {
    2.0
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            log_factor_initial: default_log_factor_initial(),
            log_factor_final: default_log_factor_final(),
            reducer: default_reducer(),
        }
    }
}

impl ScheduleConfig {
    fn validate(&self) -> Result<(), WlError> {
        if !(self.reducer > 1.0) {
            return Err(WlError::Config(
                ErrorInfo::new("schedule-reducer", "reducer must exceed 1")
                    .with_context("reducer", self.reducer.to_string()),
            ));
        }
        if !(self.log_factor_final > 0.0) || self.log_factor_initial < self.log_factor_final {
            return Err(WlError::Config(
                ErrorInfo::new(
                    "schedule-degenerate",
                    "log factors must satisfy 0 < final <= initial",
                )
                .with_context("initial", self.log_factor_initial.to_string())
                .with_context("final", self.log_factor_final.to_string()),
            ));
        }
        Ok(())
    }
}

/// Flatness criterion and stagnation-refresh policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatnessConfig {
    /// Fraction of the mean visited-bin count every visited bin must exceed.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Number of sampling steps between flatness checks (batch size).
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    /// Consecutive failed checks before the histogram is refreshed.
    #[serde(default = "default_refresh_after")]
    pub refresh_after: u64,
    /// Visited bins below this fraction of the mean count are cleared on refresh.
    #[serde(default = "default_refresh_fraction")]
    pub refresh_fraction: f64,
}

fn default_tolerance() -> f64 {
    0.8
}

fn default_check_interval() -> u64 {
    1000
}

fn default_refresh_after() -> u64 {
    20
}

fn default_refresh_fraction() -> f64 {
    0.5
}

impl Default for FlatnessConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            check_interval: default_check_interval(),
            refresh_after: default_refresh_after(),
            refresh_fraction: default_refresh_fraction(),
        }
    }
}

impl FlatnessConfig {
    fn validate(&self) -> Result<(), WlError> {
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(WlError::Config(
                ErrorInfo::new("flatness-tolerance", "tolerance must lie in (0, 1)")
                    .with_context("tolerance", self.tolerance.to_string()),
            ));
        }
        if self.check_interval == 0 {
            return Err(WlError::Config(ErrorInfo::new(
                "flatness-interval",
                "check interval must be at least one step",
            )));
        }
        if self.refresh_after == 0 {
            return Err(WlError::Config(ErrorInfo::new(
                "flatness-refresh-after",
                "refresh threshold must be at least one check",
            )));
        }
        if !(self.refresh_fraction > 0.0 && self.refresh_fraction <= 1.0) {
            return Err(WlError::Config(
                ErrorInfo::new("flatness-refresh-fraction", "refresh fraction must lie in (0, 1]")
                    .with_context("fraction", self.refresh_fraction.to_string()),
            ));
        }
        Ok(())
    }
}

/// Checkpointing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointConfig {
    /// Wall-clock seconds between rolling backup checkpoints (0 disables them).
    #[serde(default = "default_backup_interval")]
    pub backup_interval_secs: u64,
    /// Maximum number of iteration checkpoints to retain.
    #[serde(default = "default_checkpoint_retention")]
    pub max_to_keep: usize,
}

fn default_backup_interval() -> u64 {
    300
}

fn default_checkpoint_retention() -> usize {
    8
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backup_interval_secs: default_backup_interval(),
            max_to_keep: default_checkpoint_retention(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label used when deriving substream seeds (documented in manifests).
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0xD05E_5EED_D05E_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Created if it does not exist.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Flatness-check metrics filename relative to `run_directory`.
    #[serde(default = "default_metrics_filename")]
    pub metrics_file: PathBuf,
    /// Subdirectory used for checkpoint files.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
    /// Normalized DOS export filename relative to `run_directory`.
    #[serde(default = "default_dos_filename")]
    pub dos_file: PathBuf,
    /// Final histogram export filename relative to `run_directory`.
    #[serde(default = "default_histogram_filename")]
    pub histogram_file: PathBuf,
    /// Physical-system restart artifact filename relative to `run_directory`.
    #[serde(default = "default_restart_filename")]
    pub restart_file: PathBuf,
    /// Physical-system trace artifact filename relative to `run_directory`.
    #[serde(default = "default_trace_filename")]
    pub trace_file: PathBuf,
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_metrics_filename() -> PathBuf {
    PathBuf::from("metrics.csv")
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

fn default_dos_filename() -> PathBuf {
    PathBuf::from("dos.csv")
}

fn default_histogram_filename() -> PathBuf {
    PathBuf::from("histogram.csv")
}

fn default_restart_filename() -> PathBuf {
    PathBuf::from("system_restart.json")
}

fn default_trace_filename() -> PathBuf {
    PathBuf::from("trace.dat")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            manifest_file: default_manifest_filename(),
            metrics_file: default_metrics_filename(),
            checkpoint_dir: default_checkpoint_dir(),
            dos_file: default_dos_filename(),
            histogram_file: default_histogram_filename(),
            restart_file: default_restart_filename(),
            trace_file: default_trace_filename(),
        }
    }
}

/// Computes the content hash recorded in manifests and provenance payloads.
pub fn config_hash(config: &RunConfig) -> Result<String, WlError> {
    let bytes = serde_json::to_vec(config)
        .map_err(|err| WlError::Serde(ErrorInfo::new("config-hash", err.to_string())))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
