use std::fs;
use std::path::Path;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use wl_core::errors::ErrorInfo;
use wl_core::{PersistMode, PhysicalSystem, RngHandle, WlError};

#[derive(Debug, Clone, Copy)]
struct TrialShift {
    site: usize,
    level: u32,
    energy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LadderRestart {
    sites: usize,
    omega: f64,
    levels: Vec<u32>,
    energy: f64,
}

/// Independent harmonic-oscillator level ladder.
///
/// Each of the `sites` oscillators holds a non-negative excitation level
/// `n_i`; the total energy is `omega * sum_i (n_i + 1/2)`. Proposals raise or
/// lower one uniformly chosen site by a single quantum, raising whenever the
/// site sits in its ground state. The spectrum is unbounded above, so
/// observables routinely leave a finite sampling window; the model exists to
/// exercise exactly that behaviour.
#[derive(Debug, Clone)]
pub struct LevelLadder {
    sites: usize,
    omega: f64,
    levels: Vec<u32>,
    energy: f64,
    trial: Option<TrialShift>,
}

impl LevelLadder {
    /// Creates a ladder with every oscillator in its ground state.
    pub fn new(sites: usize, omega: f64) -> Result<Self, WlError> {
        if sites == 0 {
            return Err(WlError::System(ErrorInfo::new(
                "ladder-empty",
                "ladder requires at least one site",
            )));
        }
        if !omega.is_finite() || omega <= 0.0 {
            return Err(WlError::System(
                ErrorInfo::new("ladder-omega", "level spacing must be finite and positive")
                    .with_context("omega", omega.to_string()),
            ));
        }
        let levels = vec![0u32; sites];
        let energy = omega * 0.5 * sites as f64;
        Ok(Self {
            sites,
            omega,
            levels,
            energy,
            trial: None,
        })
    }

    /// Reconstructs a ladder from a restart artifact.
    pub fn from_restart(path: &Path) -> Result<Self, WlError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("restart-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let restart: LadderRestart = serde_json::from_str(&contents).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("restart-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        if restart.levels.len() != restart.sites {
            return Err(WlError::Serde(
                ErrorInfo::new("restart-shape", "level count does not match site count")
                    .with_context("sites", restart.sites.to_string())
                    .with_context("levels", restart.levels.len().to_string()),
            ));
        }
        let mut ladder = Self {
            sites: restart.sites,
            omega: restart.omega,
            levels: restart.levels,
            energy: restart.energy,
            trial: None,
        };
        ladder.energy = ladder.recomputed_energy();
        Ok(ladder)
    }

    /// Committed energy tracked incrementally.
    pub fn current_energy(&self) -> f64 {
        self.energy
    }

    /// Energy recomputed from scratch over all sites.
    pub fn recomputed_energy(&self) -> f64 {
        self.omega
            * self
                .levels
                .iter()
                .map(|&n| n as f64 + 0.5)
                .sum::<f64>()
    }

    /// Total number of excitation quanta in the committed configuration.
    pub fn total_quanta(&self) -> u64 {
        self.levels.iter().map(|&n| n as u64).sum()
    }
}

impl PhysicalSystem for LevelLadder {
    fn propose_move(&mut self, rng: &mut RngHandle) -> Result<(), WlError> {
        let site = (rng.next_u64() as usize) % self.sites;
        let current = self.levels[site];
        let raise = current == 0 || rng.next_u64() & 1 == 0;
        let (level, delta) = if raise {
            (current + 1, self.omega)
        } else {
            (current - 1, -self.omega)
        };
        self.trial = Some(TrialShift {
            site,
            level,
            energy: self.energy + delta,
        });
        Ok(())
    }

    fn observe(&self) -> Result<f64, WlError> {
        Ok(self.trial.map(|t| t.energy).unwrap_or(self.energy))
    }

    fn commit(&mut self) -> Result<(), WlError> {
        if let Some(trial) = self.trial.take() {
            self.levels[trial.site] = trial.level;
            self.energy = trial.energy;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), WlError> {
        self.trial = None;
        Ok(())
    }

    fn persist(&self, mode: PersistMode, path: &Path) -> Result<(), WlError> {
        match mode {
            PersistMode::Trace => {
                use std::io::Write;
                let mut file = fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|err| {
                        WlError::Serde(
                            ErrorInfo::new("trace-open", err.to_string())
                                .with_context("path", path.display().to_string()),
                        )
                    })?;
                writeln!(file, "{:.9} {}", self.energy, self.total_quanta()).map_err(|err| {
                    WlError::Serde(
                        ErrorInfo::new("trace-write", err.to_string())
                            .with_context("path", path.display().to_string()),
                    )
                })
            }
            PersistMode::Restart => {
                let restart = LadderRestart {
                    sites: self.sites,
                    omega: self.omega,
                    levels: self.levels.clone(),
                    energy: self.energy,
                };
                let json = serde_json::to_string_pretty(&restart).map_err(|err| {
                    WlError::Serde(ErrorInfo::new("restart-serialize", err.to_string()))
                })?;
                fs::write(path, json).map_err(|err| {
                    WlError::Serde(
                        ErrorInfo::new("restart-write", err.to_string())
                            .with_context("path", path.display().to_string()),
                    )
                })
            }
        }
    }

    fn label(&self) -> &str {
        "oscillator-ladder"
    }
}
