use std::fs;
use std::path::Path;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use wl_core::errors::ErrorInfo;
use wl_core::{PersistMode, PhysicalSystem, RngHandle, WlError};

/// Pending single-spin-flip proposal.
#[derive(Debug, Clone, Copy)]
struct TrialFlip {
    site: usize,
    energy: f64,
}

/// Restart payload written by [`PersistMode::Restart`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsingRestart {
    size: usize,
    coupling: f64,
    spins: Vec<i8>,
    energy: f64,
}

/// L x L nearest-neighbour Ising model with periodic boundaries.
///
/// The Hamiltonian is `H = -J * sum_<ij> s_i s_j` with the bond sum taken
/// over each site's right and down neighbours. Proposals flip a single
/// uniformly chosen spin; the energy is maintained incrementally and can be
/// recomputed from scratch for verification.
#[derive(Debug, Clone)]
pub struct IsingLattice {
    size: usize,
    coupling: f64,
    spins: Vec<i8>,
    energy: f64,
    trial: Option<TrialFlip>,
}

impl IsingLattice {
    /// Creates a lattice with all spins up.
    pub fn new(size: usize, coupling: f64) -> Result<Self, WlError> {
        if size < 2 {
            return Err(WlError::System(
                ErrorInfo::new("lattice-too-small", "lattice requires at least 2x2 sites")
                    .with_context("size", size.to_string()),
            ));
        }
        if !coupling.is_finite() || coupling == 0.0 {
            return Err(WlError::System(
                ErrorInfo::new("lattice-coupling", "coupling must be finite and nonzero")
                    .with_context("coupling", coupling.to_string()),
            ));
        }
        let spins = vec![1i8; size * size];
        let energy = Self::energy_of(size, coupling, &spins);
        Ok(Self {
            size,
            coupling,
            spins,
            energy,
            trial: None,
        })
    }

    /// Reconstructs a lattice from a restart artifact.
    pub fn from_restart(path: &Path) -> Result<Self, WlError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("restart-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let restart: IsingRestart = serde_json::from_str(&contents).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("restart-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        if restart.spins.len() != restart.size * restart.size {
            return Err(WlError::Serde(
                ErrorInfo::new("restart-shape", "spin count does not match lattice size")
                    .with_context("size", restart.size.to_string())
                    .with_context("spins", restart.spins.len().to_string()),
            ));
        }
        let mut lattice = Self {
            size: restart.size,
            coupling: restart.coupling,
            spins: restart.spins,
            energy: restart.energy,
            trial: None,
        };
        // The stored energy is advisory; recompute so a hand-edited restart
        // file cannot desynchronize the bookkeeping.
        lattice.energy = Self::energy_of(lattice.size, lattice.coupling, &lattice.spins);
        log::info!(
            "restored {}x{} lattice from {}",
            lattice.size,
            lattice.size,
            path.display()
        );
        Ok(lattice)
    }

    /// Randomizes every spin with the provided stream.
    pub fn randomize(&mut self, rng: &mut RngHandle) {
        for spin in self.spins.iter_mut() {
            *spin = if rng.next_u64() & 1 == 0 { 1 } else { -1 };
        }
        self.energy = Self::energy_of(self.size, self.coupling, &self.spins);
        self.trial = None;
    }

    /// Committed energy tracked incrementally.
    pub fn current_energy(&self) -> f64 {
        self.energy
    }

    /// Energy recomputed from scratch over all bonds.
    pub fn recomputed_energy(&self) -> f64 {
        Self::energy_of(self.size, self.coupling, &self.spins)
    }

    /// Net magnetization of the committed configuration.
    pub fn magnetization(&self) -> i64 {
        self.spins.iter().map(|&s| s as i64).sum()
    }

    fn energy_of(size: usize, coupling: f64, spins: &[i8]) -> f64 {
        let mut bonds = 0i64;
        for row in 0..size {
            for col in 0..size {
                let here = spins[row * size + col] as i64;
                let right = spins[row * size + (col + 1) % size] as i64;
                let down = spins[((row + 1) % size) * size + col] as i64;
                bonds += here * (right + down);
            }
        }
        -coupling * bonds as f64
    }

    fn neighbour_sum(&self, site: usize) -> i64 {
        let size = self.size;
        let row = site / size;
        let col = site % size;
        let right = self.spins[row * size + (col + 1) % size] as i64;
        let left = self.spins[row * size + (col + size - 1) % size] as i64;
        let down = self.spins[((row + 1) % size) * size + col] as i64;
        let up = self.spins[((row + size - 1) % size) * size + col] as i64;
        right + left + down + up
    }
}

impl PhysicalSystem for IsingLattice {
    fn propose_move(&mut self, rng: &mut RngHandle) -> Result<(), WlError> {
        let site = (rng.next_u64() as usize) % self.spins.len();
        let delta =
            2.0 * self.coupling * self.spins[site] as f64 * self.neighbour_sum(site) as f64;
        self.trial = Some(TrialFlip {
            site,
            energy: self.energy + delta,
        });
        Ok(())
    }

    fn observe(&self) -> Result<f64, WlError> {
        Ok(self.trial.map(|t| t.energy).unwrap_or(self.energy))
    }

    fn commit(&mut self) -> Result<(), WlError> {
        if let Some(trial) = self.trial.take() {
            self.spins[trial.site] = -self.spins[trial.site];
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
                writeln!(file, "{:.9} {}", self.energy, self.magnetization()).map_err(|err| {
                    WlError::Serde(
                        ErrorInfo::new("trace-write", err.to_string())
                            .with_context("path", path.display().to_string()),
                    )
                })
            }
            PersistMode::Restart => {
                let restart = IsingRestart {
                    size: self.size,
                    coupling: self.coupling,
                    spins: self.spins.clone(),
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
        "ising"
    }
}
