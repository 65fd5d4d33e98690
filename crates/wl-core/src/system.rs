//! Capability contract between the sampling engine and physical systems.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::WlError;
use crate::rng::RngHandle;

/// Persistence mode requested from a physical system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistMode {
    /// Generic trace dump appended during a run (energies, configurations).
    Trace,
    /// Structured restart file sufficient to reconstruct the system.
    Restart,
}

/// Capability set a physical system exposes to the sampling engine.
///
/// The engine drives the system through trial moves and never inspects its
/// internal representation. A system holds one committed configuration and at
/// most one trial configuration at a time. `propose_move` replaces the trial,
/// `commit` promotes it, `rollback` discards it. `observe` reports the scalar
/// order parameter of the trial state and must be deterministic for a fixed
/// state.
///
/// Any error returned from these methods is unrecoverable at the engine layer:
/// the run aborts and the last checkpoint remains the recovery point. A
/// collaborator with transient internal failures must resolve them before
/// returning.
pub trait PhysicalSystem: Send {
    /// Produces a candidate configuration held internally as the trial state.
    fn propose_move(&mut self, rng: &mut RngHandle) -> Result<(), WlError>;

    /// Returns the scalar observable of the trial state.
    fn observe(&self) -> Result<f64, WlError>;

    /// Promotes the trial state to the committed state.
    fn commit(&mut self) -> Result<(), WlError>;

    /// Discards the trial state, restoring the committed state.
    fn rollback(&mut self) -> Result<(), WlError>;

    /// Writes a persistence artifact for the committed state.
    fn persist(&self, mode: PersistMode, path: &Path) -> Result<(), WlError>;

    /// Short identifier recorded in manifests and snapshots.
    fn label(&self) -> &str;
}
