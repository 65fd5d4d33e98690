#![deny(missing_docs)]
//! Concrete physical systems for the density-of-states sampler.
//!
//! Each system implements the [`wl_core::PhysicalSystem`] capability set and
//! owns its configuration state; the engine only ever sees scalar
//! observables.

/// Nearest-neighbour Ising lattice with periodic boundaries.
pub mod ising;
/// Independent quantum-oscillator level ladder.
pub mod ladder;

pub use ising::IsingLattice;
pub use ladder::LevelLadder;
