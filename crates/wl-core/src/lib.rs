#![deny(missing_docs)]
//! Core traits and shared types for the Wang-Landau sampling workspace.

pub mod errors;
pub mod provenance;
pub mod rng;
pub mod system;

pub use errors::{ErrorInfo, WlError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use system::{PersistMode, PhysicalSystem};
