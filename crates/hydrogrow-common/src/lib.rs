//! # HydroGrow Common
//!
//! Common types shared by every HydroGrow crate.
//!
//! This crate provides the foundational pieces the simulation and the host
//! agree on:
//! - Identifier types (PlayerId, ContainerId, PlantId, SpeciesId)
//! - Slot placement coordinates
//! - Schema versions and magic bytes for versioned records
//! - The shared error taxonomy
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
