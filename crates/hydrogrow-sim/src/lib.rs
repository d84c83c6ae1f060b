//! # HydroGrow Simulation
//!
//! The authoritative core of HydroGrow, a cooperative hydroponics garden.
//!
//! This crate provides:
//! - Environmental state and nutrient solution
//! - Growth model (per-factor effectiveness, overall growth rate)
//! - Plant lifecycle state machine and harvest yield
//! - Container simulation (drift, depletion, evaporation, pump)
//! - Species catalog and game clock
//! - Role-based permissions and the session player registry
//! - Command authority with an outbound event bus
//! - Scheduler for auto-save and inactivity sweeps
//! - Replication snapshots and save files
//! - Interaction targets

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod authority;
pub mod container;
pub mod environment;
pub mod events;
pub mod growth;
pub mod history;
pub mod interaction;
pub mod permissions;
pub mod plant;
pub mod save;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod species;
pub mod time;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::authority::*;
    pub use crate::container::*;
    pub use crate::environment::*;
    pub use crate::events::*;
    pub use crate::growth::*;
    pub use crate::history::*;
    pub use crate::interaction::*;
    pub use crate::permissions::*;
    pub use crate::plant::*;
    pub use crate::save::*;
    pub use crate::scheduler::*;
    pub use crate::session::*;
    pub use crate::snapshot::*;
    pub use crate::species::*;
    pub use crate::time::*;
}

pub use prelude::*;
