//! Error types for HydroGrow simulation operations.

use crate::ids::{ContainerId, PlayerId, SpeciesId};
use thiserror::Error;

/// Errors raised when a simulation operation is refused.
///
/// A refused operation never mutates state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// The acting player lacks the permission for the action
    #[error("player {player} may not {action}")]
    PermissionDenied {
        /// Acting player
        player: PlayerId,
        /// Human-readable action name
        action: String,
    },

    /// Slot index is outside the container
    #[error("slot {index} is out of range (capacity {capacity})")]
    InvalidSlot {
        /// Requested index
        index: usize,
        /// Container capacity
        capacity: usize,
    },

    /// Slot already holds a plant
    #[error("slot {0} is already occupied")]
    SlotOccupied(usize),

    /// Slot holds no plant
    #[error("slot {0} is empty")]
    SlotEmpty(usize),

    /// Species key is not in the catalog
    #[error("unknown species '{0}'")]
    SpeciesNotFound(SpeciesId),

    /// The target is not in a state that allows the operation
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A value lies outside the accepted range
    #[error("{parameter} value {value} outside [{min}, {max}]")]
    RangeViolation {
        /// Parameter name
        parameter: &'static str,
        /// Offending value
        value: f32,
        /// Lower bound
        min: f32,
        /// Upper bound
        max: f32,
    },

    /// Player is not registered in the session
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// Container does not exist
    #[error("unknown {0}")]
    UnknownContainer(ContainerId),

    /// Session already holds the maximum number of players
    #[error("session is full ({max} players)")]
    SessionFull {
        /// Configured maximum
        max: usize,
    },

    /// Player is already connected
    #[error("player {0} is already connected")]
    AlreadyConnected(PlayerId),
}

/// Result type alias for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
