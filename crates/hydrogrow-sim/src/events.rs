//! Outbound simulation events.
//!
//! The authority publishes every state change here; UI, replication and
//! logging layers drain the bus. The core never waits on a consumer.

use crate::authority::CommandId;
use crate::container::HarvestOutcome;
use crate::environment::EnvironmentParameter;
use crate::history::ChatMessage;
use crate::permissions::PlayerRole;
use crate::plant::GrowthStage;
use crate::time::TimeEvent;
use crossbeam_channel::{bounded, Receiver, Sender};
use hydrogrow_common::{ContainerId, PlantId, PlayerId, SpeciesId};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Events published by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A plant moved to a new growth stage
    StageChanged {
        /// Container
        container: ContainerId,
        /// Slot index
        slot: usize,
        /// Plant
        plant: PlantId,
        /// Previous stage
        from: GrowthStage,
        /// New stage
        to: GrowthStage,
    },
    /// A plant's health reached zero
    PlantDied {
        /// Container
        container: ContainerId,
        /// Slot index
        slot: usize,
        /// Plant
        plant: PlantId,
    },
    /// A seed was planted
    PlantAdded {
        /// Container
        container: ContainerId,
        /// Slot index
        slot: usize,
        /// New plant
        plant: PlantId,
        /// Species
        species: SpeciesId,
        /// Planting player
        player: PlayerId,
    },
    /// A plant was removed without harvesting
    PlantRemoved {
        /// Container
        container: ContainerId,
        /// Slot index
        slot: usize,
        /// Removed plant
        plant: PlantId,
        /// Acting player
        player: PlayerId,
    },
    /// A plant was harvested
    Harvested {
        /// Container
        container: ContainerId,
        /// Harvesting player
        player: PlayerId,
        /// What was harvested
        outcome: HarvestOutcome,
    },
    /// A plant was watered or fed directly
    PlantCared {
        /// Container
        container: ContainerId,
        /// Slot index
        slot: usize,
        /// Resulting health
        health: f32,
        /// Acting player
        player: PlayerId,
    },
    /// An environment parameter was changed by a player
    EnvironmentChanged {
        /// Container
        container: ContainerId,
        /// Parameter
        parameter: EnvironmentParameter,
        /// Applied value
        value: f32,
        /// Acting player
        player: PlayerId,
    },
    /// A pump was started or stopped
    PumpToggled {
        /// Container
        container: ContainerId,
        /// New pump state
        running: bool,
        /// Acting player
        player: PlayerId,
    },
    /// A player joined the session
    PlayerJoined {
        /// Player
        player: PlayerId,
        /// Display name
        name: String,
        /// Assigned role
        role: PlayerRole,
    },
    /// A player left the session
    PlayerLeft {
        /// Player
        player: PlayerId,
    },
    /// A player was kicked
    PlayerKicked {
        /// Kicked player
        player: PlayerId,
        /// Kicking player
        by: PlayerId,
        /// Reason given
        reason: String,
    },
    /// A player was marked offline after inactivity
    PlayerIdle {
        /// Player
        player: PlayerId,
    },
    /// A player's role changed
    RoleChanged {
        /// Player
        player: PlayerId,
        /// New role
        role: PlayerRole,
    },
    /// Session ownership moved to another player
    OwnershipTransferred {
        /// Previous owner, if still known
        from: Option<PlayerId>,
        /// New owner
        to: PlayerId,
    },
    /// A chat line was posted
    Chat(ChatMessage),
    /// A submitted command was applied
    CommandApplied {
        /// Command
        command: CommandId,
        /// Submitting player
        player: PlayerId,
    },
    /// A submitted command was rejected without changing state
    CommandRejected {
        /// Command
        command: CommandId,
        /// Submitting player
        player: PlayerId,
        /// Why it was rejected
        reason: String,
    },
    /// The game clock reported a time event
    Time(TimeEvent),
    /// The periodic auto-save interval elapsed
    AutoSaveDue {
        /// Authority tick at which it fired
        tick: u64,
    },
}

/// Fire-and-forget consumer of simulation events.
pub trait EventSink: Send + std::fmt::Debug {
    /// Delivers one event. Must not block.
    fn emit(&self, event: SimEvent);
}

/// Bounded event bus. Events published while the bus is full are dropped.
#[derive(Debug)]
pub struct EventBus {
    sender: Sender<SimEvent>,
    receiver: Receiver<SimEvent>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: SimEvent) {
        if self.sender.try_send(event).is_err() {
            warn!("Event bus full ({} pending), dropping event", self.capacity);
        }
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<SimEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<SimEvent> {
        self.sender.clone()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: SimEvent) {
        self.publish(event);
    }
}

impl EventSink for Sender<SimEvent> {
    fn emit(&self, event: SimEvent) {
        let _ = self.try_send(event);
    }
}
