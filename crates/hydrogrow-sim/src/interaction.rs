//! Things a player can interact with, and what the interaction does.

use crate::authority::{Authority, Command};
use crate::container::ContainerSimulator;
use crate::permissions::NetworkAction;
use crate::plant::{GrowthStage, PlantLifecycle};
use hydrogrow_common::ContainerId;
use serde::{Deserialize, Serialize};

/// Water given by a single watering interaction.
pub const WATER_PER_INTERACTION: f32 = 1.0;

/// Capability shared by interactable objects.
pub trait Interactable {
    /// Prompt shown to the player.
    fn interaction_prompt(&self) -> String;

    /// Permission the primary interaction needs.
    fn primary_action(&self) -> NetworkAction;
}

impl Interactable for PlantLifecycle {
    fn interaction_prompt(&self) -> String {
        match self.stage() {
            GrowthStage::Harvest => format!("Harvest {}", self.species()),
            GrowthStage::Dead => format!("Remove dead {}", self.species()),
            stage => format!(
                "Water {} ({}, {:.0}%)",
                self.species(),
                stage.display_name(),
                self.progress() * 100.0
            ),
        }
    }

    fn primary_action(&self) -> NetworkAction {
        match self.stage() {
            GrowthStage::Harvest => NetworkAction::Harvest,
            GrowthStage::Dead => NetworkAction::RemovePlant,
            _ => NetworkAction::WaterPlant,
        }
    }
}

impl Interactable for ContainerSimulator {
    fn interaction_prompt(&self) -> String {
        let name = self.container_type().display_name();
        if !self.container_type().has_pump() {
            format!("Inspect {name}")
        } else if self.is_pump_running() {
            format!("Stop {name} pump")
        } else {
            format!("Start {name} pump")
        }
    }

    fn primary_action(&self) -> NetworkAction {
        NetworkAction::OperateEquipment
    }
}

/// Something a player is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionTarget {
    /// A container's equipment
    Container(ContainerId),
    /// The plant in one slot
    Plant {
        /// Container
        container: ContainerId,
        /// Slot index
        slot: usize,
    },
}

/// A resolved interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    /// Prompt text
    pub prompt: String,
    /// Permission required
    pub action: NetworkAction,
    /// Command that performs it, if the interaction changes anything
    pub command: Option<Command>,
}

impl InteractionTarget {
    /// Container the target belongs to.
    #[must_use]
    pub fn container(self) -> ContainerId {
        match self {
            Self::Container(id) | Self::Plant { container: id, .. } => id,
        }
    }

    /// Resolves the primary interaction, or `None` if the target is gone.
    #[must_use]
    pub fn resolve(self, authority: &Authority) -> Option<Interaction> {
        let container = authority.container(self.container())?;
        match self {
            Self::Container(id) => {
                let command = if !container.container_type().has_pump() {
                    None
                } else if container.is_pump_running() {
                    Some(Command::StopPump { container: id })
                } else {
                    Some(Command::StartPump { container: id })
                };
                Some(Interaction {
                    prompt: container.interaction_prompt(),
                    action: container.primary_action(),
                    command,
                })
            }
            Self::Plant { container: id, slot } => {
                let plant = container.plant(slot)?;
                let action = plant.primary_action();
                let command = match action {
                    NetworkAction::Harvest => Command::HarvestPlant { container: id, slot },
                    NetworkAction::RemovePlant => Command::RemovePlant { container: id, slot },
                    _ => Command::WaterPlant {
                        container: id,
                        slot,
                        amount: WATER_PER_INTERACTION,
                    },
                };
                Some(Interaction {
                    prompt: plant.interaction_prompt(),
                    action,
                    command: Some(command),
                })
            }
        }
    }
}
