//! Single-writer authority over all containers and the session.
//!
//! Clients submit [`Command`]s tagged with their player ID. The authority
//! drains the queue at the start of each tick, validates each command
//! (player known, container known, permission, input ranges) and applies
//! it atomically, then publishes the resulting [`SimEvent`]s. A rejected
//! command changes nothing and produces a `CommandRejected` event.

use crate::container::{ContainerSimulator, ContainerType};
use crate::environment::{
    EnvironmentParameter, NutrientSolution, EC_MAX, EC_MIN, NUTRIENT_MAX, PH_MAX, PH_MIN,
};
use crate::events::{EventBus, EventSink, SimEvent};
use crate::permissions::{check_access, ContainerAccess, NetworkAction, PlayerRole};
use crate::save::SaveGame;
use crate::scheduler::{Scheduler, TaskId};
use crate::session::{PlayerRegistry, SessionSettings};
use crate::snapshot::WorldSnapshot;
use crate::species::SpeciesRegistry;
use crate::time::{GameClock, TimeEvent, TimeMode};
use crossbeam_channel::{unbounded, Receiver, Sender};
use hydrogrow_common::{ContainerId, PlayerId, SimError, SimResult, SpeciesId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Seconds between inactivity sweeps.
const IDLE_SWEEP_INTERVAL: f32 = 60.0;

/// Identifier assigned to a submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId(u64);

impl CommandId {
    /// Creates a command ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A state change requested by a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Plant a seed
    PlantSeed {
        /// Target container
        container: ContainerId,
        /// Slot index
        slot: usize,
        /// Species to plant
        species: SpeciesId,
    },
    /// Remove a plant without harvesting
    RemovePlant {
        /// Target container
        container: ContainerId,
        /// Slot index
        slot: usize,
    },
    /// Harvest a ready plant
    HarvestPlant {
        /// Target container
        container: ContainerId,
        /// Slot index
        slot: usize,
    },
    /// Water a plant
    WaterPlant {
        /// Target container
        container: ContainerId,
        /// Slot index
        slot: usize,
        /// Water amount (> 0)
        amount: f32,
    },
    /// Feed a plant directly
    ApplyPlantNutrients {
        /// Target container
        container: ContainerId,
        /// Slot index
        slot: usize,
        /// Nutrient levels (non-negative)
        levels: NutrientSolution,
    },
    /// Set solution pH
    SetPh {
        /// Target container
        container: ContainerId,
        /// New pH, must lie in [4, 8]
        value: f32,
    },
    /// Set solution EC
    SetEc {
        /// Target container
        container: ContainerId,
        /// New EC, must lie in [0, 4]
        value: f32,
    },
    /// Set reservoir water level (clamped to [0, 1])
    SetWaterLevel {
        /// Target container
        container: ContainerId,
        /// New level
        value: f32,
    },
    /// Top up the nutrient solution
    AddNutrients {
        /// Target container
        container: ContainerId,
        /// Amounts to add
        levels: NutrientSolution,
    },
    /// Start the pump
    StartPump {
        /// Target container
        container: ContainerId,
    },
    /// Stop the pump
    StopPump {
        /// Target container
        container: ContainerId,
    },
    /// Change a player's role
    SetPlayerRole {
        /// Player whose role changes
        target: PlayerId,
        /// New role
        role: PlayerRole,
    },
    /// Remove a player from the session
    KickPlayer {
        /// Player to remove
        target: PlayerId,
        /// Reason shown to the session
        reason: String,
    },
    /// Post a chat line
    Chat {
        /// Message text
        text: String,
    },
}

impl Command {
    /// Permission the command requires, if any.
    #[must_use]
    pub fn action(&self) -> Option<NetworkAction> {
        Some(match self {
            Self::PlantSeed { .. } => NetworkAction::PlantSeed,
            Self::RemovePlant { .. } => NetworkAction::RemovePlant,
            Self::HarvestPlant { .. } => NetworkAction::Harvest,
            Self::WaterPlant { .. } => NetworkAction::WaterPlant,
            Self::ApplyPlantNutrients { .. } => NetworkAction::ApplyPlantNutrients,
            Self::SetPh { .. } | Self::SetEc { .. } | Self::SetWaterLevel { .. } => {
                NetworkAction::AdjustEnvironment
            }
            Self::AddNutrients { .. } => NetworkAction::AddNutrients,
            Self::StartPump { .. } | Self::StopPump { .. } => NetworkAction::OperateEquipment,
            Self::SetPlayerRole { .. } => NetworkAction::ManagePermissions,
            Self::KickPlayer { .. } => NetworkAction::KickPlayer,
            Self::Chat { .. } => return None,
        })
    }

    /// Container the command targets, if any.
    #[must_use]
    pub fn container(&self) -> Option<ContainerId> {
        match self {
            Self::PlantSeed { container, .. }
            | Self::RemovePlant { container, .. }
            | Self::HarvestPlant { container, .. }
            | Self::WaterPlant { container, .. }
            | Self::ApplyPlantNutrients { container, .. }
            | Self::SetPh { container, .. }
            | Self::SetEc { container, .. }
            | Self::SetWaterLevel { container, .. }
            | Self::AddNutrients { container, .. }
            | Self::StartPump { container }
            | Self::StopPump { container } => Some(*container),
            Self::SetPlayerRole { .. } | Self::KickPlayer { .. } | Self::Chat { .. } => None,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlantSeed { .. } => "PlantSeed",
            Self::RemovePlant { .. } => "RemovePlant",
            Self::HarvestPlant { .. } => "HarvestPlant",
            Self::WaterPlant { .. } => "WaterPlant",
            Self::ApplyPlantNutrients { .. } => "ApplyPlantNutrients",
            Self::SetPh { .. } => "SetPh",
            Self::SetEc { .. } => "SetEc",
            Self::SetWaterLevel { .. } => "SetWaterLevel",
            Self::AddNutrients { .. } => "AddNutrients",
            Self::StartPump { .. } => "StartPump",
            Self::StopPump { .. } => "StopPump",
            Self::SetPlayerRole { .. } => "SetPlayerRole",
            Self::KickPlayer { .. } => "KickPlayer",
            Self::Chat { .. } => "Chat",
        }
    }
}

/// A command with its submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Assigned ID
    pub id: CommandId,
    /// Submitting player
    pub player: PlayerId,
    /// The command
    pub command: Command,
}

/// Result of processing one command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Command ID
    pub id: CommandId,
    /// Submitting player
    pub player: PlayerId,
    /// Whether it was applied
    pub result: SimResult<()>,
}

/// Cloneable handle for submitting commands from other threads.
#[derive(Debug, Clone)]
pub struct CommandSender {
    sender: Sender<CommandEnvelope>,
    next_id: Arc<AtomicU64>,
}

impl CommandSender {
    /// Queues a command for the next tick.
    ///
    /// Returns `None` if the authority has been dropped.
    pub fn submit(&self, player: PlayerId, command: Command) -> Option<CommandId> {
        let id = CommandId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sender
            .send(CommandEnvelope {
                id,
                player,
                command,
            })
            .ok()
            .map(|()| id)
    }
}

/// Periodic session work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTask {
    /// Request an auto-save from the host
    AutoSave,
    /// Mark idle players offline
    IdleSweep,
}

/// The authoritative simulation.
#[derive(Debug)]
pub struct Authority {
    containers: BTreeMap<ContainerId, ContainerSimulator>,
    registry: PlayerRegistry,
    species: SpeciesRegistry,
    clock: GameClock,
    events: EventBus,
    sinks: Vec<Box<dyn EventSink>>,
    inbox: Receiver<CommandEnvelope>,
    sender: CommandSender,
    scheduler: Scheduler<SessionTask>,
    auto_save_task: TaskId,
    tick: u64,
    next_container_id: u32,
}

impl Authority {
    /// Creates an authority with no containers and no players.
    #[must_use]
    pub fn new(settings: SessionSettings, species: SpeciesRegistry) -> Self {
        Self::from_parts(
            PlayerRegistry::new(settings),
            species,
            GameClock::new(),
            Vec::new(),
            0,
        )
    }

    pub(crate) fn from_parts(
        registry: PlayerRegistry,
        species: SpeciesRegistry,
        clock: GameClock,
        containers: Vec<ContainerSimulator>,
        tick: u64,
    ) -> Self {
        let (tx, inbox) = unbounded();
        let mut scheduler = Scheduler::new();
        let auto_save_task = scheduler.schedule_repeating(
            registry.settings().auto_save_interval_secs,
            SessionTask::AutoSave,
        );
        scheduler.schedule_repeating(IDLE_SWEEP_INTERVAL, SessionTask::IdleSweep);

        let containers: BTreeMap<_, _> = containers.into_iter().map(|c| (c.id(), c)).collect();
        let next_container_id = containers
            .keys()
            .next_back()
            .map_or(1, |id| id.raw() + 1);

        Self {
            containers,
            registry,
            species,
            clock,
            events: EventBus::default(),
            sinks: Vec::new(),
            inbox,
            sender: CommandSender {
                sender: tx,
                next_id: Arc::new(AtomicU64::new(1)),
            },
            scheduler,
            auto_save_task,
            tick,
            next_container_id,
        }
    }

    /// Creates a container owned by `owner` and returns its ID.
    pub fn create_container(
        &mut self,
        container_type: ContainerType,
        capacity: usize,
        owner: PlayerId,
        shared: bool,
    ) -> ContainerId {
        let id = ContainerId::new(self.next_container_id);
        let container =
            ContainerSimulator::new(id, container_type, capacity, owner).with_shared(shared);
        self.insert_container(container);
        id
    }

    /// Adds a prepared container, replacing any with the same ID.
    pub fn insert_container(&mut self, container: ContainerSimulator) {
        let id = container.id();
        self.next_container_id = self.next_container_id.max(id.raw() + 1);
        self.containers.insert(id, container);
    }

    /// A container by ID.
    #[must_use]
    pub fn container(&self, id: ContainerId) -> Option<&ContainerSimulator> {
        self.containers.get(&id)
    }

    /// All containers in ID order.
    pub fn containers(&self) -> impl Iterator<Item = &ContainerSimulator> {
        self.containers.values()
    }

    /// The player registry.
    #[must_use]
    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    /// The species catalog.
    #[must_use]
    pub fn species(&self) -> &SpeciesRegistry {
        &self.species
    }

    /// The game clock.
    #[must_use]
    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    /// Switches the clock speed. Returns false if the mode was unchanged.
    pub fn set_time_mode(&mut self, mode: TimeMode) -> bool {
        let event = self.clock.set_mode(mode);
        self.publish_time(event)
    }

    /// Pauses game time, remembering the current speed.
    pub fn pause_time(&mut self) -> bool {
        let event = self.clock.pause();
        self.publish_time(event)
    }

    /// Resumes game time at the speed it was paused from.
    pub fn resume_time(&mut self) -> bool {
        let event = self.clock.resume();
        self.publish_time(event)
    }

    fn publish_time(&self, event: Option<TimeEvent>) -> bool {
        match event {
            Some(event) => {
                self.publish(SimEvent::Time(event));
                true
            }
            None => false,
        }
    }

    /// Advances the clock over time spent offline. Returns the hours
    /// actually processed.
    pub fn catch_up_offline(&mut self, hours: f32) -> f32 {
        self.clock.process_offline_hours(hours)
    }

    /// Ticks elapsed.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Seconds until the next auto-save request.
    #[must_use]
    pub fn next_auto_save_in(&self) -> Option<f32> {
        self.scheduler.time_remaining(self.auto_save_task)
    }

    /// Captures a replication snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self)
    }

    /// Captures the current state as a named save.
    #[must_use]
    pub fn save_game(&self, name: &str) -> SaveGame {
        SaveGame::capture(name, self)
    }

    /// The outbound event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Adds a sink that receives a copy of every published event.
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    fn publish(&self, event: SimEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
        self.events.publish(event);
    }

    /// Drains pending events.
    pub fn drain_events(&self) -> Vec<SimEvent> {
        self.events.drain()
    }

    /// A handle for submitting commands.
    #[must_use]
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Queues a command for the next tick.
    pub fn submit(&self, player: PlayerId, command: Command) -> CommandId {
        let id = CommandId(self.sender.next_id.fetch_add(1, Ordering::Relaxed));
        // The inbox lives as long as self, so this cannot fail.
        let _ = self.sender.sender.send(CommandEnvelope {
            id,
            player,
            command,
        });
        id
    }

    /// Applies every queued command in submission order.
    pub fn process_commands(&mut self) -> Vec<CommandOutcome> {
        let pending: Vec<_> = self.inbox.try_iter().collect();
        pending
            .into_iter()
            .map(|envelope| {
                let result = self
                    .apply(envelope.id, envelope.player, &envelope.command)
                    .map(|_| ());
                CommandOutcome {
                    id: envelope.id,
                    player: envelope.player,
                    result,
                }
            })
            .collect()
    }

    /// Validates and applies one command immediately, publishing the
    /// outcome. Returns the events the command produced.
    fn apply(
        &mut self,
        id: CommandId,
        player: PlayerId,
        command: &Command,
    ) -> SimResult<Vec<SimEvent>> {
        match self.execute(player, command) {
            Ok(events) => {
                for event in &events {
                    self.publish(event.clone());
                }
                self.publish(SimEvent::CommandApplied {
                    command: id,
                    player,
                });
                Ok(events)
            }
            Err(err) => {
                warn!("Rejected {} from player {player}: {err}", command.name());
                self.publish(SimEvent::CommandRejected {
                    command: id,
                    player,
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn apply_now(&mut self, player: PlayerId, command: &Command) -> SimResult<Vec<SimEvent>> {
        let id = CommandId(self.sender.next_id.fetch_add(1, Ordering::Relaxed));
        self.apply(id, player, command)
    }

    /// Checks whether `player` may perform `action`, optionally against a
    /// container. Side-effect free.
    #[must_use]
    pub fn can_perform(
        &self,
        player: PlayerId,
        action: NetworkAction,
        container: Option<ContainerId>,
    ) -> bool {
        self.authorize(player, action, container).is_ok()
    }

    fn authorize(
        &self,
        player: PlayerId,
        action: NetworkAction,
        container: Option<ContainerId>,
    ) -> SimResult<()> {
        if player.is_system() {
            return Ok(());
        }
        let access = match container {
            Some(id) => {
                let c = self
                    .containers
                    .get(&id)
                    .ok_or(SimError::UnknownContainer(id))?;
                Some(ContainerAccess {
                    owner: c.owner(),
                    shared: c.is_shared(),
                })
            }
            None => None,
        };
        let result = check_access(player, self.registry.permissions(player), action, access);
        if result.allowed {
            return Ok(());
        }
        if self.registry.get(player).is_none() {
            return Err(SimError::UnknownPlayer(player));
        }
        debug!(
            "Access check failed for {player}: {}",
            result
                .denial_reason
                .map_or("denied", |reason| reason.display_name())
        );
        Err(SimError::PermissionDenied {
            player,
            action: action.display_name().to_string(),
        })
    }

    fn container_mut(&mut self, id: ContainerId) -> SimResult<&mut ContainerSimulator> {
        self.containers
            .get_mut(&id)
            .ok_or(SimError::UnknownContainer(id))
    }

    /// Validates and applies a command, returning the events it produced.
    fn execute(&mut self, player: PlayerId, command: &Command) -> SimResult<Vec<SimEvent>> {
        if !player.is_system() && self.registry.get(player).is_none() {
            return Err(SimError::UnknownPlayer(player));
        }
        if let Some(id) = command.container() {
            if !self.containers.contains_key(&id) {
                return Err(SimError::UnknownContainer(id));
            }
        }
        if let Some(action) = command.action() {
            self.authorize(player, action, command.container())?;
        }
        validate_ranges(command)?;

        let mut events = Vec::new();
        let detail;
        match command {
            Command::PlantSeed {
                container,
                slot,
                species,
            } => {
                let c = self
                    .containers
                    .get_mut(container)
                    .ok_or(SimError::UnknownContainer(*container))?;
                let plant = c.plant_seed(species, *slot, player, &self.species)?;
                events.push(SimEvent::PlantAdded {
                    container: *container,
                    slot: *slot,
                    plant,
                    species: species.clone(),
                    player,
                });
                detail = format!("planted {species} in slot {slot}");
            }
            Command::RemovePlant { container, slot } => {
                let plant = self.container_mut(*container)?.remove_plant(*slot)?;
                events.push(SimEvent::PlantRemoved {
                    container: *container,
                    slot: *slot,
                    plant: plant.id(),
                    player,
                });
                detail = format!("removed {} from slot {slot}", plant.species());
            }
            Command::HarvestPlant { container, slot } => {
                let c = self
                    .containers
                    .get_mut(container)
                    .ok_or(SimError::UnknownContainer(*container))?;
                let outcome = c.harvest(*slot, &self.species)?;
                detail = format!(
                    "harvested {} x{} from slot {slot}",
                    outcome.species, outcome.yield_amount
                );
                events.push(SimEvent::Harvested {
                    container: *container,
                    player,
                    outcome,
                });
            }
            Command::WaterPlant {
                container,
                slot,
                amount,
            } => {
                let c = self.container_mut(*container)?;
                c.water_plant(*slot, *amount)?;
                events.push(plant_cared(c, *slot, player));
                detail = format!("watered slot {slot}");
            }
            Command::ApplyPlantNutrients {
                container,
                slot,
                levels,
            } => {
                let c = self.container_mut(*container)?;
                c.apply_plant_nutrients(*slot, levels)?;
                events.push(plant_cared(c, *slot, player));
                detail = format!("fed slot {slot}");
            }
            Command::SetPh { container, value } => {
                let applied = self.container_mut(*container)?.set_ph(*value);
                events.push(environment_changed(
                    *container,
                    EnvironmentParameter::Ph,
                    applied,
                    player,
                ));
                detail = format!("set pH to {applied:.2}");
            }
            Command::SetEc { container, value } => {
                let applied = self.container_mut(*container)?.set_ec(*value);
                events.push(environment_changed(
                    *container,
                    EnvironmentParameter::Ec,
                    applied,
                    player,
                ));
                detail = format!("set EC to {applied:.2}");
            }
            Command::SetWaterLevel { container, value } => {
                let applied = self.container_mut(*container)?.set_water_level(*value);
                events.push(environment_changed(
                    *container,
                    EnvironmentParameter::WaterLevel,
                    applied,
                    player,
                ));
                detail = format!("set water level to {applied:.2}");
            }
            Command::AddNutrients { container, levels } => {
                let ec = self.container_mut(*container)?.add_nutrients(levels);
                events.push(environment_changed(
                    *container,
                    EnvironmentParameter::Nutrients,
                    ec,
                    player,
                ));
                detail = format!("added nutrients, EC {ec:.2}");
            }
            Command::StartPump { container } => {
                self.container_mut(*container)?.start_pump()?;
                events.push(SimEvent::PumpToggled {
                    container: *container,
                    running: true,
                    player,
                });
                detail = "started pump".to_string();
            }
            Command::StopPump { container } => {
                self.container_mut(*container)?.stop_pump();
                events.push(SimEvent::PumpToggled {
                    container: *container,
                    running: false,
                    player,
                });
                detail = "stopped pump".to_string();
            }
            Command::SetPlayerRole { target, role } => {
                events.extend(self.registry.set_role(*target, *role)?);
                self.follow_ownership(&events);
                detail = format!("set {target} to {}", role.display_name());
            }
            Command::KickPlayer { target, reason } => {
                if *target == player {
                    return Err(SimError::InvalidState(
                        "players cannot kick themselves".to_string(),
                    ));
                }
                events.push(SimEvent::PlayerKicked {
                    player: *target,
                    by: player,
                    reason: reason.clone(),
                });
                events.extend(self.registry.kick(*target, reason)?);
                detail = format!("kicked {target}: {reason}");
            }
            Command::Chat { text } => {
                events.push(self.registry.broadcast_chat(player, text, false)?);
                self.registry.touch(player);
                return Ok(events);
            }
        }

        if let Some(action) = command.action() {
            self.registry
                .record_action(player, action, command.container(), detail);
        }
        Ok(events)
    }

    /// Moves containers owned by a previous session owner to the new one.
    fn follow_ownership(&mut self, events: &[SimEvent]) {
        for event in events {
            if let SimEvent::OwnershipTransferred {
                from: Some(previous),
                to,
            } = event
            {
                for container in self.containers.values_mut() {
                    if container.owner() == *previous {
                        container.set_owner(*to);
                    }
                }
            }
        }
    }

    /// Advances the whole simulation by `dt` real seconds.
    ///
    /// Queued commands are applied first, then the clock, containers and
    /// session timers advance.
    pub fn tick(&mut self, dt: f32) {
        self.process_commands();

        for event in self.clock.update(dt) {
            self.publish(SimEvent::Time(event));
        }
        self.registry.advance(dt);

        let mut produced = Vec::new();
        for container in self.containers.values_mut() {
            produced.extend(container.advance(dt, &self.species, &self.clock));
        }
        for event in produced {
            self.publish(event);
        }

        for task in self.scheduler.update(dt) {
            match task {
                SessionTask::AutoSave => {
                    if self.registry.player_count() > 0 {
                        info!("Auto-save due at tick {}", self.tick);
                        self.publish(SimEvent::AutoSaveDue { tick: self.tick });
                    }
                }
                SessionTask::IdleSweep => {
                    for event in self.registry.sweep_idle() {
                        self.publish(event);
                    }
                }
            }
        }
        self.tick += 1;
    }

    /// Registers a joining player. Returns false if the join was refused.
    pub fn player_joined(&mut self, player: PlayerId, name: &str) -> bool {
        match self.registry.join(player, name) {
            Ok(events) => {
                for event in events {
                    self.publish(event);
                }
                true
            }
            Err(err) => {
                warn!("Refused join of {name} ({player}): {err}");
                false
            }
        }
    }

    /// Removes a leaving player, handing on ownership if needed.
    pub fn player_left(&mut self, player: PlayerId) -> bool {
        match self.registry.leave(player) {
            Ok(events) => {
                self.follow_ownership(&events);
                for event in events {
                    self.publish(event);
                }
                true
            }
            Err(err) => {
                warn!("Leave of {player} ignored: {err}");
                false
            }
        }
    }

    /// Reassigns a role on behalf of the host.
    pub fn set_player_role(&mut self, player: PlayerId, role: PlayerRole) -> bool {
        self.apply_now(
            PlayerId::SYSTEM,
            &Command::SetPlayerRole {
                target: player,
                role,
            },
        )
        .is_ok()
    }

    /// Plants a seed. Returns false if refused.
    pub fn plant_seed(
        &mut self,
        container: ContainerId,
        species: &SpeciesId,
        slot: usize,
        player: PlayerId,
    ) -> bool {
        self.apply_now(
            player,
            &Command::PlantSeed {
                container,
                slot,
                species: species.clone(),
            },
        )
        .is_ok()
    }

    /// Removes a plant. Returns false if refused.
    pub fn remove_plant(&mut self, container: ContainerId, slot: usize, player: PlayerId) -> bool {
        self.apply_now(player, &Command::RemovePlant { container, slot })
            .is_ok()
    }

    /// Sets pH. Returns false if refused.
    pub fn set_ph(&mut self, container: ContainerId, value: f32, player: PlayerId) -> bool {
        self.apply_now(player, &Command::SetPh { container, value })
            .is_ok()
    }

    /// Sets EC. Returns false if refused.
    pub fn set_ec(&mut self, container: ContainerId, value: f32, player: PlayerId) -> bool {
        self.apply_now(player, &Command::SetEc { container, value })
            .is_ok()
    }

    /// Tops up nutrients. Returns false if refused.
    pub fn add_nutrients(
        &mut self,
        container: ContainerId,
        levels: &NutrientSolution,
        player: PlayerId,
    ) -> bool {
        self.apply_now(
            player,
            &Command::AddNutrients {
                container,
                levels: *levels,
            },
        )
        .is_ok()
    }

    /// Starts a pump. Returns false if refused.
    pub fn start_pump(&mut self, container: ContainerId, player: PlayerId) -> bool {
        self.apply_now(player, &Command::StartPump { container })
            .is_ok()
    }

    /// Stops a pump. Returns false if refused.
    pub fn stop_pump(&mut self, container: ContainerId, player: PlayerId) -> bool {
        self.apply_now(player, &Command::StopPump { container })
            .is_ok()
    }

    /// Harvests a plant and returns the yield, or 0 if refused.
    pub fn harvest(&mut self, container: ContainerId, slot: usize, player: PlayerId) -> u32 {
        let Ok(events) = self.apply_now(player, &Command::HarvestPlant { container, slot }) else {
            return 0;
        };
        events
            .iter()
            .find_map(|event| match event {
                SimEvent::Harvested { outcome, .. } => Some(outcome.yield_amount),
                _ => None,
            })
            .unwrap_or(0)
    }
}

fn validate_ranges(command: &Command) -> SimResult<()> {
    let check = |parameter: &'static str, value: f32, min: f32, max: f32| {
        if value.is_nan() || value < min || value > max {
            Err(SimError::RangeViolation {
                parameter,
                value,
                min,
                max,
            })
        } else {
            Ok(())
        }
    };
    let dose = |levels: &NutrientSolution| match levels.invalid_channel() {
        Some(value) => check("nutrient dose", value, 0.0, NUTRIENT_MAX),
        None => Ok(()),
    };
    match command {
        Command::SetPh { value, .. } => check("pH", *value, PH_MIN, PH_MAX),
        Command::AddNutrients { levels, .. } | Command::ApplyPlantNutrients { levels, .. } => {
            dose(levels)
        }
        Command::SetEc { value, .. } => check("EC", *value, EC_MIN, EC_MAX),
        Command::SetWaterLevel { value, .. } if value.is_nan() => {
            check("water level", *value, 0.0, 1.0)
        }
        _ => Ok(()),
    }
}

fn environment_changed(
    container: ContainerId,
    parameter: EnvironmentParameter,
    value: f32,
    player: PlayerId,
) -> SimEvent {
    SimEvent::EnvironmentChanged {
        container,
        parameter,
        value,
        player,
    }
}

fn plant_cared(container: &ContainerSimulator, slot: usize, player: PlayerId) -> SimEvent {
    SimEvent::PlantCared {
        container: container.id(),
        slot,
        health: container.plant(slot).map_or(0.0, |p| p.health()),
        player,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plant::GrowthStage;
    use crate::species::SpeciesProfile;

    const HOST: PlayerId = PlayerId::from_raw(1);
    const GUEST: PlayerId = PlayerId::from_raw(2);

    fn species() -> SpeciesRegistry {
        let mut registry = SpeciesRegistry::new();
        registry.register(
            SpeciesProfile::builder("lettuce", "Lettuce")
                .growth_days(1.0)
                .light_hours(16.0)
                .economy(10, 10.0, 5.0)
                .build(),
        );
        registry
    }

    fn lettuce() -> SpeciesId {
        SpeciesId::new("lettuce")
    }

    fn session() -> (Authority, ContainerId) {
        let mut authority = Authority::new(SessionSettings::default(), species());
        assert!(authority.player_joined(HOST, "Host"));
        assert!(authority.player_joined(GUEST, "Guest"));
        let id = authority.create_container(ContainerType::Nft, 4, HOST, true);
        authority.drain_events();
        (authority, id)
    }

    #[test]
    fn test_visitor_mutations_fail_without_state_change() {
        let (mut authority, id) = session();
        assert!(authority.set_player_role(GUEST, PlayerRole::Visitor));
        let before = authority.container(id).expect("container").to_record();

        assert!(!authority.plant_seed(id, &lettuce(), 0, GUEST));
        assert!(!authority.set_ph(id, 5.0, GUEST));
        assert!(!authority.add_nutrients(id, &NutrientSolution::uniform(1.0), GUEST));
        assert!(!authority.stop_pump(id, GUEST));

        assert_eq!(authority.container(id).expect("container").to_record(), before);
        let rejections = authority
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SimEvent::CommandRejected { .. }))
            .count();
        assert_eq!(rejections, 4);
    }

    #[test]
    fn test_owner_mutations_succeed() {
        let (mut authority, id) = session();
        assert!(authority.plant_seed(id, &lettuce(), 0, HOST));
        assert!(authority.set_ph(id, 5.8, HOST));
        assert!(authority.set_ec(id, 1.2, HOST));
        assert!(authority.add_nutrients(id, &NutrientSolution::uniform(0.5), HOST));
        assert!(authority.stop_pump(id, HOST));
        assert!(authority.start_pump(id, HOST));
        assert!(authority.remove_plant(id, 0, HOST));
        assert_eq!(
            authority.registry().get(HOST).map(|p| p.contribution_score),
            Some(7)
        );
    }

    #[test]
    fn test_helper_limits() {
        let (mut authority, id) = session();
        assert!(authority.plant_seed(id, &lettuce(), 1, GUEST));
        assert!(authority.add_nutrients(id, &NutrientSolution::uniform(0.1), GUEST));
        assert!(!authority.set_ph(id, 6.2, GUEST));
        assert!(!authority.stop_pump(id, GUEST));
        assert!(authority.can_perform(GUEST, NetworkAction::Harvest, Some(id)));
        assert!(!authority.can_perform(GUEST, NetworkAction::KickPlayer, None));
    }

    #[test]
    fn test_private_container() {
        let (mut authority, _) = session();
        let private = authority.create_container(ContainerType::Dwc, 2, HOST, false);
        assert!(authority.set_player_role(GUEST, PlayerRole::Manager));
        assert!(!authority.plant_seed(private, &lettuce(), 0, GUEST));
        assert!(authority.plant_seed(private, &lettuce(), 0, HOST));
    }

    #[test]
    fn test_out_of_range_rejected_not_clamped() {
        let (mut authority, id) = session();
        let ph = authority.container(id).expect("container").conditions().ph;
        authority.submit(HOST, Command::SetPh { container: id, value: 9.0 });
        authority.submit(HOST, Command::SetEc { container: id, value: -1.0 });
        let outcomes = authority.process_commands();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0].result,
            Err(SimError::RangeViolation { parameter: "pH", .. })
        ));
        assert!(outcomes[1].result.is_err());
        let after = authority.container(id).expect("container").conditions().ph;
        assert!((after - ph).abs() < f32::EPSILON);
    }

    #[test]
    fn test_bad_nutrient_dose_rejected() {
        let (mut authority, id) = session();
        let before = authority.container(id).expect("container").to_record();
        let mut dose = NutrientSolution::npk(f32::NAN, 0.5, 0.5);
        dose.zinc = f32::NAN;
        dose.iron = -50.0;

        assert!(!authority.add_nutrients(id, &dose, GUEST));
        authority.submit(
            HOST,
            Command::AddNutrients {
                container: id,
                levels: NutrientSolution::npk(0.2, 0.2, -1.0),
            },
        );
        let outcomes = authority.process_commands();
        assert!(matches!(
            outcomes[0].result,
            Err(SimError::RangeViolation { parameter: "nutrient dose", .. })
        ));
        assert_eq!(authority.container(id).expect("container").to_record(), before);

        authority.tick(0.5);
        let container = authority.container(id).expect("container");
        assert!(container.conditions().is_within_bounds());
        assert!(container.nutrients().is_non_negative());
        let json = authority.snapshot().to_json().expect("snapshot encodes");
        assert!(WorldSnapshot::from_json(&json).is_ok());
    }

    #[test]
    fn test_queue_applies_in_order_on_tick() {
        let (mut authority, id) = session();
        let sender = authority.sender();
        let handle = std::thread::spawn(move || {
            sender.submit(
                HOST,
                Command::PlantSeed {
                    container: id,
                    slot: 0,
                    species: SpeciesId::new("lettuce"),
                },
            )
        });
        let submitted = handle.join().expect("thread").expect("authority alive");
        authority.submit(
            GUEST,
            Command::PlantSeed {
                container: id,
                slot: 0,
                species: lettuce(),
            },
        );
        authority.tick(0.1);

        let events = authority.drain_events();
        assert!(events.contains(&SimEvent::CommandApplied {
            command: submitted,
            player: HOST,
        }));
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::CommandRejected { player, .. } if *player == GUEST
        )));
        assert_eq!(
            authority
                .container(id)
                .and_then(|c| c.slot(0))
                .and_then(|s| s.planted_by()),
            Some(HOST)
        );
    }

    #[test]
    fn test_unknown_player_and_container() {
        let (mut authority, id) = session();
        let stranger = PlayerId::from_raw(99);
        authority.submit(stranger, Command::StopPump { container: id });
        authority.submit(
            HOST,
            Command::StopPump {
                container: ContainerId::new(77),
            },
        );
        let outcomes = authority.process_commands();
        assert_eq!(outcomes[0].result, Err(SimError::UnknownPlayer(stranger)));
        assert_eq!(
            outcomes[1].result,
            Err(SimError::UnknownContainer(ContainerId::new(77)))
        );
        assert!(!authority.can_perform(stranger, NetworkAction::Harvest, Some(id)));
    }

    #[test]
    fn test_harvest_flow() {
        let (mut authority, id) = session();
        assert!(authority.plant_seed(id, &lettuce(), 0, HOST));
        assert_eq!(authority.harvest(id, 0, HOST), 0);
        let stage = authority
            .container(id)
            .and_then(|c| c.plant(0))
            .map(|p| p.stage());
        assert_eq!(stage, Some(GrowthStage::Seed));

        assert!(authority.set_time_mode(TimeMode::Accelerated));
        for _ in 0..80 {
            authority.tick(1.0);
        }
        let yield_amount = authority.harvest(id, 0, GUEST);
        assert!(yield_amount >= 1);
        assert!(authority.container(id).and_then(|c| c.plant(0)).is_none());
    }

    #[test]
    fn test_role_management_and_kick() {
        let (mut authority, _) = session();
        let third = PlayerId::from_raw(3);
        assert!(authority.player_joined(third, "Third"));

        authority.submit(
            GUEST,
            Command::KickPlayer {
                target: third,
                reason: "test".to_string(),
            },
        );
        authority.submit(
            HOST,
            Command::SetPlayerRole {
                target: third,
                role: PlayerRole::Manager,
            },
        );
        authority.submit(
            HOST,
            Command::KickPlayer {
                target: GUEST,
                reason: "afk".to_string(),
            },
        );
        let outcomes = authority.process_commands();
        assert!(matches!(
            outcomes[0].result,
            Err(SimError::PermissionDenied { .. })
        ));
        assert!(outcomes[1].result.is_ok());
        assert!(outcomes[2].result.is_ok());
        assert!(authority.registry().get(GUEST).is_none());
        let events = authority.drain_events();
        assert!(events.contains(&SimEvent::PlayerLeft { player: GUEST }));
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::PlayerKicked { player, by, .. } if *player == GUEST && *by == HOST
        )));
        assert_eq!(
            authority.registry().get(third).map(|p| p.role),
            Some(PlayerRole::Manager)
        );
    }

    #[test]
    fn test_ownership_hand_off_moves_containers() {
        let (mut authority, id) = session();
        assert!(authority.player_left(HOST));
        assert_eq!(authority.registry().owner(), Some(GUEST));
        assert_eq!(authority.container(id).map(ContainerSimulator::owner), Some(GUEST));
        assert!(authority.can_perform(GUEST, NetworkAction::ManagePermissions, None));
    }

    #[test]
    fn test_auto_save_only_with_players() {
        let mut authority = Authority::new(
            SessionSettings {
                auto_save_interval_secs: 1.0,
                ..Default::default()
            },
            species(),
        );
        for _ in 0..15 {
            authority.tick(0.1);
        }
        assert!(!authority
            .drain_events()
            .iter()
            .any(|e| matches!(e, SimEvent::AutoSaveDue { .. })));

        authority.player_joined(HOST, "Host");
        for _ in 0..15 {
            authority.tick(0.1);
        }
        assert!(authority
            .drain_events()
            .iter()
            .any(|e| matches!(e, SimEvent::AutoSaveDue { .. })));
    }

    #[test]
    fn test_external_sink_sees_events() {
        let (mut authority, id) = session();
        let (tx, rx) = crossbeam_channel::unbounded();
        authority.add_sink(Box::new(tx));
        assert!(authority.stop_pump(id, HOST));
        let seen: Vec<_> = rx.try_iter().collect();
        assert!(seen.contains(&SimEvent::PumpToggled {
            container: id,
            running: false,
            player: HOST,
        }));
        assert_eq!(seen, authority.drain_events());
    }

    #[test]
    fn test_time_mode_changes_are_published() {
        let (mut authority, _) = session();
        assert!(authority.set_time_mode(TimeMode::Fast));
        assert!(!authority.set_time_mode(TimeMode::Fast));
        assert!(authority.pause_time());
        assert!(authority.clock().is_paused());
        assert!(authority.resume_time());
        assert_eq!(
            authority.drain_events(),
            vec![
                SimEvent::Time(TimeEvent::ModeChanged(TimeMode::Fast)),
                SimEvent::Time(TimeEvent::ModeChanged(TimeMode::Paused)),
                SimEvent::Time(TimeEvent::ModeChanged(TimeMode::Fast)),
            ]
        );
    }

    #[test]
    fn test_chat_command() {
        let (mut authority, _) = session();
        authority.submit(GUEST, Command::Chat { text: "hi".to_string() });
        authority.tick(0.0);
        let last = authority.registry().chat().last().expect("chat line");
        assert_eq!(last.text, "hi");
        assert_eq!(last.sender_name, "Guest");
    }
}
