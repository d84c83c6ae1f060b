//! Hydroponic container: plant slots plus the solution they share.
//!
//! Each tick the container drifts pH, depletes nutrients, evaporates
//! water, applies the pump, then pushes the resulting conditions to every
//! occupied slot.

use crate::environment::{
    EnvironmentParameter, EnvironmentalConditions, NutrientSolution, EC_MAX, EC_MIN, OXYGEN_MAX,
    OXYGEN_MIN, PH_MAX, PH_MIN,
};
use crate::events::SimEvent;
use crate::plant::{GrowthStage, PlantLifecycle, PlantRecord};
use crate::species::SpeciesCatalog;
use crate::time::TimeProvider;
use hydrogrow_common::{
    ContainerId, PlantId, PlayerId, SimError, SimResult, SlotLocation, SpeciesId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Energy drawn by any container (W).
pub const BASE_ENERGY: f32 = 10.0;
/// Extra energy drawn by a running pump (W).
pub const PUMP_ENERGY: f32 = 25.0;
/// pH drift amplitude in pH units per game day.
const PH_DRIFT_RATE: f32 = 0.1;
/// Water lost per day as a fraction of the reservoir.
const EVAPORATION_PER_DAY: f32 = 0.05;
/// Below this water level the solution concentrates and loses oxygen.
const LOW_WATER_THRESHOLD: f32 = 0.3;

/// Hydroponic system type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContainerType {
    /// Deep water culture (air stones, no pump)
    #[default]
    Dwc,
    /// Ebb and flow (intermittent flooding)
    EbbFlow,
    /// Nutrient film technique
    Nft,
    /// Misted roots
    Aeroponics,
    /// Drip irrigation
    DripSystem,
}

impl ContainerType {
    /// Get the display name of this type.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Dwc => "Deep Water Culture",
            Self::EbbFlow => "Ebb & Flow",
            Self::Nft => "Nutrient Film Technique",
            Self::Aeroponics => "Aeroponics",
            Self::DripSystem => "Drip System",
        }
    }

    /// Whether this system has a circulation pump.
    #[must_use]
    pub fn has_pump(self) -> bool {
        !matches!(self, Self::Dwc)
    }

    /// Nominal efficiency of the system type.
    ///
    /// Not applied by any growth or energy formula.
    #[must_use]
    pub fn efficiency_multiplier(self) -> f32 {
        match self {
            Self::Dwc => 1.0,
            Self::EbbFlow => 1.1,
            Self::Nft => 1.2,
            Self::Aeroponics => 1.5,
            Self::DripSystem => 0.9,
        }
    }

    /// Initial oxygen level, water flow rate and energy draw.
    fn initial_profile(self) -> (f32, f32, f32) {
        let default_oxygen = EnvironmentalConditions::default().oxygen_level;
        match self {
            Self::Dwc => (1.2, 1.0, BASE_ENERGY),
            Self::EbbFlow => (default_oxygen, 0.5, BASE_ENERGY + PUMP_ENERGY * 0.3),
            Self::Nft => (default_oxygen, 0.8, BASE_ENERGY + PUMP_ENERGY * 0.5),
            Self::Aeroponics => (1.5, 1.0, BASE_ENERGY + PUMP_ENERGY * 0.8),
            Self::DripSystem => (default_oxygen, 0.3, BASE_ENERGY + PUMP_ENERGY * 0.2),
        }
    }
}

/// Seedable source of the random pH drift direction.
///
/// The generator state is plain data so a restored container continues
/// the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhDrift {
    state: u64,
}

impl PhDrift {
    /// Creates a generator from a fixed seed.
    #[must_use]
    pub const fn seeded(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Creates a generator seeded from system entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::seeded(fastrand::u64(..))
    }

    /// Next drift direction in [-1, 1).
    pub fn next_direction(&mut self) -> f32 {
        let mut rng = fastrand::Rng::with_seed(self.state);
        let direction = rng.f32() * 2.0 - 1.0;
        self.state = rng.get_seed();
        direction
    }
}

/// One fixed position in a container that can hold a plant.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantSlot {
    index: usize,
    location: SlotLocation,
    plant: Option<PlantLifecycle>,
}

impl PlantSlot {
    /// Slot index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Position relative to the container origin.
    #[must_use]
    pub fn location(&self) -> SlotLocation {
        self.location
    }

    /// Checks if a plant occupies the slot.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.plant.is_some()
    }

    /// The occupant, if any.
    #[must_use]
    pub fn plant(&self) -> Option<&PlantLifecycle> {
        self.plant.as_ref()
    }

    /// Player who planted the occupant.
    #[must_use]
    pub fn planted_by(&self) -> Option<PlayerId> {
        self.plant.as_ref().map(PlantLifecycle::planted_by)
    }
}

/// Result of a successful harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestOutcome {
    /// Harvested plant
    pub plant: PlantId,
    /// Its species
    pub species: SpeciesId,
    /// Slot it occupied
    pub slot: usize,
    /// Yield units produced
    pub yield_amount: u32,
}

/// Occupied slot inside a [`ContainerRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    /// Slot index
    pub index: usize,
    /// Occupant
    pub plant: PlantRecord,
}

/// Flat record of a container's full state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Container ID
    pub id: ContainerId,
    /// System type
    pub container_type: ContainerType,
    /// Slot count
    pub capacity: usize,
    /// Owning player
    pub owner: PlayerId,
    /// Whether non-owners may act on it
    pub shared: bool,
    /// World position of the container origin
    pub origin: SlotLocation,
    /// Environment
    pub conditions: EnvironmentalConditions,
    /// Nutrient solution
    pub nutrients: NutrientSolution,
    /// Pump state
    pub pump_running: bool,
    /// Water flow rate
    pub water_flow_rate: f32,
    /// Energy draw
    pub energy_consumption: f32,
    /// pH drift generator state
    pub drift: PhDrift,
    /// Next plant ID to allocate
    pub next_plant_id: PlantId,
    /// Occupied slots
    pub slots: Vec<SlotRecord>,
}

/// A hydroponic container and the plants growing in it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSimulator {
    id: ContainerId,
    container_type: ContainerType,
    owner: PlayerId,
    shared: bool,
    origin: SlotLocation,
    conditions: EnvironmentalConditions,
    nutrients: NutrientSolution,
    slots: Vec<PlantSlot>,
    pump_running: bool,
    water_flow_rate: f32,
    energy_consumption: f32,
    drift: PhDrift,
    next_plant_id: PlantId,
}

impl ContainerSimulator {
    /// Creates a shared container with an entropy-seeded pH drift.
    #[must_use]
    pub fn new(
        id: ContainerId,
        container_type: ContainerType,
        capacity: usize,
        owner: PlayerId,
    ) -> Self {
        let (oxygen, flow, energy) = container_type.initial_profile();
        let conditions = EnvironmentalConditions {
            oxygen_level: oxygen,
            ..Default::default()
        };
        let slots = (0..capacity)
            .map(|index| PlantSlot {
                index,
                location: SlotLocation::grid(index, capacity),
                plant: None,
            })
            .collect();

        let mut container = Self {
            id,
            container_type,
            owner,
            shared: true,
            origin: SlotLocation::default(),
            conditions,
            nutrients: NutrientSolution::default(),
            slots,
            pump_running: false,
            water_flow_rate: flow,
            energy_consumption: energy,
            drift: PhDrift::from_entropy(),
            next_plant_id: PlantId::from_raw(1),
        };
        if container_type.has_pump() {
            container.pump_running = true;
            container.energy_consumption = BASE_ENERGY + PUMP_ENERGY;
        }
        info!(
            "Initialized {} {} with {capacity} slots",
            container_type.display_name(),
            id
        );
        container
    }

    /// Sets whether non-owners may act on this container.
    #[must_use]
    pub fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Replaces the pH drift generator.
    #[must_use]
    pub fn with_drift(mut self, drift: PhDrift) -> Self {
        self.drift = drift;
        self
    }

    /// Places the container origin in the world.
    #[must_use]
    pub fn with_origin(mut self, origin: SlotLocation) -> Self {
        self.origin = origin;
        self
    }

    /// Container ID.
    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// System type.
    #[must_use]
    pub fn container_type(&self) -> ContainerType {
        self.container_type
    }

    /// Owning player.
    #[must_use]
    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    /// Reassigns the owning player.
    pub fn set_owner(&mut self, owner: PlayerId) {
        self.owner = owner;
    }

    /// Whether non-owners may act on this container.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Current environment.
    #[must_use]
    pub fn conditions(&self) -> &EnvironmentalConditions {
        &self.conditions
    }

    /// Current nutrient solution.
    #[must_use]
    pub fn nutrients(&self) -> &NutrientSolution {
        &self.nutrients
    }

    /// Whether the pump is running.
    #[must_use]
    pub fn is_pump_running(&self) -> bool {
        self.pump_running
    }

    /// Water flow rate.
    #[must_use]
    pub fn water_flow_rate(&self) -> f32 {
        self.water_flow_rate
    }

    /// Current energy draw.
    #[must_use]
    pub fn energy_consumption(&self) -> f32 {
        self.energy_consumption
    }

    /// Slot count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// All slots.
    #[must_use]
    pub fn slots(&self) -> &[PlantSlot] {
        &self.slots
    }

    /// A slot by index.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&PlantSlot> {
        self.slots.get(index)
    }

    /// The plant in a slot.
    #[must_use]
    pub fn plant(&self, index: usize) -> Option<&PlantLifecycle> {
        self.slots.get(index).and_then(PlantSlot::plant)
    }

    /// World position of a slot.
    #[must_use]
    pub fn slot_world_location(&self, index: usize) -> Option<SlotLocation> {
        self.slots
            .get(index)
            .map(|slot| slot.location.offset_by(self.origin))
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn plant_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_occupied()).count()
    }

    /// First free slot index.
    #[must_use]
    pub fn available_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.is_occupied())
    }

    /// Checks if a seed can go into `index`.
    #[must_use]
    pub fn can_plant(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|s| !s.is_occupied())
    }

    /// Advances the container by `dt` real seconds.
    pub fn advance(
        &mut self,
        dt: f32,
        catalog: &dyn SpeciesCatalog,
        time: &dyn TimeProvider,
    ) -> Vec<SimEvent> {
        let plant_count = self.plant_count() as f32;

        // pH drift
        let direction = self.drift.next_direction();
        let plant_effect = plant_count * 0.02 * dt;
        self.conditions.ph += (direction * PH_DRIFT_RATE + plant_effect) * dt / 86_400.0;
        self.conditions.ph = self.conditions.ph.clamp(PH_MIN, PH_MAX);

        // Nutrient uptake
        self.nutrients.deplete(plant_count * 0.01 * dt);
        self.conditions.ec = self.nutrients.derived_ec();

        // Evaporation, with concentration feedback while low
        self.conditions.water_level =
            (self.conditions.water_level - EVAPORATION_PER_DAY * dt / 86_400.0).max(0.0);
        if self.conditions.water_level < LOW_WATER_THRESHOLD {
            self.conditions.ec = (self.conditions.ec * 1.1).clamp(EC_MIN, EC_MAX);
            self.conditions.oxygen_level *= 0.9;
        }

        // Pump
        self.conditions.oxygen_level = if self.pump_running {
            (self.conditions.oxygen_level + 0.1 * dt).min(OXYGEN_MAX)
        } else {
            (self.conditions.oxygen_level - 0.05 * dt).max(OXYGEN_MIN)
        };
        self.conditions.clamp_all();

        let time_scale = time.time_scale();
        let mut events = Vec::new();
        for slot in &mut self.slots {
            let Some(plant) = slot.plant.as_mut() else {
                continue;
            };
            let Some(profile) = catalog.lookup(plant.species()) else {
                warn!(
                    "{}: no profile for species '{}' in slot {}, skipping",
                    self.id,
                    plant.species(),
                    slot.index
                );
                continue;
            };
            if let Some(transition) =
                plant.advance(dt, &self.conditions, &self.nutrients, profile, time_scale)
            {
                events.push(SimEvent::StageChanged {
                    container: self.id,
                    slot: slot.index,
                    plant: plant.id(),
                    from: transition.from,
                    to: transition.to,
                });
                if transition.to == GrowthStage::Dead {
                    events.push(SimEvent::PlantDied {
                        container: self.id,
                        slot: slot.index,
                        plant: plant.id(),
                    });
                }
            }
        }
        events
    }

    fn check_slot(&self, index: usize) -> SimResult<()> {
        if index < self.slots.len() {
            Ok(())
        } else {
            Err(SimError::InvalidSlot {
                index,
                capacity: self.slots.len(),
            })
        }
    }

    fn occupant_mut(&mut self, index: usize) -> SimResult<&mut PlantLifecycle> {
        self.check_slot(index)?;
        self.slots[index]
            .plant
            .as_mut()
            .ok_or(SimError::SlotEmpty(index))
    }

    /// Plants a seed of `species` into slot `index`.
    pub fn plant_seed(
        &mut self,
        species: &SpeciesId,
        index: usize,
        player: PlayerId,
        catalog: &dyn SpeciesCatalog,
    ) -> SimResult<PlantId> {
        self.check_slot(index)?;
        if self.slots[index].is_occupied() {
            return Err(SimError::SlotOccupied(index));
        }
        if catalog.lookup(species).is_none() {
            return Err(SimError::SpeciesNotFound(species.clone()));
        }

        let id = self.next_plant_id;
        self.next_plant_id = id.next();
        self.slots[index].plant = Some(PlantLifecycle::new(id, species.clone(), player));
        info!("Planted {species} in slot {index} of {}", self.id);
        Ok(id)
    }

    /// Removes and returns the plant in slot `index`.
    pub fn remove_plant(&mut self, index: usize) -> SimResult<PlantLifecycle> {
        self.check_slot(index)?;
        let plant = self.slots[index]
            .plant
            .take()
            .ok_or(SimError::SlotEmpty(index))?;
        debug!("Removed plant {} from slot {index} of {}", plant.id().raw(), self.id);
        Ok(plant)
    }

    /// Harvests the plant in slot `index`, freeing the slot.
    ///
    /// Plants that are not ready are left untouched.
    pub fn harvest(
        &mut self,
        index: usize,
        catalog: &dyn SpeciesCatalog,
    ) -> SimResult<HarvestOutcome> {
        self.check_slot(index)?;
        let plant = self.slots[index]
            .plant
            .as_ref()
            .ok_or(SimError::SlotEmpty(index))?;
        let profile = catalog
            .lookup(plant.species())
            .ok_or_else(|| SimError::SpeciesNotFound(plant.species().clone()))?;
        let yield_amount = plant.harvest_yield(profile.base_yield)?;

        let plant = self.remove_plant(index)?;
        info!(
            "Harvested {} from slot {index} of {}: {yield_amount} units",
            plant.species(),
            self.id
        );
        Ok(HarvestOutcome {
            plant: plant.id(),
            species: plant.species().clone(),
            slot: index,
            yield_amount,
        })
    }

    /// Waters the plant in slot `index`.
    pub fn water_plant(&mut self, index: usize, amount: f32) -> SimResult<()> {
        self.occupant_mut(index)?.water(amount)
    }

    /// Feeds the plant in slot `index` directly.
    pub fn apply_plant_nutrients(
        &mut self,
        index: usize,
        levels: &NutrientSolution,
    ) -> SimResult<()> {
        self.occupant_mut(index)?.apply_nutrients(levels)
    }

    /// Sets pH, clamped to [4, 8]. NaN leaves pH unchanged. Returns the
    /// applied value.
    pub fn set_ph(&mut self, ph: f32) -> f32 {
        if ph.is_nan() {
            warn!("{}: ignoring NaN pH", self.id);
            return self.conditions.ph;
        }
        self.conditions.ph = ph.clamp(PH_MIN, PH_MAX);
        debug!("{}: pH adjusted to {:.2}", self.id, self.conditions.ph);
        self.conditions.ph
    }

    /// Sets EC, clamped to [0, 4]. NaN leaves EC unchanged.
    pub fn set_ec(&mut self, ec: f32) -> f32 {
        if ec.is_nan() {
            warn!("{}: ignoring NaN EC", self.id);
            return self.conditions.ec;
        }
        self.conditions.ec = ec.clamp(EC_MIN, EC_MAX);
        debug!("{}: EC adjusted to {:.2}", self.id, self.conditions.ec);
        self.conditions.ec
    }

    /// Sets the water level, clamped to [0, 1]. NaN leaves it unchanged.
    pub fn set_water_level(&mut self, level: f32) -> f32 {
        if level.is_nan() {
            warn!("{}: ignoring NaN water level", self.id);
            return self.conditions.water_level;
        }
        self.conditions.water_level = level.clamp(0.0, 1.0);
        self.conditions.water_level
    }

    /// Tops up the nutrient solution and recomputes EC. Returns the new EC.
    pub fn add_nutrients(&mut self, levels: &NutrientSolution) -> f32 {
        self.nutrients.add(levels);
        self.conditions.ec = self.nutrients.derived_ec();
        debug!("{}: added nutrients, EC now {:.2}", self.id, self.conditions.ec);
        self.conditions.ec
    }

    /// Starts the circulation pump.
    pub fn start_pump(&mut self) -> SimResult<()> {
        if !self.container_type.has_pump() {
            return Err(SimError::InvalidState(format!(
                "{} containers have no water pump",
                self.container_type.display_name()
            )));
        }
        self.pump_running = true;
        self.energy_consumption = BASE_ENERGY + PUMP_ENERGY;
        debug!("{}: water pump started", self.id);
        Ok(())
    }

    /// Stops the circulation pump.
    pub fn stop_pump(&mut self) {
        self.pump_running = false;
        self.energy_consumption = BASE_ENERGY;
        debug!("{}: water pump stopped", self.id);
    }

    /// Current value of one environment parameter.
    #[must_use]
    pub fn parameter_value(&self, parameter: EnvironmentParameter) -> f32 {
        match parameter {
            EnvironmentParameter::Ph => self.conditions.ph,
            EnvironmentParameter::Ec | EnvironmentParameter::Nutrients => self.conditions.ec,
            EnvironmentParameter::WaterLevel => self.conditions.water_level,
            EnvironmentParameter::Pump => self.conditions.oxygen_level,
        }
    }

    /// Exports the full state as a flat record.
    #[must_use]
    pub fn to_record(&self) -> ContainerRecord {
        ContainerRecord {
            id: self.id,
            container_type: self.container_type,
            capacity: self.slots.len(),
            owner: self.owner,
            shared: self.shared,
            origin: self.origin,
            conditions: self.conditions,
            nutrients: self.nutrients,
            pump_running: self.pump_running,
            water_flow_rate: self.water_flow_rate,
            energy_consumption: self.energy_consumption,
            drift: self.drift,
            next_plant_id: self.next_plant_id,
            slots: self
                .slots
                .iter()
                .filter_map(|slot| {
                    slot.plant.as_ref().map(|plant| SlotRecord {
                        index: slot.index,
                        plant: plant.to_record(),
                    })
                })
                .collect(),
        }
    }

    /// Rebuilds a container from a record.
    ///
    /// Slot entries outside the capacity or duplicating an index are
    /// rejected.
    pub fn from_record(record: ContainerRecord) -> SimResult<Self> {
        let capacity = record.capacity;
        let mut slots: Vec<PlantSlot> = (0..capacity)
            .map(|index| PlantSlot {
                index,
                location: SlotLocation::grid(index, capacity),
                plant: None,
            })
            .collect();

        for entry in record.slots {
            let slot = slots.get_mut(entry.index).ok_or(SimError::InvalidSlot {
                index: entry.index,
                capacity,
            })?;
            if slot.plant.is_some() {
                return Err(SimError::SlotOccupied(entry.index));
            }
            slot.plant = Some(PlantLifecycle::from_record(entry.plant));
        }

        let mut conditions = record.conditions;
        conditions.clamp_all();

        Ok(Self {
            id: record.id,
            container_type: record.container_type,
            owner: record.owner,
            shared: record.shared,
            origin: record.origin,
            conditions,
            nutrients: record.nutrients,
            slots,
            pump_running: record.pump_running,
            water_flow_rate: record.water_flow_rate,
            energy_consumption: record.energy_consumption,
            drift: record.drift,
            next_plant_id: record.next_plant_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::{SpeciesProfile, SpeciesRegistry};
    use crate::time::FixedTimeScale;
    use proptest::prelude::*;

    const OWNER: PlayerId = PlayerId::from_raw(1);

    fn catalog() -> SpeciesRegistry {
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

    fn container(kind: ContainerType) -> ContainerSimulator {
        ContainerSimulator::new(ContainerId::new(1), kind, 4, OWNER)
            .with_drift(PhDrift::seeded(42))
    }

    #[test]
    fn test_type_initialization() {
        let dwc = container(ContainerType::Dwc);
        assert!(!dwc.is_pump_running());
        assert!((dwc.conditions().oxygen_level - 1.2).abs() < f32::EPSILON);
        assert!((dwc.energy_consumption() - BASE_ENERGY).abs() < f32::EPSILON);

        let aero = container(ContainerType::Aeroponics);
        assert!(aero.is_pump_running());
        assert!((aero.conditions().oxygen_level - 1.5).abs() < f32::EPSILON);
        assert!((aero.energy_consumption() - (BASE_ENERGY + PUMP_ENERGY)).abs() < f32::EPSILON);

        let drip = container(ContainerType::DripSystem);
        assert!((drip.water_flow_rate() - 0.3).abs() < f32::EPSILON);
        assert!((ContainerType::Nft.efficiency_multiplier() - 1.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_dwc_refuses_pump() {
        let mut dwc = container(ContainerType::Dwc);
        assert!(matches!(dwc.start_pump(), Err(SimError::InvalidState(_))));
        assert!(!dwc.is_pump_running());

        let mut nft = container(ContainerType::Nft);
        nft.stop_pump();
        assert!((nft.energy_consumption() - BASE_ENERGY).abs() < f32::EPSILON);
        nft.start_pump().expect("NFT has a pump");
        assert!(nft.is_pump_running());
    }

    #[test]
    fn test_slot_layout() {
        let c = container(ContainerType::Dwc);
        assert_eq!(c.capacity(), 4);
        let locations: Vec<_> = c.slots().iter().map(PlantSlot::location).collect();
        assert!((locations[0].x + 30.0).abs() < f32::EPSILON);
        assert!((locations[1].x - 0.0).abs() < f32::EPSILON);
        assert!((locations[2].y - 0.0).abs() < f32::EPSILON);
        assert!((locations[0].y + 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_plant_seed_and_slots() {
        let catalog = catalog();
        let mut c = container(ContainerType::Dwc);

        let id = c.plant_seed(&lettuce(), 0, OWNER, &catalog).expect("slot 0 is free");
        assert_eq!(c.plant_count(), 1);
        assert_eq!(c.slot(0).and_then(PlantSlot::planted_by), Some(OWNER));
        assert_eq!(c.available_slot(), Some(1));

        assert_eq!(
            c.plant_seed(&lettuce(), 0, OWNER, &catalog),
            Err(SimError::SlotOccupied(0))
        );
        assert!(matches!(
            c.plant_seed(&lettuce(), 9, OWNER, &catalog),
            Err(SimError::InvalidSlot { index: 9, .. })
        ));
        assert!(matches!(
            c.plant_seed(&SpeciesId::new("kudzu"), 1, OWNER, &catalog),
            Err(SimError::SpeciesNotFound(_))
        ));
        assert_eq!(c.plant_count(), 1);

        let second = c.plant_seed(&lettuce(), 1, OWNER, &catalog).expect("slot 1 is free");
        assert_ne!(id, second);

        let removed = c.remove_plant(0).expect("slot 0 holds a plant");
        assert_eq!(removed.id(), id);
        assert!(matches!(c.remove_plant(0), Err(SimError::SlotEmpty(0))));
        assert_eq!(c.available_slot(), Some(0));
    }

    #[test]
    fn test_setters_clamp() {
        let mut c = container(ContainerType::Dwc);
        assert!((c.set_ph(12.0) - PH_MAX).abs() < f32::EPSILON);
        assert!((c.set_ec(-3.0) - EC_MIN).abs() < f32::EPSILON);
        assert!((c.set_water_level(2.0) - 1.0).abs() < f32::EPSILON);
        let ec = c.add_nutrients(&NutrientSolution::npk(1.0, 1.0, 1.0));
        assert!((ec - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_depletion_with_plants() {
        let catalog = catalog();
        let mut c = container(ContainerType::Nft);
        c.plant_seed(&lettuce(), 0, OWNER, &catalog).expect("free slot");
        c.plant_seed(&lettuce(), 1, OWNER, &catalog).expect("free slot");

        c.advance(10.0, &catalog, &FixedTimeScale(1.0));
        // c = 2 * 0.01 * 10 = 0.2
        assert!((c.nutrients().nitrogen - 0.8).abs() < 1e-6);
        assert!((c.nutrients().phosphorus - 0.84).abs() < 1e-6);
        assert!((c.nutrients().potassium - 0.76).abs() < 1e-6);
        assert!((c.conditions().ec - 0.8 * 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_low_water_feedback_compounds() {
        let catalog = catalog();
        let mut c = container(ContainerType::Dwc);
        c.set_water_level(0.1);
        c.set_ec(2.0);
        // No plants: EC is recomputed from nutrients (1.5), then the
        // low-water penalty concentrates it.
        c.advance(0.01, &catalog, &FixedTimeScale(1.0));
        assert!((c.conditions().ec - 1.5 * 1.1).abs() < 1e-5);
        let first_oxygen = c.conditions().oxygen_level;
        assert!((first_oxygen - (1.2 * 0.9 - 0.0005)).abs() < 1e-5);

        c.advance(0.01, &catalog, &FixedTimeScale(1.0));
        assert!((c.conditions().ec - 1.5 * 1.1).abs() < 1e-5);
        assert!(c.conditions().oxygen_level < first_oxygen * 0.91);
    }

    #[test]
    fn test_pump_drives_oxygen() {
        let catalog = catalog();
        let mut c = container(ContainerType::Dwc);
        for _ in 0..100 {
            c.advance(1.0, &catalog, &FixedTimeScale(1.0));
        }
        assert!((c.conditions().oxygen_level - OXYGEN_MIN).abs() < 1e-6);

        let mut n = container(ContainerType::Nft);
        for _ in 0..100 {
            n.advance(1.0, &catalog, &FixedTimeScale(1.0));
        }
        assert!((n.conditions().oxygen_level - OXYGEN_MAX).abs() < 1e-6);
    }

    #[test]
    fn test_harvest_ready_plant() {
        let catalog = catalog();
        let mut c = container(ContainerType::Nft);
        c.plant_seed(&lettuce(), 2, OWNER, &catalog).expect("free slot");

        let mut events = Vec::new();
        for _ in 0..80 {
            events.extend(c.advance(1.0, &catalog, &FixedTimeScale(1440.0)));
        }
        assert!(events
            .iter()
            .any(|e| matches!(e, SimEvent::StageChanged { to: GrowthStage::Harvest, .. })));

        let outcome = c.harvest(2, &catalog).expect("plant is ready");
        assert_eq!(outcome.slot, 2);
        assert!(outcome.yield_amount >= 1);
        assert!(!c.slots()[2].is_occupied());
    }

    #[test]
    fn test_harvest_unready_is_no_op() {
        let catalog = catalog();
        let mut c = container(ContainerType::Dwc);
        c.plant_seed(&lettuce(), 0, OWNER, &catalog).expect("free slot");
        let before = c.clone();
        assert!(matches!(c.harvest(0, &catalog), Err(SimError::InvalidState(_))));
        assert_eq!(c, before);
        assert!(matches!(c.harvest(1, &catalog), Err(SimError::SlotEmpty(1))));
    }

    #[test]
    fn test_plant_care() {
        let catalog = catalog();
        let mut c = container(ContainerType::Dwc);
        c.plant_seed(&lettuce(), 0, OWNER, &catalog).expect("free slot");
        c.water_plant(0, 1.0).expect("plant exists");
        assert!(c.water_plant(1, 1.0).is_err());
        assert!(c.water_plant(0, -2.0).is_err());
        c.apply_plant_nutrients(0, &NutrientSolution::uniform(1.0))
            .expect("plant exists");
    }

    #[test]
    fn test_seeded_drift_is_reproducible() {
        let catalog = catalog();
        let mut a = container(ContainerType::Dwc);
        let mut b = container(ContainerType::Dwc);
        for _ in 0..50 {
            a.advance(30.0, &catalog, &FixedTimeScale(60.0));
            b.advance(30.0, &catalog, &FixedTimeScale(60.0));
        }
        assert_eq!(a.to_record(), b.to_record());
    }

    #[test]
    fn test_record_round_trip_reproduces_ticks() {
        let catalog = catalog();
        let time = FixedTimeScale(60.0);
        let mut original = container(ContainerType::EbbFlow);
        original.plant_seed(&lettuce(), 0, OWNER, &catalog).expect("free slot");
        original.plant_seed(&lettuce(), 3, OWNER, &catalog).expect("free slot");
        for _ in 0..20 {
            original.advance(5.0, &catalog, &time);
        }

        let encoded = bincode::serialize(&original.to_record()).expect("encode");
        let decoded: ContainerRecord = bincode::deserialize(&encoded).expect("decode");
        let mut restored = ContainerSimulator::from_record(decoded).expect("valid record");
        assert_eq!(restored, original);

        let dts = [0.5, 1.0, 16.6, 3.0, 42.0, 0.1];
        for dt in dts {
            let a = original.advance(dt, &catalog, &time);
            let b = restored.advance(dt, &catalog, &time);
            assert_eq!(a, b);
        }
        assert_eq!(restored.to_record(), original.to_record());
    }

    #[test]
    fn test_from_record_rejects_bad_slots() {
        let catalog = catalog();
        let mut c = container(ContainerType::Dwc);
        c.plant_seed(&lettuce(), 0, OWNER, &catalog).expect("free slot");
        let mut record = c.to_record();
        record.slots[0].index = 10;
        assert!(ContainerSimulator::from_record(record).is_err());
    }

    #[test]
    fn test_nan_setters_keep_current_values() {
        let mut c = container(ContainerType::Nft);
        let before = *c.conditions();
        assert!((c.set_ph(f32::NAN) - before.ph).abs() < f32::EPSILON);
        assert!((c.set_ec(f32::NAN) - before.ec).abs() < f32::EPSILON);
        assert!((c.set_water_level(f32::NAN) - before.water_level).abs() < f32::EPSILON);
        assert_eq!(*c.conditions(), before);

        let mut poisoned = NutrientSolution::npk(f32::NAN, 0.5, 0.5);
        poisoned.zinc = f32::NAN;
        poisoned.iron = -50.0;
        let ec = c.add_nutrients(&poisoned);
        assert!(ec.is_finite());
        assert!(c.conditions().is_within_bounds());
        assert!(c.nutrients().is_non_negative());
    }

    /// Finite values from `range`, plus NaN and both infinities.
    fn input(range: std::ops::Range<f32>) -> impl Strategy<Value = f32> {
        prop_oneof![
            8 => range,
            1 => Just(f32::NAN),
            1 => Just(f32::INFINITY),
            1 => Just(f32::NEG_INFINITY),
        ]
    }

    proptest! {
        #[test]
        fn prop_clamp_invariants_hold(
            ph in input(-10.0..20.0),
            ec in input(-5.0..10.0),
            water in input(-1.0..2.0),
            feed in input(-5.0..5.0),
            trace in input(-5.0..5.0),
            dts in proptest::collection::vec(0.0f32..120.0, 1..20),
            pump in any::<bool>(),
        ) {
            let catalog = catalog();
            let mut c = container(ContainerType::Nft);
            c.plant_seed(&lettuce(), 0, OWNER, &catalog).expect("free slot");
            c.set_ph(ph);
            c.set_ec(ec);
            c.set_water_level(water);
            let mut dose = NutrientSolution::uniform(feed);
            dose.zinc = trace;
            c.add_nutrients(&dose);
            prop_assert!(c.conditions().is_within_bounds());
            prop_assert!(c.nutrients().is_non_negative());
            if !pump {
                c.stop_pump();
            }
            for dt in dts {
                c.advance(dt, &catalog, &FixedTimeScale(1440.0));
                prop_assert!(c.conditions().is_within_bounds());
                if let Some(plant) = c.plant(0) {
                    prop_assert!(plant.health() >= 0.0 && plant.health() <= plant.max_health());
                    prop_assert!((0.0..=2.0).contains(&plant.factors().overall));
                    prop_assert!((0.0..=1.0).contains(&plant.progress()));
                }
            }
            let json = serde_json::to_string(&c.to_record()).expect("record encodes");
            let decoded: ContainerRecord = serde_json::from_str(&json).expect("record decodes");
            prop_assert_eq!(decoded.conditions, *c.conditions());
        }
    }
}
