//! Per-plant lifecycle: growth progress, stage ladder, health and yield.

use crate::environment::{EnvironmentalConditions, NutrientSolution};
use crate::growth::GrowthFactors;
use crate::species::SpeciesProfile;
use hydrogrow_common::{PlantId, PlayerId, SimError, SimResult, SpeciesId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Health a freshly planted seed starts with.
pub const DEFAULT_MAX_HEALTH: f32 = 100.0;

/// Growth stage of a plant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum GrowthStage {
    /// Just planted
    #[default]
    Seed,
    /// Progress >= 0.1
    Seedling,
    /// Progress >= 0.25
    Vegetative,
    /// Progress >= 0.6
    Flowering,
    /// Progress >= 0.8, ready to harvest
    Harvest,
    /// Health reached zero. Terminal.
    Dead,
}

impl GrowthStage {
    /// Stage implied by growth progress alone (boundaries inclusive).
    #[must_use]
    pub fn from_progress(progress: f32) -> Self {
        if progress >= 0.8 {
            Self::Harvest
        } else if progress >= 0.6 {
            Self::Flowering
        } else if progress >= 0.25 {
            Self::Vegetative
        } else if progress >= 0.1 {
            Self::Seedling
        } else {
            Self::Seed
        }
    }

    /// Get the display name of this stage.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Seed => "Seed",
            Self::Seedling => "Seedling",
            Self::Vegetative => "Vegetative",
            Self::Flowering => "Flowering",
            Self::Harvest => "Ready to Harvest",
            Self::Dead => "Dead",
        }
    }

    /// Check if this plant can be harvested.
    #[must_use]
    pub fn is_harvestable(self) -> bool {
        matches!(self, Self::Harvest)
    }

    /// Check if this plant is dead.
    #[must_use]
    pub fn is_dead(self) -> bool {
        matches!(self, Self::Dead)
    }
}

/// A stage change produced by [`PlantLifecycle::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    /// Previous stage
    pub from: GrowthStage,
    /// New stage
    pub to: GrowthStage,
}

/// Flat record of a plant's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantRecord {
    /// Plant ID
    pub id: PlantId,
    /// Species key
    pub species: SpeciesId,
    /// Player who planted it
    pub planted_by: PlayerId,
    /// Current stage
    pub stage: GrowthStage,
    /// Growth progress in [0, 1]
    pub progress: f32,
    /// Age in game days
    pub age_days: f32,
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Last computed effectiveness factors
    pub factors: GrowthFactors,
    /// Last nutrient levels the plant observed
    pub observed_nutrients: NutrientSolution,
}

/// State machine for one planted seed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantLifecycle {
    id: PlantId,
    species: SpeciesId,
    planted_by: PlayerId,
    stage: GrowthStage,
    progress: f32,
    age_days: f32,
    health: f32,
    max_health: f32,
    factors: GrowthFactors,
    observed_nutrients: NutrientSolution,
}

impl PlantLifecycle {
    /// Creates a seed at full health.
    #[must_use]
    pub fn new(id: PlantId, species: SpeciesId, planted_by: PlayerId) -> Self {
        Self {
            id,
            species,
            planted_by,
            stage: GrowthStage::Seed,
            progress: 0.0,
            age_days: 0.0,
            health: DEFAULT_MAX_HEALTH,
            max_health: DEFAULT_MAX_HEALTH,
            factors: GrowthFactors::default(),
            observed_nutrients: NutrientSolution::default(),
        }
    }

    /// Plant ID.
    #[must_use]
    pub fn id(&self) -> PlantId {
        self.id
    }

    /// Species key.
    #[must_use]
    pub fn species(&self) -> &SpeciesId {
        &self.species
    }

    /// Player who planted it.
    #[must_use]
    pub fn planted_by(&self) -> PlayerId {
        self.planted_by
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> GrowthStage {
        self.stage
    }

    /// Growth progress in [0, 1].
    #[must_use]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Age in game days.
    #[must_use]
    pub fn age_days(&self) -> f32 {
        self.age_days
    }

    /// Current health.
    #[must_use]
    pub fn health(&self) -> f32 {
        self.health
    }

    /// Maximum health.
    #[must_use]
    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    /// Health as a percentage of maximum.
    #[must_use]
    pub fn health_percentage(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            self.health / self.max_health * 100.0
        }
    }

    /// Last computed effectiveness factors.
    #[must_use]
    pub fn factors(&self) -> &GrowthFactors {
        &self.factors
    }

    /// Last nutrient levels the plant observed.
    #[must_use]
    pub fn observed_nutrients(&self) -> &NutrientSolution {
        &self.observed_nutrients
    }

    /// Checks if the plant is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.stage.is_dead()
    }

    /// Checks if the plant can be harvested now.
    #[must_use]
    pub fn can_harvest(&self) -> bool {
        self.stage.is_harvestable()
    }

    /// Advances the plant by `dt` real seconds.
    ///
    /// `time_scale` converts real seconds to game seconds for age and
    /// progress; health changes use real seconds. Dead plants do not change.
    pub fn advance(
        &mut self,
        dt: f32,
        env: &EnvironmentalConditions,
        nutrients: &NutrientSolution,
        profile: &SpeciesProfile,
        time_scale: f32,
    ) -> Option<StageTransition> {
        if !self.is_alive() {
            return None;
        }
        let from = self.stage;
        let game_dt = dt * time_scale;

        self.age_days += game_dt / 86_400.0;

        let growth_seconds = profile.growth_seconds();
        if growth_seconds > 0.0 {
            self.progress += self.factors.overall / growth_seconds * game_dt;
        } else {
            self.progress = 1.0;
        }
        self.progress = self.progress.clamp(0.0, 1.0);

        self.stage = self.stage.max(GrowthStage::from_progress(self.progress));

        self.factors = GrowthFactors::evaluate(env, profile);
        self.observed_nutrients = *nutrients;

        let rate = self.factors.overall;
        let mut delta = 0.0;
        if rate < 0.5 {
            delta -= (1.0 - rate) * 10.0 * dt;
        }
        if rate > 0.8 {
            delta += (rate - 0.8) * 5.0 * dt;
        }
        self.health = (self.health + delta).clamp(0.0, self.max_health);

        if self.health <= 0.0 {
            self.stage = GrowthStage::Dead;
            info!("Plant {} ({}) has died", self.id.raw(), self.species);
        }

        if self.stage == from {
            return None;
        }
        if self.stage != GrowthStage::Dead {
            info!(
                "Plant {} ({}) reached stage {}",
                self.id.raw(),
                self.species,
                self.stage.display_name()
            );
            for (factor, value) in self.factors.problems() {
                debug!(
                    "Plant {} has poor {} ({value:.2})",
                    self.id.raw(),
                    factor.display_name()
                );
            }
        }
        Some(StageTransition {
            from,
            to: self.stage,
        })
    }

    /// Yield this plant would give if harvested now.
    ///
    /// Fails with [`SimError::InvalidState`] unless the plant is in the
    /// Harvest stage. Does not change the plant.
    pub fn harvest_yield(&self, base_yield: u32) -> SimResult<u32> {
        if !self.can_harvest() {
            return Err(SimError::InvalidState(format!(
                "plant {} is {} and cannot be harvested",
                self.id.raw(),
                self.stage.display_name()
            )));
        }
        let multiplier =
            (self.health / self.max_health * self.factors.overall).clamp(0.1, 1.5);
        Ok((base_yield as f32 * multiplier).round() as u32)
    }

    /// Waters the plant, restoring `amount * 5` health.
    pub fn water(&mut self, amount: f32) -> SimResult<()> {
        self.ensure_alive()?;
        if amount.is_nan() || amount <= 0.0 {
            return Err(SimError::RangeViolation {
                parameter: "water amount",
                value: amount,
                min: 0.0,
                max: f32::MAX,
            });
        }
        self.health = (self.health + amount * 5.0).min(self.max_health);
        debug!("Watered plant {}, health {:.1}", self.id.raw(), self.health);
        Ok(())
    }

    /// Feeds the plant directly, restoring `mean(N, P, K) * 2` health.
    pub fn apply_nutrients(&mut self, levels: &NutrientSolution) -> SimResult<()> {
        self.ensure_alive()?;
        if !levels.is_non_negative() {
            return Err(SimError::InvalidState(
                "nutrient levels must be non-negative".to_string(),
            ));
        }
        self.health = (self.health + levels.primary_mean() * 2.0).min(self.max_health);
        self.observed_nutrients = *levels;
        Ok(())
    }

    fn ensure_alive(&self) -> SimResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(SimError::InvalidState(format!(
                "plant {} is dead",
                self.id.raw()
            )))
        }
    }

    /// Exports the plant as a flat record.
    #[must_use]
    pub fn to_record(&self) -> PlantRecord {
        PlantRecord {
            id: self.id,
            species: self.species.clone(),
            planted_by: self.planted_by,
            stage: self.stage,
            progress: self.progress,
            age_days: self.age_days,
            health: self.health,
            max_health: self.max_health,
            factors: self.factors,
            observed_nutrients: self.observed_nutrients,
        }
    }

    /// Rebuilds a plant from a record, clamping out-of-range values.
    #[must_use]
    pub fn from_record(record: PlantRecord) -> Self {
        let max_health = if record.max_health > 0.0 {
            record.max_health
        } else {
            DEFAULT_MAX_HEALTH
        };
        Self {
            id: record.id,
            species: record.species,
            planted_by: record.planted_by,
            stage: record.stage,
            progress: record.progress.clamp(0.0, 1.0),
            age_days: record.age_days.max(0.0),
            health: record.health.clamp(0.0, max_health),
            max_health,
            factors: record.factors,
            observed_nutrients: record.observed_nutrients,
        }
    }
}
