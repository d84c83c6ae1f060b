//! Species catalog: immutable growth profiles looked up by species key.

use crate::growth::OptimalRange;
use hydrogrow_common::SpeciesId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Broad plant family, used for grouping in shop and journal views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlantCategory {
    /// Lettuce, spinach, kale...
    #[default]
    Leafy,
    /// Tomatoes, peppers, strawberries...
    Fruiting,
    /// Basil, mint, parsley...
    Herbs,
    /// Radishes, carrots...
    Root,
    /// Edible flowers
    Flowering,
}

impl PlantCategory {
    /// Get the display name of this category.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Leafy => "Leafy Greens",
            Self::Fruiting => "Fruiting",
            Self::Herbs => "Herbs",
            Self::Root => "Root Vegetables",
            Self::Flowering => "Flowering",
        }
    }
}

/// Growth parameters of one species. Never mutated by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesProfile {
    /// Catalog key
    pub id: SpeciesId,
    /// Display name
    pub display_name: String,
    /// Category
    pub category: PlantCategory,
    /// Days from seed to full growth under ideal conditions
    pub growth_days: f32,
    /// Optimal solution pH
    pub optimal_ph: OptimalRange,
    /// Optimal EC (mS/cm)
    pub optimal_ec: OptimalRange,
    /// Optimal temperature (°C)
    pub optimal_temperature: OptimalRange,
    /// Optimal relative humidity (%)
    pub optimal_humidity: f32,
    /// Light hours per day the species needs
    pub light_hours: f32,
    /// Yield units at full health and unit growth rate
    pub base_yield: u32,
    /// Market value per yield unit
    pub market_value: f32,
    /// Price of one seed
    pub seed_cost: f32,
    /// Player level required to plant this species
    pub unlock_level: u32,
}

impl Default for SpeciesProfile {
    fn default() -> Self {
        Self {
            id: SpeciesId::new("generic"),
            display_name: "Generic Plant".to_string(),
            category: PlantCategory::Leafy,
            growth_days: 7.0,
            optimal_ph: OptimalRange::new(5.5, 6.5),
            optimal_ec: OptimalRange::new(1.0, 2.0),
            optimal_temperature: OptimalRange::new(18.0, 24.0),
            optimal_humidity: 60.0,
            light_hours: 14.0,
            base_yield: 1,
            market_value: 10.0,
            seed_cost: 5.0,
            unlock_level: 1,
        }
    }
}

impl SpeciesProfile {
    /// Starts a builder seeded with the default profile values.
    #[must_use]
    pub fn builder(id: &str, display_name: &str) -> SpeciesProfileBuilder {
        SpeciesProfileBuilder::new(id, display_name)
    }

    /// Growth duration in game seconds.
    #[must_use]
    pub fn growth_seconds(&self) -> f32 {
        self.growth_days * 86_400.0
    }
}

/// Builder for species profiles.
#[derive(Debug, Clone)]
pub struct SpeciesProfileBuilder {
    profile: SpeciesProfile,
}

impl SpeciesProfileBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(id: &str, display_name: &str) -> Self {
        Self {
            profile: SpeciesProfile {
                id: SpeciesId::new(id),
                display_name: display_name.to_string(),
                ..SpeciesProfile::default()
            },
        }
    }

    /// Set the category.
    #[must_use]
    pub fn category(mut self, category: PlantCategory) -> Self {
        self.profile.category = category;
        self
    }

    /// Set the growth duration in days.
    #[must_use]
    pub fn growth_days(mut self, days: f32) -> Self {
        self.profile.growth_days = days;
        self
    }

    /// Set the optimal pH range.
    #[must_use]
    pub fn ph(mut self, min: f32, max: f32) -> Self {
        self.profile.optimal_ph = OptimalRange::new(min, max);
        self
    }

    /// Set the optimal EC range.
    #[must_use]
    pub fn ec(mut self, min: f32, max: f32) -> Self {
        self.profile.optimal_ec = OptimalRange::new(min, max);
        self
    }

    /// Set the optimal temperature range.
    #[must_use]
    pub fn temperature(mut self, min: f32, max: f32) -> Self {
        self.profile.optimal_temperature = OptimalRange::new(min, max);
        self
    }

    /// Set the optimal humidity.
    #[must_use]
    pub fn humidity(mut self, humidity: f32) -> Self {
        self.profile.optimal_humidity = humidity;
        self
    }

    /// Set the required light hours.
    #[must_use]
    pub fn light_hours(mut self, hours: f32) -> Self {
        self.profile.light_hours = hours;
        self
    }

    /// Set base yield, market value and seed cost.
    #[must_use]
    pub fn economy(mut self, base_yield: u32, market_value: f32, seed_cost: f32) -> Self {
        self.profile.base_yield = base_yield;
        self.profile.market_value = market_value;
        self.profile.seed_cost = seed_cost;
        self
    }

    /// Set the unlock level.
    #[must_use]
    pub fn unlock_level(mut self, level: u32) -> Self {
        self.profile.unlock_level = level;
        self
    }

    /// Build the profile.
    #[must_use]
    pub fn build(self) -> SpeciesProfile {
        self.profile
    }
}

/// Read access to species profiles.
pub trait SpeciesCatalog {
    /// Looks up a profile by key.
    fn lookup(&self, id: &SpeciesId) -> Option<&SpeciesProfile>;
}

/// Errors raised while loading species data.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// RON text could not be parsed
    #[error("species data parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Two entries share a key
    #[error("duplicate species '{0}'")]
    Duplicate(SpeciesId),
}

/// In-memory species catalog.
#[derive(Debug, Clone, Default)]
pub struct SpeciesRegistry {
    profiles: BTreeMap<SpeciesId, SpeciesProfile>,
}

impl SpeciesRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in species.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    /// Loads a registry from a RON list of profiles.
    ///
    /// Fields missing from an entry take the default profile values.
    pub fn from_ron(text: &str) -> Result<Self, CatalogError> {
        let profiles: Vec<SpeciesProfile> = ron::from_str(text)?;
        let mut registry = Self::new();
        for profile in profiles {
            if registry.profiles.contains_key(&profile.id) {
                return Err(CatalogError::Duplicate(profile.id));
            }
            registry.register(profile);
        }
        debug!("Loaded {} species from RON", registry.len());
        Ok(registry)
    }

    /// Registers the built-in species.
    pub fn register_defaults(&mut self) {
        self.register(
            SpeciesProfile::builder("lettuce", "Butterhead Lettuce")
                .category(PlantCategory::Leafy)
                .growth_days(7.0)
                .ph(5.5, 6.5)
                .ec(1.0, 2.0)
                .temperature(16.0, 22.0)
                .light_hours(14.0)
                .economy(1, 10.0, 5.0)
                .build(),
        );
        self.register(
            SpeciesProfile::builder("basil", "Sweet Basil")
                .category(PlantCategory::Herbs)
                .growth_days(10.0)
                .ph(5.5, 6.5)
                .ec(1.0, 1.6)
                .temperature(20.0, 27.0)
                .humidity(50.0)
                .light_hours(16.0)
                .economy(2, 8.0, 4.0)
                .build(),
        );
        self.register(
            SpeciesProfile::builder("spinach", "Spinach")
                .category(PlantCategory::Leafy)
                .growth_days(8.0)
                .ph(6.0, 7.0)
                .ec(1.8, 2.3)
                .temperature(15.0, 21.0)
                .light_hours(12.0)
                .economy(1, 12.0, 6.0)
                .build(),
        );
        self.register(
            SpeciesProfile::builder("tomato", "Cherry Tomato")
                .category(PlantCategory::Fruiting)
                .growth_days(21.0)
                .ph(5.8, 6.3)
                .ec(2.0, 3.5)
                .temperature(20.0, 26.0)
                .humidity(65.0)
                .light_hours(16.0)
                .economy(6, 15.0, 12.0)
                .unlock_level(3)
                .build(),
        );
        self.register(
            SpeciesProfile::builder("strawberry", "Strawberry")
                .category(PlantCategory::Fruiting)
                .growth_days(28.0)
                .ph(5.5, 6.2)
                .ec(1.0, 1.5)
                .temperature(18.0, 24.0)
                .humidity(65.0)
                .light_hours(14.0)
                .economy(8, 20.0, 18.0)
                .unlock_level(5)
                .build(),
        );
        self.register(
            SpeciesProfile::builder("radish", "Radish")
                .category(PlantCategory::Root)
                .growth_days(5.0)
                .ph(6.0, 7.0)
                .ec(1.6, 2.2)
                .temperature(10.0, 20.0)
                .light_hours(12.0)
                .economy(1, 6.0, 2.0)
                .unlock_level(2)
                .build(),
        );
        self.register(
            SpeciesProfile::builder("nasturtium", "Nasturtium")
                .category(PlantCategory::Flowering)
                .growth_days(12.0)
                .ph(6.0, 7.5)
                .ec(1.0, 1.8)
                .temperature(18.0, 25.0)
                .light_hours(15.0)
                .economy(3, 14.0, 7.0)
                .unlock_level(4)
                .build(),
        );
    }

    /// Registers a profile, replacing any profile with the same key.
    pub fn register(&mut self, profile: SpeciesProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Gets a profile by key.
    #[must_use]
    pub fn get(&self, id: &SpeciesId) -> Option<&SpeciesProfile> {
        self.profiles.get(id)
    }

    /// Species whose unlock level is at most `level`.
    #[must_use]
    pub fn unlocked_at(&self, level: u32) -> Vec<&SpeciesProfile> {
        self.profiles
            .values()
            .filter(|p| p.unlock_level <= level)
            .collect()
    }

    /// Species in a category.
    #[must_use]
    pub fn by_category(&self, category: PlantCategory) -> Vec<&SpeciesProfile> {
        self.profiles
            .values()
            .filter(|p| p.category == category)
            .collect()
    }

    /// Iterates over all profiles in key order.
    pub fn iter(&self) -> impl Iterator<Item = &SpeciesProfile> {
        self.profiles.values()
    }

    /// Number of registered species.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Checks if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl SpeciesCatalog for SpeciesRegistry {
    fn lookup(&self, id: &SpeciesId) -> Option<&SpeciesProfile> {
        self.get(id)
    }
}
