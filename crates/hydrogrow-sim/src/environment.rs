//! Environmental state of a hydroponic container.
//!
//! Holds the solution chemistry and the climate values a container
//! exposes to its plants. The container is the only writer.

use serde::{Deserialize, Serialize};

/// Lowest admissible solution pH.
pub const PH_MIN: f32 = 4.0;
/// Highest admissible solution pH.
pub const PH_MAX: f32 = 8.0;
/// Lowest admissible EC (mS/cm).
pub const EC_MIN: f32 = 0.0;
/// Highest admissible EC (mS/cm).
pub const EC_MAX: f32 = 4.0;
/// Oxygen floor reached with the pump stopped.
pub const OXYGEN_MIN: f32 = 0.3;
/// Oxygen ceiling reached with the pump running.
pub const OXYGEN_MAX: f32 = 1.5;
/// Upper bound of each primary nutrient channel.
pub const NUTRIENT_MAX: f32 = 3.0;
/// EC produced per unit of mean primary nutrient level.
pub const EC_PER_NUTRIENT: f32 = 1.5;

/// Climate and solution values seen by every plant in a container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalConditions {
    /// Solution pH, in [4, 8]
    pub ph: f32,
    /// Electrical conductivity, in [0, 4]
    pub ec: f32,
    /// Air temperature (°C)
    pub temperature: f32,
    /// Relative humidity (%)
    pub humidity: f32,
    /// Light intensity multiplier
    pub light_intensity: f32,
    /// Dissolved oxygen level, in [0.3, 1.5]
    pub oxygen_level: f32,
    /// Reservoir fill fraction, in [0, 1]
    pub water_level: f32,
}

impl Default for EnvironmentalConditions {
    fn default() -> Self {
        Self {
            ph: 6.0,
            ec: 1.5,
            temperature: 21.0,
            humidity: 60.0,
            light_intensity: 1.0,
            oxygen_level: 1.0,
            water_level: 1.0,
        }
    }
}

impl EnvironmentalConditions {
    /// Forces every bounded field back into its admissible range.
    pub fn clamp_all(&mut self) {
        self.ph = self.ph.clamp(PH_MIN, PH_MAX);
        self.ec = self.ec.clamp(EC_MIN, EC_MAX);
        self.oxygen_level = self.oxygen_level.clamp(OXYGEN_MIN, OXYGEN_MAX);
        self.water_level = self.water_level.clamp(0.0, 1.0);
    }

    /// Checks whether every bounded field is inside its range.
    #[must_use]
    pub fn is_within_bounds(&self) -> bool {
        (PH_MIN..=PH_MAX).contains(&self.ph)
            && (EC_MIN..=EC_MAX).contains(&self.ec)
            && (OXYGEN_MIN..=OXYGEN_MAX).contains(&self.oxygen_level)
            && (0.0..=1.0).contains(&self.water_level)
    }
}

/// Nine-channel nutrient solution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutrientSolution {
    /// Nitrogen
    pub nitrogen: f32,
    /// Phosphorus
    pub phosphorus: f32,
    /// Potassium
    pub potassium: f32,
    /// Calcium
    pub calcium: f32,
    /// Magnesium
    pub magnesium: f32,
    /// Sulfur
    pub sulfur: f32,
    /// Iron
    pub iron: f32,
    /// Manganese
    pub manganese: f32,
    /// Zinc
    pub zinc: f32,
}

impl Default for NutrientSolution {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl NutrientSolution {
    /// Solution with every channel at `level`.
    #[must_use]
    pub const fn uniform(level: f32) -> Self {
        Self {
            nitrogen: level,
            phosphorus: level,
            potassium: level,
            calcium: level,
            magnesium: level,
            sulfur: level,
            iron: level,
            manganese: level,
            zinc: level,
        }
    }

    /// Solution with only the primary N-P-K channels set.
    #[must_use]
    pub const fn npk(nitrogen: f32, phosphorus: f32, potassium: f32) -> Self {
        let mut solution = Self::uniform(0.0);
        solution.nitrogen = nitrogen;
        solution.phosphorus = phosphorus;
        solution.potassium = potassium;
        solution
    }

    /// All nine channels in N, P, K, Ca, Mg, S, Fe, Mn, Zn order.
    #[must_use]
    pub const fn channels(&self) -> [f32; 9] {
        [
            self.nitrogen,
            self.phosphorus,
            self.potassium,
            self.calcium,
            self.magnesium,
            self.sulfur,
            self.iron,
            self.manganese,
            self.zinc,
        ]
    }

    /// Mean of the primary N-P-K channels.
    #[must_use]
    pub fn primary_mean(&self) -> f32 {
        (self.nitrogen + self.phosphorus + self.potassium) / 3.0
    }

    /// EC implied by the current primary channels, clamped to the EC range.
    #[must_use]
    pub fn derived_ec(&self) -> f32 {
        (self.primary_mean() * EC_PER_NUTRIENT).clamp(EC_MIN, EC_MAX)
    }

    /// Checks that every channel is finite and not negative.
    #[must_use]
    pub fn is_non_negative(&self) -> bool {
        self.invalid_channel().is_none()
    }

    /// First channel that is NaN, infinite or negative.
    #[must_use]
    pub fn invalid_channel(&self) -> Option<f32> {
        self.channels()
            .into_iter()
            .find(|c| !c.is_finite() || *c < 0.0)
    }

    /// Adds another solution channel by channel, each clamped to
    /// [0, NUTRIENT_MAX]. Negative and non-finite doses are ignored.
    pub fn add(&mut self, other: &Self) {
        fn top_up(level: &mut f32, dose: f32) {
            if dose.is_finite() && dose > 0.0 {
                *level = (*level + dose).clamp(0.0, NUTRIENT_MAX);
            }
        }
        top_up(&mut self.nitrogen, other.nitrogen);
        top_up(&mut self.phosphorus, other.phosphorus);
        top_up(&mut self.potassium, other.potassium);
        top_up(&mut self.calcium, other.calcium);
        top_up(&mut self.magnesium, other.magnesium);
        top_up(&mut self.sulfur, other.sulfur);
        top_up(&mut self.iron, other.iron);
        top_up(&mut self.manganese, other.manganese);
        top_up(&mut self.zinc, other.zinc);
    }

    /// Drains the primary channels by `consumption`, floored at zero.
    ///
    /// Phosphorus drains at 0.8x and potassium at 1.2x the nitrogen rate.
    pub fn deplete(&mut self, consumption: f32) {
        self.nitrogen = (self.nitrogen - consumption).max(0.0);
        self.phosphorus = (self.phosphorus - consumption * 0.8).max(0.0);
        self.potassium = (self.potassium - consumption * 1.2).max(0.0);
    }
}

/// Environment parameter identifiers used in change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvironmentParameter {
    /// Solution pH
    Ph,
    /// Electrical conductivity
    Ec,
    /// Reservoir water level
    WaterLevel,
    /// Nutrient channels
    Nutrients,
    /// Pump state / oxygenation
    Pump,
}

impl EnvironmentParameter {
    /// Get the display name of this parameter.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Ph => "pH",
            Self::Ec => "EC",
            Self::WaterLevel => "water level",
            Self::Nutrients => "nutrients",
            Self::Pump => "pump",
        }
    }
}
