//! Growth model: per-factor effectiveness and overall growth rate.
//!
//! Every function here is pure. The four factors act as independent
//! multiplicative gates, so one badly out-of-range variable can suppress
//! growth on its own.

use crate::environment::EnvironmentalConditions;
use crate::species::SpeciesProfile;
use serde::{Deserialize, Serialize};

/// Reference day length (hours) the light factor is normalised against.
pub const BASELINE_LIGHT_HOURS: f32 = 16.0;
/// Factors below this are reported as growth problems.
pub const PROBLEM_THRESHOLD: f32 = 0.7;
/// Upper bound of the overall growth rate.
pub const MAX_GROWTH_RATE: f32 = 2.0;

/// Inclusive optimal range for one environmental variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalRange {
    /// Lower bound
    pub min: f32,
    /// Upper bound
    pub max: f32,
}

impl OptimalRange {
    /// Creates a new range.
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Checks whether `value` lies inside the range (bounds inclusive).
    #[must_use]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Distance from `value` to the nearest bound, zero inside the range.
    #[must_use]
    pub fn distance(&self, value: f32) -> f32 {
        if self.contains(value) {
            0.0
        } else {
            (value - self.min).abs().min((value - self.max).abs())
        }
    }

    /// Midpoint of the range.
    #[must_use]
    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) * 0.5
    }
}

/// pH effectiveness: 1 inside the range, exponential falloff outside.
#[must_use]
pub fn ph_effect(ph: f32, range: OptimalRange) -> f32 {
    if range.contains(ph) {
        1.0
    } else {
        (-2.0 * range.distance(ph)).exp()
    }
}

/// Nutrient effectiveness from EC: linear falloff outside the range, floor 0.1.
#[must_use]
pub fn nutrient_effect(ec: f32, range: OptimalRange) -> f32 {
    if range.contains(ec) {
        1.0
    } else {
        (1.0 - 0.5 * range.distance(ec)).max(0.1)
    }
}

/// Light effectiveness relative to a 16 hour reference day, in [0.1, 1.2].
#[must_use]
pub fn light_effect(intensity: f32, required_hours: f32) -> f32 {
    (intensity * required_hours / BASELINE_LIGHT_HOURS).clamp(0.1, 1.2)
}

/// Temperature effectiveness: gentle linear falloff outside the range, floor 0.1.
#[must_use]
pub fn temperature_effect(temperature: f32, range: OptimalRange) -> f32 {
    if range.contains(temperature) {
        1.0
    } else {
        (1.0 - 0.1 * range.distance(temperature)).max(0.1)
    }
}

/// Which effectiveness factor a growth problem refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrowthFactor {
    /// Solution pH
    Ph,
    /// Nutrient concentration
    Nutrient,
    /// Light supply
    Light,
    /// Air temperature
    Temperature,
}

impl GrowthFactor {
    /// Get the display name of this factor.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Ph => "pH",
            Self::Nutrient => "nutrients",
            Self::Light => "light",
            Self::Temperature => "temperature",
        }
    }
}

/// Effectiveness factors for one plant and the resulting growth rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthFactors {
    /// pH effectiveness, in (0, 1]
    pub ph: f32,
    /// Nutrient effectiveness, in [0.1, 1]
    pub nutrient: f32,
    /// Light effectiveness, in [0.1, 1.2]
    pub light: f32,
    /// Temperature effectiveness, in [0.1, 1]
    pub temperature: f32,
    /// Product of the factors, clamped to [0, 2]
    pub overall: f32,
}

impl Default for GrowthFactors {
    fn default() -> Self {
        Self {
            ph: 1.0,
            nutrient: 1.0,
            light: 1.0,
            temperature: 1.0,
            overall: 1.0,
        }
    }
}

impl GrowthFactors {
    /// Evaluates all factors for `profile` under `env`.
    #[must_use]
    pub fn evaluate(env: &EnvironmentalConditions, profile: &SpeciesProfile) -> Self {
        let ph = ph_effect(env.ph, profile.optimal_ph);
        let nutrient = nutrient_effect(env.ec, profile.optimal_ec);
        let light = light_effect(env.light_intensity, profile.light_hours);
        let temperature = temperature_effect(env.temperature, profile.optimal_temperature);

        Self {
            ph,
            nutrient,
            light,
            temperature,
            overall: (ph * nutrient * light * temperature).clamp(0.0, MAX_GROWTH_RATE),
        }
    }

    /// Factors currently below the problem threshold.
    #[must_use]
    pub fn problems(&self) -> Vec<(GrowthFactor, f32)> {
        [
            (GrowthFactor::Ph, self.ph),
            (GrowthFactor::Nutrient, self.nutrient),
            (GrowthFactor::Light, self.light),
            (GrowthFactor::Temperature, self.temperature),
        ]
        .into_iter()
        .filter(|(_, value)| *value < PROBLEM_THRESHOLD)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PH: OptimalRange = OptimalRange::new(5.5, 6.5);

    #[test]
    fn test_effects_inside_range() {
        assert!((ph_effect(6.0, PH) - 1.0).abs() < f32::EPSILON);
        assert!((ph_effect(5.5, PH) - 1.0).abs() < f32::EPSILON);
        assert!((nutrient_effect(1.5, OptimalRange::new(1.0, 2.0)) - 1.0).abs() < f32::EPSILON);
        assert!(
            (temperature_effect(21.0, OptimalRange::new(18.0, 24.0)) - 1.0).abs() < f32::EPSILON
        );
    }

    #[test]
    fn test_effects_outside_range() {
        // One pH unit out: exp(-2)
        assert!((ph_effect(7.5, PH) - (-2.0_f32).exp()).abs() < 1e-6);
        // EC 1.0 above the range
        assert!((nutrient_effect(3.0, OptimalRange::new(1.0, 2.0)) - 0.5).abs() < 1e-6);
        // Far away: floors
        assert!((nutrient_effect(40.0, OptimalRange::new(1.0, 2.0)) - 0.1).abs() < 1e-6);
        assert!(
            (temperature_effect(40.0, OptimalRange::new(18.0, 24.0)) - 0.1).abs() < 1e-6
        );
        assert!(
            (temperature_effect(14.0, OptimalRange::new(18.0, 24.0)) - 0.6).abs() < 1e-6
        );
    }

    #[test]
    fn test_light_effect() {
        assert!((light_effect(1.0, 16.0) - 1.0).abs() < f32::EPSILON);
        assert!((light_effect(1.0, 8.0) - 0.5).abs() < f32::EPSILON);
        assert!((light_effect(2.0, 16.0) - 1.2).abs() < f32::EPSILON);
        assert!((light_effect(0.0, 16.0) - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_ideal_conditions_give_unit_rate() {
        let profile = SpeciesProfile::builder("lettuce", "Lettuce")
            .light_hours(16.0)
            .build();
        let factors = GrowthFactors::evaluate(&EnvironmentalConditions::default(), &profile);
        assert!((factors.overall - 1.0).abs() < 1e-6);
        assert!(factors.problems().is_empty());
    }

    #[test]
    fn test_problems_reported() {
        let profile = SpeciesProfile::builder("lettuce", "Lettuce")
            .light_hours(16.0)
            .build();
        let env = EnvironmentalConditions {
            ph: 8.0,
            ..Default::default()
        };
        let factors = GrowthFactors::evaluate(&env, &profile);
        let problems = factors.problems();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].0, GrowthFactor::Ph);
    }

    proptest! {
        #[test]
        fn prop_effects_stay_in_range(value in -100.0f32..100.0, hours in 0.0f32..48.0) {
            let range = OptimalRange::new(5.5, 6.5);
            let ph = ph_effect(value, range);
            prop_assert!((0.0..=1.0).contains(&ph));
            let n = nutrient_effect(value, range);
            prop_assert!((0.1..=1.0).contains(&n));
            let t = temperature_effect(value, range);
            prop_assert!((0.1..=1.0).contains(&t));
            let l = light_effect(value, hours);
            prop_assert!((0.1..=1.2).contains(&l));
        }

        #[test]
        fn prop_overall_rate_bounded(
            ph in 4.0f32..8.0,
            ec in 0.0f32..4.0,
            temperature in -10.0f32..50.0,
            light in 0.0f32..3.0,
        ) {
            let profile = SpeciesProfile::default();
            let env = EnvironmentalConditions {
                ph,
                ec,
                temperature,
                light_intensity: light,
                ..Default::default()
            };
            let factors = GrowthFactors::evaluate(&env, &profile);
            prop_assert!((0.0..=MAX_GROWTH_RATE).contains(&factors.overall));
        }
    }
}
