//! Game time: time-scale modes and the day/night clock.
//!
//! The simulation never reads a global clock. Tick entry points take a
//! [`TimeProvider`] and ask it for the current real-to-game multiplier.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Seconds in a game day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;
/// Seconds in a game hour.
pub const SECONDS_PER_HOUR: f64 = 3_600.0;
/// Hour daylight begins.
pub const DAY_START_HOUR: u32 = 6;
/// Hour night begins.
pub const NIGHT_START_HOUR: u32 = 18;
/// Longest offline gap (hours) that is replayed on load.
pub const MAX_OFFLINE_HOURS: f32 = 72.0;
/// Offline gaps at or below this many hours are ignored.
pub const MIN_OFFLINE_HOURS: f32 = 0.1;

/// Source of the real-seconds-to-game-seconds multiplier.
pub trait TimeProvider {
    /// Current time scale.
    fn time_scale(&self) -> f32;
}

/// A constant time scale, handy for hosts that drive game time themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTimeScale(pub f32);

impl TimeProvider for FixedTimeScale {
    fn time_scale(&self) -> f32 {
        self.0
    }
}

/// Game speed setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeMode {
    /// Time stopped
    Paused,
    /// One real minute is one game hour
    #[default]
    Normal,
    /// Twice normal speed
    Fast,
    /// Four times normal speed
    VeryFast,
    /// One real minute is one game day
    Accelerated,
}

impl TimeMode {
    /// Real-to-game seconds multiplier for this mode.
    #[must_use]
    pub fn scale(self) -> f32 {
        match self {
            Self::Paused => 0.0,
            Self::Normal => 60.0,
            Self::Fast => 120.0,
            Self::VeryFast => 240.0,
            Self::Accelerated => 1440.0,
        }
    }

    /// Mode selected by the speed toggle from this one.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Paused => Self::Normal,
            Self::Normal => Self::Fast,
            Self::Fast => Self::VeryFast,
            Self::VeryFast | Self::Accelerated => Self::Normal,
        }
    }

    /// Get the display name of this mode.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Paused => "Paused",
            Self::Normal => "Normal",
            Self::Fast => "Fast",
            Self::VeryFast => "Very Fast",
            Self::Accelerated => "Accelerated",
        }
    }
}

/// Notifications produced while the clock advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeEvent {
    /// A new day began (1-based day number)
    NewDay(u32),
    /// The hour changed (0-23)
    HourChanged(u32),
    /// Daylight began
    DayStarted,
    /// Night began
    NightStarted,
    /// The speed mode changed
    ModeChanged(TimeMode),
}

/// Day/night clock driven by real time and the current [`TimeMode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameClock {
    mode: TimeMode,
    previous_mode: TimeMode,
    /// Game seconds since day 1, 00:00
    game_seconds: f64,
    offline_hours_processed: f32,
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl GameClock {
    /// Creates a clock at day 1, 06:00 in Normal mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: TimeMode::Normal,
            previous_mode: TimeMode::Normal,
            game_seconds: f64::from(DAY_START_HOUR) * SECONDS_PER_HOUR,
            offline_hours_processed: 0.0,
        }
    }

    /// Creates a clock in the given mode.
    #[must_use]
    pub fn with_mode(mode: TimeMode) -> Self {
        Self {
            mode,
            previous_mode: mode,
            ..Self::new()
        }
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> TimeMode {
        self.mode
    }

    /// Changes the mode, remembering the previous one.
    pub fn set_mode(&mut self, mode: TimeMode) -> Option<TimeEvent> {
        if self.mode == mode {
            return None;
        }
        self.previous_mode = self.mode;
        self.mode = mode;
        info!("Time mode changed to {}", mode.display_name());
        Some(TimeEvent::ModeChanged(mode))
    }

    /// Steps through the speed modes.
    pub fn toggle_mode(&mut self) -> Option<TimeEvent> {
        self.set_mode(self.mode.toggled())
    }

    /// Pauses the clock.
    pub fn pause(&mut self) -> Option<TimeEvent> {
        if self.mode == TimeMode::Paused {
            return None;
        }
        self.set_mode(TimeMode::Paused)
    }

    /// Resumes the mode that was active before pausing.
    pub fn resume(&mut self) -> Option<TimeEvent> {
        if self.mode != TimeMode::Paused {
            return None;
        }
        self.set_mode(self.previous_mode)
    }

    /// Checks if the clock is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.mode == TimeMode::Paused
    }

    /// Total game seconds elapsed since day 1, 00:00.
    #[must_use]
    pub fn game_seconds(&self) -> f64 {
        self.game_seconds
    }

    /// Current day, starting at 1.
    #[must_use]
    pub fn day(&self) -> u32 {
        (self.game_seconds / SECONDS_PER_DAY) as u32 + 1
    }

    /// Current hour (0-23).
    #[must_use]
    pub fn hour(&self) -> u32 {
        ((self.game_seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR) as u32
    }

    /// Current minute (0-59).
    #[must_use]
    pub fn minute(&self) -> u32 {
        ((self.game_seconds % SECONDS_PER_HOUR) / 60.0) as u32
    }

    /// Fractional hour of the day.
    #[must_use]
    pub fn time_of_day(&self) -> f32 {
        ((self.game_seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR) as f32
    }

    /// Check if it's daytime (6:00 to 18:00).
    #[must_use]
    pub fn is_day(&self) -> bool {
        (DAY_START_HOUR..NIGHT_START_HOUR).contains(&self.hour())
    }

    /// Check if it's nighttime.
    #[must_use]
    pub fn is_night(&self) -> bool {
        !self.is_day()
    }

    /// Formatted as `Day N, HH:MM`.
    #[must_use]
    pub fn formatted(&self) -> String {
        format!("Day {}, {:02}:{:02}", self.day(), self.hour(), self.minute())
    }

    /// Hours replayed by the last offline catch-up.
    #[must_use]
    pub fn offline_hours_processed(&self) -> f32 {
        self.offline_hours_processed
    }

    /// Advances by `real_dt` real seconds at the current scale.
    pub fn update(&mut self, real_dt: f32) -> Vec<TimeEvent> {
        let game_dt = f64::from(real_dt * self.mode.scale());
        if game_dt <= 0.0 {
            return Vec::new();
        }
        self.advance_game_seconds(game_dt)
    }

    /// Advances the clock by whole game hours regardless of mode.
    pub fn advance_hours(&mut self, hours: f32) -> Vec<TimeEvent> {
        self.advance_game_seconds(f64::from(hours.max(0.0)) * SECONDS_PER_HOUR)
    }

    /// Replays time spent offline, capped at 72 hours.
    ///
    /// Returns the hours actually replayed (zero for gaps of 0.1 h or less).
    pub fn process_offline_hours(&mut self, hours: f32) -> f32 {
        let hours = hours.min(MAX_OFFLINE_HOURS);
        if hours > MIN_OFFLINE_HOURS {
            self.advance_hours(hours);
            self.offline_hours_processed = hours;
            info!("Processed {hours:.2} hours of offline time");
        } else {
            self.offline_hours_processed = 0.0;
        }
        self.offline_hours_processed
    }

    fn advance_game_seconds(&mut self, seconds: f64) -> Vec<TimeEvent> {
        let previous_day = self.day();
        let previous_hour = self.hour();
        let was_day = self.is_day();

        self.game_seconds += seconds;

        let mut events = Vec::new();
        if self.day() != previous_day {
            events.push(TimeEvent::NewDay(self.day()));
        }
        if self.hour() != previous_hour {
            events.push(TimeEvent::HourChanged(self.hour()));
        }
        match (was_day, self.is_day()) {
            (false, true) => events.push(TimeEvent::DayStarted),
            (true, false) => events.push(TimeEvent::NightStarted),
            _ => {}
        }
        events
    }
}

impl TimeProvider for GameClock {
    fn time_scale(&self) -> f32 {
        self.mode.scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_scales() {
        assert!(TimeMode::Paused.scale().abs() < f32::EPSILON);
        assert!((TimeMode::Normal.scale() - 60.0).abs() < f32::EPSILON);
        assert!((TimeMode::Accelerated.scale() - 1440.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_toggle_cycle() {
        let mut clock = GameClock::with_mode(TimeMode::Paused);
        clock.toggle_mode();
        assert_eq!(clock.mode(), TimeMode::Normal);
        clock.toggle_mode();
        assert_eq!(clock.mode(), TimeMode::Fast);
        clock.toggle_mode();
        assert_eq!(clock.mode(), TimeMode::VeryFast);
        clock.toggle_mode();
        assert_eq!(clock.mode(), TimeMode::Normal);

        clock.set_mode(TimeMode::Accelerated);
        clock.toggle_mode();
        assert_eq!(clock.mode(), TimeMode::Normal);
    }

    #[test]
    fn test_pause_resume_restores_mode() {
        let mut clock = GameClock::with_mode(TimeMode::Fast);
        assert_eq!(clock.pause(), Some(TimeEvent::ModeChanged(TimeMode::Paused)));
        assert!(clock.is_paused());
        assert!(clock.update(100.0).is_empty());
        clock.resume();
        assert_eq!(clock.mode(), TimeMode::Fast);
        assert!(clock.resume().is_none());
    }

    #[test]
    fn test_starts_at_dawn_on_day_one() {
        let clock = GameClock::new();
        assert_eq!(clock.day(), 1);
        assert_eq!(clock.hour(), 6);
        assert!(clock.is_day());
        assert_eq!(clock.formatted(), "Day 1, 06:00");
    }

    #[test]
    fn test_update_reports_hour_and_night() {
        let mut clock = GameClock::new();
        // 60 real seconds at Normal = one game hour
        let events = clock.update(60.0);
        assert_eq!(events, vec![TimeEvent::HourChanged(7)]);

        let events = clock.advance_hours(11.0);
        assert!(events.contains(&TimeEvent::HourChanged(18)));
        assert!(events.contains(&TimeEvent::NightStarted));
        assert!(clock.is_night());
    }

    #[test]
    fn test_new_day() {
        let mut clock = GameClock::new();
        let events = clock.advance_hours(24.0);
        assert!(events.contains(&TimeEvent::NewDay(2)));
        assert_eq!(clock.hour(), 6);
    }

    #[test]
    fn test_offline_catch_up() {
        let mut clock = GameClock::new();
        assert!(clock.process_offline_hours(0.05).abs() < f32::EPSILON);
        assert!((clock.game_seconds() - 6.0 * SECONDS_PER_HOUR).abs() < 1e-6);

        let processed = clock.process_offline_hours(100.0);
        assert!((processed - MAX_OFFLINE_HOURS).abs() < f32::EPSILON);
        assert_eq!(clock.day(), 4);
    }

    #[test]
    fn test_fixed_time_scale() {
        let provider = FixedTimeScale(2.5);
        assert!((provider.time_scale() - 2.5).abs() < f32::EPSILON);
    }
}
