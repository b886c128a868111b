//! Ambient-context tuning: per-request volume and suppression threshold.
//!
//! `ContextAdapter::adjust` is pure. The scheduler asks its
//! `ContextProvider` for the hour once per admission and feeds it in.

use crate::request::Priority;
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Largest magnitude of the volume adjustment.
pub const MAX_VOLUME_ADJUSTMENT: f32 = 0.3;

/// Derived tuning for one request. Recomputed per item, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningState {
    /// In `[-0.3, +0.3]`, added to the base volume.
    pub volume_adjustment: f32,
    /// Requests strictly below this priority are not spoken at all.
    pub priority_threshold: Priority,
    /// Always zero: speaking rate is fixed.
    pub rate_adjustment: f32,
}

impl Default for TuningState {
    fn default() -> Self {
        Self {
            volume_adjustment: 0.0,
            priority_threshold: Priority::Low,
            rate_adjustment: 0.0,
        }
    }
}

impl TuningState {
    pub fn suppresses(&self, priority: Priority) -> bool {
        priority < self.priority_threshold
    }

    /// Base volume plus adjustment, clamped to `[0, 1]`.
    pub fn effective_volume(&self, base_volume: f32) -> f32 {
        (base_volume + self.volume_adjustment).clamp(0.0, 1.0)
    }
}

/// Personalization switches selecting which adaptive rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextProfile {
    /// Quieter output and Medium threshold at night.
    pub night_mode: bool,
    /// Volume offsets by urgency.
    pub urgency_boost: bool,
}

impl Default for ContextProfile {
    fn default() -> Self {
        Self {
            night_mode: true,
            urgency_boost: true,
        }
    }
}

/// Supplies ambient context to the scheduler.
pub trait ContextProvider: Send + Sync {
    /// Current local hour, 0-23.
    fn hour_of_day(&self) -> u8;

    fn profile(&self) -> ContextProfile {
        ContextProfile::default()
    }
}

/// Wall-clock provider using the local timezone.
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    profile: ContextProfile,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: ContextProfile) -> Self {
        Self { profile }
    }
}

impl ContextProvider for SystemClock {
    fn hour_of_day(&self) -> u8 {
        chrono::Local::now().hour() as u8
    }

    fn profile(&self) -> ContextProfile {
        self.profile
    }
}

/// Provider with a settable hour, for tests and fixed-schedule deployments.
#[derive(Debug)]
pub struct FixedClock {
    hour: AtomicU8,
    profile: ContextProfile,
}

impl FixedClock {
    pub fn new(hour: u8) -> Self {
        Self {
            hour: AtomicU8::new(hour % 24),
            profile: ContextProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: ContextProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn set_hour(&self, hour: u8) {
        self.hour.store(hour % 24, Ordering::Relaxed);
    }
}

impl ContextProvider for FixedClock {
    fn hour_of_day(&self) -> u8 {
        self.hour.load(Ordering::Relaxed)
    }

    fn profile(&self) -> ContextProfile {
        self.profile
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAdapter {
    profile: ContextProfile,
}

impl ContextAdapter {
    pub fn new(profile: ContextProfile) -> Self {
        Self { profile }
    }

    pub fn is_night(hour: u8) -> bool {
        hour < 7 || hour > 22
    }

    pub fn is_working_hours(hour: u8) -> bool {
        (9..18).contains(&hour)
    }

    pub fn adjust(&self, priority: Priority, hour_of_day: u8) -> TuningState {
        let mut volume = 0.0f32;
        let mut threshold = Priority::Low;

        if self.profile.night_mode && Self::is_night(hour_of_day) {
            volume -= 0.3;
            threshold = Priority::Medium;
        }

        // Working hours (see `is_working_hours`) carry no adjustment yet.

        if self.profile.urgency_boost {
            volume += match priority {
                Priority::Urgent => 0.2,
                Priority::High => 0.1,
                Priority::Medium => 0.0,
                Priority::Low => -0.1,
            };
        }

        TuningState {
            volume_adjustment: volume.clamp(-MAX_VOLUME_ADJUSTMENT, MAX_VOLUME_ADJUSTMENT),
            priority_threshold: threshold,
            rate_adjustment: 0.0,
        }
    }
}
