//! Mutable speech settings.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Speaking rate handed to every engine call. Not configurable.
pub const SPEECH_RATE: f32 = 1.0;

pub const MIN_PITCH: f32 = 0.5;
pub const MAX_PITCH: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub enabled: bool,
    pub language: String,
    pub pitch: f32,
    /// In `[0, 1]`.
    pub base_volume: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "en".to_string(),
            pitch: 1.0,
            base_volume: 1.0,
        }
    }
}

impl Settings {
    /// Bring loaded or merged values back into range.
    pub fn normalized(mut self) -> Self {
        self.pitch = if self.pitch.is_finite() {
            self.pitch.clamp(MIN_PITCH, MAX_PITCH)
        } else {
            1.0
        };
        self.base_volume = if self.base_volume.is_finite() {
            self.base_volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        if self.language.trim().is_empty() {
            self.language = "en".to_string();
        }
        self
    }
}

/// Partial update for `Settings`; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub enabled: Option<bool>,
    pub language: Option<String>,
    pub pitch: Option<f32>,
    pub base_volume: Option<f32>,
}

impl SettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn pitch(mut self, pitch: f32) -> Self {
        self.pitch = Some(pitch);
        self
    }

    pub fn base_volume(mut self, base_volume: f32) -> Self {
        self.base_volume = Some(base_volume);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.language.is_none()
            && self.pitch.is_none()
            && self.base_volume.is_none()
    }
}

/// Owner of the live settings. Persistence is driven by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    current: Settings,
}

impl SettingsStore {
    pub fn new(initial: Settings) -> Self {
        Self {
            current: initial.normalized(),
        }
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    pub fn is_enabled(&self) -> bool {
        self.current.enabled
    }

    /// Merge `patch` into the current settings and return the result.
    pub fn apply(&mut self, patch: SettingsPatch) -> Settings {
        let mut next = self.current.clone();
        if let Some(v) = patch.enabled {
            next.enabled = v;
        }
        if let Some(v) = patch.language {
            next.language = v;
        }
        if let Some(v) = patch.pitch {
            next.pitch = v;
        }
        if let Some(v) = patch.base_volume {
            next.base_volume = v;
        }
        self.current = next.normalized();
        debug!(target: "herald::settings", settings = ?self.current, "Settings updated");
        self.current.clone()
    }
}
