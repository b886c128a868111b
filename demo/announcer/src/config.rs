use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use herald_core::{CommandEngineConfig, Priority, SchedulerConfig};

/// Which speech engine the announcer drives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineKind {
    /// espeak-ng subprocess
    Espeak,
    /// Log lines only, simulated playback time
    Log,
}

impl EngineKind {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "espeak" | "espeak-ng" => Some(EngineKind::Espeak),
            "log" | "console" => Some(EngineKind::Log),
            _ => None,
        }
    }
}

/// High-level configuration for the announcer demo
#[derive(Clone, Debug)]
pub struct AnnouncerConfig {
    pub engine: EngineKind,
    /// Directory for settings.json / usage_stats.json; in-memory when unset
    pub storage_dir: Option<PathBuf>,
    /// Pin the hour of day instead of reading the local clock
    pub fixed_hour: Option<u8>,
    /// Priority for input lines without a `priority:` prefix
    pub default_priority: Priority,
    pub log_ms_per_char: u64,
    pub scheduler: SchedulerConfig,
    pub espeak: CommandEngineConfig,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            engine: std::env::var("ANNOUNCER_ENGINE")
                .ok()
                .and_then(|s| EngineKind::parse(&s))
                .unwrap_or(EngineKind::Espeak),
            storage_dir: std::env::var("ANNOUNCER_STORAGE_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            fixed_hour: std::env::var("ANNOUNCER_HOUR")
                .ok()
                .and_then(|v| v.parse::<u8>().ok())
                .filter(|h| *h < 24),
            default_priority: std::env::var("ANNOUNCER_PRIORITY")
                .ok()
                .and_then(|v| Priority::parse(&v))
                .unwrap_or_default(),
            log_ms_per_char: std::env::var("ANNOUNCER_LOG_MS_PER_CHAR")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(40),
            scheduler: SchedulerConfig::default(),
            espeak: CommandEngineConfig::default(),
        }
    }
}

impl AnnouncerConfig {
    /// Load configuration from a TOML file (path via ANNOUNCER_CONFIG or ./announcer.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("ANNOUNCER_CONFIG").unwrap_or_else(|_| "announcer.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "announcer", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => Self::from_toml_str(&s, default),
            Err(e) => {
                tracing::warn!(target: "announcer", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    fn from_toml_str(s: &str, default: Self) -> Self {
        match toml::from_str::<AnnouncerToml>(s) {
            Ok(t) => t.overlay(default),
            Err(e) => {
                tracing::warn!(target: "announcer", error = %e, "Failed to parse TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AnnouncerToml {
    pub engine: Option<String>,
    pub storage_dir: Option<PathBuf>,
    pub hour: Option<u8>,
    pub default_priority: Option<String>,
    pub scheduler: Option<SchedulerToml>,
    pub espeak: Option<EspeakToml>,
    pub log: Option<LogToml>,
}

impl AnnouncerToml {
    fn overlay(self, mut base: AnnouncerConfig) -> AnnouncerConfig {
        if let Some(e) = self.engine {
            match EngineKind::parse(&e) {
                Some(kind) => base.engine = kind,
                None => {
                    tracing::warn!(target: "announcer", engine = %e, "Unknown engine in TOML; keeping default")
                }
            }
        }
        if let Some(d) = self.storage_dir {
            base.storage_dir = Some(d);
        }
        if let Some(h) = self.hour {
            base.fixed_hour = Some(h % 24);
        }
        if let Some(p) = self.default_priority.as_deref().and_then(Priority::parse) {
            base.default_priority = p;
        }
        if let Some(s) = self.scheduler {
            s.apply(&mut base.scheduler);
        }
        if let Some(e) = self.espeak {
            e.apply(&mut base.espeak);
        }
        if let Some(l) = self.log {
            if let Some(v) = l.ms_per_char {
                base.log_ms_per_char = v;
            }
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SchedulerToml {
    pub max_chars: Option<usize>,
    pub utterance_timeout_ms: Option<u64>,
    pub mailbox_capacity: Option<usize>,
    pub replacements: Option<Vec<(String, String)>>, // [["ETA", "estimated arrival"], ...]
}
impl SchedulerToml {
    fn apply(self, s: &mut SchedulerConfig) {
        if let Some(v) = self.max_chars {
            s.max_chars = v.max(1);
        }
        if let Some(v) = self.utterance_timeout_ms {
            s.utterance_timeout = (v > 0).then(|| Duration::from_millis(v));
        }
        if let Some(v) = self.mailbox_capacity {
            s.mailbox_capacity = v.max(1);
        }
        if let Some(v) = self.replacements {
            s.replacements = v.into_iter().filter(|(k, _)| !k.is_empty()).collect();
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct EspeakToml {
    pub bin: Option<PathBuf>,
    pub voice: Option<String>,
    pub wpm: Option<u32>,
}
impl EspeakToml {
    fn apply(self, e: &mut CommandEngineConfig) {
        if let Some(v) = self.bin {
            e.espeak_bin = Some(v);
        }
        if let Some(v) = self.voice {
            e.default_voice = Some(v);
        }
        if let Some(v) = self.wpm {
            e.base_wpm = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LogToml {
    pub ms_per_char: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AnnouncerConfig {
        AnnouncerConfig {
            engine: EngineKind::Espeak,
            storage_dir: None,
            fixed_hour: None,
            default_priority: Priority::Medium,
            log_ms_per_char: 40,
            scheduler: SchedulerConfig::default(),
            espeak: CommandEngineConfig {
                espeak_bin: None,
                default_voice: None,
                base_wpm: 160,
            },
        }
    }

    #[test]
    fn test_toml_overlays_defaults() {
        let cfg = AnnouncerConfig::from_toml_str(
            r#"
            engine = "log"
            hour = 23
            default_priority = "high"

            [scheduler]
            max_chars = 80
            utterance_timeout_ms = 0
            replacements = [["ETA", "estimated arrival"]]

            [espeak]
            voice = "en-gb"

            [log]
            ms_per_char = 5
            "#,
            base(),
        );
        assert_eq!(cfg.engine, EngineKind::Log);
        assert_eq!(cfg.fixed_hour, Some(23));
        assert_eq!(cfg.default_priority, Priority::High);
        assert_eq!(cfg.scheduler.max_chars, 80);
        assert_eq!(cfg.scheduler.utterance_timeout, None);
        assert_eq!(
            cfg.scheduler.replacements,
            vec![("ETA".to_string(), "estimated arrival".to_string())]
        );
        assert_eq!(cfg.espeak.default_voice.as_deref(), Some("en-gb"));
        assert_eq!(cfg.log_ms_per_char, 5);
    }

    #[test]
    fn test_bad_toml_keeps_defaults() {
        let cfg = AnnouncerConfig::from_toml_str("engine = [", base());
        assert_eq!(cfg.engine, EngineKind::Espeak);
        assert_eq!(cfg.log_ms_per_char, 40);
    }

    #[test]
    fn test_unknown_engine_is_ignored() {
        let cfg = AnnouncerConfig::from_toml_str(r#"engine = "festival""#, base());
        assert_eq!(cfg.engine, EngineKind::Espeak);
    }
}
