//! Speech requests as submitted by producers.

use crate::engine::Progress;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Urgency of a request. Ordered `Low < Medium < High < Urgent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Parse a priority name, case-insensitive. Accepts `normal` for `Medium`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" | "normal" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier assigned to a request when the scheduler accepts it.
///
/// Ids come from a per-scheduler counter, so a larger id was admitted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spk-{}", self.0)
    }
}

/// Engine-specific parameters, passed through to the engine untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TuningOptions {
    pub voice: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

type StartFn = Arc<dyn Fn(RequestId) + Send + Sync>;
type FinishFn = Arc<dyn Fn(RequestId, bool) + Send + Sync>;
type ProgressFn = Arc<dyn Fn(RequestId, Progress) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(RequestId, &str) + Send + Sync>;

/// Observer hooks for one request.
///
/// Hooks run on the scheduler's dispatcher task, never on the scheduler
/// loop itself, and are delivered in the order the events happened.
#[derive(Clone, Default)]
pub struct SpeechCallbacks {
    pub(crate) on_start: Option<StartFn>,
    pub(crate) on_finish: Option<FinishFn>,
    pub(crate) on_progress: Option<ProgressFn>,
    pub(crate) on_error: Option<ErrorFn>,
}

impl SpeechCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, f: impl Fn(RequestId) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(f));
        self
    }

    /// `completed` is false when playback was cancelled or preempted.
    pub fn on_finish(mut self, f: impl Fn(RequestId, bool) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl Fn(RequestId, Progress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(RequestId, &str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.on_start.is_none()
            && self.on_finish.is_none()
            && self.on_progress.is_none()
            && self.on_error.is_none()
    }
}

impl fmt::Debug for SpeechCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechCallbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// A unit of work submitted to `SpeechScheduler::speak`.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub priority: Priority,
    pub tuning: TuningOptions,
    pub callbacks: SpeechCallbacks,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: Priority::default(),
            tuning: TuningOptions::default(),
            callbacks: SpeechCallbacks::default(),
        }
    }

    pub fn low(text: impl Into<String>) -> Self {
        Self::new(text).with_priority(Priority::Low)
    }

    pub fn high(text: impl Into<String>) -> Self {
        Self::new(text).with_priority(Priority::High)
    }

    pub fn urgent(text: impl Into<String>) -> Self {
        Self::new(text).with_priority(Priority::Urgent)
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.tuning.voice = Some(voice.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tuning.params.insert(key.into(), value.into());
        self
    }

    pub fn with_callbacks(mut self, callbacks: SpeechCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_totally_ordered() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Urgent);
        let mut all = vec![Priority::Urgent, Priority::Low, Priority::High, Priority::Medium];
        all.sort();
        assert_eq!(all, Priority::ALL.to_vec());
    }

    #[test]
    fn priority_parse_accepts_aliases() {
        assert_eq!(Priority::parse("URGENT"), Some(Priority::Urgent));
        assert_eq!(Priority::parse(" normal "), Some(Priority::Medium));
        assert_eq!(Priority::parse("later"), None);
    }

    #[test]
    fn request_id_display() {
        assert_eq!(RequestId(42).to_string(), "spk-42");
    }
}
