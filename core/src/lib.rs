// Herald Core Library
// Priority speech-queue scheduler for spoken notifications

pub mod config;
pub mod context;
pub mod engine;
pub mod queue;
pub mod request;
pub mod retry;
pub mod sanitizer;
pub mod scheduler;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod telemetry;

// Export core types
pub use config::SchedulerConfig;
pub use context::{ContextAdapter, ContextProfile, ContextProvider, FixedClock, SystemClock, TuningState};
pub use engine::{
    CommandEngine, CommandEngineConfig, EngineEvent, EngineEventSink, LogEngine, Progress,
    SpeechEngine, Utterance,
};
pub use queue::{PriorityQueue, QueueItem};
pub use request::{Priority, RequestId, SpeechCallbacks, SpeechRequest, TuningOptions};
pub use retry::{RetryDecision, RetryPolicy, MAX_RETRIES};
pub use sanitizer::TextSanitizer;
pub use scheduler::{
    QueueStatus, QueuedSummary, SchedulerBuilder, SchedulerEvent, SchedulerStatus, SpeechScheduler,
};
pub use settings::{Settings, SettingsPatch, SettingsStore, SPEECH_RATE};
pub use stats::{UsageStats, UsageStatsTracker};
pub use storage::{InMemoryStore, JsonFileStore, Persistence, Record};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeraldError {
    #[error("Request rejected: text is empty after sanitization")]
    Empty,

    #[error("Request rejected: speech is disabled")]
    Disabled,

    #[error("Request rejected: priority {priority:?} is below threshold {threshold:?}")]
    Suppressed {
        priority: Priority,
        threshold: Priority,
    },

    #[error("Engine error: {0}")]
    EngineError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Scheduler is not running")]
    SchedulerClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl HeraldError {
    /// True for the synchronous admission rejections returned by `speak()`.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            HeraldError::Empty | HeraldError::Disabled | HeraldError::Suppressed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, HeraldError>;
