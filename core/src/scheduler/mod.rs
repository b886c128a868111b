//! Speech scheduler: a cloneable handle over a single-owner actor.
//!
//! ```text
//! SpeechScheduler --Command--> actor --Utterance--> SpeechEngine
//!                                ^                      |
//!                                +----EngineSignal------+
//! ```
//!
//! The actor owns the queue, the playback slot, settings and usage stats.
//! Handles only send commands and await oneshot replies.

mod actor;
mod controller;
mod dispatch;

use crate::config::SchedulerConfig;
use crate::context::{ContextProvider, SystemClock};
use crate::engine::SpeechEngine;
use crate::request::{Priority, RequestId, SpeechRequest};
use crate::settings::{Settings, SettingsPatch};
use crate::stats::UsageStats;
use crate::storage::{InMemoryStore, Persistence, Record};
use crate::{HeraldError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

/// Lifecycle notifications for observers of the whole scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    Accepted { id: RequestId, priority: Priority },
    Rejected { priority: Priority, reason: String },
    Started { id: RequestId, retry_count: u32 },
    Finished { id: RequestId, completed: bool },
    Failed { id: RequestId, reason: String, retry_count: u32 },
    Retrying { id: RequestId, retry_count: u32 },
    Dropped { id: RequestId },
    Preempted { id: RequestId, by: RequestId },
    Stopped { cleared: usize },
}

/// One pending item as seen by `queue_status()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedSummary {
    pub id: RequestId,
    pub text: String,
    pub priority: Priority,
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// Pending items in playback order. The active item is not included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatus {
    pub length: usize,
    pub items: Vec<QueuedSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatus {
    pub initialized: bool,
    pub speaking: bool,
    pub paused: bool,
    pub queue_length: usize,
    pub settings: Settings,
}

pub(crate) enum Command {
    Speak {
        request: SpeechRequest,
        reply: oneshot::Sender<Result<RequestId>>,
    },
    Pause {
        reply: oneshot::Sender<()>,
    },
    Resume {
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<usize>,
    },
    Cancel {
        id: RequestId,
        reply: oneshot::Sender<bool>,
    },
    QueueStatus {
        reply: oneshot::Sender<QueueStatus>,
    },
    Status {
        reply: oneshot::Sender<SchedulerStatus>,
    },
    SaveSettings {
        patch: SettingsPatch,
        reply: oneshot::Sender<Settings>,
    },
    UsageStats {
        reply: oneshot::Sender<UsageStats>,
    },
    ClearUsageStats {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running scheduler. Cheap to clone; all clones drive the same actor.
#[derive(Clone)]
pub struct SpeechScheduler {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl SpeechScheduler {
    pub fn builder(engine: Arc<dyn SpeechEngine>) -> SchedulerBuilder {
        SchedulerBuilder::new(engine)
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| HeraldError::SchedulerClosed)?;
        rx.await.map_err(|_| HeraldError::SchedulerClosed)
    }

    /// Admit a request. Returns once it is queued or rejected.
    pub async fn speak(&self, request: SpeechRequest) -> Result<RequestId> {
        self.request(|reply| Command::Speak { request, reply })
            .await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(|reply| Command::Resume { reply }).await
    }

    /// Drop all pending items and cancel playback. Returns how many were pending.
    pub async fn stop(&self) -> Result<usize> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Cancel one request. False if it is neither queued nor playing.
    pub async fn cancel(&self, id: RequestId) -> Result<bool> {
        self.request(|reply| Command::Cancel { id, reply }).await
    }

    pub async fn queue_status(&self) -> Result<QueueStatus> {
        self.request(|reply| Command::QueueStatus { reply }).await
    }

    pub async fn status(&self) -> Result<SchedulerStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Merge `patch` into the settings and return the result.
    pub async fn save_settings(&self, patch: SettingsPatch) -> Result<Settings> {
        self.request(|reply| Command::SaveSettings { patch, reply })
            .await
    }

    pub async fn usage_stats(&self) -> Result<UsageStats> {
        self.request(|reply| Command::UsageStats { reply }).await
    }

    pub async fn clear_usage_stats(&self) -> Result<()> {
        self.request(|reply| Command::ClearUsageStats { reply })
            .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Cancel playback, flush pending saves and stop the actor.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

pub struct SchedulerBuilder {
    engine: Arc<dyn SpeechEngine>,
    context: Arc<dyn ContextProvider>,
    settings_store: Option<Arc<dyn Persistence<Settings>>>,
    usage_store: Option<Arc<dyn Persistence<UsageStats>>>,
    config: SchedulerConfig,
}

impl SchedulerBuilder {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            engine,
            context: Arc::new(SystemClock::new()),
            settings_store: None,
            usage_store: None,
            config: SchedulerConfig::default(),
        }
    }

    pub fn context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = context;
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn Persistence<Settings>>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn usage_store(mut self, store: Arc<dyn Persistence<UsageStats>>) -> Self {
        self.usage_store = Some(store);
        self
    }

    /// Use one backend for both records.
    pub fn storage<S>(self, store: Arc<S>) -> Self
    where
        S: Persistence<Settings> + Persistence<UsageStats> + 'static,
    {
        let settings: Arc<dyn Persistence<Settings>> = store.clone();
        let usage: Arc<dyn Persistence<UsageStats>> = store;
        self.settings_store(settings).usage_store(usage)
    }

    /// Load persisted state and start the actor on the current runtime.
    ///
    /// Unreadable records fall back to defaults; scheduling never depends
    /// on storage being healthy.
    pub async fn spawn(self) -> SpeechScheduler {
        let memory = InMemoryStore::new();
        let settings_store: Arc<dyn Persistence<Settings>> = match self.settings_store {
            Some(store) => store,
            None => memory.clone(),
        };
        let usage_store: Arc<dyn Persistence<UsageStats>> = match self.usage_store {
            Some(store) => store,
            None => memory,
        };

        let settings = load_or_default(settings_store.as_ref()).await;
        let stats = load_or_default(usage_store.as_ref()).await;
        info!(
            target: "herald::scheduler",
            engine = self.engine.name(),
            enabled = settings.enabled,
            language = %settings.language,
            total_requests = stats.total_requests,
            "Speech scheduler starting"
        );

        let (commands_tx, commands_rx) = mpsc::channel(self.config.mailbox_capacity);
        let (events_tx, _) = broadcast::channel(self.config.events_capacity);

        let actor = actor::SchedulerActor::new(actor::ActorParts {
            engine: self.engine,
            context: self.context,
            config: self.config,
            settings,
            stats,
            settings_store,
            usage_store,
            commands: commands_rx,
            events: events_tx.clone(),
        });
        tokio::spawn(actor.run());

        SpeechScheduler {
            commands: commands_tx,
            events: events_tx,
        }
    }
}

async fn load_or_default<T: Record + Default>(store: &dyn Persistence<T>) -> T {
    match store.load().await {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            warn!(target: "herald::storage", key = T::KEY, error = %e, "Failed to load record, using defaults");
            T::default()
        }
    }
}
