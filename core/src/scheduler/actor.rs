use super::controller::PlaybackController;
use super::dispatch::CallbackDispatcher;
use super::{Command, SchedulerEvent, SchedulerStatus};
use crate::config::SchedulerConfig;
use crate::context::{ContextAdapter, ContextProvider};
use crate::engine::{EngineSignal, SpeechEngine};
use crate::queue::QueueItem;
use crate::request::{Priority, RequestId, SpeechRequest};
use crate::sanitizer::TextSanitizer;
use crate::settings::{Settings, SettingsStore};
use crate::stats::{UsageStats, UsageStatsTracker};
use crate::storage::{Persistence, Record};
use crate::{HeraldError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

pub(super) struct ActorParts {
    pub engine: Arc<dyn SpeechEngine>,
    pub context: Arc<dyn ContextProvider>,
    pub config: SchedulerConfig,
    pub settings: Settings,
    pub stats: UsageStats,
    pub settings_store: Arc<dyn Persistence<Settings>>,
    pub usage_store: Arc<dyn Persistence<UsageStats>>,
    pub commands: mpsc::Receiver<Command>,
    pub events: broadcast::Sender<SchedulerEvent>,
}

pub(super) struct SchedulerActor {
    controller: PlaybackController,
    settings: SettingsStore,
    stats: UsageStatsTracker,
    sanitizer: TextSanitizer,
    context: Arc<dyn ContextProvider>,
    next_id: u64,
    commands: mpsc::Receiver<Command>,
    signals: mpsc::UnboundedReceiver<EngineSignal>,
    events: broadcast::Sender<SchedulerEvent>,
    settings_tx: watch::Sender<Settings>,
    stats_tx: watch::Sender<UsageStats>,
    background: Vec<JoinHandle<()>>,
}

impl SchedulerActor {
    pub(super) fn new(parts: ActorParts) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (callbacks, dispatcher) = CallbackDispatcher::spawn();

        let settings = SettingsStore::new(parts.settings);
        let stats = UsageStatsTracker::new(parts.stats);
        let sanitizer = TextSanitizer::new(parts.config.max_chars)
            .with_replacements(parts.config.replacements)
            .with_language(settings.get().language.clone());

        let (settings_tx, settings_rx) = watch::channel(settings.get().clone());
        let (stats_tx, stats_rx) = watch::channel(stats.snapshot());
        let background = vec![
            dispatcher,
            spawn_persister(parts.settings_store, settings_rx),
            spawn_persister(parts.usage_store, stats_rx),
        ];

        let controller = PlaybackController::new(
            parts.engine,
            parts.config.utterance_timeout,
            signals_tx,
            callbacks,
            parts.events.clone(),
        );

        Self {
            controller,
            settings,
            stats,
            sanitizer,
            context: parts.context,
            next_id: 1,
            commands: parts.commands,
            signals: signals_rx,
            events: parts.events,
            settings_tx,
            stats_tx,
            background,
        }
    }

    pub(super) async fn run(mut self) {
        let shutdown_reply = loop {
            let deadline = self.controller.deadline();
            // Placeholder instant for the disabled branch; never polled
            let wake = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => break Some(reply),
                    Some(cmd) => self.handle(cmd),
                    None => break None,
                },
                Some(signal) = self.signals.recv() => {
                    self.controller.on_signal(signal, self.settings.get());
                }
                _ = sleep_until(wake), if deadline.is_some() => {
                    self.controller.on_timeout(self.settings.get());
                }
            }
        };

        self.controller.stop();
        let SchedulerActor {
            controller,
            settings_tx,
            stats_tx,
            background,
            ..
        } = self;
        // Closing the watch senders and the dispatcher's queue lets the
        // background tasks drain and exit
        drop(controller);
        drop(settings_tx);
        drop(stats_tx);
        for handle in background {
            if let Err(e) = handle.await {
                warn!(target: "herald::scheduler", error = %e, "Background task ended abnormally");
            }
        }
        info!(target: "herald::scheduler", "Speech scheduler stopped");

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Speak { request, reply } => {
                let result = self.admit(request);
                let _ = reply.send(result);
            }
            Command::Pause { reply } => {
                self.controller.pause();
                let _ = reply.send(());
            }
            Command::Resume { reply } => {
                self.controller.resume(self.settings.get());
                let _ = reply.send(());
            }
            Command::Stop { reply } => {
                let cleared = self.controller.stop();
                let _ = reply.send(cleared);
            }
            Command::Cancel { id, reply } => {
                let found = self.controller.cancel(id, self.settings.get());
                let _ = reply.send(found);
            }
            Command::QueueStatus { reply } => {
                let _ = reply.send(self.controller.snapshot());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::SaveSettings { patch, reply } => {
                let merged = self.settings.apply(patch);
                self.sanitizer.set_language(&merged.language);
                info!(
                    target: "herald::scheduler",
                    enabled = merged.enabled,
                    language = %merged.language,
                    pitch = merged.pitch,
                    base_volume = merged.base_volume,
                    "Settings updated"
                );
                self.settings_tx.send_replace(merged.clone());
                let _ = reply.send(merged);
            }
            Command::UsageStats { reply } => {
                let _ = reply.send(self.stats.snapshot());
            }
            Command::ClearUsageStats { reply } => {
                self.stats.clear();
                self.publish_stats();
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                // Handled by the run loop
                let _ = reply.send(());
            }
        }
    }

    fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            initialized: true,
            speaking: self.controller.is_speaking(),
            paused: self.controller.is_paused(),
            queue_length: self.controller.queue_len(),
            settings: self.settings.get().clone(),
        }
    }

    fn admit(&mut self, request: SpeechRequest) -> Result<RequestId> {
        let priority = request.priority;
        let text = self.sanitizer.sanitize(&request.text);
        if text.is_empty() {
            return Err(self.reject(HeraldError::Empty, priority));
        }
        let chars = text.chars().count();

        if !self.settings.is_enabled() {
            self.stats.record(priority, chars);
            self.publish_stats();
            return Err(self.reject(HeraldError::Disabled, priority));
        }

        let adapter = ContextAdapter::new(self.context.profile());
        let tuning = adapter.adjust(priority, self.context.hour_of_day());
        if tuning.suppresses(priority) {
            let err = HeraldError::Suppressed {
                priority,
                threshold: tuning.priority_threshold,
            };
            return Err(self.reject(err, priority));
        }

        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.stats.record(priority, chars);
        self.publish_stats();

        debug!(
            target: "herald::scheduler",
            id = %id,
            priority = %priority,
            chars,
            volume_adjustment = tuning.volume_adjustment,
            queue_length = self.controller.queue_len(),
            active = ?self.controller.active_id(),
            "Request accepted"
        );
        let _ = self.events.send(SchedulerEvent::Accepted { id, priority });

        let item = QueueItem::new(id, request, text, tuning);
        self.controller.admit(item, self.settings.get());
        Ok(id)
    }

    fn reject(&self, err: HeraldError, priority: Priority) -> HeraldError {
        debug!(target: "herald::scheduler", priority = %priority, reason = %err, "Request rejected");
        let _ = self.events.send(SchedulerEvent::Rejected {
            priority,
            reason: err.to_string(),
        });
        err
    }

    fn publish_stats(&self) {
        self.stats_tx.send_replace(self.stats.snapshot());
    }
}

/// Write every value published on `rx` to `store`, latest value wins.
fn spawn_persister<T: Record>(
    store: Arc<dyn Persistence<T>>,
    mut rx: watch::Receiver<T>,
) -> JoinHandle<()> {
    // The initial value counts as seen, so only changes are saved
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let value = rx.borrow_and_update().clone();
            if let Err(e) = store.save(&value).await {
                warn!(target: "herald::storage", key = T::KEY, error = %e, "Failed to persist record");
            }
        }
    })
}
