//! Playback state machine.
//!
//! Owns the queue and the single playback slot. Every method runs on the
//! scheduler task and returns without awaiting; the engine is driven through
//! its non-blocking trait methods and answers on the signal channel.

use super::dispatch::CallbackDispatcher;
use super::{QueueStatus, QueuedSummary, SchedulerEvent};
use crate::engine::{EngineEvent, EngineEventSink, EngineSignal, SpeechEngine, Utterance};
use crate::queue::{PriorityQueue, QueueItem};
use crate::request::{Priority, RequestId};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::settings::{Settings, SPEECH_RATE};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// The item in the playback slot.
#[derive(Debug)]
pub(crate) struct Active {
    pub(crate) item: QueueItem,
    pub(crate) attempt: u64,
    /// A cancel was issued; the next terminal event ends the item.
    pub(crate) cancel_requested: bool,
    deadline: Option<Instant>,
    /// Watchdog time left, held while paused.
    remaining: Option<Duration>,
}

#[derive(Debug)]
pub(crate) enum PlaybackState {
    Idle,
    Speaking(Active),
}

pub(crate) struct PlaybackController {
    engine: Arc<dyn SpeechEngine>,
    queue: PriorityQueue,
    state: PlaybackState,
    paused: bool,
    retry: RetryPolicy,
    next_attempt: u64,
    timeout: Option<Duration>,
    signals: mpsc::UnboundedSender<EngineSignal>,
    callbacks: CallbackDispatcher,
    events: broadcast::Sender<SchedulerEvent>,
}

impl PlaybackController {
    pub(crate) fn new(
        engine: Arc<dyn SpeechEngine>,
        timeout: Option<Duration>,
        signals: mpsc::UnboundedSender<EngineSignal>,
        callbacks: CallbackDispatcher,
        events: broadcast::Sender<SchedulerEvent>,
    ) -> Self {
        Self {
            engine,
            queue: PriorityQueue::new(),
            state: PlaybackState::Idle,
            paused: false,
            retry: RetryPolicy::default(),
            next_attempt: 1,
            timeout,
            signals,
            callbacks,
            events,
        }
    }

    fn publish(&self, event: SchedulerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn is_speaking(&self) -> bool {
        matches!(self.state, PlaybackState::Speaking(_))
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn active_id(&self) -> Option<RequestId> {
        match &self.state {
            PlaybackState::Speaking(a) => Some(a.item.id),
            _ => None,
        }
    }

    /// Watchdog expiry of the active attempt, if one is armed.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        match &self.state {
            PlaybackState::Speaking(a) if !self.paused => a.deadline,
            _ => None,
        }
    }

    pub(crate) fn snapshot(&self) -> QueueStatus {
        let items: Vec<QueuedSummary> = self
            .queue
            .iter()
            .map(|item| QueuedSummary {
                id: item.id,
                text: item.text.clone(),
                priority: item.priority(),
                retry_count: item.retry_count,
                enqueued_at: item.enqueued_at,
            })
            .collect();
        QueueStatus {
            length: items.len(),
            items,
        }
    }

    /// Queue an admitted item, preempting non-Urgent playback for Urgent ones.
    pub(crate) fn admit(&mut self, item: QueueItem, settings: &Settings) {
        let preempt = item.priority() == Priority::Urgent
            && matches!(&self.state, PlaybackState::Speaking(a) if a.item.priority() < Priority::Urgent);

        if preempt {
            let by = item.id;
            self.queue.insert_preemptive(item);
            self.preempt_active(by);
        } else {
            self.queue.insert(item);
        }
        self.advance(settings);
    }

    fn preempt_active(&mut self, by: RequestId) {
        let PlaybackState::Speaking(active) = &mut self.state else {
            return;
        };
        if active.cancel_requested {
            return;
        }
        active.cancel_requested = true;
        let id = active.item.id;
        info!(target: "herald::scheduler", id = %id, by = %by, "Preempting active utterance");
        self.publish(SchedulerEvent::Preempted { id, by });

        if let Err(e) = self.engine.cancel() {
            // No cancel event will follow; end the item here
            warn!(target: "herald::scheduler", id = %id, error = %e, "Engine cancel failed");
            self.finish_active(false);
        }
    }

    /// Start queued items until one is playing, the queue is empty or we are paused.
    pub(crate) fn advance(&mut self, settings: &Settings) {
        while !self.paused && matches!(self.state, PlaybackState::Idle) {
            let Some(item) = self.queue.pop_head() else {
                return;
            };
            self.start(item, settings);
        }
    }

    fn start(&mut self, item: QueueItem, settings: &Settings) {
        let attempt = self.next_attempt;
        self.next_attempt += 1;

        let utterance = Utterance {
            id: item.id,
            text: item.text.clone(),
            language: settings.language.clone(),
            volume: item.tuning.effective_volume(settings.base_volume),
            pitch: settings.pitch,
            rate: SPEECH_RATE + item.tuning.rate_adjustment,
            tuning: item.request.tuning.clone(),
        };
        let sink = EngineEventSink::new(item.id, attempt, self.signals.clone());

        debug!(
            target: "herald::scheduler",
            id = %item.id,
            attempt,
            priority = %item.priority(),
            retry_count = item.retry_count,
            volume = utterance.volume,
            engine = self.engine.name(),
            "Starting utterance"
        );
        self.publish(SchedulerEvent::Started {
            id: item.id,
            retry_count: item.retry_count,
        });

        match self.engine.speak(utterance, sink) {
            Ok(()) => {
                self.state = PlaybackState::Speaking(Active {
                    item,
                    attempt,
                    cancel_requested: false,
                    deadline: self.timeout.map(|t| Instant::now() + t),
                    remaining: None,
                });
            }
            Err(e) => self.fail(item, e.to_string()),
        }
    }

    /// Route one engine signal. Signals from superseded attempts are dropped.
    pub(crate) fn on_signal(&mut self, signal: EngineSignal, settings: &Settings) {
        let current = match &self.state {
            PlaybackState::Speaking(a) if a.attempt == signal.attempt => a,
            _ => {
                trace!(
                    target: "herald::scheduler",
                    id = %signal.request_id,
                    attempt = signal.attempt,
                    "Ignoring stale engine event"
                );
                return;
            }
        };

        match signal.event {
            EngineEvent::Start => {
                debug!(target: "herald::scheduler", id = %current.item.id, "Engine started");
                self.callbacks
                    .start(&current.item.request.callbacks, current.item.id);
            }
            EngineEvent::Progress(p) => {
                trace!(target: "herald::scheduler", id = %current.item.id, index = p.char_index, "Progress");
                self.callbacks
                    .progress(&current.item.request.callbacks, current.item.id, p);
            }
            EngineEvent::Finish { completed } => {
                self.finish_active(completed);
                self.advance(settings);
            }
            EngineEvent::Error(reason) => {
                if current.cancel_requested {
                    debug!(target: "herald::scheduler", id = %current.item.id, reason = %reason, "Error after cancel treated as cancel");
                    self.finish_active(false);
                } else if let Some(item) = self.take_active() {
                    self.fail(item, reason);
                }
                self.advance(settings);
            }
        }
    }

    /// Watchdog expiry: cancel the engine and treat the attempt as failed.
    pub(crate) fn on_timeout(&mut self, settings: &Settings) {
        let Some(deadline) = self.deadline() else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }
        let Some(item) = self.take_active() else {
            return;
        };
        if let Err(e) = self.engine.cancel() {
            warn!(target: "herald::scheduler", id = %item.id, error = %e, "Engine cancel after timeout failed");
        }
        let ms = self.timeout.map(|t| t.as_millis()).unwrap_or_default();
        self.fail(item, format!("utterance timed out after {ms}ms"));
        self.advance(settings);
    }

    fn take_active(&mut self) -> Option<QueueItem> {
        match std::mem::replace(&mut self.state, PlaybackState::Idle) {
            PlaybackState::Speaking(a) => Some(a.item),
            other => {
                self.state = other;
                None
            }
        }
    }

    fn finish_active(&mut self, completed: bool) {
        let Some(item) = self.take_active() else {
            return;
        };
        debug!(target: "herald::scheduler", id = %item.id, completed, "Utterance finished");
        self.callbacks
            .finish(&item.request.callbacks, item.id, completed);
        self.publish(SchedulerEvent::Finished {
            id: item.id,
            completed,
        });
    }

    /// Erroring: report the failure, then let the retry policy requeue or drop.
    fn fail(&mut self, item: QueueItem, reason: String) {
        warn!(
            target: "herald::scheduler",
            id = %item.id,
            retry_count = item.retry_count,
            reason = %reason,
            "Utterance failed"
        );
        self.callbacks.error(&item.request.callbacks, item.id, &reason);
        self.publish(SchedulerEvent::Failed {
            id: item.id,
            reason,
            retry_count: item.retry_count,
        });

        match self.retry.on_failure(item) {
            RetryDecision::Requeue(item) => {
                debug!(target: "herald::scheduler", id = %item.id, retry_count = item.retry_count, "Requeueing for retry");
                self.publish(SchedulerEvent::Retrying {
                    id: item.id,
                    retry_count: item.retry_count,
                });
                self.queue.insert_front_of_band(item);
            }
            RetryDecision::Drop(item) => {
                warn!(
                    target: "herald::scheduler",
                    id = %item.id,
                    max_retries = self.retry.max_retries(),
                    "Dropping utterance after repeated failures"
                );
                self.publish(SchedulerEvent::Dropped { id: item.id });
            }
        }
    }

    pub(crate) fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        if let PlaybackState::Speaking(a) = &mut self.state {
            a.remaining = a
                .deadline
                .take()
                .map(|d| d.saturating_duration_since(Instant::now()));
            if let Err(e) = self.engine.pause() {
                debug!(target: "herald::scheduler", id = %a.item.id, error = %e, "Engine cannot pause; active utterance plays out");
            }
        }
        info!(target: "herald::scheduler", queue_length = self.queue.len(), "Playback paused");
    }

    pub(crate) fn resume(&mut self, settings: &Settings) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if let PlaybackState::Speaking(a) = &mut self.state {
            if let Some(left) = a.remaining.take() {
                a.deadline = Some(Instant::now() + left);
            }
            if let Err(e) = self.engine.resume() {
                debug!(target: "herald::scheduler", id = %a.item.id, error = %e, "Engine cannot resume");
            }
        }
        info!(target: "herald::scheduler", queue_length = self.queue.len(), "Playback resumed");
        self.advance(settings);
    }

    /// Clear the queue and end the active item. Returns the cleared count.
    pub(crate) fn stop(&mut self) -> usize {
        let cleared = self.queue.clear();
        if let PlaybackState::Speaking(a) = &self.state {
            if let Err(e) = self.engine.cancel() {
                warn!(target: "herald::scheduler", id = %a.item.id, error = %e, "Engine cancel on stop failed");
            }
        }
        self.finish_active(false);
        info!(target: "herald::scheduler", cleared, "Playback stopped");
        self.publish(SchedulerEvent::Stopped { cleared });
        cleared
    }

    /// Remove a pending item or cancel the active one.
    pub(crate) fn cancel(&mut self, id: RequestId, settings: &Settings) -> bool {
        if let Some(item) = self.queue.remove(id) {
            debug!(target: "herald::scheduler", id = %item.id, "Removed pending utterance");
            return true;
        }
        let PlaybackState::Speaking(active) = &mut self.state else {
            return false;
        };
        if active.item.id != id {
            return false;
        }
        if !active.cancel_requested {
            active.cancel_requested = true;
            if let Err(e) = self.engine.cancel() {
                warn!(target: "herald::scheduler", id = %id, error = %e, "Engine cancel failed");
                self.finish_active(false);
                self.advance(settings);
            }
        }
        true
    }
}
