//! Speech engine seam.
//!
//! The scheduler hands an engine one `Utterance` at a time together with an
//! `EngineEventSink`. `speak` must return promptly; playback progress is
//! reported through the sink, exactly one terminal event (`Finish` or
//! `Error`) per utterance:
//! - `Start` once audio begins
//! - `Progress` optionally, any number of times
//! - `Finish { completed: false }` after `cancel`
//!
//! Implementations:
//! - `CommandEngine` - espeak-ng CLI, killed on cancel
//! - `LogEngine` - logs the text and reports a simulated playback

mod command;
mod console;

pub use command::{CommandEngine, CommandEngineConfig};
pub use console::LogEngine;

use crate::request::{RequestId, TuningOptions};
use crate::{HeraldError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// Playback position reported by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub char_index: usize,
    pub char_length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Start,
    Progress(Progress),
    Finish { completed: bool },
    Error(String),
}

impl EngineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineEvent::Finish { .. } | EngineEvent::Error(_))
    }
}

/// Everything an engine needs to voice one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: RequestId,
    pub text: String,
    pub language: String,
    /// In `[0, 1]`.
    pub volume: f32,
    pub pitch: f32,
    pub rate: f32,
    pub tuning: TuningOptions,
}

/// Event tagged with the playback attempt it belongs to.
#[derive(Debug, Clone)]
pub struct EngineSignal {
    pub request_id: RequestId,
    pub attempt: u64,
    pub event: EngineEvent,
}

/// Reporting handle for one playback attempt.
///
/// Sending never blocks. Events from an attempt the scheduler has already
/// moved past are discarded on arrival.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    request_id: RequestId,
    attempt: u64,
    tx: mpsc::UnboundedSender<EngineSignal>,
}

impl EngineEventSink {
    pub fn new(
        request_id: RequestId,
        attempt: u64,
        tx: mpsc::UnboundedSender<EngineSignal>,
    ) -> Self {
        Self {
            request_id,
            attempt,
            tx,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Returns false once the scheduler has shut down.
    pub fn emit(&self, event: EngineEvent) -> bool {
        trace!(target: "herald::engine", id = %self.request_id, attempt = self.attempt, event = ?event, "Engine event");
        self.tx
            .send(EngineSignal {
                request_id: self.request_id,
                attempt: self.attempt,
                event,
            })
            .is_ok()
    }

    pub fn start(&self) -> bool {
        self.emit(EngineEvent::Start)
    }

    pub fn progress(&self, char_index: usize, char_length: usize) -> bool {
        self.emit(EngineEvent::Progress(Progress {
            char_index,
            char_length,
        }))
    }

    pub fn finish(&self, completed: bool) -> bool {
        self.emit(EngineEvent::Finish { completed })
    }

    pub fn error(&self, reason: impl Into<String>) -> bool {
        self.emit(EngineEvent::Error(reason.into()))
    }
}

/// A serial player. The scheduler never has more than one utterance active.
pub trait SpeechEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Begin voicing `utterance`. An `Err` counts as a failed attempt.
    fn speak(&self, utterance: Utterance, sink: EngineEventSink) -> Result<()>;

    /// Stop the active utterance; the engine then reports `Finish { completed: false }`.
    fn cancel(&self) -> Result<()>;

    fn pause(&self) -> Result<()> {
        Err(HeraldError::Unsupported("pause"))
    }

    fn resume(&self) -> Result<()> {
        Err(HeraldError::Unsupported("resume"))
    }
}

/// Current tokio runtime, as an engine error when called outside one.
pub(crate) fn runtime_handle() -> Result<tokio::runtime::Handle> {
    tokio::runtime::Handle::try_current()
        .map_err(|e| HeraldError::EngineError(format!("no tokio runtime: {e}")))
}
