use super::{runtime_handle, EngineEventSink, SpeechEngine, Utterance};
use crate::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

struct Active {
    handle: JoinHandle<()>,
    sink: EngineEventSink,
}

/// Engine that prints instead of playing audio.
///
/// Playback is simulated at `ms_per_char`, with one progress event per word,
/// so queueing and preemption behave as they would with a real player.
pub struct LogEngine {
    ms_per_char: u64,
    active: Arc<Mutex<Option<Active>>>,
}

impl Default for LogEngine {
    fn default() -> Self {
        Self::new(0)
    }
}

impl LogEngine {
    pub fn new(ms_per_char: u64) -> Self {
        Self {
            ms_per_char,
            active: Arc::new(Mutex::new(None)),
        }
    }

    fn take_active(&self) -> Option<Active> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl SpeechEngine for LogEngine {
    fn name(&self) -> &'static str {
        "log"
    }

    fn speak(&self, utterance: Utterance, sink: EngineEventSink) -> Result<()> {
        let runtime = runtime_handle()?;
        if let Some(previous) = self.take_active() {
            previous.handle.abort();
        }

        let ms_per_char = self.ms_per_char;
        let task_sink = sink.clone();
        let handle = runtime.spawn(async move {
            task_sink.start();
            info!(
                target: "herald::engine",
                id = %utterance.id,
                volume = utterance.volume,
                pitch = utterance.pitch,
                language = %utterance.language,
                "Speaking: {}",
                utterance.text
            );
            let mut index = 0usize;
            for word in utterance.text.split(' ') {
                let len = word.chars().count();
                if ms_per_char > 0 {
                    tokio::time::sleep(Duration::from_millis(ms_per_char * len as u64)).await;
                }
                task_sink.progress(index, len);
                index += len + 1;
            }
            task_sink.finish(true);
        });

        *self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Active { handle, sink });
        Ok(())
    }

    fn cancel(&self) -> Result<()> {
        if let Some(active) = self.take_active() {
            if !active.handle.is_finished() {
                active.handle.abort();
                active.sink.finish(false);
                info!(target: "herald::engine", id = %active.sink.request_id(), "Log engine cancelled");
            }
        }
        Ok(())
    }
}
