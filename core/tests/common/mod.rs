#![allow(dead_code)]

use herald_core::{
    EngineEventSink, FixedClock, HeraldError, InMemoryStore, Result, SchedulerConfig, SchedulerEvent,
    SpeechEngine, SpeechScheduler, Utterance,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// What the scripted engine does with one `speak` call.
#[derive(Clone, Debug)]
pub enum Step {
    /// Start and finish immediately.
    Complete,
    /// Start and report an error.
    Fail(String),
    /// Start, then wait for `finish_current` or `cancel`.
    Hold,
    /// Accept the utterance and never report anything.
    Hang,
}

/// Engine double that records every call and plays back a script.
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    spoken: Mutex<Vec<Utterance>>,
    current: Mutex<Option<EngineEventSink>>,
    cancels: AtomicUsize,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    refuse_cancel: AtomicBool,
}

impl ScriptedEngine {
    pub fn new(fallback: Step) -> Arc<Self> {
        Self::scripted(Vec::new(), fallback)
    }

    pub fn scripted(steps: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            fallback,
            spoken: Mutex::new(Vec::new()),
            current: Mutex::new(None),
            cancels: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            refuse_cancel: AtomicBool::new(false),
        })
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn utterances(&self) -> Vec<Utterance> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    /// Make every later `cancel` return an error and leave the held utterance alone.
    pub fn refuse_cancel(&self) {
        self.refuse_cancel.store(true, Ordering::SeqCst);
    }

    /// Report the held utterance as failed.
    pub fn fail_current(&self, reason: &str) {
        if let Some(sink) = self.current.lock().unwrap().take() {
            sink.error(reason);
        }
    }

    /// Report the held utterance as done.
    pub fn finish_current(&self, completed: bool) {
        if let Some(sink) = self.current.lock().unwrap().take() {
            sink.finish(completed);
        }
    }
}

impl SpeechEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn speak(&self, utterance: Utterance, sink: EngineEventSink) -> Result<()> {
        self.spoken.lock().unwrap().push(utterance);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match step {
            Step::Complete => {
                sink.start();
                sink.finish(true);
            }
            Step::Fail(reason) => {
                sink.start();
                sink.error(reason);
            }
            Step::Hold => {
                sink.start();
                *self.current.lock().unwrap() = Some(sink);
            }
            Step::Hang => {
                *self.current.lock().unwrap() = Some(sink);
            }
        }
        Ok(())
    }

    fn cancel(&self) -> Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        if self.refuse_cancel.load(Ordering::SeqCst) {
            return Err(HeraldError::EngineError("device busy".into()));
        }
        if let Some(sink) = self.current.lock().unwrap().take() {
            sink.finish(false);
        }
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Midday, so no request is suppressed.
pub const NOON: u8 = 12;

pub fn test_config() -> SchedulerConfig {
    SchedulerConfig::default().with_utterance_timeout(None)
}

pub async fn spawn_scheduler(engine: Arc<ScriptedEngine>) -> SpeechScheduler {
    SpeechScheduler::builder(engine)
        .context(Arc::new(FixedClock::new(NOON)))
        .storage(InMemoryStore::new())
        .config(test_config())
        .spawn()
        .await
}

/// Wait until an event matching `pred` arrives.
pub async fn wait_for(
    rx: &mut broadcast::Receiver<SchedulerEvent>,
    pred: impl Fn(&SchedulerEvent) -> bool,
) -> SchedulerEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for scheduler event")
}

/// Collect events until one matching `last` arrives, inclusive.
pub async fn collect_until(
    rx: &mut broadcast::Receiver<SchedulerEvent>,
    last: impl Fn(&SchedulerEvent) -> bool,
) -> Vec<SchedulerEvent> {
    tokio::time::timeout(Duration::from_secs(2), async {
        let mut seen = Vec::new();
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let done = last(&event);
                    seen.push(event);
                    if done {
                        return seen;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out collecting scheduler events")
}
