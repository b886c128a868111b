//! Observer-hook delivery off the scheduler loop.

use crate::engine::Progress;
use crate::request::{RequestId, SpeechCallbacks};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

enum Notification {
    Start(Arc<dyn Fn(RequestId) + Send + Sync>, RequestId),
    Finish(Arc<dyn Fn(RequestId, bool) + Send + Sync>, RequestId, bool),
    Progress(Arc<dyn Fn(RequestId, Progress) + Send + Sync>, RequestId, Progress),
    Error(Arc<dyn Fn(RequestId, &str) + Send + Sync>, RequestId, String),
}

impl Notification {
    fn deliver(self) {
        match self {
            Notification::Start(f, id) => f(id),
            Notification::Finish(f, id, completed) => f(id, completed),
            Notification::Progress(f, id, p) => f(id, p),
            Notification::Error(f, id, reason) => f(id, &reason),
        }
    }
}

/// Queues hook invocations for a single delivery task, preserving order.
#[derive(Clone)]
pub(crate) struct CallbackDispatcher {
    tx: mpsc::UnboundedSender<Notification>,
}

impl CallbackDispatcher {
    pub(crate) fn spawn() -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        let handle = tokio::spawn(async move {
            while let Some(n) = rx.recv().await {
                if catch_unwind(AssertUnwindSafe(|| n.deliver())).is_err() {
                    warn!(target: "herald::scheduler", "Speech callback panicked");
                }
            }
        });
        (Self { tx }, handle)
    }

    fn send(&self, n: Notification) {
        // Only fails after the delivery task is gone, i.e. during shutdown
        let _ = self.tx.send(n);
    }

    pub(crate) fn start(&self, cb: &SpeechCallbacks, id: RequestId) {
        if let Some(f) = &cb.on_start {
            self.send(Notification::Start(Arc::clone(f), id));
        }
    }

    pub(crate) fn finish(&self, cb: &SpeechCallbacks, id: RequestId, completed: bool) {
        if let Some(f) = &cb.on_finish {
            self.send(Notification::Finish(Arc::clone(f), id, completed));
        }
    }

    pub(crate) fn progress(&self, cb: &SpeechCallbacks, id: RequestId, progress: Progress) {
        if let Some(f) = &cb.on_progress {
            self.send(Notification::Progress(Arc::clone(f), id, progress));
        }
    }

    pub(crate) fn error(&self, cb: &SpeechCallbacks, id: RequestId, reason: &str) {
        if let Some(f) = &cb.on_error {
            self.send(Notification::Error(Arc::clone(f), id, reason.to_string()));
        }
    }
}
