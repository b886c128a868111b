use crate::sanitizer::DEFAULT_MAX_CHARS;
use std::time::Duration;

/// Scheduler tunables.
///
/// Env overrides (read by `Default`):
/// - HERALD_MAX_CHARS
/// - HERALD_UTTERANCE_TIMEOUT_MS (0 disables the watchdog)
/// - HERALD_MAILBOX
/// - HERALD_EVENTS_CAPACITY
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Sanitized text is truncated to this many characters.
    pub max_chars: usize,
    /// Caller replacement table, applied before the built-in symbol table.
    pub replacements: Vec<(String, String)>,
    /// Per-utterance watchdog; `None` lets a hung engine stall the queue.
    pub utterance_timeout: Option<Duration>,
    /// Command mailbox capacity; producers wait when it is full.
    pub mailbox_capacity: usize,
    /// Buffer of the `subscribe()` broadcast channel.
    pub events_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let max_chars = env_parse("HERALD_MAX_CHARS").unwrap_or(DEFAULT_MAX_CHARS);
        let timeout_ms = env_parse::<u64>("HERALD_UTTERANCE_TIMEOUT_MS").unwrap_or(20_000);
        let mailbox_capacity = env_parse("HERALD_MAILBOX").unwrap_or(256);
        let events_capacity = env_parse("HERALD_EVENTS_CAPACITY").unwrap_or(256);

        Self {
            max_chars,
            replacements: Vec::new(),
            utterance_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            mailbox_capacity: mailbox_capacity.max(1),
            events_capacity: events_capacity.max(1),
        }
    }
}

impl SchedulerConfig {
    pub fn with_replacements(mut self, replacements: Vec<(String, String)>) -> Self {
        self.replacements = replacements;
        self
    }

    pub fn with_utterance_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.utterance_timeout = timeout;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
