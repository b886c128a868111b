//! Bounded retry for failed utterances.

use crate::queue::QueueItem;

/// Retries allowed after the first failed attempt.
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug)]
pub enum RetryDecision {
    /// Re-insert this item; its `retry_count` has been incremented.
    Requeue(QueueItem),
    /// Give up on this item.
    Drop(QueueItem),
}

/// Pure decision on a failed item. Re-insertion is the caller's job.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn on_failure(&self, mut item: QueueItem) -> RetryDecision {
        if item.retry_count < self.max_retries {
            item.retry_count += 1;
            RetryDecision::Requeue(item)
        } else {
            RetryDecision::Drop(item)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TuningState;
    use crate::request::{RequestId, SpeechRequest};

    fn item() -> QueueItem {
        QueueItem::new(
            RequestId(1),
            SpeechRequest::new("x"),
            "x".into(),
            TuningState::default(),
        )
    }

    #[test]
    fn requeues_three_times_then_drops() {
        let policy = RetryPolicy::default();
        let mut current = item();
        for expected in 1..=MAX_RETRIES {
            current = match policy.on_failure(current) {
                RetryDecision::Requeue(next) => next,
                RetryDecision::Drop(_) => panic!("dropped too early"),
            };
            assert_eq!(current.retry_count, expected);
        }
        match policy.on_failure(current) {
            RetryDecision::Drop(dropped) => assert_eq!(dropped.retry_count, MAX_RETRIES),
            RetryDecision::Requeue(_) => panic!("retry cap exceeded"),
        }
    }
}
