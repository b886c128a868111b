//! Accumulated usage counters.

use crate::request::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub urgent: u64,
}

impl PriorityCounts {
    pub fn get(&self, priority: Priority) -> u64 {
        match priority {
            Priority::Low => self.low,
            Priority::Medium => self.medium,
            Priority::High => self.high,
            Priority::Urgent => self.urgent,
        }
    }

    fn bump(&mut self, priority: Priority) {
        let slot = match priority {
            Priority::Low => &mut self.low,
            Priority::Medium => &mut self.medium,
            Priority::High => &mut self.high,
            Priority::Urgent => &mut self.urgent,
        };
        *slot = slot.saturating_add(1);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageStats {
    pub total_requests: u64,
    pub total_characters: u64,
    pub average_length: f64,
    pub by_priority: PriorityCounts,
    pub last_used: Option<DateTime<Utc>>,
}

/// Running totals; updated once per accepted `speak()` call.
#[derive(Debug, Clone, Default)]
pub struct UsageStatsTracker {
    stats: UsageStats,
}

impl UsageStatsTracker {
    pub fn new(initial: UsageStats) -> Self {
        Self { stats: initial }
    }

    /// Count one request of `chars` characters.
    pub fn record(&mut self, priority: Priority, chars: usize) {
        let s = &mut self.stats;
        s.total_requests = s.total_requests.saturating_add(1);
        s.total_characters = s.total_characters.saturating_add(chars as u64);
        s.average_length = s.total_characters as f64 / s.total_requests as f64;
        s.by_priority.bump(priority);
        s.last_used = Some(Utc::now());
    }

    pub fn clear(&mut self) {
        self.stats = UsageStats::default();
    }

    pub fn snapshot(&self) -> UsageStats {
        self.stats.clone()
    }
}
