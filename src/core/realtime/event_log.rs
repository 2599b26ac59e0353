//! Capped, most-recent-first log of protocol traffic.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::base::Direction;
use super::codec::ProtocolEvent;

/// Default number of entries kept before the oldest are evicted.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Immutable snapshot of one sent or received event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub event: ProtocolEvent,
    pub timestamp: OffsetDateTime,
    pub direction: Direction,
}

impl LogEntry {
    pub fn event_type(&self) -> &str {
        self.event.event_type()
    }

    /// Display form for the observation surface.
    pub fn to_view(&self) -> LogEntryView {
        LogEntryView {
            direction: self.direction,
            event_type: self.event_type().to_string(),
            event_id: self.event.event_id.clone(),
            timestamp: self
                .timestamp
                .format(&Rfc3339)
                .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string()),
            event: self.event.to_wire_value().unwrap_or(Value::Null),
        }
    }
}

/// Serializable projection of a [`LogEntry`].
#[derive(Debug, Clone, Serialize)]
pub struct LogEntryView {
    pub direction: Direction,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub timestamp: String,
    pub event: Value,
}

/// Ordered log of protocol events, newest first.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    appended: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl EventLog {
    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            appended: 0,
        }
    }

    /// Prepend `event`, evicting the oldest entry once the cap is reached.
    pub fn append(&mut self, event: ProtocolEvent, timestamp: OffsetDateTime) {
        let direction = event.direction();
        self.entries.push_front(LogEntry {
            event,
            timestamp,
            direction,
        });
        if self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
        self.appended += 1;
    }

    /// Every retained entry, most recent first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Entries for display: for each delta type only the most recent entry is
    /// kept. Other entries pass through untouched.
    pub fn display(&self) -> Vec<&LogEntry> {
        let mut seen_deltas: HashSet<&str> = HashSet::new();
        let mut shown = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !entry.event.is_delta() || seen_deltas.insert(entry.event_type()) {
                shown.push(entry);
            }
        }
        shown
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events appended since creation, including evicted and cleared ones.
    pub fn total_appended(&self) -> u64 {
        self.appended
    }
}
