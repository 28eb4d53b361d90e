use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Severity of a captured console write, per spec.md §4.D step 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
    Fatal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEntry {
    pub level: ConsoleLevel,
    pub message: String,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-invocation ordered console buffer, capped to `max_entries`. A capped
/// buffer drops the oldest entries first so the most recent output survives,
/// matching spec.md's "cap buffer size (config)" rule.
#[derive(Debug, Default)]
pub struct ConsoleBuffer {
    entries: Vec<ConsoleEntry>,
    max_entries: usize,
}

impl ConsoleBuffer {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn push(&mut self, level: ConsoleLevel, message: impl Into<String>) {
        if self.max_entries == 0 {
            return;
        }
        if self.entries.len() >= self.max_entries {
            self.entries.remove(0);
        }
        self.entries.push(ConsoleEntry {
            level,
            message: message.into(),
            timestamp_ms: now_ms(),
        });
    }

    pub fn into_entries(self) -> Vec<ConsoleEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_at_max_entries_dropping_oldest() {
        let mut buf = ConsoleBuffer::new(2);
        buf.push(ConsoleLevel::Log, "a");
        buf.push(ConsoleLevel::Log, "b");
        buf.push(ConsoleLevel::Log, "c");
        let entries = buf.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "b");
        assert_eq!(entries[1].message, "c");
    }

    #[test]
    fn zero_cap_discards_everything() {
        let mut buf = ConsoleBuffer::new(0);
        buf.push(ConsoleLevel::Error, "dropped");
        assert!(buf.is_empty());
    }
}
