//! Bounded debug history of detection cycles

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::detect::Detection;

/// Default number of cycles retained
pub const DEFAULT_HISTORY_CAP: usize = 20;

/// One recorded detection cycle
#[derive(Debug, Clone)]
pub struct DebugEntry {
    pub at: DateTime<Utc>,
    pub found: bool,
    pub detections: Vec<Detection>,
    /// Annotated preview frame, when the service returned one
    pub preview_png: Option<Vec<u8>>,
}

/// Most-recent-first history with a fixed capacity
///
/// Appending beyond the capacity evicts the oldest entry.
#[derive(Debug)]
pub struct DebugHistory {
    entries: VecDeque<DebugEntry>,
    cap: usize,
}

impl Default for DebugHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl DebugHistory {
    /// Create a history retaining at most `cap` entries
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(64)),
            cap: cap.max(1),
        }
    }

    /// Record a cycle, evicting the oldest entry when full
    pub fn record(&mut self, entry: DebugEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.cap);
    }

    /// Entries, most recent first
    pub fn iter(&self) -> impl Iterator<Item = &DebugEntry> {
        self.entries.iter()
    }

    /// The most recent entry
    #[must_use]
    pub fn latest(&self) -> Option<&DebugEntry> {
        self.entries.front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries, keeping the capacity
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
