use chrono::{SecondsFormat, Utc};

use crate::state::{HistoryEntry, Query};

/// Newest-first archive of completed exchanges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryLedger {
    entries: Vec<HistoryEntry>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend an entry for `query`, stamped now.
    pub fn archive(&mut self, query: &Query) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.push_front(HistoryEntry {
            question: query.text.clone(),
            expert_role: query.expert_role.clone(),
            timestamp,
        });
    }

    pub fn push_front(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
