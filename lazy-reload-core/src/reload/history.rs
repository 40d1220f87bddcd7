//! Reload History
//!
//! Append-only log of reinitialize invocations, in the order they were
//! invoked. A record is written when the reinitialize call *begins*, so
//! nested reloads triggered from inside a unit's setup appear after the
//! unit that triggered them: the log is the depth-first invocation order.
//! A reinitialize that later fails still has its record.
//!
//! First-time construction and plain Live resolution never write records.

use serde::Serialize;

use crate::namespace::UnitName;

/// One reinitialize invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadRecord {
    /// Position in the log, counting from zero since manager creation.
    pub seq: u64,
    pub name: UnitName,
    /// Setups already in flight on the invoking thread.
    pub depth: usize,
}

/// Ordered log of reinitialize invocations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReloadHistory {
    records: Vec<ReloadRecord>,
    #[serde(skip)]
    next_seq: u64,
}

impl ReloadHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its sequence number.
    pub fn record(&mut self, name: UnitName, depth: usize) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.push(ReloadRecord { seq, name, depth });
        seq
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[ReloadRecord] {
        &self.records
    }

    /// Reloaded names in invocation order.
    pub fn names(&self) -> Vec<UnitName> {
        self.records.iter().map(|r| r.name.clone()).collect()
    }

    /// How many times `name` was reinitialized.
    pub fn count_for(&self, name: &str) -> usize {
        self.records.iter().filter(|r| r.name.as_str() == name).count()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no record is held.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove and return every record. Sequence numbers keep counting.
    pub fn take(&mut self) -> Vec<ReloadRecord> {
        std::mem::take(&mut self.records)
    }

    /// Serialize the held records as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
