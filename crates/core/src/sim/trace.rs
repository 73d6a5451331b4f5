//! Execution trace.
//!
//! A bounded log of successfully executed steps, oldest first.

use std::collections::VecDeque;

use serde::Serialize;

use crate::common::{Gpr, InstrAddr, MemoryChange};

/// One executed step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    /// Sequence number since the last reset, starting at 1.
    pub step: u64,
    /// Index of the executed instruction.
    pub pc: usize,
    /// Listing address of the executed instruction.
    pub address: InstrAddr,
    /// Instruction text.
    pub instruction: String,
    /// Registers the step wrote.
    pub changed_registers: Vec<Gpr>,
    /// Bytes the step wrote.
    pub changed_memory: Vec<MemoryChange>,
    /// Wall-clock time in Unix milliseconds.
    pub timestamp_ms: u64,
}

/// Ring of trace entries; the oldest is evicted once `capacity` is reached.
#[derive(Clone, Debug, Serialize)]
#[serde(transparent)]
pub struct TraceLog {
    entries: VecDeque<TraceEntry>,
    #[serde(skip)]
    capacity: usize,
}

impl TraceLog {
    /// Creates an empty log.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: TraceEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            let _ = self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &TraceEntry> + '_ {
        self.entries.iter()
    }

    /// The newest entry.
    pub fn last(&self) -> Option<&TraceEntry> {
        self.entries.back()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
