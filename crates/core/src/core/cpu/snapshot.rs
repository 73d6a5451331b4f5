//! Bounded snapshot history.
//!
//! Before each instruction executes, a deep copy of the architectural state is appended to a
//! ring. The ring is diagnostic only: nothing restores from it.

use std::collections::VecDeque;

use crate::core::arch::{Flags, Memory, RegisterFile};

/// A deep copy of the architectural state at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Register values.
    pub registers: RegisterFile,
    /// Flag values.
    pub flags: Flags,
    /// Full memory contents.
    pub memory: Memory,
    /// Instruction index.
    pub pc: usize,
    /// Wall-clock time the snapshot was taken, in Unix milliseconds.
    pub timestamp_ms: u64,
}

/// Ring of the most recent snapshots.
#[derive(Clone, Debug)]
pub struct History {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl History {
    /// Creates an empty history holding at most `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(128)),
            capacity,
        }
    }

    /// Appends a snapshot, evicting the oldest when full.
    pub fn push(&mut self, snapshot: Snapshot) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            let _ = self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Number of snapshots held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of snapshots held.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> + '_ {
        self.entries.iter()
    }

    /// Drops every snapshot.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
