//! Memory change records and serialization helpers.
//!
//! This module defines the small value types shared between the CPU state, the executor and the
//! controller's trace. These types are used for the following:
//! 1. **Change Reporting:** Which bytes a step wrote, as `(address, value)` pairs.
//! 2. **Lossless Export:** Emitting 64-bit machine values as decimal strings so JSON consumers
//!    with 53-bit numbers do not round them.

use serde::{Serialize, Serializer};

/// One byte written during a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MemoryChange {
    /// Byte address.
    #[serde(serialize_with = "decimal")]
    pub address: u64,
    /// Value stored at the address after the step.
    pub value: u8,
}

impl MemoryChange {
    /// Creates a change record.
    pub const fn new(address: u64, value: u8) -> Self {
        Self { address, value }
    }
}

/// Serializes a 64-bit value as its decimal string.
#[allow(clippy::trivially_copy_pass_by_ref)]
pub fn decimal<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Serializes an optional signed 64-bit value as its decimal string.
#[allow(clippy::ref_option)]
pub fn decimal_opt_signed<S: Serializer>(
    value: &Option<i64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.collect_str(v),
        None => serializer.serialize_none(),
    }
}
