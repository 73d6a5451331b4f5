//! Sparse byte-addressable memory.
//!
//! This module implements the interpreter's flat 64-bit address space. It provides:
//! 1. **Storage:** A sparse address-to-byte map; addresses never written read as zero.
//! 2. **Multi-byte Access:** Little-endian reads and writes of 1 to 8 bytes.
//! 3. **Byte Interface:** The `ByteMemory` trait shared with the change-tracking CPU state, so
//!    string helpers work on either.

use std::collections::BTreeMap;

/// Byte-granular memory access.
///
/// Implemented by the raw `Memory` and by `CpuState`, which records every written address.
pub trait ByteMemory {
    /// Reads one byte; unwritten addresses read as 0.
    fn read_byte(&self, addr: u64) -> u8;

    /// Writes one byte.
    fn write_byte(&mut self, addr: u64, val: u8);

    /// Reads `size` bytes (at most 8) little-endian.
    fn read_le(&self, addr: u64, size: usize) -> u64 {
        (0..size.min(8)).fold(0u64, |acc, i| {
            acc | (u64::from(self.read_byte(addr.wrapping_add(i as u64))) << (i * 8))
        })
    }

    /// Writes the low `size` bytes (at most 8) of `val` little-endian.
    fn write_le(&mut self, addr: u64, val: u64, size: usize) {
        for i in 0..size.min(8) {
            self.write_byte(addr.wrapping_add(i as u64), (val >> (i * 8)) as u8);
        }
    }

    /// Writes a contiguous byte slice starting at `addr`.
    fn write_bytes(&mut self, addr: u64, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_byte(addr.wrapping_add(i as u64), *byte);
        }
    }
}

/// Sparse memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memory {
    bytes: BTreeMap<u64, u8>,
}

impl Memory {
    /// Creates an empty memory.
    pub const fn new() -> Self {
        Self {
            bytes: BTreeMap::new(),
        }
    }

    /// Number of bytes ever written.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Forgets every byte.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Iterates over written `(address, value)` pairs in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u8)> + '_ {
        self.bytes.iter().map(|(&addr, &val)| (addr, val))
    }

    /// Copies `len` bytes starting at `start`, reading zeros where nothing was written.
    pub fn dump(&self, start: u64, len: usize) -> Vec<u8> {
        (0..len as u64)
            .map(|i| self.read_byte(start.wrapping_add(i)))
            .collect()
    }
}

impl ByteMemory for Memory {
    #[inline]
    fn read_byte(&self, addr: u64) -> u8 {
        self.bytes.get(&addr).copied().unwrap_or(0)
    }

    #[inline]
    fn write_byte(&mut self, addr: u64, val: u8) {
        let _ = self.bytes.insert(addr, val);
    }
}
