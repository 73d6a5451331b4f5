//! Instruction address type.
//!
//! Listings print addresses in many shapes: `0x08000040`, `1c`, `0000000000401126`. This module
//! defines a single strong type for them. It provides the following:
//! 1. **Normalization:** Every spelling of an address maps to one canonical value.
//! 2. **Canonical Text:** Lowercase hex, zero-padded to at least 8 digits, no `0x` prefix.
//! 3. **Ordering:** Addresses sort numerically so nearest-address lookups work on ordered maps.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Minimum number of hex digits in the canonical address text.
const CANONICAL_WIDTH: usize = 8;

/// The address of a disassembled instruction.
///
/// Equality and ordering are numeric, so `0x1c`, `1c` and `0000001c` are the same key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrAddr(pub u64);

impl InstrAddr {
    /// Creates an address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(self) -> u64 {
        self.0
    }

    /// Parses hex address text, with or without a `0x` prefix.
    ///
    /// # Arguments
    ///
    /// * `text` - Address text such as `0x08000040`, `1c` or `0000000000401126`.
    ///
    /// # Returns
    ///
    /// The parsed address, or `None` if the text is not a hex number that fits in 64 bits.
    pub fn parse_hex(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let significant = digits.trim_start_matches('0');
        if significant.len() > 16 {
            return None;
        }
        if significant.is_empty() {
            return Some(Self(0));
        }
        u64::from_str_radix(significant, 16).ok().map(Self)
    }

    /// Returns the canonical text form of this address.
    pub fn canonical(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for InstrAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$x}", self.0, width = CANONICAL_WIDTH)
    }
}

impl FromStr for InstrAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s).ok_or_else(|| format!("invalid address: {s}"))
    }
}

impl From<u64> for InstrAddr {
    fn from(addr: u64) -> Self {
        Self(addr)
    }
}

impl Serialize for InstrAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
