//! x86-64 architectural state components.
//!
//! This module contains the storage types the CPU state is built from.
//! It includes the following modules:
//! 1. **Flags:** ZF/SF/CF/OF and their update rules.
//! 2. **GPRs:** The 16-register file with aliased sub-register views.
//! 3. **Memory:** Sparse little-endian byte memory and the `ByteMemory` trait.

/// Status flags and their update rules.
pub mod flags;

/// General-purpose register file implementation.
pub mod gpr;

/// Sparse byte-addressable memory.
pub mod memory;

pub use flags::{FlagOp, Flags};
pub use gpr::{RegisterFile, RegisterFormat};
pub use memory::{ByteMemory, Memory};
