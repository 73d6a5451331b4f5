//! Fixed ABI and interpreter constants.
//!
//! This module defines values that are part of the x86-64 System V calling convention or of the
//! interpreter's documented approximations, and are therefore not configurable. It includes:
//! 1. **Calling Convention:** Integer argument and return registers.
//! 2. **Stack:** Slot size used by push/pop and return addresses.
//! 3. **Library Calls:** Call-target addresses conventionally bound to emulated functions.

use super::reg::Gpr;

/// Integer argument registers in System V order (first three are enough for the emulated calls).
pub const ARG_REGS: [Gpr; 3] = [Gpr::Rdi, Gpr::Rsi, Gpr::Rdx];

/// Register receiving a library call's return value.
pub const RETURN_REG: Gpr = Gpr::Rax;

/// Size in bytes of one stack slot (pushed values and return addresses).
pub const STACK_SLOT: usize = 8;

/// Call-target addresses that unlinked object files commonly show for library calls.
///
/// Consulted only when a call target is neither a known library name nor a resolvable jump.
pub const KNOWN_CALL_TARGETS: [(u64, &str); 2] = [(0x1c, "printf"), (0x37, "scanf")];
