//! Processor model.
//!
//! This module contains the architectural state of the interpreted program and the executor
//! that mutates it.

/// Register file, flags and sparse memory.
pub mod arch;

/// CPU state ownership, change tracking and snapshot history.
pub mod cpu;

/// Instruction dispatch and semantics.
pub mod exec;

pub use self::cpu::CpuState;
pub use self::exec::Executor;
