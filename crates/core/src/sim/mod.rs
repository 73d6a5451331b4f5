//! Program control and C library emulation.
//!
//! # Modules
//!
//! * `controller`: Loads a program and drives stepping, running and breakpoints.
//! * `syscalls`: Emulated `printf`, `scanf`, `puts`, `malloc` and `free`.
//! * `trace`: Bounded log of executed steps.

/// Execution controller.
pub mod controller;

/// C library emulation.
pub mod syscalls;

/// Execution trace ring.
pub mod trace;

pub use controller::{ExecutionController, PauseHandle, RunOutcome, Status};
pub use syscalls::{LibFunction, SyscallSimulator};
