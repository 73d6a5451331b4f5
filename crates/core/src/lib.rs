//! x86-64 listing interpreter library.
//!
//! This crate executes disassembled x86-64 functions (AT&T syntax, radare2 or objdump output)
//! one instruction at a time, with the following:
//! 1. **ISA:** Listing parser, operand grammar and the supported mnemonic table.
//! 2. **Core:** Register file with sub-register aliasing, flags, sparse memory and the executor.
//! 3. **Simulation:** Execution controller, breakpoints, trace and C library emulation.
//! 4. **Support:** Configuration, statistics and error types.
//!
//! # Examples
//!
//! ```
//! use x86sim_core::ExecutionController;
//!
//! let listing = concat!(
//!     "   0:\t48 c7 c0 05 00 00 00\tmov    $0x5,%rax\n",
//!     "   7:\t83 c0 03\tadd    $0x3,%eax\n",
//! );
//! let mut controller = ExecutionController::default();
//! controller.load_program(listing).unwrap();
//! let _ = controller.step();
//! let _ = controller.step();
//! assert_eq!(controller.cpu().get_register("rax").unwrap(), 8);
//! assert!(!controller.cpu().flags.zf);
//! ```

/// Common types and constants (addresses, registers, errors).
pub mod common;
/// Interpreter configuration (defaults and per-component structures).
pub mod config;
/// Processor model (registers, flags, memory, CPU state, executor).
pub mod core;
/// Instruction set (listing parser, operands, mnemonic table).
pub mod isa;
/// Execution controller, trace and C library emulation.
pub mod sim;
/// Execution state and run statistics.
pub mod stats;

/// Root configuration type; use `Config::default()` or load from JSON.
pub use crate::config::Config;
/// Architectural state of the interpreted program.
pub use crate::core::CpuState;
/// Drives a loaded program; the main entry point for hosts.
pub use crate::sim::ExecutionController;
/// Parses a disassembly listing.
pub use crate::isa::parse;
