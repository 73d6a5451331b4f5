//! Common utilities and types used throughout the interpreter.
//!
//! This module provides fundamental building blocks shared by the parser, the CPU model, the
//! executor and the controller. It includes:
//! 1. **Address Types:** A canonical, numerically ordered instruction address.
//! 2. **Constants:** Calling-convention registers and the emulated library-function set.
//! 3. **Change Records:** Memory change pairs and decimal-string serialization.
//! 4. **Error Handling:** Parse, execution and configuration errors.
//! 5. **Register Metadata:** Physical registers, widths and the alias table.

/// Canonical instruction address type.
pub mod addr;

/// Calling-convention and library-call constants.
pub mod constants;

/// Memory change records and serialization helpers.
pub mod data;

/// Error types for parsing, execution and configuration.
pub mod error;

/// Register names, widths and aliases.
pub mod reg;

pub use addr::InstrAddr;
pub use data::MemoryChange;
pub use error::{ConfigError, ExecError, ParseError, ParseFailure, StepError};
pub use reg::{Gpr, RegAlias, Width};
