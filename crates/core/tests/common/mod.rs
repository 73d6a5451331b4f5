//! # Test Utilities
//!
//! Shared helpers for the interpreter tests.


/// Listing builders.
pub mod listing;

pub use harness::{TestContext, init_tracing};
pub use listing::{objdump, radare2};
