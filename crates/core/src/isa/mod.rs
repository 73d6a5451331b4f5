//! Instruction set definitions and the listing parser.
//!
//! Contains everything that is derived from listing text alone, before any state exists.
//!
//! # Modules
//!
//! * `instruction`: Parsed instruction, relocation and program structures.
//! * `opcode`: The closed set of supported operations and their mnemonic spellings.
//! * `operand`: AT&T operand grammar (registers, immediates, memory operands, frame slots).
//! * `parser`: radare2 and objdump listing parser.

use regex::Regex;

/// Parsed instruction, relocation and program structures.
pub mod instruction;

/// Supported operations and their mnemonic table.
pub mod opcode;

/// Operand classification and grammar.
pub mod operand;

/// Disassembly listing parser.
pub mod parser;

pub use instruction::{Instruction, ParsedProgram, Relocation};
pub use opcode::{InstrClass, Opcode};
pub use parser::parse;

/// Compiles one of the crate's fixed patterns.
///
/// Every pattern passed here is a string literal covered by the parser tests.
#[allow(clippy::expect_used)]
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}
