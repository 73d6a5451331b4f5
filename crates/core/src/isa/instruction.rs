//! Parsed instruction and program structures.
//!
//! An `Instruction` is one recognized listing line. It is immutable after parsing; the executor
//! and controller only ever read it.

use serde::Serialize;

use crate::common::{InstrAddr, ParseError};

/// Relocation metadata attached to the instruction that precedes a relocation line.
///
/// Object files that were never linked show call and data targets as placeholders; the
/// relocation names the real symbol (`R_X86_64_PLT32 __isoc99_scanf-0x4`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Relocation {
    /// Relocation type, such as `R_X86_64_PLT32`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Target symbol.
    pub symbol: String,
    /// Signed addend, when the listing shows one.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::common::data::decimal_opt_signed"
    )]
    pub addend: Option<i64>,
}

impl Relocation {
    /// Builds a relocation from its type and `symbol[+-addend]` text.
    ///
    /// When the addend is not a number the whole text is kept as the symbol.
    pub fn new(kind: &str, target: &str) -> Self {
        let split = target
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '+' || c == '-')
            .map(|(i, _)| i);
        if let Some(i) = split {
            let (symbol, addend) = target.split_at(i);
            if let Some(value) = crate::isa::operand::parse_number(addend) {
                return Self {
                    kind: kind.to_string(),
                    symbol: symbol.to_string(),
                    addend: Some(value),
                };
            }
        }
        Self {
            kind: kind.to_string(),
            symbol: target.to_string(),
            addend: None,
        }
    }
}

/// One disassembled instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    /// Canonical address.
    pub address: InstrAddr,
    /// Raw byte column text; empty when the listing omits it.
    pub bytes: String,
    /// Mnemonic, lowercased, with any folded prefix (`rep movsb`).
    pub mnemonic: String,
    /// Operand strings in source (AT&T) order.
    pub operands: Vec<String>,
    /// Trailing comment without its `#` or `;` marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Relocation from the following listing line, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relocation: Option<Relocation>,
    /// The original line.
    pub source_line: String,
    /// 1-based line number in the listing.
    pub line_number: usize,
}

impl Instruction {
    /// Renders the instruction as `mnemonic op1, op2`.
    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.operands.join(", "))
        }
    }
}

/// The result of parsing a listing that contained at least one instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedProgram {
    /// Instructions in listing order.
    pub instructions: Vec<Instruction>,
    /// Name of the disassembled function, from a symbol or function header.
    pub function_name: Option<String>,
    /// Lines that looked like instructions but could not be parsed.
    pub errors: Vec<ParseError>,
}

impl ParsedProgram {
    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
