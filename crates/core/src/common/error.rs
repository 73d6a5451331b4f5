//! Error taxonomy for parsing, execution and configuration.
//!
//! This module defines every error the interpreter reports. It provides:
//! 1. **Parse Errors:** Per-line failures and the aggregate failure returned when a listing
//!    contains no recognizable instruction.
//! 2. **Execution Errors:** The causes a single step can fail with, and `StepError`, which pairs a
//!    cause with the offending mnemonic and operands.
//! 3. **Configuration Errors:** I/O and JSON failures while loading a `Config`.
//!
//! Step failures are values inside an `ExecutionResult`; nothing in the interpreter panics on bad
//! input.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// A single listing line that could not be turned into an instruction.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("line {line_number}: {message}: `{line}`")]
pub struct ParseError {
    /// 1-based line number in the input text.
    pub line_number: usize,
    /// The raw line.
    pub line: String,
    /// What went wrong.
    pub message: String,
}

impl ParseError {
    /// Creates a parse error for `line` at `line_number`.
    pub fn new(line_number: usize, line: &str, message: impl Into<String>) -> Self {
        Self {
            line_number,
            line: line.to_string(),
            message: message.into(),
        }
    }
}

/// Returned when a listing yields no instructions at all.
///
/// Carries one error per non-blank line that did not produce an instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Error, Serialize)]
pub struct ParseFailure {
    /// Per-line errors, in line order.
    pub errors: Vec<ParseError>,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse assembly: no instructions found")?;
        for error in &self.errors {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

/// Cause of a failed execution step.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The mnemonic has no handler.
    #[error("unsupported instruction `{mnemonic}` (supported: {supported})")]
    UnsupportedInstruction {
        /// Mnemonic as written in the listing.
        mnemonic: String,
        /// Comma-separated list of supported mnemonics.
        supported: String,
    },

    /// The instruction has fewer operands than its handler needs.
    #[error("`{mnemonic}` requires {required} operand(s), got {found}")]
    OperandCount {
        /// Mnemonic as written in the listing.
        mnemonic: String,
        /// Operands the handler needs.
        required: usize,
        /// Operands present.
        found: usize,
    },

    /// An operand has a shape the handler cannot read or write.
    #[error("unsupported operand `{operand}`: {reason}")]
    OperandFormat {
        /// Operand text.
        operand: String,
        /// Why the operand was rejected.
        reason: String,
    },

    /// A jump or call target matched no address, no label and did not lie past the program.
    #[error("jump target not found: `{0}`")]
    UnresolvedJumpTarget(String),

    /// A register name that is not a general-purpose register spelling.
    #[error("unknown register `{0}`")]
    UnknownRegister(String),

    /// Text supplied to a `%d` input request is not a base-10 integer.
    #[error("invalid number format: `{0}`")]
    InvalidNumericInput(String),

    /// `process_user_input` was called while no input request was outstanding.
    #[error("no pending input request")]
    NoPendingInput,
}

impl ExecError {
    /// Builds an `OperandFormat` error.
    pub fn operand(operand: &str, reason: impl Into<String>) -> Self {
        Self::OperandFormat {
            operand: operand.to_string(),
            reason: reason.into(),
        }
    }
}

/// A failed step: the cause plus the instruction that raised it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepError {
    /// Mnemonic of the failing instruction.
    pub mnemonic: String,
    /// Operands of the failing instruction.
    pub operands: Vec<String>,
    /// Underlying cause.
    pub kind: ExecError,
}

impl StepError {
    /// Wraps `kind` with the instruction context.
    pub fn new(mnemonic: &str, operands: &[String], kind: ExecError) -> Self {
        Self {
            mnemonic: mnemonic.to_string(),
            operands: operands.to_vec(),
            kind,
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands.is_empty() {
            write!(f, "{}: {}", self.mnemonic, self.kind)
        } else {
            write!(f, "{} {}: {}", self.mnemonic, self.operands.join(", "), self.kind)
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl Serialize for StepError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Failure to load a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The text is not valid configuration JSON.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}
