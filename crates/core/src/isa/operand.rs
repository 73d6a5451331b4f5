//! AT&T operand grammar.
//!
//! This module turns operand text into structured values. It provides:
//! 1. **Splitting:** Top-level comma splitting that keeps `disp(base,index,scale)` intact.
//! 2. **Classification:** Register, immediate, memory or label.
//! 3. **Literals:** Signed hex and decimal numbers, with or without the `$` immediate marker.
//! 4. **Memory Operands:** The `disp(base,index,scale)` grammar in all of its optional forms.
//! 5. **Frame Slots:** The `var_Nh` / `arg_Nh` local-variable spellings some disassemblers print.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::compile;
use crate::common::{ExecError, RegAlias};

/// Broad operand category, decided from the operand's spelling alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperandKind {
    /// `%reg`
    Register,
    /// `$imm` or a bare number
    Immediate,
    /// `disp(base,index,scale)` or a frame slot
    Memory,
    /// Anything else: symbols, `addr <sym>` jump targets
    Label,
}

/// Splits an operand list on commas that are not inside parentheses.
///
/// Empty segments are dropped and every operand is trimmed.
pub fn split_operands(text: &str) -> Vec<String> {
    let mut operands = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                push_operand(&mut operands, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_operand(&mut operands, &current);
    operands
}

fn push_operand(operands: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        operands.push(trimmed.to_string());
    }
}

/// Classifies an operand by its spelling.
pub fn classify(operand: &str) -> OperandKind {
    let text = operand.trim();
    if text.starts_with('%') {
        OperandKind::Register
    } else if text.starts_with('$') || parse_number(text).is_some() {
        OperandKind::Immediate
    } else if text.contains('(') || parse_frame_slot(text).is_some() {
        OperandKind::Memory
    } else {
        OperandKind::Label
    }
}

/// Returns the canonical 64-bit register name for any spelling of a register.
///
/// `%EAX`, `ax` and `ah` all map to `rax`.
pub fn canonical_register(name: &str) -> Option<&'static str> {
    RegAlias::lookup(name).map(|alias| alias.gpr.name())
}

/// Parses a signed hex (`0x`) or decimal literal.
///
/// Values are taken modulo 2^64, so `0xffffffffffffffff` is `-1`.
pub fn parse_number(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(hex, 16).ok()?
    } else {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u64>().ok()?
    };
    let value = magnitude as i64;
    Some(if negative { value.wrapping_neg() } else { value })
}

/// Parses a `$`-marked immediate such as `$0x10`, `$-8` or `$42`.
pub fn parse_immediate(text: &str) -> Result<i64, ExecError> {
    let literal = text
        .trim()
        .strip_prefix('$')
        .ok_or_else(|| ExecError::operand(text, "immediate must start with `$`"))?;
    parse_number(literal).ok_or_else(|| ExecError::operand(text, "invalid immediate value"))
}

/// Parses a frame-slot pseudo-operand into its offset from RBP.
///
/// `var_Nh` is `RBP - N` and `arg_Nh` is `RBP + N`, with `N` in hex.
pub fn parse_frame_slot(text: &str) -> Option<i64> {
    let text = text.trim();
    let (sign, rest) = if let Some(rest) = text.strip_prefix("var_") {
        (-1, rest)
    } else if let Some(rest) = text.strip_prefix("arg_") {
        (1, rest)
    } else {
        return None;
    };
    let digits = rest.strip_suffix('h').unwrap_or(rest);
    if digits.is_empty() {
        return None;
    }
    i64::from_str_radix(digits, 16).ok().map(|n| sign * n)
}

/// Base of an effective address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddrBase {
    /// A general-purpose register (any width spelling).
    Reg(RegAlias),
    /// `%rip`; the interpreter has no real instruction pointer, see `ExecutorConfig::rip_stride`.
    Rip,
}

/// A decoded `disp(base,index,scale)` operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryOperand {
    /// Signed displacement; zero when absent.
    pub displacement: i64,
    /// Base register, absent in `(,%rax,8)`.
    pub base: Option<AddrBase>,
    /// Index register.
    pub index: Option<RegAlias>,
    /// Index scale: 1, 2, 4 or 8.
    pub scale: u8,
}

static MEMORY_OPERAND: LazyLock<Regex> = LazyLock::new(|| {
    compile(concat!(
        r"^(?P<disp>[+-]?(?:0[xX][0-9a-fA-F]+|[0-9]+))?",
        r"\(\s*(?P<base>%[a-zA-Z0-9]+)?",
        r"\s*(?:,\s*(?P<index>%[a-zA-Z0-9]+)?\s*(?:,\s*(?P<scale>[0-9]+))?)?\s*\)$",
    ))
});

/// Parses a memory operand.
///
/// Accepts every combination of displacement, base, index and scale: `(%rax)`, `8(%rbp)`,
/// `(%rax,%rbx)`, `-0x10(%rbp,%rcx,4)`, `(,%rax,8)`, `0x20(,%rdx,2)`.
///
/// # Errors
///
/// Returns `ExecError::OperandFormat` naming the operand when the text does not match the
/// grammar, names an unknown register, or uses a scale other than 1, 2, 4 or 8.
pub fn parse_memory_operand(text: &str) -> Result<MemoryOperand, ExecError> {
    let trimmed = text.trim();
    let caps = MEMORY_OPERAND
        .captures(trimmed)
        .ok_or_else(|| ExecError::operand(text, "invalid memory operand format"))?;

    let displacement = match caps.name("disp") {
        Some(m) => parse_number(m.as_str())
            .ok_or_else(|| ExecError::operand(text, "displacement out of range"))?,
        None => 0,
    };

    let base = match caps.name("base") {
        Some(m) if m.as_str().eq_ignore_ascii_case("%rip") => Some(AddrBase::Rip),
        Some(m) => Some(AddrBase::Reg(RegAlias::lookup(m.as_str()).ok_or_else(|| {
            ExecError::operand(text, format!("unknown base register {}", m.as_str()))
        })?)),
        None => None,
    };

    let index = match caps.name("index") {
        Some(m) => Some(RegAlias::lookup(m.as_str()).ok_or_else(|| {
            ExecError::operand(text, format!("unknown index register {}", m.as_str()))
        })?),
        None => None,
    };

    let scale = match caps.name("scale") {
        Some(m) => match m.as_str() {
            "1" => 1,
            "2" => 2,
            "4" => 4,
            "8" => 8,
            other => {
                return Err(ExecError::operand(text, format!("invalid scale {other}")));
            }
        },
        None => 1,
    };

    if base.is_none() && index.is_none() {
        return Err(ExecError::operand(text, "memory operand needs a base or index register"));
    }
    if caps.name("scale").is_some() && index.is_none() {
        return Err(ExecError::operand(text, "scale given without an index register"));
    }

    Ok(MemoryOperand {
        displacement,
        base,
        index,
        scale,
    })
}
