//! Disassembly listing parser.
//!
//! Turns the text output of a disassembler into an ordered instruction list. Two dialects are
//! understood, and every line is matched independently:
//!
//! 1. **radare2:** `│ ╎   0x08000040      pushq %rbp          ; comment`, optionally with a
//!    packed byte column (truncated ones end in `.`), function headers
//!    (`┌ 949: int sym.main (...)`) and `;--` / `afv:` annotations.
//! 2. **objdump:** `  1c:	48 89 e5             	mov    %rsp,%rbp  # comment`, with file
//!    banners, `<symbol>:` headers, byte-only continuation lines and `R_X86_64_*` relocation
//!    lines.
//!
//! The radare2 grammar is tried first. A relocation line attaches to the instruction before it.
//! Lines that are neither instructions nor recognizably skippable become `ParseError`s; the
//! parse as a whole succeeds as long as one instruction was found.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use super::compile;
use super::instruction::{Instruction, ParsedProgram, Relocation};
use super::operand::split_operands;
use crate::common::{InstrAddr, ParseError, ParseFailure};

static RELOCATION: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^\s*(?P<addr>[0-9a-fA-F]+):\s*(?P<kind>R_[A-Z0-9_]+)\s+(?P<target>\S+)\s*$")
});

static R2_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\s*┌\s*\d+:\s*(?P<sig>[^(]*)\("));

static R2_FUNCTION_LEGACY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\s*/\s*\(fcn\)\s+(?P<name>\S+)"));

static OBJDUMP_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\s*[0-9a-fA-F]+\s+<(?P<name>[^>]+)>:\s*$"));

static R2_INSTRUCTION: LazyLock<Regex> = LazyLock::new(|| {
    compile(concat!(
        r"^[^\w;]*(?P<addr>0x[0-9a-fA-F]+)\s+",
        r"(?:(?P<bytes>(?:[0-9a-fA-F]{2})+\.?)\s+)?",
        r"(?P<mnem>[a-zA-Z][a-zA-Z0-9.]*)",
        r"(?:\s+(?P<ops>[^;]*?))?\s*(?:;\s*(?P<comment>.*?))?\s*$",
    ))
});

static OBJDUMP_LINE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\s*(?P<addr>[0-9a-fA-F]+):\s*(?P<rest>.*)$"));

static OBJDUMP_BYTES: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^(?P<bytes>[0-9a-fA-F]{2}(?: [0-9a-fA-F]{2})*)(?:\s{2,}|\t|$)(?P<instr>.*)$")
});

static MNEMONIC: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(?P<mnem>[a-zA-Z][a-zA-Z0-9.]*)(?:\s+(?P<ops>.*))?$"));

/// Prefixes that do not change what the interpreter does.
const IGNORED_PREFIXES: [&str; 10] = [
    "bnd", "notrack", "cs", "ds", "ss", "es", "fs", "gs", "data16", "addr32",
];

/// Prefixes that become part of the mnemonic (`rep stos`), except before a return.
const FOLDED_PREFIXES: [&str; 6] = ["rep", "repz", "repe", "repnz", "repne", "lock"];

/// What a single listing line turned out to be.
#[derive(Debug)]
enum Line {
    Instruction(Instruction),
    Continuation(String),
    Relocation(Relocation),
    Function(String),
    Skipped(&'static str),
    Unrecognized(&'static str),
}

/// Parses a disassembly listing.
///
/// # Arguments
///
/// * `text` - The listing, in radare2 or objdump format (the two may even be mixed).
///
/// # Returns
///
/// The parsed program, including non-fatal errors for lines that could not be understood.
///
/// # Errors
///
/// Returns a `ParseFailure` when no instruction line was recognized. It then lists one error
/// for every non-blank line, skipped ones included.
pub fn parse(text: &str) -> Result<ParsedProgram, ParseFailure> {
    let mut program = ParsedProgram::default();
    let mut skipped = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_number = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }
        match classify_line(raw, line_number) {
            Line::Instruction(instr) => {
                trace!(address = %instr.address, mnemonic = %instr.mnemonic, "parsed instruction");
                program.instructions.push(instr);
            }
            Line::Continuation(bytes) => {
                if let Some(prev) = program.instructions.last_mut() {
                    if !prev.bytes.is_empty() {
                        prev.bytes.push(' ');
                    }
                    prev.bytes.push_str(&bytes);
                }
                skipped.push(ParseError::new(line_number, raw, "byte continuation line"));
            }
            Line::Relocation(reloc) => {
                if let Some(prev) = program.instructions.last_mut() {
                    trace!(symbol = %reloc.symbol, "attached relocation");
                    prev.relocation = Some(reloc);
                }
                skipped.push(ParseError::new(line_number, raw, "relocation line"));
            }
            Line::Function(name) => {
                if program.function_name.is_none() {
                    debug!(function = %name, "found function header");
                    program.function_name = Some(name);
                }
                skipped.push(ParseError::new(line_number, raw, "function header"));
            }
            Line::Skipped(why) => skipped.push(ParseError::new(line_number, raw, why)),
            Line::Unrecognized(why) => {
                let error = ParseError::new(line_number, raw, why);
                skipped.push(error.clone());
                program.errors.push(error);
            }
        }
    }

    if program.instructions.is_empty() {
        return Err(ParseFailure { errors: skipped });
    }
    debug!(
        instructions = program.instructions.len(),
        errors = program.errors.len(),
        "parsed listing"
    );
    Ok(program)
}

fn classify_line(raw: &str, line_number: usize) -> Line {
    let line = raw.trim_end();
    let trimmed = line.trim_start();

    if trimmed.contains("file format") || trimmed.starts_with("Disassembly of section") {
        return Line::Skipped("banner line");
    }
    if let Some(caps) = RELOCATION.captures(line) {
        return Line::Relocation(Relocation::new(&caps["kind"], &caps["target"]));
    }
    if let Some(name) = function_header(line) {
        return Line::Function(name);
    }
    if trimmed.starts_with(';') || trimmed.starts_with('#') || trimmed.starts_with("//") {
        return Line::Skipped("comment line");
    }
    if starts_with_glyph(trimmed) {
        let content = strip_glyphs(trimmed);
        if content.is_empty() {
            return Line::Skipped("decorative line");
        }
        if content.starts_with(';') {
            return Line::Skipped("comment line");
        }
        if !content.starts_with("0x") && content.contains(':') {
            return Line::Skipped("annotation line");
        }
    }
    if let Some(instr) = parse_radare2(line, line_number) {
        return Line::Instruction(instr);
    }
    match parse_objdump(line, line_number) {
        Some(line) => line,
        None => Line::Unrecognized("unrecognized line format"),
    }
}

fn function_header(line: &str) -> Option<String> {
    if let Some(caps) = R2_FUNCTION.captures(line) {
        let name = caps["sig"]
            .split_whitespace()
            .last()?
            .trim_start_matches('*')
            .to_string();
        return (!name.is_empty()).then_some(name);
    }
    if let Some(caps) = R2_FUNCTION_LEGACY.captures(line) {
        return Some(caps["name"].to_string());
    }
    OBJDUMP_SYMBOL
        .captures(line)
        .map(|caps| caps["name"].to_string())
}

/// Box-drawing, block and arrow characters used by radare2's graph gutter.
fn is_glyph(c: char) -> bool {
    matches!(c, '\u{2190}'..='\u{21FF}' | '\u{2500}'..='\u{25FF}')
}

fn starts_with_glyph(text: &str) -> bool {
    text.chars().next().is_some_and(is_glyph)
}

fn strip_glyphs(text: &str) -> &str {
    text.trim_start_matches(|c: char| {
        is_glyph(c) || c.is_whitespace() || matches!(c, '<' | '>' | '-' | '=' | '`' | '|' | '.')
    })
}

fn parse_radare2(line: &str, line_number: usize) -> Option<Instruction> {
    let caps = R2_INSTRUCTION.captures(line)?;
    let address = InstrAddr::parse_hex(&caps["addr"])?;
    let ops = caps.name("ops").map_or("", |m| m.as_str());
    let (mnemonic, operands) = fold_prefixes(&caps["mnem"], ops)?;
    Some(Instruction {
        address,
        bytes: caps.name("bytes").map_or_else(String::new, |m| m.as_str().to_string()),
        mnemonic,
        operands: split_operands(&operands),
        comment: caps
            .name("comment")
            .map(|m| m.as_str().trim().to_string())
            .filter(|c| !c.is_empty()),
        relocation: None,
        source_line: line.to_string(),
        line_number,
    })
}

fn parse_objdump(line: &str, line_number: usize) -> Option<Line> {
    let caps = OBJDUMP_LINE.captures(line)?;
    let address = InstrAddr::parse_hex(&caps["addr"])?;
    let rest = &caps["rest"];

    let (body, comment) = match rest.find('#') {
        Some(i) => (&rest[..i], Some(rest[i + 1..].trim().to_string())),
        None => (rest, None),
    };
    let body = body.trim();

    let (bytes, instr_text) = match OBJDUMP_BYTES.captures(body) {
        Some(b) => (
            b["bytes"].to_string(),
            b.name("instr").map_or("", |m| m.as_str()).trim().to_string(),
        ),
        None => (String::new(), body.to_string()),
    };
    if instr_text.is_empty() {
        return if bytes.is_empty() {
            Some(Line::Unrecognized("address without instruction"))
        } else {
            Some(Line::Continuation(bytes))
        };
    }

    let parts = MNEMONIC.captures(&instr_text)?;
    let ops = parts.name("ops").map_or("", |m| m.as_str());
    let (mnemonic, operands) = fold_prefixes(&parts["mnem"], ops)?;
    Some(Line::Instruction(Instruction {
        address,
        bytes,
        mnemonic,
        operands: split_operands(&operands),
        comment: comment.filter(|c| !c.is_empty()),
        relocation: None,
        source_line: line.to_string(),
        line_number,
    }))
}

/// Drops no-op prefixes and folds repeat/lock prefixes into the mnemonic.
///
/// Returns the final mnemonic (lowercased) and the remaining operand text.
fn fold_prefixes(first: &str, ops: &str) -> Option<(String, String)> {
    let mut words: Vec<&str> = std::iter::once(first)
        .chain(ops.split_whitespace().take_while(|w| !w.contains(['%', '$', '(', ','])))
        .collect();
    let consumed = words.len() - 1;
    let mut folded: Vec<String> = Vec::new();

    while let Some(word) = words.first().copied() {
        let lower = word.to_ascii_lowercase();
        let rest_is_ret = words.get(1).is_some_and(|w| w.to_ascii_lowercase().starts_with("ret"));
        if words.len() > 1 && IGNORED_PREFIXES.contains(&lower.as_str()) {
            let _ = words.remove(0);
        } else if words.len() > 1 && FOLDED_PREFIXES.contains(&lower.as_str()) {
            if !rest_is_ret {
                folded.push(lower);
            }
            let _ = words.remove(0);
        } else {
            break;
        }
    }

    let mnemonic_word = words.first()?;
    if !mnemonic_word.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    folded.push(mnemonic_word.to_ascii_lowercase());
    let mnemonic = folded.join(" ");

    // Prefix candidates after the real mnemonic are operand words after all.
    let operands = words
        .iter()
        .skip(1)
        .copied()
        .chain(ops.split_whitespace().skip(consumed))
        .collect::<Vec<_>>()
        .join(" ");
    Some((mnemonic, operands))
}
