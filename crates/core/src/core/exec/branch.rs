//! Control Transfer.
//!
//! This module implements jumps, calls and returns for the executor. It performs the following:
//! 1. **Target Resolution:** Maps jump operands (hex addresses, `addr <sym>` forms, labels) to
//!    instruction indices, with the nearest-following-instruction fallback.
//! 2. **Call Routing:** Sends calls to emulated library functions or resolves them as jumps.
//! 3. **Returns:** Pops the return index; a non-positive value ends the program.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::Executor;
use super::result::JumpTarget;
use crate::common::constants::{RETURN_REG, STACK_SLOT};
use crate::common::{ExecError, InstrAddr};
use crate::core::cpu::CpuState;
use crate::isa::{Instruction, compile};
use crate::sim::syscalls::{LibFunction, SyscallSimulator};

/// `# 0x401136 <main+0x10>` style comment carrying the real target.
static COMMENT_TARGET: LazyLock<Regex> =
    LazyLock::new(|| compile(r"#?\s*(0x[0-9a-fA-F]+)\s*<([^>]*)>"));

/// `<name>` or `<name+0x1f>` inside an operand.
static ANGLE_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"<([^>+]+)(?:\+0x[0-9a-fA-F]+)?>"));

impl Executor {
    /// Resolves a jump operand to the instruction it transfers to.
    ///
    /// # Arguments
    ///
    /// * `target` - Operand text: `0x401136`, `401136 <main+0x10>`, or a label name.
    ///
    /// # Returns
    ///
    /// The exact instruction at a hex address; failing that `ProgramEnd` when the address is
    /// above every instruction, else the nearest instruction above it. Labels resolve through
    /// the label map.
    ///
    /// # Errors
    ///
    /// `ExecError::UnresolvedJumpTarget` when nothing matches.
    pub fn resolve_jump_target(&self, target: &str) -> Result<JumpTarget, ExecError> {
        let t = target.trim();
        if let Some(addr) = hex_target(t) {
            return Ok(self.resolve_address(InstrAddr::new(addr)));
        }
        self.label_index(t)
            .map(JumpTarget::Index)
            .ok_or_else(|| ExecError::UnresolvedJumpTarget(t.to_string()))
    }

    /// Index for a label, trying the text itself, the name inside `<...>` and the name with
    /// any disassembler prefix removed.
    pub fn label_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        if let Some(&i) = self.labels.get(name) {
            return Some(i);
        }
        if let Some(i) = ANGLE_SYMBOL
            .captures(name)
            .and_then(|caps| self.labels.get(&caps[1]).copied())
        {
            return Some(i);
        }
        let stripped = strip_symbol_prefix(name);
        self.labels.get(stripped).copied()
    }

    fn resolve_address(&self, addr: InstrAddr) -> JumpTarget {
        if let Some(&i) = self.address_map.get(&addr) {
            return JumpTarget::Index(i);
        }
        match self.address_map.range(addr..).next() {
            Some((found, &i)) => {
                warn!(
                    address = %addr,
                    nearest = %found,
                    "no instruction at jump target, using next"
                );
                JumpTarget::Index(i)
            }
            None => JumpTarget::ProgramEnd,
        }
    }

    /// Jump operand after applying a `# 0xHEX <label>` comment, which takes precedence.
    pub(super) fn effective_target(instr: &Instruction) -> String {
        instr
            .comment
            .as_deref()
            .and_then(|c| COMMENT_TARGET.captures(c))
            .map_or_else(
                || instr.operands[0].clone(),
                |caps| format!("{} <{}>", &caps[1], &caps[2]),
            )
    }

    pub(super) fn exec_jump(&mut self, instr: &Instruction) -> Result<(), ExecError> {
        let target = Self::effective_target(instr);
        self.jump = Some(self.resolve_jump_target(&target)?);
        Ok(())
    }

    pub(super) fn exec_call(
        &mut self,
        instr: &Instruction,
        cpu: &mut CpuState,
        syscalls: &mut SyscallSimulator,
    ) -> Result<(), ExecError> {
        let target = Self::effective_target(instr);
        let return_index = cpu.pc as u64 + 1;
        cpu.push(return_index, STACK_SLOT);

        let reloc = instr.relocation.as_ref().map(|r| r.symbol.as_str());
        let func = library_function(&target, reloc)
            .or_else(|| hex_target(&target).and_then(SyscallSimulator::function_for_address));
        if let Some(func) = func {
            self.library_call(func, cpu, syscalls);
            return Ok(());
        }
        if let Some(i) = reloc.and_then(|sym| self.label_index(sym)) {
            self.jump = Some(JumpTarget::Index(i));
            return Ok(());
        }
        match self.resolve_jump_target(&target) {
            Ok(jump) => {
                debug!(target = %target, ?jump, "call");
                self.jump = Some(jump);
            }
            Err(_) => {
                warn!(target = %target, "unknown call target, returning 0");
                cpu.write_gpr(RETURN_REG, 0);
                self.stubbed_call = true;
                self.return_from_call(cpu);
            }
        }
        Ok(())
    }

    pub(super) fn exec_ret(&mut self, cpu: &mut CpuState) {
        self.return_from_call(cpu);
    }

    fn library_call(
        &mut self,
        func: LibFunction,
        cpu: &mut CpuState,
        syscalls: &mut SyscallSimulator,
    ) {
        let result = syscalls.call(func, cpu);
        let rax = if result.input_required { 0 } else { result.return_value as u64 };
        cpu.write_gpr(RETURN_REG, rax);
        self.return_from_call(cpu);
        self.library = Some((func, result));
    }

    fn return_from_call(&mut self, cpu: &mut CpuState) {
        let value = cpu.pop(STACK_SLOT) as i64;
        self.jump = Some(if value <= 0 {
            JumpTarget::ProgramEnd
        } else {
            JumpTarget::Index(value as usize)
        });
    }
}

/// Parses `0xHEX`, `0xHEX <sym>` or `HEX <sym>` into an address.
pub fn hex_target(text: &str) -> Option<u64> {
    let text = text.trim();
    let first = text.split_whitespace().next()?;
    if let Some(hex) = first.strip_prefix("0x").or_else(|| first.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    let has_symbol = text[first.len()..].trim_start().starts_with('<');
    if has_symbol && first.bytes().all(|b| b.is_ascii_hexdigit()) {
        return u64::from_str_radix(first, 16).ok();
    }
    None
}

/// Reduces a call target to a bare C function name.
///
/// Strips `sym.imp.`/`sym.`/`reloc.` prefixes, `@plt`-style suffixes, leading underscores and
/// the `isoc99_` prefix, so `sym.imp.__isoc99_scanf` and `__isoc99_scanf@PLT` are both `scanf`.
pub fn normalize_call_name(name: &str) -> String {
    let name = strip_symbol_prefix(name.trim());
    let name = name.split('@').next().unwrap_or(name);
    let name = name.trim_start_matches('_');
    let name = name
        .strip_prefix("isoc99_")
        .or_else(|| name.strip_prefix("isoc23_"))
        .unwrap_or(name);
    name.to_string()
}

fn strip_symbol_prefix(name: &str) -> &str {
    ["sym.imp.", "sym.", "reloc."]
        .iter()
        .find_map(|p| name.strip_prefix(p))
        .unwrap_or(name)
}

/// The emulated function a call targets, from the relocation symbol, a `<name>` in the
/// operand, or the operand itself.
fn library_function(target: &str, relocation: Option<&str>) -> Option<LibFunction> {
    let angle = ANGLE_SYMBOL.captures(target).map(|c| c[1].to_string());
    let bare = target.split_whitespace().next().map(str::to_string);
    relocation
        .map(str::to_string)
        .into_iter()
        .chain(angle)
        .chain(bare)
        .find_map(|name| LibFunction::from_name(&normalize_call_name(&name)))
}
