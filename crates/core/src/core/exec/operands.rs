//! Operand Resolution.
//!
//! This module turns operand text into values and writable locations against the current CPU
//! state. It provides:
//! 1. **Sources:** Registers, `$` immediates, bare numbers, memory operands and frame slots.
//! 2. **Destinations:** Registers, memory operands and frame slots. Immediates are rejected
//!    before anything is written.
//! 3. **Effective Addresses:** `disp + base + index * scale`, with the RIP-relative
//!    approximation used for `%rip` bases.
//! 4. **Width Inference:** Operation width for unsuffixed mnemonics.

use tracing::warn;

use crate::common::{ExecError, Gpr, RegAlias, Width};
use crate::config::ExecutorConfig;
use crate::core::cpu::CpuState;
use crate::isa::operand::{self, AddrBase};

/// A writable operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    /// A register view.
    Reg(RegAlias),
    /// A memory address.
    Mem(u64),
}

/// A decoded operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    /// An immediate value.
    Imm(i64),
    /// A register or memory location.
    Loc(Location),
}

/// Decodes a source operand.
///
/// # Arguments
///
/// * `text` - Operand as written in the listing.
/// * `config` - Executor settings (RIP stride).
/// * `cpu` - State used to compute effective addresses.
///
/// # Errors
///
/// `UnknownRegister` for an unrecognized `%name`, `OperandFormat` for anything else that is
/// not a register, immediate, number, memory operand or frame slot.
pub fn decode(text: &str, config: &ExecutorConfig, cpu: &CpuState) -> Result<Operand, ExecError> {
    let t = text.trim();
    if t.starts_with('%') {
        return RegAlias::lookup(t)
            .map(|alias| Operand::Loc(Location::Reg(alias)))
            .ok_or_else(|| ExecError::UnknownRegister(t.to_string()));
    }
    if t.starts_with('$') {
        return operand::parse_immediate(t).map(Operand::Imm);
    }
    if t.contains('(') {
        return effective_address(t, config, cpu).map(|addr| Operand::Loc(Location::Mem(addr)));
    }
    if let Some(offset) = operand::parse_frame_slot(t) {
        return Ok(Operand::Loc(Location::Mem(frame_address(cpu, offset))));
    }
    if let Some(n) = operand::parse_number(t) {
        return Ok(Operand::Imm(n));
    }
    Err(ExecError::operand(t, "unsupported operand format"))
}

/// Decodes an operand that will be written.
///
/// # Errors
///
/// As `decode`, plus `OperandFormat` when the operand is an immediate.
pub fn decode_dest(
    text: &str,
    config: &ExecutorConfig,
    cpu: &CpuState,
) -> Result<Location, ExecError> {
    match decode(text, config, cpu)? {
        Operand::Loc(loc) => Ok(loc),
        Operand::Imm(_) => Err(ExecError::operand(
            text.trim(),
            "destination must be a register or memory operand",
        )),
    }
}

/// Reads an operand at `width`.
///
/// Register views read at their own width; immediates are returned sign-extended to 64 bits.
pub fn read(cpu: &CpuState, op: Operand, width: Width) -> u64 {
    match op {
        Operand::Imm(n) => n as u64,
        Operand::Loc(Location::Reg(alias)) => cpu.read_alias(alias),
        Operand::Loc(Location::Mem(addr)) => cpu.read_memory(addr, width.bytes()),
    }
}

/// Writes `value` to a location.
///
/// Registers follow the partial-write rules of the view being written; memory receives the low
/// `width` bytes.
pub fn write(cpu: &mut CpuState, loc: Location, value: u64, width: Width) {
    match loc {
        Location::Reg(alias) => cpu.write_alias(alias, value),
        Location::Mem(addr) => cpu.write_memory(addr, value, width.bytes()),
    }
}

/// Computes the effective address of a memory operand.
///
/// A `%rip` base, or an unparsable operand that mentions `%rip` (such as `str(%rip)`), yields
/// `pc * rip_stride` with the displacement ignored.
///
/// # Errors
///
/// `OperandFormat` for any other malformed memory operand.
pub fn effective_address(
    text: &str,
    config: &ExecutorConfig,
    cpu: &CpuState,
) -> Result<u64, ExecError> {
    match operand::parse_memory_operand(text) {
        Ok(mem) => {
            let base = match mem.base {
                Some(AddrBase::Rip) => return Ok(rip_placeholder(text, config, cpu)),
                Some(AddrBase::Reg(alias)) => cpu.read_alias(alias),
                None => 0,
            };
            let index = mem
                .index
                .map_or(0, |alias| cpu.read_alias(alias).wrapping_mul(u64::from(mem.scale)));
            Ok((mem.displacement as u64).wrapping_add(base).wrapping_add(index))
        }
        Err(_) if text.to_ascii_lowercase().contains("%rip") => {
            Ok(rip_placeholder(text, config, cpu))
        }
        Err(e) => Err(e),
    }
}

/// Address of a `var_Nh`/`arg_Nh` frame slot.
pub fn frame_address(cpu: &CpuState, offset: i64) -> u64 {
    cpu.read_gpr(Gpr::Rbp).wrapping_add(offset as u64)
}

/// Operation width for a mnemonic without a size suffix.
///
/// Taken from the first register operand; quadword when there is none.
pub fn infer_width(operands: &[String]) -> Width {
    operands
        .iter()
        .filter(|op| op.trim().starts_with('%'))
        .find_map(|op| RegAlias::lookup(op))
        .map_or(Width::Qword, |alias| alias.width)
}

fn rip_placeholder(text: &str, config: &ExecutorConfig, cpu: &CpuState) -> u64 {
    let addr = (cpu.pc as u64).wrapping_mul(config.rip_stride);
    warn!(operand = text.trim(), pc = cpu.pc, addr, "approximating RIP-relative address");
    addr
}
