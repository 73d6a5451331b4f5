//! CPU State Definition.
//!
//! This module defines `CpuState`, the single owner of all architectural state. It coordinates
//! the following:
//! 1. **State Management:** Registers, flags, sparse memory and the program counter (an index
//!    into the instruction list, not a machine address).
//! 2. **Change Tracking:** The registers and memory bytes written since the last
//!    `clear_change_tracking`, reported with each step.
//! 3. **Stack Operations:** `push`/`pop` through RSP.
//! 4. **History:** A bounded ring of deep snapshots for diagnostics.
//!
//! Exactly one `CpuState` exists per loaded program; the executor and the syscall simulator
//! receive it by `&mut` for the duration of a step.

/// Bounded snapshot history.
pub mod snapshot;

use std::collections::BTreeSet;

use serde::Serialize;

use self::snapshot::{History, Snapshot};
use crate::common::constants::STACK_SLOT;
use crate::common::{ExecError, Gpr, MemoryChange, RegAlias, Width};
use crate::config::CpuConfig;
use crate::core::arch::{ByteMemory, FlagOp, Flags, Memory, RegisterFile};
use crate::stats::epoch_millis;

/// One quadword of the stack view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StackSlot {
    /// Slot address.
    #[serde(serialize_with = "crate::common::data::decimal")]
    pub address: u64,
    /// Quadword stored there.
    #[serde(serialize_with = "crate::common::data::decimal")]
    pub value: u64,
}

/// Architectural state of the interpreted program.
#[derive(Clone, Debug)]
pub struct CpuState {
    regs: RegisterFile,
    /// Status flags.
    pub flags: Flags,
    memory: Memory,
    /// Index of the instruction being executed.
    pub pc: usize,
    changed_registers: BTreeSet<Gpr>,
    changed_memory: BTreeSet<u64>,
    history: History,
    stack_top: u64,
}

impl CpuState {
    /// Creates a CPU in its reset state.
    pub fn new(config: &CpuConfig) -> Self {
        let mut cpu = Self {
            regs: RegisterFile::new(),
            flags: Flags::default(),
            memory: Memory::new(),
            pc: 0,
            changed_registers: BTreeSet::new(),
            changed_memory: BTreeSet::new(),
            history: History::new(config.history_capacity),
            stack_top: config.stack_top,
        };
        cpu.reset();
        cpu
    }

    /// Reads a register by any of its spellings.
    ///
    /// # Arguments
    ///
    /// * `name` - Register spelling, with or without `%`, in any case.
    ///
    /// # Returns
    ///
    /// The view's value, zero-extended to 64 bits.
    ///
    /// # Errors
    ///
    /// `ExecError::UnknownRegister` if the name is not a general-purpose register.
    pub fn get_register(&self, name: &str) -> Result<u64, ExecError> {
        let alias = lookup(name)?;
        Ok(self.regs.read_alias(alias))
    }

    /// Writes a register by any of its spellings, following x86-64 partial-write rules.
    ///
    /// # Errors
    ///
    /// `ExecError::UnknownRegister` if the name is not a general-purpose register.
    pub fn set_register(&mut self, name: &str, value: u64) -> Result<(), ExecError> {
        let alias = lookup(name)?;
        self.write_alias(alias, value);
        Ok(())
    }

    /// Reads a register view.
    #[inline]
    pub const fn read_alias(&self, alias: RegAlias) -> u64 {
        self.regs.read_alias(alias)
    }

    /// Writes a register view and marks its owner changed.
    pub fn write_alias(&mut self, alias: RegAlias, value: u64) {
        self.regs.write_alias(alias, value);
        let _ = self.changed_registers.insert(alias.gpr);
    }

    /// Reads a full 64-bit register.
    #[inline]
    pub const fn read_gpr(&self, reg: Gpr) -> u64 {
        self.regs.read(reg)
    }

    /// Writes a full 64-bit register and marks it changed.
    pub fn write_gpr(&mut self, reg: Gpr, value: u64) {
        self.regs.write(reg, value);
        let _ = self.changed_registers.insert(reg);
    }

    /// Read-only access to the register file.
    pub const fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Read-only access to memory.
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Reads `size` bytes little-endian; unwritten bytes read as zero.
    pub fn read_memory(&self, addr: u64, size: usize) -> u64 {
        self.read_le(addr, size)
    }

    /// Writes the low `size` bytes of `value` little-endian, marking each byte changed.
    pub fn write_memory(&mut self, addr: u64, value: u64, size: usize) {
        self.write_le(addr, value, size);
    }

    /// Pushes `size` bytes of `value`: RSP decreases by `size`, then the value is stored there.
    pub fn push(&mut self, value: u64, size: usize) {
        let rsp = self.read_gpr(Gpr::Rsp).wrapping_sub(size as u64);
        self.write_gpr(Gpr::Rsp, rsp);
        self.write_memory(rsp, value, size);
    }

    /// Pops `size` bytes: the value at RSP is read, then RSP increases by `size`.
    pub fn pop(&mut self, size: usize) -> u64 {
        let rsp = self.read_gpr(Gpr::Rsp);
        let value = self.read_memory(rsp, size);
        self.write_gpr(Gpr::Rsp, rsp.wrapping_add(size as u64));
        value
    }

    /// Reflects an operation's result into the flags.
    ///
    /// ZF and SF always follow `result`; CF and OF change only for additions and subtractions.
    /// Instructions with no flag effect must not call this.
    pub fn update_flags(&mut self, result: u64, width: Width, op: FlagOp) {
        self.flags.update(result, width, op);
    }

    /// Appends a deep copy of the current state to the history ring.
    pub fn save_snapshot(&mut self) {
        self.history.push(Snapshot {
            registers: self.regs.clone(),
            flags: self.flags,
            memory: self.memory.clone(),
            pc: self.pc,
            timestamp_ms: epoch_millis(),
        });
    }

    /// Snapshot history, oldest first.
    pub const fn history(&self) -> &History {
        &self.history
    }

    /// Restores the power-on state.
    ///
    /// Every register is zeroed except RSP, which is set to the configured top of stack. Flags,
    /// memory, change tracking and history are cleared and the PC returns to 0.
    pub fn reset(&mut self) {
        self.regs = RegisterFile::new();
        self.regs.write(Gpr::Rsp, self.stack_top);
        self.flags.clear();
        self.memory.clear();
        self.pc = 0;
        self.clear_change_tracking();
        self.history.clear();
    }

    /// Forgets which registers and bytes were written.
    pub fn clear_change_tracking(&mut self) {
        self.changed_registers.clear();
        self.changed_memory.clear();
    }

    /// Registers written since the last `clear_change_tracking`.
    pub fn changed_registers(&self) -> Vec<Gpr> {
        self.changed_registers.iter().copied().collect()
    }

    /// Bytes written since the last `clear_change_tracking`, with their current values.
    pub fn changed_memory(&self) -> Vec<MemoryChange> {
        self.changed_memory
            .iter()
            .map(|&addr| MemoryChange::new(addr, self.memory.read_byte(addr)))
            .collect()
    }

    /// The `depth` quadwords at and above RSP.
    pub fn stack_view(&self, depth: usize) -> Vec<StackSlot> {
        let rsp = self.read_gpr(Gpr::Rsp);
        (0..depth)
            .map(|i| {
                let address = rsp.wrapping_add((i * STACK_SLOT) as u64);
                StackSlot {
                    address,
                    value: self.read_memory(address, STACK_SLOT),
                }
            })
            .collect()
    }
}

impl ByteMemory for CpuState {
    #[inline]
    fn read_byte(&self, addr: u64) -> u8 {
        self.memory.read_byte(addr)
    }

    fn write_byte(&mut self, addr: u64, val: u8) {
        self.memory.write_byte(addr, val);
        let _ = self.changed_memory.insert(addr);
    }
}

fn lookup(name: &str) -> Result<RegAlias, ExecError> {
    RegAlias::lookup(name).ok_or_else(|| ExecError::UnknownRegister(name.trim().to_string()))
}
