//! x86-64 General-Purpose Register File.
//!
//! This module implements storage for the 16 general-purpose registers. It performs the
//! following:
//! 1. **Storage:** Maintains 16 independent 64-bit registers.
//! 2. **Aliased Views:** Reads and writes through any width spelling with exact x86-64 rules:
//!    32-bit writes zero-extend into bits 63:32, 16-bit and 8-bit writes (including the legacy
//!    high-byte registers) leave every other bit untouched.
//! 3. **Debugging:** Provides utilities for dumping and formatting register state.

use crate::common::{Gpr, RegAlias, Width};

/// Output radix for register formatting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegisterFormat {
    /// `0x000000000000002a`
    #[default]
    Hex,
    /// `42`
    Decimal,
    /// `0b101010`
    Binary,
}

/// General-purpose register file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [u64; 16],
}

impl RegisterFile {
    /// Creates a register file with every register set to zero.
    pub const fn new() -> Self {
        Self { regs: [0; 16] }
    }

    /// Reads the full 64-bit value of a register.
    #[inline(always)]
    pub const fn read(&self, reg: Gpr) -> u64 {
        self.regs[reg.index()]
    }

    /// Writes the full 64-bit value of a register.
    #[inline(always)]
    pub const fn write(&mut self, reg: Gpr, val: u64) {
        self.regs[reg.index()] = val;
    }

    /// Reads through an aliased view.
    ///
    /// # Arguments
    ///
    /// * `alias` - The view to read (for example `eax` or `ah`).
    ///
    /// # Returns
    ///
    /// The view's bits, zero-extended to 64 bits.
    pub const fn read_alias(&self, alias: RegAlias) -> u64 {
        (self.read(alias.gpr) >> alias.shift()) & alias.width.mask()
    }

    /// Writes through an aliased view.
    ///
    /// # Arguments
    ///
    /// * `alias` - The view to write.
    /// * `val` - The value; bits beyond the view's width are ignored.
    pub const fn write_alias(&mut self, alias: RegAlias, val: u64) {
        let merged = match alias.width {
            Width::Qword => val,
            Width::Dword => val & Width::Dword.mask(),
            Width::Word | Width::Byte => {
                let field = alias.width.mask() << alias.shift();
                let old = self.read(alias.gpr);
                (old & !field) | ((val & alias.width.mask()) << alias.shift())
            }
        };
        self.write(alias.gpr, merged);
    }

    /// Iterates over `(register, value)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Gpr, u64)> + '_ {
        Gpr::ALL.iter().map(|&reg| (reg, self.read(reg)))
    }

    /// Formats one register value.
    pub fn format(&self, reg: Gpr, format: RegisterFormat) -> String {
        let val = self.read(reg);
        match format {
            RegisterFormat::Hex => format!("{val:#018x}"),
            RegisterFormat::Decimal => val.to_string(),
            RegisterFormat::Binary => format!("{val:#b}"),
        }
    }

    /// Dumps the contents of all registers to stdout, two per line.
    pub fn dump(&self, format: RegisterFormat) {
        for pair in Gpr::ALL.chunks(2) {
            if let [a, b] = pair {
                println!(
                    "{:<3}={:<20} {:<3}={}",
                    a.name(),
                    self.format(*a, format),
                    b.name(),
                    self.format(*b, format)
                );
            }
        }
    }
}
