//! Register naming and aliasing metadata.
//!
//! x86-64 exposes each of its 16 general-purpose registers under several names of different
//! widths. This module encodes that relationship as static data. It provides:
//! 1. **Physical Registers:** The `Gpr` enum naming the 16 architectural 64-bit registers.
//! 2. **Widths:** The `Width` enum with masks, sign bits and signed ranges for each operand size.
//! 3. **Aliases:** A static table mapping every spelling (`%eax`, `ax`, `AH`, `r9b`, ...) to its
//!    owning register, width and high-byte flag.

use std::fmt;

use serde::Serialize;

/// One of the 16 architectural general-purpose registers.
///
/// Narrower register names are views over one of these; they never have storage of their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gpr {
    /// Accumulator; library calls return through it.
    Rax,
    /// Base register.
    Rbx,
    /// Counter register.
    Rcx,
    /// Data register; third integer argument.
    Rdx,
    /// Source index; second integer argument.
    Rsi,
    /// Destination index; first integer argument.
    Rdi,
    /// Stack pointer.
    Rsp,
    /// Frame base pointer.
    Rbp,
    /// Extended register r8.
    R8,
    /// Extended register r9.
    R9,
    /// Extended register r10.
    R10,
    /// Extended register r11.
    R11,
    /// Extended register r12.
    R12,
    /// Extended register r13.
    R13,
    /// Extended register r14.
    R14,
    /// Extended register r15.
    R15,
}

impl Gpr {
    /// Every register, in display order.
    pub const ALL: [Self; 16] = [
        Self::Rax,
        Self::Rbx,
        Self::Rcx,
        Self::Rdx,
        Self::Rsi,
        Self::Rdi,
        Self::Rsp,
        Self::Rbp,
        Self::R8,
        Self::R9,
        Self::R10,
        Self::R11,
        Self::R12,
        Self::R13,
        Self::R14,
        Self::R15,
    ];

    /// Index into a 16-entry register array.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Canonical (64-bit) name without the `%` sigil.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rax => "rax",
            Self::Rbx => "rbx",
            Self::Rcx => "rcx",
            Self::Rdx => "rdx",
            Self::Rsi => "rsi",
            Self::Rdi => "rdi",
            Self::Rsp => "rsp",
            Self::Rbp => "rbp",
            Self::R8 => "r8",
            Self::R9 => "r9",
            Self::R10 => "r10",
            Self::R11 => "r11",
            Self::R12 => "r12",
            Self::R13 => "r13",
            Self::R14 => "r14",
            Self::R15 => "r15",
        }
    }
}

impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operand size of a register view or memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Width {
    /// 8 bits.
    Byte,
    /// 16 bits.
    Word,
    /// 32 bits.
    Dword,
    /// 64 bits.
    Qword,
}

impl Width {
    /// Size in bytes.
    #[inline(always)]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Dword => 4,
            Self::Qword => 8,
        }
    }

    /// Size in bits.
    #[inline(always)]
    pub const fn bits(self) -> u32 {
        (self.bytes() * 8) as u32
    }

    /// Mask selecting the low `bits()` bits of a 64-bit value.
    #[inline(always)]
    pub const fn mask(self) -> u64 {
        match self {
            Self::Qword => u64::MAX,
            _ => (1u64 << self.bits()) - 1,
        }
    }

    /// Mask selecting the sign bit at this width.
    #[inline(always)]
    pub const fn sign_bit(self) -> u64 {
        1u64 << (self.bits() - 1)
    }

    /// Truncates `value` to this width.
    #[inline(always)]
    pub const fn truncate(self, value: u64) -> u64 {
        value & self.mask()
    }

    /// Interprets the low bits of `value` as a two's complement number of this width.
    pub const fn sign_extend(self, value: u64) -> i64 {
        let shift = 64 - self.bits();
        ((value << shift) as i64) >> shift
    }

    /// Smallest signed value representable at this width.
    pub const fn signed_min(self) -> i128 {
        -(1i128 << (self.bits() - 1))
    }

    /// Largest signed value representable at this width.
    pub const fn signed_max(self) -> i128 {
        (1i128 << (self.bits() - 1)) - 1
    }

    /// Width for an AT&T size suffix (`b`, `w`, `l`, `q`).
    pub const fn from_suffix(suffix: char) -> Option<Self> {
        match suffix {
            'b' => Some(Self::Byte),
            'w' => Some(Self::Word),
            'l' => Some(Self::Dword),
            'q' => Some(Self::Qword),
            _ => None,
        }
    }
}

/// Static metadata for one register spelling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegAlias {
    /// The physical register this name views.
    pub gpr: Gpr,
    /// Width of the view.
    pub width: Width,
    /// Whether the view is the legacy high byte (bits 15:8), as in `ah`.
    pub high: bool,
}

impl RegAlias {
    const fn full(gpr: Gpr, width: Width) -> Self {
        Self {
            gpr,
            width,
            high: false,
        }
    }

    const fn high_byte(gpr: Gpr) -> Self {
        Self {
            gpr,
            width: Width::Byte,
            high: true,
        }
    }

    /// Looks up a register spelling.
    ///
    /// The lookup is case-insensitive and accepts an optional leading `%`.
    ///
    /// # Arguments
    ///
    /// * `name` - Register spelling such as `%eax`, `R10D` or `ah`.
    ///
    /// # Returns
    ///
    /// The alias metadata, or `None` if the name is not a general-purpose register.
    pub fn lookup(name: &str) -> Option<Self> {
        let bare = name.trim();
        let bare = bare.strip_prefix('%').unwrap_or(bare);
        if bare.len() > 5 {
            return None;
        }
        let lower = bare.to_ascii_lowercase();
        ALIASES
            .iter()
            .find(|(spelling, _)| *spelling == lower)
            .map(|(_, alias)| *alias)
    }

    /// Bit offset of the view within its owning register.
    #[inline(always)]
    pub const fn shift(self) -> u32 {
        if self.high { 8 } else { 0 }
    }
}

/// Every accepted register spelling, without the `%` sigil.
static ALIASES: [(&str, RegAlias); 68] = {
    use Gpr::{R8, R9, R10, R11, R12, R13, R14, R15, Rax, Rbp, Rbx, Rcx, Rdi, Rdx, Rsi, Rsp};
    use Width::{Byte, Dword, Qword, Word};
    [
        ("rax", RegAlias::full(Rax, Qword)),
        ("eax", RegAlias::full(Rax, Dword)),
        ("ax", RegAlias::full(Rax, Word)),
        ("al", RegAlias::full(Rax, Byte)),
        ("ah", RegAlias::high_byte(Rax)),
        ("rbx", RegAlias::full(Rbx, Qword)),
        ("ebx", RegAlias::full(Rbx, Dword)),
        ("bx", RegAlias::full(Rbx, Word)),
        ("bl", RegAlias::full(Rbx, Byte)),
        ("bh", RegAlias::high_byte(Rbx)),
        ("rcx", RegAlias::full(Rcx, Qword)),
        ("ecx", RegAlias::full(Rcx, Dword)),
        ("cx", RegAlias::full(Rcx, Word)),
        ("cl", RegAlias::full(Rcx, Byte)),
        ("ch", RegAlias::high_byte(Rcx)),
        ("rdx", RegAlias::full(Rdx, Qword)),
        ("edx", RegAlias::full(Rdx, Dword)),
        ("dx", RegAlias::full(Rdx, Word)),
        ("dl", RegAlias::full(Rdx, Byte)),
        ("dh", RegAlias::high_byte(Rdx)),
        ("rsi", RegAlias::full(Rsi, Qword)),
        ("esi", RegAlias::full(Rsi, Dword)),
        ("si", RegAlias::full(Rsi, Word)),
        ("sil", RegAlias::full(Rsi, Byte)),
        ("rdi", RegAlias::full(Rdi, Qword)),
        ("edi", RegAlias::full(Rdi, Dword)),
        ("di", RegAlias::full(Rdi, Word)),
        ("dil", RegAlias::full(Rdi, Byte)),
        ("rsp", RegAlias::full(Rsp, Qword)),
        ("esp", RegAlias::full(Rsp, Dword)),
        ("sp", RegAlias::full(Rsp, Word)),
        ("spl", RegAlias::full(Rsp, Byte)),
        ("rbp", RegAlias::full(Rbp, Qword)),
        ("ebp", RegAlias::full(Rbp, Dword)),
        ("bp", RegAlias::full(Rbp, Word)),
        ("bpl", RegAlias::full(Rbp, Byte)),
        ("r8", RegAlias::full(R8, Qword)),
        ("r8d", RegAlias::full(R8, Dword)),
        ("r8w", RegAlias::full(R8, Word)),
        ("r8b", RegAlias::full(R8, Byte)),
        ("r9", RegAlias::full(R9, Qword)),
        ("r9d", RegAlias::full(R9, Dword)),
        ("r9w", RegAlias::full(R9, Word)),
        ("r9b", RegAlias::full(R9, Byte)),
        ("r10", RegAlias::full(R10, Qword)),
        ("r10d", RegAlias::full(R10, Dword)),
        ("r10w", RegAlias::full(R10, Word)),
        ("r10b", RegAlias::full(R10, Byte)),
        ("r11", RegAlias::full(R11, Qword)),
        ("r11d", RegAlias::full(R11, Dword)),
        ("r11w", RegAlias::full(R11, Word)),
        ("r11b", RegAlias::full(R11, Byte)),
        ("r12", RegAlias::full(R12, Qword)),
        ("r12d", RegAlias::full(R12, Dword)),
        ("r12w", RegAlias::full(R12, Word)),
        ("r12b", RegAlias::full(R12, Byte)),
        ("r13", RegAlias::full(R13, Qword)),
        ("r13d", RegAlias::full(R13, Dword)),
        ("r13w", RegAlias::full(R13, Word)),
        ("r13b", RegAlias::full(R13, Byte)),
        ("r14", RegAlias::full(R14, Qword)),
        ("r14d", RegAlias::full(R14, Dword)),
        ("r14w", RegAlias::full(R14, Word)),
        ("r14b", RegAlias::full(R14, Byte)),
        ("r15", RegAlias::full(R15, Qword)),
        ("r15d", RegAlias::full(R15, Dword)),
        ("r15w", RegAlias::full(R15, Word)),
        ("r15b", RegAlias::full(R15, Byte)),
    ]
};
