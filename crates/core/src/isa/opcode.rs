//! Supported mnemonics and their handler variants.
//!
//! The interpreter implements a closed set of operations. `Opcode` names each one, and
//! `MNEMONICS` maps every accepted AT&T spelling (with or without a size suffix) onto it. The
//! dispatch table behind `lookup` is built from `MNEMONICS` once, on first use.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;

use crate::common::Width;

/// One supported operation.
///
/// `None` widths mean "unsuffixed": the width comes from the register operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// Copy source to destination.
    Mov(Option<Width>),
    /// Zero-extending move from a narrower source.
    Movzx {
        /// Source width.
        src: Width,
        /// Destination width.
        dst: Width,
    },
    /// Load effective address.
    Lea,
    /// Push a quadword.
    Push,
    /// Pop a quadword.
    Pop,
    /// Integer addition.
    Add(Option<Width>),
    /// Integer subtraction.
    Sub(Option<Width>),
    /// Compare: subtraction that only updates flags.
    Cmp(Option<Width>),
    /// Sign-extend EAX into RAX.
    Cltq,
    /// Unconditional jump.
    Jmp,
    /// Jump if ZF is set.
    Je,
    /// Jump if ZF is clear.
    Jne,
    /// Call a function or emulated library routine.
    Call,
    /// Return to the caller.
    Ret,
    /// Tear down the stack frame.
    Leave,
    /// No operation.
    Nop,
}

/// Broad instruction category for statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrClass {
    /// mov, movzx, lea, push, pop, cltq
    DataMove,
    /// add, sub
    Arithmetic,
    /// cmp
    Compare,
    /// jmp, je, jne
    Branch,
    /// call, ret, leave
    CallReturn,
    /// nop
    Other,
}

impl Opcode {
    /// Number of operands the handler requires.
    pub const fn arity(self) -> usize {
        match self {
            Self::Mov(_)
            | Self::Movzx { .. }
            | Self::Lea
            | Self::Add(_)
            | Self::Sub(_)
            | Self::Cmp(_) => 2,
            Self::Push | Self::Pop | Self::Jmp | Self::Je | Self::Jne | Self::Call => 1,
            Self::Cltq | Self::Ret | Self::Leave | Self::Nop => 0,
        }
    }

    /// Statistics category.
    pub const fn class(self) -> InstrClass {
        match self {
            Self::Mov(_) | Self::Movzx { .. } | Self::Lea | Self::Push | Self::Pop | Self::Cltq => {
                InstrClass::DataMove
            }
            Self::Add(_) | Self::Sub(_) => InstrClass::Arithmetic,
            Self::Cmp(_) => InstrClass::Compare,
            Self::Jmp | Self::Je | Self::Jne => InstrClass::Branch,
            Self::Call | Self::Ret | Self::Leave => InstrClass::CallReturn,
            Self::Nop => InstrClass::Other,
        }
    }
}

/// Every accepted mnemonic spelling.
pub const MNEMONICS: &[(&str, Opcode)] = &[
    ("mov", Opcode::Mov(None)),
    ("movb", Opcode::Mov(Some(Width::Byte))),
    ("movw", Opcode::Mov(Some(Width::Word))),
    ("movl", Opcode::Mov(Some(Width::Dword))),
    ("movq", Opcode::Mov(Some(Width::Qword))),
    ("movabs", Opcode::Mov(Some(Width::Qword))),
    ("movabsq", Opcode::Mov(Some(Width::Qword))),
    (
        "movzbw",
        Opcode::Movzx {
            src: Width::Byte,
            dst: Width::Word,
        },
    ),
    (
        "movzbl",
        Opcode::Movzx {
            src: Width::Byte,
            dst: Width::Dword,
        },
    ),
    (
        "movzbq",
        Opcode::Movzx {
            src: Width::Byte,
            dst: Width::Qword,
        },
    ),
    (
        "movzwl",
        Opcode::Movzx {
            src: Width::Word,
            dst: Width::Dword,
        },
    ),
    (
        "movzwq",
        Opcode::Movzx {
            src: Width::Word,
            dst: Width::Qword,
        },
    ),
    ("lea", Opcode::Lea),
    ("leaq", Opcode::Lea),
    ("push", Opcode::Push),
    ("pushq", Opcode::Push),
    ("pop", Opcode::Pop),
    ("popq", Opcode::Pop),
    ("add", Opcode::Add(None)),
    ("addb", Opcode::Add(Some(Width::Byte))),
    ("addw", Opcode::Add(Some(Width::Word))),
    ("addl", Opcode::Add(Some(Width::Dword))),
    ("addq", Opcode::Add(Some(Width::Qword))),
    ("sub", Opcode::Sub(None)),
    ("subb", Opcode::Sub(Some(Width::Byte))),
    ("subw", Opcode::Sub(Some(Width::Word))),
    ("subl", Opcode::Sub(Some(Width::Dword))),
    ("subq", Opcode::Sub(Some(Width::Qword))),
    ("cmp", Opcode::Cmp(None)),
    ("cmpb", Opcode::Cmp(Some(Width::Byte))),
    ("cmpw", Opcode::Cmp(Some(Width::Word))),
    ("cmpl", Opcode::Cmp(Some(Width::Dword))),
    ("cmpq", Opcode::Cmp(Some(Width::Qword))),
    ("cltq", Opcode::Cltq),
    ("cdqe", Opcode::Cltq),
    ("jmp", Opcode::Jmp),
    ("jmpq", Opcode::Jmp),
    ("je", Opcode::Je),
    ("jz", Opcode::Je),
    ("jne", Opcode::Jne),
    ("jnz", Opcode::Jne),
    ("call", Opcode::Call),
    ("callq", Opcode::Call),
    ("ret", Opcode::Ret),
    ("retq", Opcode::Ret),
    ("leave", Opcode::Leave),
    ("leaveq", Opcode::Leave),
    ("nop", Opcode::Nop),
    ("nopw", Opcode::Nop),
    ("nopl", Opcode::Nop),
];

static DISPATCH: LazyLock<HashMap<&'static str, Opcode>> =
    LazyLock::new(|| MNEMONICS.iter().copied().collect());

/// Looks up a mnemonic, ignoring case.
pub fn lookup(mnemonic: &str) -> Option<Opcode> {
    if mnemonic.bytes().any(|b| b.is_ascii_uppercase()) {
        DISPATCH.get(mnemonic.to_ascii_lowercase().as_str()).copied()
    } else {
        DISPATCH.get(mnemonic).copied()
    }
}

/// Comma-separated list of every accepted mnemonic, for error messages.
pub fn supported_list() -> String {
    MNEMONICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}
