//! RFLAGS subset: ZF, SF, CF and OF.
//!
//! Only the four status flags the supported instructions read or write are modelled. ZF and SF
//! are derived from the truncated result; CF and OF need the operands and are only recomputed
//! for additions and subtractions.

use serde::Serialize;

use crate::common::Width;

/// The operation whose result is being reflected into the flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlagOp {
    /// Addition of `lhs + rhs`.
    Add {
        /// First operand.
        lhs: u64,
        /// Second operand.
        rhs: u64,
    },
    /// Subtraction of `lhs - rhs` (also used by `cmp`).
    Sub {
        /// Minuend.
        lhs: u64,
        /// Subtrahend.
        rhs: u64,
    },
    /// Any other flag-setting operation; CF and OF keep their values.
    Other,
}

/// Status flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Flags {
    /// Zero flag.
    pub zf: bool,
    /// Sign flag.
    pub sf: bool,
    /// Carry flag.
    pub cf: bool,
    /// Overflow flag.
    pub of: bool,
}

impl Flags {
    /// Updates the flags for a result of the given width.
    ///
    /// # Arguments
    ///
    /// * `result` - The operation's result; bits above `width` are ignored.
    /// * `width` - Operand width of the instruction.
    /// * `op` - The operation and its operands, for CF/OF.
    pub fn update(&mut self, result: u64, width: Width, op: FlagOp) {
        let truncated = width.truncate(result);
        self.zf = truncated == 0;
        self.sf = truncated & width.sign_bit() != 0;

        match op {
            FlagOp::Add { lhs, rhs } => {
                let unsigned = width.truncate(lhs) as u128 + width.truncate(rhs) as u128;
                self.cf = unsigned > width.mask() as u128;
                let signed = width.sign_extend(lhs) as i128 + width.sign_extend(rhs) as i128;
                self.of = signed < width.signed_min() || signed > width.signed_max();
            }
            FlagOp::Sub { lhs, rhs } => {
                self.cf = width.truncate(lhs) < width.truncate(rhs);
                let signed = width.sign_extend(lhs) as i128 - width.sign_extend(rhs) as i128;
                self.of = signed < width.signed_min() || signed > width.signed_max();
            }
            FlagOp::Other => {}
        }
    }

    /// Clears every flag.
    pub const fn clear(&mut self) {
        *self = Self {
            zf: false,
            sf: false,
            cf: false,
            of: false,
        };
    }
}
