//! Per-step result reported by the executor and the controller.

use serde::Serialize;

use crate::common::{Gpr, MemoryChange, StepError};
use crate::isa::InstrClass;
use crate::sim::syscalls::LibFunction;

/// Where control goes after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JumpTarget {
    /// Continue at this instruction index.
    Index(usize),
    /// Nothing left to run: the program has terminated.
    ProgramEnd,
}

/// Outcome of one step.
///
/// Faults, breakpoint stops and normal completion all use this shape; only faults have
/// `success == false`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// The step did not fault.
    pub success: bool,
    /// Fault details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    /// Informational note (breakpoint, completion, non-fatal library failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Registers written by the step.
    pub changed_registers: Vec<Gpr>,
    /// Bytes written by the step.
    pub changed_memory: Vec<MemoryChange>,
    /// Control did not simply fall through.
    pub jumped: bool,
    /// Next instruction index when `jumped` and the program continues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jump_target: Option<usize>,
    /// The program has finished.
    pub program_terminated: bool,
    /// Execution stopped at a breakpoint without running the instruction.
    pub breakpoint_hit: bool,
    /// Text printed by an emulated library call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syscall_output: Option<String>,
    /// An emulated `scanf` is waiting for host input.
    pub input_required: bool,
    /// Prompt for the pending input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_prompt: Option<String>,
    /// Library function the step called, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_call: Option<LibFunction>,
    /// Category of the executed instruction.
    #[serde(skip)]
    pub class: Option<InstrClass>,
}

impl ExecutionResult {
    /// A faulted step.
    pub fn failure(error: StepError) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Self::default()
        }
    }

    /// The terminal result for a PC past the end of the program.
    pub fn completed() -> Self {
        Self {
            success: true,
            program_terminated: true,
            message: Some("program execution completed".to_string()),
            ..Self::default()
        }
    }

    /// A stop at an enabled breakpoint.
    pub fn breakpoint(index: usize) -> Self {
        Self {
            success: true,
            breakpoint_hit: true,
            message: Some(format!("breakpoint hit at instruction {index}")),
            ..Self::default()
        }
    }

    /// Applies the jump decision to the result fields.
    pub(crate) const fn set_jump(&mut self, jump: Option<JumpTarget>) {
        match jump {
            Some(JumpTarget::Index(i)) => {
                self.jumped = true;
                self.jump_target = Some(i);
            }
            Some(JumpTarget::ProgramEnd) => {
                self.jumped = true;
                self.program_terminated = true;
            }
            None => {}
        }
    }
}
