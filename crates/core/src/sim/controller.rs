//! Execution Controller.
//!
//! This module drives a loaded program. It coordinates the following:
//! 1. **Loading:** Parses a listing and installs a fresh CPU, executor and syscall simulator.
//! 2. **Stepping:** Executes one instruction, advancing the PC, trace and counters.
//! 3. **Running:** A batched loop that yields to the async runtime between batches and stops on
//!    faults, termination, breakpoints, input requests or a pause request.
//! 4. **Debugging:** Breakpoints, trace access, debug snapshots and the JSON export.
//!
//! Status moves between idle, running, paused and completed. Only `run()` is asynchronous; every
//! other operation completes before returning.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::syscalls::{PendingInput, SyscallSimulator};
use super::trace::{TraceEntry, TraceLog};
use crate::common::{Gpr, InstrAddr, MemoryChange, ParseFailure, StepError};
use crate::config::Config;
use crate::core::arch::{Flags, Memory};
use crate::core::cpu::{CpuState, StackSlot};
use crate::core::exec::Executor;
use crate::core::exec::result::ExecutionResult;
use crate::isa::{Instruction, ParsedProgram, parse};
use crate::stats::{ExecutionState, RunStats, epoch_millis};

/// Quadwords shown in the debug stack view.
const STACK_VIEW_DEPTH: usize = 16;

/// Coarse controller status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Loaded (or empty) and not started.
    Idle,
    /// Inside `run()`.
    Running,
    /// Stopped by a pause, breakpoint or input request; can be resumed.
    Paused,
    /// The PC is past the last instruction.
    Completed,
}

/// Why `run()` returned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RunOutcome {
    /// The program finished.
    Completed,
    /// Stopped before executing the instruction at `index`.
    BreakpointHit {
        /// Instruction index of the breakpoint.
        index: usize,
    },
    /// A pause was requested.
    Paused,
    /// `scanf` is waiting; call `process_user_input` then run again.
    InputRequired {
        /// Prompt for the host.
        prompt: String,
    },
    /// A step failed.
    Faulted {
        /// The failing step.
        error: StepError,
    },
}

/// A clonable handle that requests a pause of an in-flight `run()`.
#[derive(Clone, Debug, Default)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    /// Asks the running loop to stop before its next step.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a pause is pending.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A breakpoint on an instruction index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    /// Instruction index.
    pub index: usize,
    /// Address of the instruction, for display.
    pub address: InstrAddr,
    /// Disabled breakpoints are kept but never stop execution.
    pub enabled: bool,
    /// Condition text supplied by the host. Stored and exported, never evaluated.
    pub condition: Option<String>,
}

/// A register and its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RegisterValue {
    /// Register.
    pub name: Gpr,
    /// Full 64-bit value.
    #[serde(serialize_with = "crate::common::data::decimal")]
    pub value: u64,
}

/// A point-in-time view for debuggers.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    /// Controller status.
    pub status: Status,
    /// Index of the next instruction.
    pub pc: usize,
    /// Text of the next instruction, if any.
    pub instruction: Option<String>,
    /// All general-purpose registers.
    pub registers: Vec<RegisterValue>,
    /// Status flags.
    pub flags: Flags,
    /// Quadwords at and above RSP.
    pub stack: Vec<StackSlot>,
    /// Registers written by the last step.
    pub changed_registers: Vec<Gpr>,
    /// Bytes written by the last step.
    pub changed_memory: Vec<MemoryChange>,
    /// Pending `scanf` request.
    pub pending_input: Option<PendingInput>,
    /// Snapshots held in the history ring.
    pub history_len: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    function_name: Option<&'a str>,
    instructions: &'a [Instruction],
    trace: &'a TraceLog,
    registers: Vec<RegisterValue>,
    flags: Flags,
    memory: Vec<MemoryChange>,
    breakpoints: Vec<&'a Breakpoint>,
    output: &'a str,
    state: &'a ExecutionState,
    stats: &'a RunStats,
}

/// Owns and drives one loaded program.
#[derive(Debug)]
pub struct ExecutionController {
    config: Config,
    program: ParsedProgram,
    cpu: CpuState,
    executor: Executor,
    syscalls: SyscallSimulator,
    pc: usize,
    breakpoints: BTreeMap<usize, Breakpoint>,
    trace: TraceLog,
    state: ExecutionState,
    stats: RunStats,
    pause: PauseHandle,
    resume_from: Option<usize>,
}

impl ExecutionController {
    /// Creates a controller with no program loaded.
    pub fn new(config: Config) -> Self {
        Self {
            cpu: CpuState::new(&config.cpu),
            executor: Executor::new(&config.executor),
            syscalls: SyscallSimulator::new(&config.syscalls),
            trace: TraceLog::new(config.controller.trace_capacity),
            program: ParsedProgram::default(),
            pc: 0,
            breakpoints: BTreeMap::new(),
            state: ExecutionState::default(),
            stats: RunStats::default(),
            pause: PauseHandle::default(),
            resume_from: None,
            config,
        }
    }

    /// Parses and installs a program.
    ///
    /// On success the CPU, executor and syscall simulator are replaced, breakpoints are cleared
    /// and everything is reset. Sample strings are seeded into memory when configured.
    ///
    /// # Errors
    ///
    /// Returns the aggregated parse failure; the previously loaded program is left untouched.
    pub fn load_program(&mut self, text: &str) -> Result<(), ParseFailure> {
        let program = parse(text).inspect_err(|e| warn!(errors = e.errors.len(), "load failed"))?;
        info!(
            instructions = program.len(),
            function = program.function_name.as_deref().unwrap_or("?"),
            skipped = program.errors.len(),
            "program loaded"
        );

        self.cpu = CpuState::new(&self.config.cpu);
        self.executor = Executor::new(&self.config.executor);
        self.syscalls = SyscallSimulator::new(&self.config.syscalls);
        self.executor.set_instructions(&program);
        self.program = program;
        self.breakpoints.clear();
        self.reset();
        Ok(())
    }

    /// Executes one instruction.
    ///
    /// # Returns
    ///
    /// * A terminal "completed" result, with no state change, when the PC is past the end.
    /// * A breakpoint result, with no state change, when an enabled breakpoint sits at the PC
    ///   and the previous stop was not this same breakpoint.
    /// * Otherwise the executor's result. On success the PC moves to the jump target, to PC + 1,
    ///   or past the end on termination, and a paused controller leaves the paused status. On
    ///   failure nothing moves and only the fault counter changes.
    pub fn step(&mut self) -> ExecutionResult {
        let Some(instr) = self.program.instructions.get(self.pc) else {
            self.state.current_pc = self.pc;
            return ExecutionResult::completed();
        };

        if self.resume_from != Some(self.pc) && self.breakpoint_enabled(self.pc) {
            self.resume_from = Some(self.pc);
            self.stats.steps += 1;
            self.stats.breakpoint_hits += 1;
            self.state.is_paused = true;
            info!(index = self.pc, address = %instr.address, "breakpoint hit");
            return ExecutionResult::breakpoint(self.pc);
        }

        self.cpu.pc = self.pc;
        let result = self
            .executor
            .execute_instruction(instr, &mut self.cpu, &mut self.syscalls);
        if !result.success {
            self.stats.faults += 1;
            return result;
        }

        self.resume_from = None;
        self.stats.steps += 1;
        self.state.executed_instructions += 1;
        self.trace.push(TraceEntry {
            step: self.state.executed_instructions,
            pc: self.pc,
            address: instr.address,
            instruction: instr.text(),
            changed_registers: result.changed_registers.clone(),
            changed_memory: result.changed_memory.clone(),
            timestamp_ms: epoch_millis(),
        });
        if let Some(class) = result.class {
            self.stats
                .record(class, result.jumped, result.library_call.is_some());
        }

        self.pc = if result.program_terminated {
            self.program.len()
        } else {
            result.jump_target.unwrap_or(self.pc + 1)
        };
        self.state.current_pc = self.pc;
        self.state.is_paused = false;
        debug!(next_pc = self.pc, jumped = result.jumped, "step complete");
        result
    }

    /// Prepares a run, or requests a pause if one is already in progress.
    ///
    /// # Returns
    ///
    /// `true` if a run was started.
    pub fn begin_run(&mut self) -> bool {
        if self.state.is_running {
            self.pause.request();
            return false;
        }
        self.pause.clear();
        self.state.start();
        info!(pc = self.pc, "run started");
        true
    }

    /// Executes up to one batch of steps.
    ///
    /// # Returns
    ///
    /// `Some(outcome)` when the run stopped, `None` when the batch finished and the run should
    /// continue after yielding.
    pub fn run_batch(&mut self) -> Option<RunOutcome> {
        let batch = self.config.controller.batch_size.max(1);
        for _ in 0..batch {
            if self.pause.take() {
                self.state.stop(true);
                info!(pc = self.pc, "run paused");
                return Some(RunOutcome::Paused);
            }
            if self.pc >= self.program.len() {
                return Some(self.finish());
            }

            let result = self.step();
            if let Some(error) = result.error {
                self.state.stop(false);
                return Some(RunOutcome::Faulted { error });
            }
            if result.breakpoint_hit {
                self.state.stop(true);
                return Some(RunOutcome::BreakpointHit { index: self.pc });
            }
            if result.input_required {
                self.state.stop(true);
                let prompt = result.input_prompt.unwrap_or_default();
                info!(prompt = %prompt, "run waiting for input");
                return Some(RunOutcome::InputRequired { prompt });
            }
            if result.program_terminated {
                return Some(self.finish());
            }
        }
        None
    }

    /// Runs until the program stops, yielding to the runtime after every batch.
    ///
    /// If a run is already in progress this requests a pause instead and returns `Paused`.
    ///
    /// Dropping the future mid-run leaves the controller paused rather than running.
    pub async fn run(&mut self) -> RunOutcome {
        if !self.begin_run() {
            return RunOutcome::Paused;
        }
        let guard = RunGuard(self);
        loop {
            if let Some(outcome) = guard.0.run_batch() {
                return outcome;
            }
            tokio::task::yield_now().await;
        }
    }

    fn finish(&mut self) -> RunOutcome {
        self.pc = self.pc.min(self.program.len());
        self.state.current_pc = self.pc;
        self.state.stop(false);
        info!(
            executed = self.state.executed_instructions,
            elapsed_ms = self.state.execution_time_ms,
            "program completed"
        );
        RunOutcome::Completed
    }

    /// Stops a run in progress.
    pub fn pause(&mut self) {
        if self.state.is_running {
            self.pause.clear();
            self.state.stop(true);
            info!(pc = self.pc, "paused");
        }
    }

    /// A handle that can pause `run()` from another task.
    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    /// Returns to the start of the loaded program.
    ///
    /// Zeroes the PC, counters and trace, resets the CPU and syscall simulator, and reseeds
    /// sample data. Breakpoints are kept.
    pub fn reset(&mut self) {
        self.pause.clear();
        self.pc = 0;
        self.resume_from = None;
        self.cpu.reset();
        self.syscalls.reset();
        self.trace.clear();
        self.state = ExecutionState::new(self.program.len());
        self.stats = RunStats::default();
        if self.config.syscalls.seed_sample_data {
            self.syscalls.seed_sample_data(&mut self.cpu);
        }
        self.cpu.clear_change_tracking();
        debug!("controller reset");
    }

    /// Completes a pending `scanf` with host input.
    pub fn process_user_input(&mut self, text: &str) -> ExecutionResult {
        let result = self
            .executor
            .process_user_input(text, &mut self.cpu, &mut self.syscalls);
        if let Some(err) = &result.error {
            warn!(input = text, "{err}");
        }
        result
    }

    /// Adds an enabled breakpoint; out-of-range indices are ignored.
    pub fn add_breakpoint(&mut self, index: usize) {
        self.insert_breakpoint(index, None);
    }

    /// Adds an enabled breakpoint carrying a condition.
    ///
    /// The condition is kept for display and export only; the breakpoint stops unconditionally.
    pub fn add_conditional_breakpoint(&mut self, index: usize, condition: &str) {
        self.insert_breakpoint(index, Some(condition.to_string()));
    }

    fn insert_breakpoint(&mut self, index: usize, condition: Option<String>) {
        if let Some(instr) = self.program.instructions.get(index) {
            let _ = self.breakpoints.insert(
                index,
                Breakpoint {
                    index,
                    address: instr.address,
                    enabled: true,
                    condition,
                },
            );
        }
    }

    /// Removes a breakpoint.
    pub fn remove_breakpoint(&mut self, index: usize) {
        let _ = self.breakpoints.remove(&index);
    }

    /// Enables or disables a breakpoint, adding it enabled if absent.
    pub fn toggle_breakpoint(&mut self, index: usize) {
        match self.breakpoints.get_mut(&index) {
            Some(bp) => bp.enabled = !bp.enabled,
            None => self.add_breakpoint(index),
        }
    }

    /// Removes every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Breakpoints in index order.
    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.values().cloned().collect()
    }

    fn breakpoint_enabled(&self, index: usize) -> bool {
        self.breakpoints.get(&index).is_some_and(|bp| bp.enabled)
    }

    /// Executed steps, oldest first.
    pub const fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Empties the trace.
    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// Current status.
    pub fn status(&self) -> Status {
        if self.state.is_running {
            Status::Running
        } else if self.state.is_paused {
            Status::Paused
        } else if !self.program.is_empty() && self.pc >= self.program.len() {
            Status::Completed
        } else {
            Status::Idle
        }
    }

    /// A debugger view of the current state.
    pub fn debug_info(&self) -> DebugInfo {
        DebugInfo {
            status: self.status(),
            pc: self.pc,
            instruction: self.current_instruction().map(Instruction::text),
            registers: register_values(&self.cpu),
            flags: self.cpu.flags,
            stack: self.cpu.stack_view(STACK_VIEW_DEPTH),
            changed_registers: self.cpu.changed_registers(),
            changed_memory: self.cpu.changed_memory(),
            pending_input: self.syscalls.pending_input().cloned(),
            history_len: self.cpu.history().len(),
        }
    }

    /// Serializes the program, trace, final state and statistics as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        let doc = ExportDocument {
            function_name: self.program.function_name.as_deref(),
            instructions: &self.program.instructions,
            trace: &self.trace,
            registers: register_values(&self.cpu),
            flags: self.cpu.flags,
            memory: memory_contents(self.cpu.memory()),
            breakpoints: self.breakpoints.values().collect(),
            output: self.syscalls.output(),
            state: &self.state,
            stats: &self.stats,
        };
        serde_json::to_string_pretty(&doc)
    }

    /// The instruction at the PC.
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.program.instructions.get(self.pc)
    }

    /// Index of the next instruction.
    pub const fn pc(&self) -> usize {
        self.pc
    }

    /// The loaded program.
    pub const fn program(&self) -> &ParsedProgram {
        &self.program
    }

    /// Loaded instructions.
    pub fn instructions(&self) -> &[Instruction] {
        &self.program.instructions
    }

    /// CPU state.
    pub const fn cpu(&self) -> &CpuState {
        &self.cpu
    }

    /// Mutable CPU state, for hosts that edit registers or memory between steps.
    pub const fn cpu_mut(&mut self) -> &mut CpuState {
        &mut self.cpu
    }

    /// C library emulation, including the accumulated program output.
    pub const fn syscalls(&self) -> &SyscallSimulator {
        &self.syscalls
    }

    /// Execution state.
    pub const fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Run statistics.
    pub const fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Configuration in use.
    pub const fn config(&self) -> &Config {
        &self.config
    }
}

/// Marks an abandoned `run()` as paused.
struct RunGuard<'a>(&'a mut ExecutionController);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.0.state.is_running {
            self.0.state.stop(true);
            warn!(pc = self.0.pc, "run abandoned, controller paused");
        }
    }
}

impl Default for ExecutionController {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn register_values(cpu: &CpuState) -> Vec<RegisterValue> {
    cpu.registers()
        .iter()
        .map(|(name, value)| RegisterValue { name, value })
        .collect()
}

fn memory_contents(memory: &Memory) -> Vec<MemoryChange> {
    memory
        .iter()
        .map(|(addr, value)| MemoryChange::new(addr, value))
        .collect()
}
