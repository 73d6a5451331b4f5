//! Execution state and statistics.
//!
//! This module tracks what the controller reports about a run. It provides:
//! 1. **Execution State:** Running/paused flags, PC, instruction counters and elapsed time.
//! 2. **Instruction Mix:** Counts by category (data move, arithmetic, compare, branch,
//!    call/return, library call).
//! 3. **Reporting:** A plain-text summary printed by the CLI.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::isa::InstrClass;

/// Current wall-clock time in Unix milliseconds (0 if the clock is before 1970).
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// Controller-visible execution state.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    /// A `run()` is in progress.
    pub is_running: bool,
    /// Execution stopped at a pause request or breakpoint and can be resumed.
    pub is_paused: bool,
    /// Index of the next instruction.
    pub current_pc: usize,
    /// Instructions in the loaded program.
    pub total_instructions: usize,
    /// Instructions successfully executed since the last reset.
    pub executed_instructions: u64,
    /// Wall-clock time spent inside `run()` since the last reset.
    pub execution_time_ms: u64,
    #[serde(skip)]
    run_started: Option<Instant>,
}

impl ExecutionState {
    /// Fresh state for a program of `total_instructions`.
    pub fn new(total_instructions: usize) -> Self {
        Self {
            total_instructions,
            ..Self::default()
        }
    }

    /// Marks a run as started.
    pub fn start(&mut self) {
        self.is_running = true;
        self.is_paused = false;
        self.run_started = Some(Instant::now());
    }

    /// Marks the run as stopped, optionally paused, and folds its duration into the total.
    pub fn stop(&mut self, paused: bool) {
        if let Some(started) = self.run_started.take() {
            self.execution_time_ms += started.elapsed().as_millis() as u64;
        }
        self.is_running = false;
        self.is_paused = paused;
    }
}

/// Run statistics tracking the instruction mix.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// Successful steps plus breakpoint stops; failed steps only count as `faults`.
    pub steps: u64,
    /// Instructions executed successfully.
    pub instructions: u64,
    /// mov, movzx, lea, push, pop, cltq
    pub inst_data_move: u64,
    /// add, sub
    pub inst_arithmetic: u64,
    /// cmp
    pub inst_compare: u64,
    /// jmp, je, jne
    pub inst_branch: u64,
    /// jumps whose condition held
    pub branches_taken: u64,
    /// call, ret, leave
    pub inst_call_return: u64,
    /// nop
    pub inst_other: u64,
    /// Calls routed to the C library emulation.
    pub library_calls: u64,
    /// Steps that failed.
    pub faults: u64,
    /// Breakpoint stops.
    pub breakpoint_hits: u64,
}

impl RunStats {
    /// Counts one executed instruction.
    pub const fn record(&mut self, class: InstrClass, jumped: bool, library_call: bool) {
        self.instructions += 1;
        match class {
            InstrClass::DataMove => self.inst_data_move += 1,
            InstrClass::Arithmetic => self.inst_arithmetic += 1,
            InstrClass::Compare => self.inst_compare += 1,
            InstrClass::Branch => {
                self.inst_branch += 1;
                if jumped {
                    self.branches_taken += 1;
                }
            }
            InstrClass::CallReturn => self.inst_call_return += 1,
            InstrClass::Other => self.inst_other += 1,
        }
        if library_call {
            self.library_calls += 1;
        }
    }

    /// Prints the statistics summary to stdout.
    pub fn print(&self, state: &ExecutionState) {
        let instr = self.instructions.max(1) as f64;
        let pct = |n: u64| (n as f64 / instr) * 100.0;
        println!("\n==========================================================");
        println!("X86-64 INTERPRETER STATISTICS");
        println!("==========================================================");
        println!("host_ms                  {}", state.execution_time_ms);
        println!("steps                    {}", self.steps);
        println!("insts                    {}", self.instructions);
        println!("program_len              {}", state.total_instructions);
        println!("faults                   {}", self.faults);
        println!("breakpoint_hits          {}", self.breakpoint_hits);
        println!("----------------------------------------------------------");
        println!("INSTRUCTION MIX");
        let mix = [
            ("data_move", self.inst_data_move),
            ("arithmetic", self.inst_arithmetic),
            ("compare", self.inst_compare),
            ("branch", self.inst_branch),
            ("call_return", self.inst_call_return),
            ("other", self.inst_other),
        ];
        for (label, count) in mix {
            println!("  {label:<23}{count} ({:.2}%)", pct(count));
        }
        println!("  branches_taken         {}", self.branches_taken);
        println!("  library_calls          {}", self.library_calls);
        println!("==========================================================");
    }
}
