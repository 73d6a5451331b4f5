//! Instruction Executor.
//!
//! This module applies one parsed instruction to the CPU state. It performs the following:
//! 1. **Dispatch:** Mnemonics resolve through the shared opcode table to a closed handler set.
//! 2. **Validation:** Operand counts and destination kinds are checked before any state changes.
//! 3. **Semantics:** Data movement, arithmetic with flags, compares, jumps, calls, returns and
//!    frame teardown.
//! 4. **Library Calls:** Calls to emulated C functions are routed to the syscall simulator,
//!    including the two-phase `scanf` input protocol.
//!
//! Failures never panic; they come back as an `ExecutionResult` with `success == false`.

/// Jumps, calls, returns and target resolution.
pub mod branch;

/// Operand decoding, effective addresses and width inference.
pub mod operands;

/// Step result types.
pub mod result;

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, error, trace, warn};

use self::operands::{Location, decode, decode_dest, effective_address, frame_address, read, write};
use self::result::{ExecutionResult, JumpTarget};
use crate::common::constants::{RETURN_REG, STACK_SLOT};
use crate::common::{ExecError, Gpr, InstrAddr, RegAlias, StepError, Width};
use crate::config::ExecutorConfig;
use crate::core::arch::FlagOp;
use crate::core::cpu::CpuState;
use crate::isa::opcode;
use crate::isa::operand;
use crate::isa::{Instruction, Opcode, ParsedProgram, compile};
use crate::sim::syscalls::{LibCallResult, LibFunction, SyscallSimulator};

/// `<name>` or `<name+0x1f>` in a trailing comment.
static COMMENT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"<([^>+]+)(\+0x[0-9a-fA-F]+)?>"));

/// Executes instructions against a `CpuState`.
///
/// Holds the address and label maps of the loaded program and the per-step jump and
/// library-call state.
#[derive(Clone, Debug)]
pub struct Executor {
    config: ExecutorConfig,
    address_map: BTreeMap<InstrAddr, usize>,
    labels: HashMap<String, usize>,
    jump: Option<JumpTarget>,
    library: Option<(LibFunction, LibCallResult)>,
    stubbed_call: bool,
}

impl Executor {
    /// Creates an executor with no program loaded.
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            config: config.clone(),
            address_map: BTreeMap::new(),
            labels: HashMap::new(),
            jump: None,
            library: None,
            stubbed_call: false,
        }
    }

    /// Installs the address and label maps for a program.
    ///
    /// Labels come from every `<name>` or `<name+0xNN>` in trailing comments, mapped to the
    /// index of the commented instruction (the last occurrence wins). The function name, with
    /// and without a `sym.` prefix, maps to index 0 unless a comment already named it.
    pub fn set_instructions(&mut self, program: &ParsedProgram) {
        self.address_map.clear();
        self.labels.clear();
        for (i, instr) in program.instructions.iter().enumerate() {
            let _ = self.address_map.insert(instr.address, i);
            if let Some(comment) = &instr.comment {
                for caps in COMMENT_LABEL.captures_iter(comment) {
                    let _ = self.labels.insert(caps[1].to_string(), i);
                }
            }
        }
        if let Some(name) = &program.function_name {
            let _ = self.labels.entry(name.clone()).or_insert(0);
            if let Some(bare) = name.strip_prefix("sym.") {
                let _ = self.labels.entry(bare.to_string()).or_insert(0);
            }
        }
        trace!(
            instructions = self.address_map.len(),
            labels = self.labels.len(),
            "executor maps built"
        );
    }

    /// Index of the instruction at `addr`.
    pub fn address_index(&self, addr: InstrAddr) -> Option<usize> {
        self.address_map.get(&addr).copied()
    }

    /// Executes one instruction.
    ///
    /// Clears change tracking and the jump state, saves a snapshot, then dispatches on the
    /// mnemonic. The CPU's `pc` must already hold the instruction's index.
    ///
    /// # Arguments
    ///
    /// * `instr` - The instruction to execute.
    /// * `cpu` - State to mutate.
    /// * `syscalls` - C library emulation for `call`.
    ///
    /// # Returns
    ///
    /// The step's outcome. On failure no destination has been written.
    pub fn execute_instruction(
        &mut self,
        instr: &Instruction,
        cpu: &mut CpuState,
        syscalls: &mut SyscallSimulator,
    ) -> ExecutionResult {
        cpu.clear_change_tracking();
        self.jump = None;
        self.library = None;
        self.stubbed_call = false;
        cpu.save_snapshot();

        debug!(pc = cpu.pc, address = %instr.address, text = %instr.text(), "execute");

        match self.dispatch(instr, cpu, syscalls) {
            Ok(opcode) => self.success_result(opcode, cpu),
            Err(kind) => {
                let err = StepError::new(&instr.mnemonic, &instr.operands, kind);
                error!(pc = cpu.pc, address = %instr.address, "{err}");
                ExecutionResult::failure(err)
            }
        }
    }

    /// Completes a pending `scanf` with host input.
    ///
    /// Writes the converted value to the pending buffer, sets RAX to the conversion count and
    /// clears the request.
    ///
    /// # Returns
    ///
    /// A result listing the registers and bytes written. Fails with `NoPendingInput` when
    /// nothing is waiting, or `InvalidNumericInput` when `%d` input is not a number; the
    /// request is cleared either way.
    pub fn process_user_input(
        &mut self,
        input: &str,
        cpu: &mut CpuState,
        syscalls: &mut SyscallSimulator,
    ) -> ExecutionResult {
        cpu.clear_change_tracking();
        self.jump = None;
        self.library = None;
        let Some(pending) = syscalls.take_pending_input() else {
            return ExecutionResult::failure(StepError::new(
                LibFunction::Scanf.name(),
                &[],
                ExecError::NoPendingInput,
            ));
        };
        let result =
            syscalls.handle_scanf(pending.format_addr, pending.buffer_addr, cpu, Some(input));
        cpu.write_gpr(RETURN_REG, result.return_value as u64);
        debug!(input, count = result.return_value, "scanf input applied");

        ExecutionResult {
            success: result.success,
            error: result
                .error
                .map(|kind| StepError::new(LibFunction::Scanf.name(), &[], kind)),
            changed_registers: cpu.changed_registers(),
            changed_memory: cpu.changed_memory(),
            library_call: Some(LibFunction::Scanf),
            ..ExecutionResult::default()
        }
    }

    fn dispatch(
        &mut self,
        instr: &Instruction,
        cpu: &mut CpuState,
        syscalls: &mut SyscallSimulator,
    ) -> Result<Opcode, ExecError> {
        let opcode = opcode::lookup(&instr.mnemonic).ok_or_else(|| {
            ExecError::UnsupportedInstruction {
                mnemonic: instr.mnemonic.clone(),
                supported: opcode::supported_list(),
            }
        })?;
        let ops = &instr.operands;
        if ops.len() < opcode.arity() {
            return Err(ExecError::OperandCount {
                mnemonic: instr.mnemonic.clone(),
                required: opcode.arity(),
                found: ops.len(),
            });
        }

        match opcode {
            Opcode::Mov(width) => self.exec_mov(ops, width, cpu)?,
            Opcode::Movzx { src, dst } => self.exec_movzx(ops, src, dst, cpu)?,
            Opcode::Lea => self.exec_lea(ops, cpu)?,
            Opcode::Push => self.exec_push(ops, cpu)?,
            Opcode::Pop => self.exec_pop(ops, cpu)?,
            Opcode::Add(width) => self.exec_arith(ops, width, cpu, false)?,
            Opcode::Sub(width) => self.exec_arith(ops, width, cpu, true)?,
            Opcode::Cmp(width) => self.exec_cmp(ops, width, cpu)?,
            Opcode::Cltq => exec_cltq(cpu),
            Opcode::Jmp => self.exec_jump(instr)?,
            Opcode::Je => {
                if cpu.flags.zf {
                    self.exec_jump(instr)?;
                }
            }
            Opcode::Jne => {
                if !cpu.flags.zf {
                    self.exec_jump(instr)?;
                }
            }
            Opcode::Call => self.exec_call(instr, cpu, syscalls)?,
            Opcode::Ret => self.exec_ret(cpu),
            Opcode::Leave => exec_leave(cpu),
            Opcode::Nop => {}
        }
        Ok(opcode)
    }

    fn success_result(&mut self, opcode: Opcode, cpu: &CpuState) -> ExecutionResult {
        let mut result = ExecutionResult {
            success: true,
            changed_registers: cpu.changed_registers(),
            changed_memory: cpu.changed_memory(),
            class: Some(opcode.class()),
            ..ExecutionResult::default()
        };
        result.set_jump(self.jump);

        if let Some((func, call)) = self.library.take() {
            result.library_call = Some(func);
            result.syscall_output = call.output;
            result.input_required = call.input_required;
            result.input_prompt = call.input_prompt;
            result.message = call.error.map(|e| format!("{}: {e}", func.name()));
        } else if self.stubbed_call {
            result.message = Some("unknown call target treated as a library call".to_string());
        }
        result
    }

    fn exec_mov(
        &self,
        ops: &[String],
        width: Option<Width>,
        cpu: &mut CpuState,
    ) -> Result<(), ExecError> {
        let src = decode(&ops[0], &self.config, cpu)?;
        let dst = decode_dest(&ops[1], &self.config, cpu)?;
        let width = op_width(ops, width);
        let value = read(cpu, src, width);
        write(cpu, dst, value, width);
        Ok(())
    }

    fn exec_movzx(
        &self,
        ops: &[String],
        src_width: Width,
        dst_width: Width,
        cpu: &mut CpuState,
    ) -> Result<(), ExecError> {
        let src = decode(&ops[0], &self.config, cpu)?;
        let dst = decode_dest(&ops[1], &self.config, cpu)?;
        let value = src_width.truncate(read(cpu, src, src_width));
        write(cpu, dst, value, dst_width);
        Ok(())
    }

    fn exec_lea(&self, ops: &[String], cpu: &mut CpuState) -> Result<(), ExecError> {
        let dst = decode_dest(&ops[1], &self.config, cpu)?;
        let Location::Reg(alias) = dst else {
            return Err(ExecError::operand(ops[1].trim(), "lea destination must be a register"));
        };
        let addr = self.lea_address(&ops[0], cpu)?;
        cpu.write_alias(alias, addr);
        Ok(())
    }

    /// Address computed by `lea` for its source operand.
    ///
    /// Absolute numbers are taken as-is, memory operands go through effective-address
    /// arithmetic, frame slots are RBP-relative, and anything symbolic gets the configured
    /// placeholder address.
    fn lea_address(&self, text: &str, cpu: &CpuState) -> Result<u64, ExecError> {
        let t = text.trim();
        if let Some(n) = operand::parse_number(t) {
            return Ok(n as u64);
        }
        if t.contains('(') || t.to_ascii_lowercase().contains("%rip") {
            return effective_address(t, &self.config, cpu);
        }
        if let Some(offset) = operand::parse_frame_slot(t) {
            return Ok(frame_address(cpu, offset));
        }
        warn!(
            operand = t,
            placeholder = self.config.symbol_placeholder,
            "symbolic lea operand, using placeholder address"
        );
        Ok(self.config.symbol_placeholder)
    }

    fn exec_push(&self, ops: &[String], cpu: &mut CpuState) -> Result<(), ExecError> {
        let src = decode(&ops[0], &self.config, cpu)?;
        let value = read(cpu, src, Width::Qword);
        cpu.push(value, STACK_SLOT);
        Ok(())
    }

    fn exec_pop(&self, ops: &[String], cpu: &mut CpuState) -> Result<(), ExecError> {
        let dst = decode_dest(&ops[0], &self.config, cpu)?;
        let value = cpu.pop(STACK_SLOT);
        write(cpu, dst, value, Width::Qword);
        Ok(())
    }

    fn exec_arith(
        &self,
        ops: &[String],
        width: Option<Width>,
        cpu: &mut CpuState,
        subtract: bool,
    ) -> Result<(), ExecError> {
        let src = decode(&ops[0], &self.config, cpu)?;
        let dst = decode_dest(&ops[1], &self.config, cpu)?;
        let width = op_width(ops, width);
        let lhs = width.truncate(read(cpu, operands::Operand::Loc(dst), width));
        let rhs = width.truncate(read(cpu, src, width));
        let (result, op) = if subtract {
            (lhs.wrapping_sub(rhs), FlagOp::Sub { lhs, rhs })
        } else {
            (lhs.wrapping_add(rhs), FlagOp::Add { lhs, rhs })
        };
        write(cpu, dst, result, width);
        cpu.update_flags(width.truncate(result), width, op);
        Ok(())
    }

    /// `cmp src1, src2` sets flags from `src2 - src1` and writes nothing.
    fn exec_cmp(
        &self,
        ops: &[String],
        width: Option<Width>,
        cpu: &mut CpuState,
    ) -> Result<(), ExecError> {
        let src1 = decode(&ops[0], &self.config, cpu)?;
        let src2 = decode(&ops[1], &self.config, cpu)?;
        let width = op_width(ops, width);
        let lhs = width.truncate(read(cpu, src2, width));
        let rhs = width.truncate(read(cpu, src1, width));
        cpu.update_flags(lhs.wrapping_sub(rhs), width, FlagOp::Sub { lhs, rhs });
        Ok(())
    }
}

fn op_width(ops: &[String], explicit: Option<Width>) -> Width {
    explicit.unwrap_or_else(|| operands::infer_width(ops))
}

fn exec_cltq(cpu: &mut CpuState) {
    let eax = RegAlias {
        gpr: Gpr::Rax,
        width: Width::Dword,
        high: false,
    };
    let value = Width::Dword.sign_extend(cpu.read_alias(eax));
    cpu.write_gpr(Gpr::Rax, value as u64);
}

fn exec_leave(cpu: &mut CpuState) {
    let rbp = cpu.read_gpr(Gpr::Rbp);
    cpu.write_gpr(Gpr::Rsp, rbp);
    let saved = cpu.pop(STACK_SLOT);
    cpu.write_gpr(Gpr::Rbp, saved);
}
