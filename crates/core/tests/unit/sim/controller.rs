//! # Execution Controller Tests
//!
//! Loading, stepping, the batched async run loop, breakpoints, input requests, pausing, reset,
//! the trace, and the debug and export views.

use std::pin::pin;
use std::task::{Context, Waker};
use std::time::Duration;

use pretty_assertions::assert_eq;
use x86sim_core::common::{ExecError, Gpr, InstrAddr};
use x86sim_core::config::Config;
use x86sim_core::sim::syscalls::read_string;
use x86sim_core::sim::{ExecutionController, RunOutcome, Status};

use crate::common::listing::addr;
use crate::common::{TestContext, init_tracing, radare2};

const COUNT_TO_THREE: [&str; 4] = [
    "addl $1, %eax ; <top>",
    "cmpl $3, %eax",
    "jne top",
    "nop",
];

fn controller(instructions: &[&str]) -> ExecutionController {
    TestContext::new().load(&radare2(instructions)).controller
}

#[test]
fn test_load_program() {
    let ctrl = controller(&["nop", "ret"]);
    assert_eq!(ctrl.instructions().len(), 2);
    assert_eq!(ctrl.program().function_name.as_deref(), Some("main"));
    assert_eq!(ctrl.pc(), 0);
    assert_eq!(ctrl.status(), Status::Idle);
    assert_eq!(ctrl.state().total_instructions, 2);
    assert_eq!(ctrl.current_instruction().unwrap().mnemonic, "nop");
}

#[test]
fn test_failed_load_keeps_previous_program() {
    let mut ctrl = controller(&["nop", "ret"]);
    let failure = ctrl
        .load_program("main.o:     file format elf64-x86-64\n")
        .unwrap_err();

    assert!(!failure.errors.is_empty());
    assert_eq!(ctrl.instructions().len(), 2);
}

#[test]
fn test_load_replaces_state() {
    let mut ctrl = controller(&["movq $1, %rax"]);
    ctrl.add_breakpoint(0);
    let _ = ctrl.step();
    let _ = ctrl.step();

    ctrl.load_program(&radare2(&["nop"])).unwrap();
    assert_eq!(ctrl.cpu().read_gpr(Gpr::Rax), 0);
    assert!(ctrl.breakpoints().is_empty());
    assert!(ctrl.trace().is_empty());
    assert_eq!(ctrl.pc(), 0);
}

#[test]
fn test_step_advances_and_completes() {
    let mut ctrl = controller(&["movq $1, %rax", "nop"]);

    assert!(ctrl.step().success);
    assert_eq!(ctrl.pc(), 1);
    assert!(ctrl.step().success);
    assert_eq!(ctrl.pc(), 2);
    assert_eq!(ctrl.status(), Status::Completed);

    let done = ctrl.step();
    assert!(done.success);
    assert!(done.program_terminated);
    assert!(!done.jumped);
    assert_eq!(ctrl.state().executed_instructions, 2);
}

#[test]
fn test_step_on_empty_controller() {
    let mut ctrl = ExecutionController::default();
    let result = ctrl.step();
    assert!(result.program_terminated);
    assert_eq!(ctrl.status(), Status::Idle);
}

#[test]
fn test_fault_does_not_advance() {
    let mut ctrl = controller(&["nop", "imul %eax, %ebx", "nop"]);
    let _ = ctrl.step();
    let fault = ctrl.step();

    assert!(!fault.success);
    assert_eq!(ctrl.pc(), 1);
    assert_eq!(ctrl.stats().faults, 1);
    assert_eq!(ctrl.stats().steps, 1);
    assert_eq!(ctrl.trace().len(), 1);
}

#[test]
fn test_step_stops_at_breakpoint_once() {
    let mut ctrl = controller(&["nop", "movq $4, %rbx", "nop"]);
    ctrl.add_breakpoint(1);
    let _ = ctrl.step();

    let stop = ctrl.step();
    assert!(stop.success);
    assert!(stop.breakpoint_hit);
    assert_eq!(ctrl.pc(), 1);
    assert_eq!(ctrl.cpu().read_gpr(Gpr::Rbx), 0);
    assert_eq!(ctrl.status(), Status::Paused);

    let resumed = ctrl.step();
    assert!(!resumed.breakpoint_hit);
    assert_eq!(ctrl.cpu().read_gpr(Gpr::Rbx), 4);
    assert_eq!(ctrl.pc(), 2);
    assert_eq!(ctrl.status(), Status::Idle);
}

#[test]
fn test_fault_after_breakpoint_does_not_rearm_it() {
    let mut ctrl = controller(&["nop", "imul %eax, %ebx"]);
    ctrl.add_breakpoint(1);
    let _ = ctrl.step();
    assert!(ctrl.step().breakpoint_hit);

    for _ in 0..2 {
        let fault = ctrl.step();
        assert!(!fault.success);
        assert!(!fault.breakpoint_hit);
        assert_eq!(ctrl.pc(), 1);
    }
    assert_eq!(ctrl.stats().faults, 2);
    assert_eq!(ctrl.stats().steps, 2);
    assert_eq!(ctrl.stats().breakpoint_hits, 1);
    assert_eq!(ctrl.state().executed_instructions, 1);
}

#[tokio::test]
async fn test_run_to_completion() {
    let mut ctrl = controller(&COUNT_TO_THREE);
    assert_eq!(ctrl.run().await, RunOutcome::Completed);

    assert_eq!(ctrl.cpu().read_gpr(Gpr::Rax), 3);
    assert_eq!(ctrl.pc(), 4);
    assert_eq!(ctrl.status(), Status::Completed);
    assert!(!ctrl.state().is_running);

    let stats = ctrl.stats();
    assert_eq!(stats.instructions, 10);
    assert_eq!(stats.inst_arithmetic, 3);
    assert_eq!(stats.inst_compare, 3);
    assert_eq!(stats.inst_branch, 3);
    assert_eq!(stats.branches_taken, 2);
    assert_eq!(stats.inst_other, 1);
}

#[tokio::test]
async fn test_breakpoint_hits_once_per_run() {
    let mut ctrl = controller(&["nop", "nop", "nop", "movq $1, %rax", "nop"]);
    ctrl.add_breakpoint(3);

    assert_eq!(ctrl.run().await, RunOutcome::BreakpointHit { index: 3 });
    assert_eq!(ctrl.pc(), 3);
    assert_eq!(ctrl.cpu().read_gpr(Gpr::Rax), 0);
    assert_eq!(ctrl.status(), Status::Paused);

    assert_eq!(ctrl.run().await, RunOutcome::Completed);
    assert_eq!(ctrl.cpu().read_gpr(Gpr::Rax), 1);
    assert_eq!(ctrl.stats().breakpoint_hits, 1);
}

#[tokio::test]
async fn test_breakpoint_inside_loop() {
    let mut ctrl = controller(&COUNT_TO_THREE);
    ctrl.add_breakpoint(0);

    let mut stops = Vec::new();
    loop {
        match ctrl.run().await {
            RunOutcome::BreakpointHit { index } => {
                stops.push((index, ctrl.cpu().read_gpr(Gpr::Rax)));
            }
            RunOutcome::Completed => break,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(stops, vec![(0, 0), (0, 1), (0, 2)]);
    assert_eq!(ctrl.cpu().read_gpr(Gpr::Rax), 3);
}

#[tokio::test]
async fn test_disabled_breakpoint() {
    let mut ctrl = controller(&["nop", "nop"]);
    ctrl.toggle_breakpoint(1);
    assert!(ctrl.breakpoints()[0].enabled);

    ctrl.toggle_breakpoint(1);
    assert!(!ctrl.breakpoints()[0].enabled);
    assert_eq!(ctrl.run().await, RunOutcome::Completed);
}

#[tokio::test]
async fn test_conditional_breakpoint_stops_unconditionally() {
    let mut ctrl = controller(&["nop", "movq $1, %rax", "nop"]);
    ctrl.add_conditional_breakpoint(1, "rax == 5");
    assert_eq!(ctrl.breakpoints()[0].condition.as_deref(), Some("rax == 5"));

    assert_eq!(ctrl.run().await, RunOutcome::BreakpointHit { index: 1 });
    let doc: serde_json::Value = serde_json::from_str(&ctrl.export_json().unwrap()).unwrap();
    assert_eq!(doc["breakpoints"][0]["condition"], "rax == 5");

    assert_eq!(ctrl.run().await, RunOutcome::Completed);
}

#[test]
fn test_breakpoint_management() {
    let mut ctrl = controller(&["nop", "nop", "nop"]);
    ctrl.add_breakpoint(2);
    ctrl.add_breakpoint(0);
    ctrl.add_breakpoint(7);

    let bps = ctrl.breakpoints();
    assert_eq!(bps.iter().map(|bp| bp.index).collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(bps[1].address, InstrAddr::new(addr(2)));

    ctrl.remove_breakpoint(0);
    assert_eq!(ctrl.breakpoints().len(), 1);
    ctrl.clear_breakpoints();
    assert!(ctrl.breakpoints().is_empty());
}

#[tokio::test]
async fn test_fault_stops_run() {
    let mut ctrl = controller(&["movq $1, %rax", "mov %foo, %rax", "movq $2, %rax"]);
    match ctrl.run().await {
        RunOutcome::Faulted { error } => {
            assert_eq!(error.kind, ExecError::UnknownRegister("%foo".to_string()));
            assert_eq!(error.mnemonic, "mov");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(ctrl.pc(), 1);
    assert_eq!(ctrl.cpu().read_gpr(Gpr::Rax), 1);
    assert_eq!(ctrl.status(), Status::Idle);
}

#[tokio::test]
async fn test_run_waits_for_input() {
    let mut ctx = TestContext::new().load(&radare2(&[
        "movl $0x3000, %edi",
        "movl $0x3100, %esi",
        "call scanf",
        "movl $0x3100, %edi",
        "call puts",
    ]));
    ctx.write_str(0x3000, "%s");

    let outcome = ctx.controller.run().await;
    assert_eq!(
        outcome,
        RunOutcome::InputRequired {
            prompt: "Enter a string:".to_string()
        }
    );
    assert_eq!(ctx.controller.status(), Status::Paused);
    assert_eq!(ctx.pc(), 3);
    assert!(ctx.controller.debug_info().pending_input.is_some());

    let result = ctx.controller.process_user_input("alice");
    assert!(result.success);
    assert_eq!(ctx.controller.run().await, RunOutcome::Completed);
    assert_eq!(ctx.output(), "alice\n");
}

#[tokio::test]
async fn test_small_batches() {
    let mut config = Config::default();
    config.controller.batch_size = 1;
    let mut ctx = TestContext::with_config(config).load(&radare2(&COUNT_TO_THREE));

    assert_eq!(ctx.controller.run().await, RunOutcome::Completed);
    assert_eq!(ctx.reg("rax"), 3);
}

#[test]
fn test_pause_between_batches() {
    let mut ctrl = controller(&["jmp 0x1000"]);
    assert!(ctrl.begin_run());
    assert_eq!(ctrl.status(), Status::Running);
    assert!(ctrl.run_batch().is_none());

    ctrl.pause_handle().request();
    assert_eq!(ctrl.run_batch(), Some(RunOutcome::Paused));
    assert_eq!(ctrl.status(), Status::Paused);
    assert!(!ctrl.pause_handle().is_requested());
}

#[test]
fn test_begin_run_twice_requests_pause() {
    let mut ctrl = controller(&["jmp 0x1000"]);
    assert!(ctrl.begin_run());
    assert!(!ctrl.begin_run());
    assert!(ctrl.pause_handle().is_requested());
    assert_eq!(ctrl.run_batch(), Some(RunOutcome::Paused));

    ctrl.pause();
    assert_eq!(ctrl.status(), Status::Paused);
}

#[test]
fn test_pause_stops_running_state() {
    let mut ctrl = controller(&["jmp 0x1000"]);
    ctrl.pause();
    assert_eq!(ctrl.status(), Status::Idle);

    assert!(ctrl.begin_run());
    ctrl.pause();
    assert_eq!(ctrl.status(), Status::Paused);
}

#[test]
fn test_abandoned_run_leaves_controller_paused() {
    let mut ctrl = controller(&["jmp 0x1000"]);
    {
        let mut run = pin!(ctrl.run());
        let mut cx = Context::from_waker(Waker::noop());
        assert!(run.as_mut().poll(&mut cx).is_pending());
    }

    assert!(!ctrl.state().is_running);
    assert_eq!(ctrl.status(), Status::Paused);
    assert!(ctrl.state().executed_instructions > 0);
    assert!(ctrl.begin_run());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pause_from_another_task() {
    init_tracing();
    let mut ctrl = controller(&["jmp 0x1000"]);
    let handle = ctrl.pause_handle();

    let task = tokio::spawn(async move {
        let outcome = ctrl.run().await;
        (outcome, ctrl)
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.request();

    let (outcome, ctrl) = task.await.unwrap();
    assert_eq!(outcome, RunOutcome::Paused);
    assert_eq!(ctrl.status(), Status::Paused);
    assert!(ctrl.state().executed_instructions > 0);
}

#[tokio::test]
async fn test_reset_restores_initial_state() {
    let mut ctx = TestContext::new().load(&radare2(&[
        "movq $0x1234, %rbx",
        "movl $7, -0x8(%rsp)",
        "movl $0x3000, %edi",
        "call puts",
        "nop",
    ]));
    ctx.controller.add_breakpoint(4);
    ctx.write_str(0x3000, "bye");
    let stack = ctx.reg("rsp");

    assert_eq!(ctx.controller.run().await, RunOutcome::BreakpointHit { index: 4 });
    assert_eq!(ctx.output(), "bye\n");

    ctx.controller.reset();
    assert_eq!(ctx.pc(), 0);
    assert_eq!(ctx.reg("rbx"), 0);
    assert_eq!(ctx.reg("rsp"), stack);
    assert_eq!(ctx.mem(stack - 8, 4), 0);
    assert_eq!(ctx.mem(0x3000, 1), 0);
    assert_eq!(ctx.output(), "");
    assert!(ctx.controller.trace().is_empty());
    assert_eq!(ctx.controller.state().executed_instructions, 0);
    assert_eq!(ctx.controller.stats().instructions, 0);
    assert_eq!(ctx.controller.status(), Status::Idle);
    assert_eq!(ctx.controller.breakpoints().len(), 1);
    assert_eq!(
        read_string(ctx.cpu(), 0x1000, 100),
        "Enter your input: "
    );
    assert!(ctx.cpu().changed_registers().is_empty());

    assert_eq!(ctx.controller.run().await, RunOutcome::BreakpointHit { index: 4 });
}

#[test]
fn test_reset_without_sample_data() {
    let mut config = Config::default();
    config.syscalls.seed_sample_data = false;
    let ctx = TestContext::with_config(config).load(&radare2(&["nop"]));
    assert!(ctx.cpu().memory().is_empty());
}

#[test]
fn test_trace() {
    let mut ctrl = controller(&["movq $1, %rax", "movl $2, -0x8(%rsp)", "nop"]);
    let _ = ctrl.step();
    let _ = ctrl.step();

    let entries: Vec<_> = ctrl.trace().iter().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].step, 1);
    assert_eq!(entries[0].pc, 0);
    assert_eq!(entries[0].address, InstrAddr::new(addr(0)));
    assert_eq!(entries[1].address, InstrAddr::new(addr(1)));
    assert_eq!(entries[0].instruction, "movq $1, %rax");
    assert_eq!(entries[0].changed_registers, vec![Gpr::Rax]);
    assert_eq!(entries[1].changed_memory.len(), 4);
    assert_eq!(ctrl.trace().last().unwrap().pc, 1);

    ctrl.clear_trace();
    assert!(ctrl.trace().is_empty());
}

#[test]
fn test_trace_capacity() {
    let mut config = Config::default();
    config.controller.trace_capacity = 2;
    let mut ctx = TestContext::with_config(config).load(&radare2(&["nop", "nop", "nop"]));
    let _ = ctx.step_ok(3);

    let steps: Vec<u64> = ctx.controller.trace().iter().map(|e| e.step).collect();
    assert_eq!(steps, vec![2, 3]);
}

#[test]
fn test_debug_info() {
    let mut ctrl = controller(&["pushq $5", "nop"]);
    let _ = ctrl.step();
    let info = ctrl.debug_info();

    assert_eq!(info.pc, 1);
    assert_eq!(info.instruction.as_deref(), Some("nop"));
    assert_eq!(info.registers.len(), 16);
    assert_eq!(info.stack.len(), 16);
    assert_eq!(info.stack[0].value, 5);
    assert_eq!(info.changed_registers, vec![Gpr::Rsp]);
    assert_eq!(info.changed_memory.len(), 8);
    assert_eq!(info.history_len, 1);
    assert!(info.pending_input.is_none());
}

#[tokio::test]
async fn test_export_json() {
    let mut ctx = TestContext::new().load(&radare2(&[
        "movl $0x3000, %edi",
        "call puts",
    ]));
    ctx.write_str(0x3000, "ok");
    ctx.controller.add_breakpoint(1);
    let _ = ctx.controller.run().await;
    let _ = ctx.controller.run().await;

    let json = ctx.controller.export_json().unwrap();
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(doc["functionName"], "main");
    assert_eq!(doc["instructions"].as_array().unwrap().len(), 2);
    assert_eq!(doc["instructions"][0]["address"], "00001000");
    assert_eq!(doc["trace"].as_array().unwrap().len(), 2);
    assert_eq!(doc["output"], "ok\n");
    assert_eq!(doc["breakpoints"][0]["index"], 1);
    assert!(doc["breakpoints"][0]["condition"].is_null());
    assert_eq!(doc["trace"][1]["address"], "00001004");
    assert_eq!(doc["stats"]["libraryCalls"], 1);
    assert_eq!(doc["state"]["executedInstructions"], 2);
    assert!(doc["registers"].as_array().is_some());
}
