//! # C Library Emulation Tests
//!
//! Direct tests of the `printf`/`scanf`/`puts`/`malloc`/`free` handlers, plus programs that
//! reach them through `call`.

use pretty_assertions::assert_eq;
use rstest::rstest;
use x86sim_core::common::ExecError;
use x86sim_core::config::SyscallConfig;
use x86sim_core::core::arch::{ByteMemory, Memory};
use x86sim_core::sim::syscalls::{read_string, write_string};
use x86sim_core::sim::{LibFunction, SyscallSimulator};

use crate::common::{TestContext, radare2};

const FORMAT: u64 = 0x3000;
const BUFFER: u64 = 0x3100;
const FRAME: u64 = 0x5000;

fn simulator() -> SyscallSimulator {
    SyscallSimulator::new(&SyscallConfig::default())
}

fn memory_with(addr: u64, text: &str) -> Memory {
    let mut mem = Memory::new();
    write_string(&mut mem, addr, text);
    mem
}

#[test]
fn test_printf_conversions() {
    let mut mem = memory_with(FORMAT, "x=%d y=%s %x %c %% %lu\\n");
    write_string(&mut mem, BUFFER, "str");
    let mut sys = simulator();

    let args = [(-5i64) as u64, BUFFER, 255, u64::from(b'A'), u64::MAX];
    let result = sys.handle_printf(FORMAT, &args, &mem);

    let expected = "x=-5 y=str ff A % 18446744073709551615\n";
    assert!(result.success);
    assert_eq!(result.output.as_deref(), Some(expected));
    assert_eq!(result.return_value, expected.len() as i64);
    assert_eq!(sys.output(), expected);
}

#[rstest]
#[case("%d", 0x1_0000_0005, "5")]
#[case("%d", 0xffff_ffff, "-1")]
#[case("%ld", 0xffff_ffff, "4294967295")]
#[case("%i|%u", 0xffff_fffe, "-2|%u")]
#[case("%q", 1, "%q")]
#[case("100%", 1, "100%")]
#[case("tab\\there", 0, "tab\there")]
fn test_printf_edge_cases(#[case] format: &str, #[case] arg: u64, #[case] expected: &str) {
    let mem = memory_with(FORMAT, format);
    let mut sys = simulator();
    let result = sys.handle_printf(FORMAT, &[arg], &mem);
    assert_eq!(result.output.as_deref(), Some(expected));
}

#[test]
fn test_output_accumulates() {
    let mem = memory_with(FORMAT, "a");
    let mut sys = simulator();
    let _ = sys.handle_printf(FORMAT, &[], &mem);
    let _ = sys.handle_puts(FORMAT, &mem);
    assert_eq!(sys.output(), "aa\n");

    sys.clear_output();
    assert_eq!(sys.output(), "");
}

#[test]
fn test_puts() {
    let mem = memory_with(FORMAT, "hello");
    let mut sys = simulator();
    let result = sys.handle_puts(FORMAT, &mem);
    assert_eq!(result.return_value, 1);
    assert_eq!(result.output.as_deref(), Some("hello\n"));
}

#[test]
fn test_malloc_bumps_aligned() {
    let mut sys = simulator();
    assert_eq!(sys.handle_malloc(1).return_value, 0x0800_1000);
    assert_eq!(sys.handle_malloc(0).return_value, 0x0800_1010);
    assert_eq!(sys.handle_malloc(33).return_value, 0x0800_1020);
    assert_eq!(sys.handle_malloc(8).return_value, 0x0800_1050);

    sys.reset();
    assert_eq!(sys.handle_malloc(8).return_value, 0x0800_1000);
    assert_eq!(SyscallSimulator::handle_free(0x0800_1000).return_value, 0);
}

#[test]
fn test_malloc_too_large_returns_null() {
    let mut sys = simulator();
    assert_eq!(sys.handle_malloc(u64::MAX).return_value, 0);
    assert_eq!(sys.handle_malloc(u64::MAX - 0x0800_0000).return_value, 0);
    assert_eq!(sys.handle_malloc(16).return_value, 0x0800_1000);
    assert_eq!(sys.handle_malloc(16).return_value, 0x0800_1010);
}

#[test]
fn test_sample_data_low_formats_stop_at_base() {
    let config = SyscallConfig {
        sample_data_base: 0x200,
        ..SyscallConfig::default()
    };
    let mut mem = Memory::new();
    SyscallSimulator::new(&config).seed_sample_data(&mut mem);

    assert_eq!(read_string(&mem, 0x0, 100), "%s");
    assert_eq!(read_string(&mem, 0x100, 100), "%s");
    assert_eq!(read_string(&mem, 0x200, 100), "Enter your input: ");
}

#[test]
fn test_scanf_requests_input() {
    let mut mem = memory_with(FORMAT, "%d");
    let mut sys = simulator();

    let result = sys.handle_scanf(FORMAT, BUFFER, &mut mem, None);
    assert!(result.success);
    assert!(result.input_required);
    assert_eq!(result.input_prompt.as_deref(), Some("Enter a number:"));
    assert_eq!(result.return_value, 0);
    assert_eq!(mem.read_le(BUFFER, 4), 0);

    let pending = sys.pending_input().unwrap();
    assert_eq!(pending.buffer_addr, BUFFER);
    assert_eq!(pending.format_addr, FORMAT);
    assert_eq!(pending.prompt, "Enter a number:");
}

#[rstest]
#[case("%d", "42", &[42, 0, 0, 0])]
#[case("%d", "  -17abc", &[0xef, 0xff, 0xff, 0xff])]
#[case("%s", "hi there", b"hi there\0")]
#[case("", "x", b"x\0")]
#[case("%s", "", b"\0")]
#[case("%c", "zebra", b"z")]
fn test_scanf_conversions(#[case] format: &str, #[case] input: &str, #[case] stored: &[u8]) {
    let mut mem = memory_with(FORMAT, format);
    let mut sys = simulator();
    let result = sys.handle_scanf(FORMAT, BUFFER, &mut mem, Some(input));

    assert!(result.success);
    assert_eq!(result.return_value, 1);
    assert_eq!(mem.dump(BUFFER, stored.len()), stored.to_vec());
}

#[test]
fn test_scanf_rejects_non_numeric() {
    let mut mem = memory_with(FORMAT, "%d");
    let mut sys = simulator();
    let result = sys.handle_scanf(FORMAT, BUFFER, &mut mem, Some("abc"));

    assert!(!result.success);
    assert_eq!(result.return_value, 0);
    assert_eq!(result.error, Some(ExecError::InvalidNumericInput("abc".to_string())));
    assert_eq!(mem.read_le(BUFFER, 4), 0);
}

#[test]
fn test_scanf_unsupported_format() {
    let mut mem = memory_with(FORMAT, "%f");
    let mut sys = simulator();
    let result = sys.handle_scanf(FORMAT, BUFFER, &mut mem, Some("1.5"));
    assert!(!result.success);
    assert!(matches!(result.error, Some(ExecError::OperandFormat { .. })));
}

#[test]
fn test_string_length_limit() {
    let config = SyscallConfig {
        max_string_len: 4,
        ..SyscallConfig::default()
    };
    let sys = SyscallSimulator::new(&config);
    let mem = memory_with(FORMAT, "abcdef");

    assert_eq!(sys.read_string(&mem, FORMAT), "abcd");
    assert_eq!(read_string(&mem, FORMAT, 100), "abcdef");
    assert_eq!(read_string(&mem, 0x9999, 100), "");
}

#[test]
fn test_sample_data() {
    let mut mem = Memory::new();
    simulator().seed_sample_data(&mut mem);

    assert_eq!(read_string(&mem, 0x1000, 100), "Enter your input: ");
    assert_eq!(read_string(&mem, 0, 100), "%s");
    assert_eq!(read_string(&mem, 0x300, 100), "%s");
    assert_eq!(mem.read_byte(0x3000), 0);
}

#[test]
fn test_function_lookup() {
    assert_eq!(LibFunction::from_name("printf"), Some(LibFunction::Printf));
    assert_eq!(LibFunction::from_name("free"), Some(LibFunction::Free));
    assert_eq!(LibFunction::from_name("strlen"), None);
    assert_eq!(LibFunction::Malloc.name(), "malloc");

    assert_eq!(SyscallSimulator::function_for_address(0x1c), Some(LibFunction::Printf));
    assert_eq!(SyscallSimulator::function_for_address(0x37), Some(LibFunction::Scanf));
    assert_eq!(SyscallSimulator::function_for_address(0x20), None);
}

#[test]
fn test_printf_call_in_program() {
    let mut ctx = TestContext::new().load(&radare2(&[
        "movl $0x3000, %edi",
        "movl $0x2a, %esi",
        "call sym.imp.printf",
        "nop",
    ]));
    ctx.write_str(FORMAT, "%d\n");
    let top = ctx.reg("rsp");
    let results = ctx.step_ok(3);

    let call = &results[2];
    assert_eq!(call.library_call, Some(LibFunction::Printf));
    assert_eq!(call.syscall_output.as_deref(), Some("42\n"));
    assert_eq!(call.jump_target, Some(3));
    assert_eq!(ctx.output(), "42\n");
    assert_eq!(ctx.reg("rax"), 3);
    assert_eq!(ctx.reg("rsp"), top);
    assert_eq!(ctx.pc(), 3);
}

#[test]
fn test_scanf_call_in_program() {
    let mut ctx = TestContext::new().load(&radare2(&[
        "movl $0x3000, %edi",
        "leaq -0x4(%rbp), %rsi",
        "call __isoc99_scanf",
        "movl -0x4(%rbp), %eax",
    ]));
    ctx.write_str(FORMAT, "%d");
    ctx.set_reg("rbp", FRAME);
    let results = ctx.step_ok(3);

    let call = &results[2];
    assert!(call.input_required);
    assert_eq!(call.input_prompt.as_deref(), Some("Enter a number:"));
    assert_eq!(ctx.reg("rax"), 0);
    assert_eq!(ctx.pc(), 3);

    let input = ctx.controller.process_user_input("123");
    assert!(input.success);
    assert_eq!(input.library_call, Some(LibFunction::Scanf));
    assert_eq!(input.changed_memory.len(), 4);
    assert_eq!(ctx.reg("rax"), 1);
    assert!(ctx.controller.syscalls().pending_input().is_none());

    let _ = ctx.step_ok(1);
    assert_eq!(ctx.reg("rax"), 123);
}

#[test]
fn test_scanf_bad_input_in_program() {
    let mut ctx = TestContext::new().load(&radare2(&[
        "movl $0x3000, %edi",
        "movl $0x3100, %esi",
        "call scanf",
    ]));
    ctx.write_str(FORMAT, "%d");
    let _ = ctx.step_ok(3);

    let input = ctx.controller.process_user_input("twelve");
    assert!(!input.success);
    assert_eq!(
        input.error.unwrap().kind,
        ExecError::InvalidNumericInput("twelve".to_string())
    );
    assert_eq!(ctx.reg("rax"), 0);
    assert!(ctx.controller.syscalls().pending_input().is_none());
}

#[test]
fn test_puts_through_relocation() {
    let listing = "0000000000000000 <main>:
   0:\tbf 00 30 00 00       \tmov    $0x3000,%edi
   5:\te8 00 00 00 00       \tcall   a <main+0xa>
\t\t\t6: R_X86_64_PLT32\tputs-0x4
   a:\tb8 00 00 00 00       \tmov    $0x0,%eax
";
    let mut ctx = TestContext::new().load(listing);
    ctx.write_str(FORMAT, "hello");
    let results = ctx.step_ok(2);

    assert_eq!(results[1].library_call, Some(LibFunction::Puts));
    assert_eq!(ctx.output(), "hello\n");
    assert_eq!(ctx.reg("rax"), 1);
    assert_eq!(ctx.pc(), 2);
}

#[test]
fn test_call_to_known_placeholder_address() {
    let listing = "0000000000000000 <main>:
   0:\tbf 00 30 00 00       \tmov    $0x3000,%edi
   5:\te8 00 00 00 00       \tcall   1c <main+0x1c>
   a:\tc3                   \tret
";
    let mut ctx = TestContext::new().load(listing);
    ctx.write_str(FORMAT, "Hi");
    let results = ctx.step_ok(2);

    assert_eq!(results[1].library_call, Some(LibFunction::Printf));
    assert_eq!(ctx.output(), "Hi");
    assert_eq!(ctx.pc(), 2);
}

#[test]
fn test_huge_malloc_in_program() {
    let mut ctx = TestContext::new().load(&radare2(&[
        "movq $-1, %rdi",
        "call malloc",
        "movq %rax, %rbx",
        "movl $8, %edi",
        "call malloc",
    ]));
    let _ = ctx.step_ok(5);
    assert_eq!(ctx.reg("rbx"), 0);
    assert_eq!(ctx.reg("rax"), 0x0800_1000);
}

#[test]
fn test_malloc_and_free_in_program() {
    let mut ctx = TestContext::new().load(&radare2(&[
        "movl $0x20, %edi",
        "call malloc",
        "movq %rax, %rbx",
        "movl $5, %edi",
        "call sym.imp.malloc",
        "movq %rax, %rdi",
        "call free",
    ]));
    let _ = ctx.step_ok(5);
    assert_eq!(ctx.reg("rbx"), 0x0800_1000);
    assert_eq!(ctx.reg("rax"), 0x0800_1020);

    let results = ctx.step_ok(2);
    assert_eq!(results[1].library_call, Some(LibFunction::Free));
    assert_eq!(ctx.reg("rax"), 0);
}
