//! C library call emulation.
//!
//! Interpreted programs call into libc for I/O. This module emulates the handful of functions a
//! typical teaching program uses, against the interpreter's own registers and memory. It
//! provides:
//! 1. **printf / puts:** Format rendering into an output buffer the host reads.
//! 2. **scanf:** A two-phase protocol. The first call records a pending request and returns a
//!    prompt; the host answers it later with `Executor::process_user_input`, which re-invokes
//!    the handler with the text.
//! 3. **malloc / free:** A bump allocator with no reuse.
//! 4. **Memory Helpers:** NUL-terminated string reads and writes, and sample-data seeding.
//!
//! Arguments follow the System V convention: RDI, RSI, RDX carry the first three.

use serde::Serialize;
use tracing::{debug, warn};

use crate::common::constants::{ARG_REGS, KNOWN_CALL_TARGETS};
use crate::common::ExecError;
use crate::config::SyscallConfig;
use crate::core::arch::ByteMemory;
use crate::core::cpu::CpuState;

/// Strings seeded for `printf` at the sample-data base.
const PRINTF_SAMPLES: [&str; 6] = [
    "Enter your input: ",
    "Please enter a string: ",
    "Input: ",
    "%s",
    "%d",
    "",
];

/// Strings seeded for `scanf` after the `printf` samples.
const SCANF_SAMPLES: [&str; 4] = ["%s", "%d", "%c", ""];

/// Gap left after each seeded string.
const SAMPLE_PADDING: u64 = 16;

/// Spacing of the `%s` strings seeded below the sample-data base.
const LOW_FORMAT_STRIDE: u64 = 0x100;

/// Alignment of `malloc` results.
const HEAP_ALIGN: u64 = 16;

/// An emulated C library function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LibFunction {
    /// `int printf(const char *fmt, ...)`
    Printf,
    /// `int scanf(const char *fmt, ...)`
    Scanf,
    /// `int puts(const char *s)`
    Puts,
    /// `void *malloc(size_t n)`
    Malloc,
    /// `void free(void *p)`
    Free,
}

impl LibFunction {
    /// Looks up a normalized function name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "printf" => Some(Self::Printf),
            "scanf" => Some(Self::Scanf),
            "puts" => Some(Self::Puts),
            "malloc" => Some(Self::Malloc),
            "free" => Some(Self::Free),
            _ => None,
        }
    }

    /// The function's C name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Printf => "printf",
            Self::Scanf => "scanf",
            Self::Puts => "puts",
            Self::Malloc => "malloc",
            Self::Free => "free",
        }
    }
}

/// An input request waiting for the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInput {
    /// Address of the scanf format string.
    #[serde(serialize_with = "crate::common::data::decimal")]
    pub format_addr: u64,
    /// Address the converted input is written to.
    #[serde(serialize_with = "crate::common::data::decimal")]
    pub buffer_addr: u64,
    /// Human-readable prompt.
    pub prompt: String,
}

/// Outcome of one emulated library call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LibCallResult {
    /// The call did what was asked.
    pub success: bool,
    /// Value for RAX.
    pub return_value: i64,
    /// Text the call printed.
    pub output: Option<String>,
    /// The call is waiting for host input.
    pub input_required: bool,
    /// Prompt shown for the input request.
    pub input_prompt: Option<String>,
    /// Why the call failed, when it did.
    pub error: Option<ExecError>,
}

impl LibCallResult {
    fn returning(return_value: i64) -> Self {
        Self {
            success: true,
            return_value,
            ..Self::default()
        }
    }

    fn printed(text: String) -> Self {
        Self {
            success: true,
            return_value: text.len() as i64,
            output: Some(text),
            ..Self::default()
        }
    }

    fn failed(error: ExecError) -> Self {
        Self {
            success: false,
            return_value: 0,
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Emulator for the supported C library functions.
#[derive(Clone, Debug)]
pub struct SyscallSimulator {
    config: SyscallConfig,
    output: String,
    pending: Option<PendingInput>,
    heap_next: u64,
}

impl SyscallSimulator {
    /// Creates a simulator with an empty output buffer and a fresh heap.
    pub fn new(config: &SyscallConfig) -> Self {
        Self {
            config: config.clone(),
            output: String::new(),
            pending: None,
            heap_next: config.heap_base,
        }
    }

    /// Clears output, the pending request and the heap.
    pub fn reset(&mut self) {
        self.output.clear();
        self.pending = None;
        self.heap_next = self.config.heap_base;
    }

    /// Calls `func` with arguments taken from the CPU's argument registers.
    ///
    /// `scanf` is always invoked without input here; see `handle_scanf`.
    pub fn call(&mut self, func: LibFunction, cpu: &mut CpuState) -> LibCallResult {
        let args = ARG_REGS.map(|reg| cpu.read_gpr(reg));
        debug!(function = func.name(), rdi = args[0], rsi = args[1], rdx = args[2], "library call");
        match func {
            LibFunction::Printf => self.handle_printf(args[0], &args[1..], cpu),
            LibFunction::Scanf => self.handle_scanf(args[0], args[1], cpu, None),
            LibFunction::Puts => self.handle_puts(args[0], cpu),
            LibFunction::Malloc => self.handle_malloc(args[0]),
            LibFunction::Free => Self::handle_free(args[0]),
        }
    }

    /// Renders a `printf` call.
    ///
    /// `%s` and `%d` consume the next argument in order; `%d` prints the low 32 bits as a signed
    /// `int`. Also understood: `%i`, `%u`, `%x`, `%c`, the `l`/`ll` length modifiers and `%%`.
    /// Literal `\n` and `\t` escape sequences in the format are expanded.
    ///
    /// # Arguments
    ///
    /// * `format_addr` - Address of the NUL-terminated format string.
    /// * `args` - Argument register values after the format.
    /// * `memory` - Memory to read strings from.
    pub fn handle_printf<M: ByteMemory + ?Sized>(
        &mut self,
        format_addr: u64,
        args: &[u64],
        memory: &M,
    ) -> LibCallResult {
        let format = expand_escapes(&self.read_string(memory, format_addr));
        let mut rendered = String::with_capacity(format.len());
        let mut next_arg = args.iter().copied();
        let mut chars = format.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                rendered.push(c);
                continue;
            }
            let mut long = false;
            while chars.peek() == Some(&'l') {
                long = true;
                let _ = chars.next();
            }
            let Some(conv) = chars.next() else {
                rendered.push('%');
                break;
            };
            if conv == '%' {
                rendered.push('%');
                continue;
            }
            if !matches!(conv, 's' | 'd' | 'i' | 'u' | 'x' | 'c') {
                rendered.push('%');
                rendered.push(conv);
                continue;
            }
            let Some(arg) = next_arg.next() else {
                rendered.push('%');
                rendered.push(conv);
                continue;
            };
            match (conv, long) {
                ('s', _) => rendered.push_str(&self.read_string(memory, arg)),
                ('d' | 'i', false) => rendered.push_str(&(arg as u32 as i32).to_string()),
                ('d' | 'i', true) => rendered.push_str(&(arg as i64).to_string()),
                ('u', false) => rendered.push_str(&(arg as u32).to_string()),
                ('u', true) => rendered.push_str(&arg.to_string()),
                ('x', false) => rendered.push_str(&format!("{:x}", arg as u32)),
                ('x', true) => rendered.push_str(&format!("{arg:x}")),
                _ => rendered.push(char::from(arg as u8)),
            }
        }

        self.output.push_str(&rendered);
        LibCallResult::printed(rendered)
    }

    /// Handles a `scanf` call.
    ///
    /// Without `input`, records a pending request and returns an "input required" result whose
    /// prompt is derived from the format; memory is untouched. With `input`, converts it per the
    /// format and stores it at `buffer_addr`: `%s` (and an empty format) writes the bytes plus a
    /// NUL terminator, `%d` writes a 4-byte little-endian integer, `%c` writes one byte.
    ///
    /// An input that is not a number for `%d` is a failed call returning 0; execution continues.
    pub fn handle_scanf<M: ByteMemory + ?Sized>(
        &mut self,
        format_addr: u64,
        buffer_addr: u64,
        memory: &mut M,
        input: Option<&str>,
    ) -> LibCallResult {
        let format = self.read_string(memory, format_addr);

        let Some(input) = input else {
            let prompt = scanf_prompt(&format).to_string();
            debug!(%prompt, buffer = buffer_addr, "scanf waiting for input");
            self.pending = Some(PendingInput {
                format_addr,
                buffer_addr,
                prompt: prompt.clone(),
            });
            return LibCallResult {
                success: true,
                return_value: 0,
                input_required: true,
                input_prompt: Some(prompt),
                ..LibCallResult::default()
            };
        };

        if format.is_empty() || format.contains("%s") {
            write_string(memory, buffer_addr, input);
            LibCallResult::returning(1)
        } else if format.contains("%d") {
            match parse_int_prefix(input) {
                Some(value) => {
                    memory.write_le(buffer_addr, u64::from(value as u32), 4);
                    LibCallResult::returning(1)
                }
                None => {
                    warn!(input, "scanf %d received non-numeric input");
                    LibCallResult::failed(ExecError::InvalidNumericInput(input.to_string()))
                }
            }
        } else if format.contains("%c") {
            memory.write_byte(buffer_addr, input.bytes().next().unwrap_or(0));
            LibCallResult::returning(1)
        } else {
            LibCallResult::failed(ExecError::operand(&format, "unsupported scanf format"))
        }
    }

    /// Prints the string at `addr` followed by a newline.
    pub fn handle_puts<M: ByteMemory + ?Sized>(&mut self, addr: u64, memory: &M) -> LibCallResult {
        let mut text = self.read_string(memory, addr);
        text.push('\n');
        self.output.push_str(&text);
        LibCallResult {
            success: true,
            return_value: 1,
            output: Some(text),
            ..LibCallResult::default()
        }
    }

    /// Allocates `size` bytes from the bump heap.
    ///
    /// Returns NULL, leaving the heap untouched, when the request does not fit in the address
    /// space.
    pub fn handle_malloc(&mut self, size: u64) -> LibCallResult {
        let ptr = self.heap_next;
        let next = size
            .max(1)
            .div_ceil(HEAP_ALIGN)
            .checked_mul(HEAP_ALIGN)
            .and_then(|rounded| ptr.checked_add(rounded));
        let Some(next) = next else {
            warn!(size, "malloc request too large, returning NULL");
            return LibCallResult::returning(0);
        };
        self.heap_next = next;
        LibCallResult::returning(ptr as i64)
    }

    /// Accepts any pointer and returns 0.
    pub fn handle_free(_ptr: u64) -> LibCallResult {
        LibCallResult::returning(0)
    }

    /// Reads a NUL-terminated string, stopping after the configured maximum length.
    pub fn read_string<M: ByteMemory + ?Sized>(&self, memory: &M, addr: u64) -> String {
        read_string(memory, addr, self.config.max_string_len)
    }

    /// The outstanding input request, if any.
    pub const fn pending_input(&self) -> Option<&PendingInput> {
        self.pending.as_ref()
    }

    /// Removes and returns the outstanding input request.
    pub fn take_pending_input(&mut self) -> Option<PendingInput> {
        self.pending.take()
    }

    /// Everything printed since the last reset or `clear_output`.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Empties the output buffer.
    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    /// Library function conventionally found at a call-target address in unlinked objects.
    pub fn function_for_address(addr: u64) -> Option<LibFunction> {
        KNOWN_CALL_TARGETS
            .iter()
            .find(|(known, _)| *known == addr)
            .and_then(|(_, name)| LibFunction::from_name(name))
    }

    /// Writes the sample prompt and format strings.
    ///
    /// The interpreter cannot resolve `.rodata` addresses, so placeholder addresses are made to
    /// land on plausible format strings instead: the samples go at the configured base, and
    /// `%s` is written every 0x100 bytes below it.
    pub fn seed_sample_data<M: ByteMemory + ?Sized>(&self, memory: &mut M) {
        let mut addr = self.config.sample_data_base;
        for text in PRINTF_SAMPLES.iter().chain(SCANF_SAMPLES.iter()) {
            write_string(memory, addr, text);
            addr = addr.wrapping_add(text.len() as u64 + SAMPLE_PADDING);
        }
        for low in (0..self.config.sample_data_base).step_by(LOW_FORMAT_STRIDE as usize) {
            write_string(memory, low, "%s");
        }
    }
}

/// Reads a NUL-terminated string of at most `max_len` bytes.
///
/// Bytes are interpreted as UTF-8, with invalid sequences replaced.
pub fn read_string<M: ByteMemory + ?Sized>(memory: &M, addr: u64, max_len: usize) -> String {
    let bytes: Vec<u8> = (0..max_len as u64)
        .map(|i| memory.read_byte(addr.wrapping_add(i)))
        .take_while(|&b| b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Writes `text` followed by a NUL terminator.
pub fn write_string<M: ByteMemory + ?Sized>(memory: &mut M, addr: u64, text: &str) {
    memory.write_bytes(addr, text.as_bytes());
    memory.write_byte(addr.wrapping_add(text.len() as u64), 0);
}

fn expand_escapes(format: &str) -> String {
    format.replace("\\n", "\n").replace("\\t", "\t")
}

fn scanf_prompt(format: &str) -> &'static str {
    if format.is_empty() || format.contains("%s") {
        "Enter a string:"
    } else if format.contains("%d") {
        "Enter a number:"
    } else {
        "Input required"
    }
}

/// Parses a leading base-10 integer the way C's `atoi` family does: optional whitespace and
/// sign, then digits; trailing text is ignored. The value wraps to 32 bits.
fn parse_int_prefix(input: &str) -> Option<i32> {
    let trimmed = input.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().ok()?;
    let value = if negative { -magnitude } else { magnitude };
    Some(value as i32)
}
