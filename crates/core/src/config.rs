//! Configuration system for the interpreter.
//!
//! This module defines the configuration structures used to parameterize the interpreter. It
//! provides:
//! 1. **Defaults:** Stack sentinel, placeholder addresses, buffer capacities and batch size.
//! 2. **Structures:** Per-component config for the CPU model, executor, syscall simulator and
//!    controller.
//! 3. **Loading:** Deserialization from JSON text or a JSON file; every field is optional.
//!
//! Use `Config::default()` for the built-in values.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::common::ConfigError;

/// Default configuration constants.
///
/// These values are used whenever a field is absent from the supplied JSON.
mod defaults {
    /// Initial stack pointer after reset; simulates the top of the stack.
    pub const STACK_TOP: u64 = 0x7fff_0000;

    /// Number of state snapshots kept for diagnostics.
    pub const HISTORY_CAPACITY: usize = 100;

    /// Address produced by `lea` for symbolic operands that cannot be resolved.
    pub const SYMBOL_PLACEHOLDER: u64 = 0x0800_0000;

    /// Multiplier applied to the PC to approximate RIP-relative addresses.
    pub const RIP_STRIDE: u64 = 8;

    /// Upper bound on bytes read for a NUL-terminated string.
    pub const MAX_STRING_LEN: usize = 1000;

    /// First address handed out by `malloc`.
    pub const HEAP_BASE: u64 = 0x0800_1000;

    /// Where the sample prompt and format strings are seeded.
    pub const SAMPLE_DATA_BASE: u64 = 0x1000;

    /// Maximum number of trace entries retained.
    pub const TRACE_CAPACITY: usize = 1000;

    /// Steps executed by `run()` between cooperative yields.
    pub const BATCH_SIZE: usize = 100;
}

/// Root configuration.
///
/// # Examples
///
/// ```
/// use x86sim_core::config::Config;
///
/// let json = r#"{ "controller": { "batch_size": 10 }, "cpu": { "stack_top": 4096 } }"#;
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.controller.batch_size, 10);
/// assert_eq!(config.controller.trace_capacity, 1000);
/// assert_eq!(config.cpu.stack_top, 0x1000);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// CPU state model settings
    #[serde(default)]
    pub cpu: CpuConfig,
    /// Instruction executor settings
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// C library emulation settings
    #[serde(default)]
    pub syscalls: SyscallConfig,
    /// Execution controller settings
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl Config {
    /// Parses a configuration from JSON text.
    ///
    /// # Arguments
    ///
    /// * `json` - JSON object; absent sections and fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }
}

/// CPU state model settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CpuConfig {
    /// Value of RSP after reset
    #[serde(default = "CpuConfig::default_stack_top")]
    pub stack_top: u64,

    /// Snapshot ring capacity
    #[serde(default = "CpuConfig::default_history_capacity")]
    pub history_capacity: usize,
}

impl CpuConfig {
    fn default_stack_top() -> u64 {
        defaults::STACK_TOP
    }

    fn default_history_capacity() -> usize {
        defaults::HISTORY_CAPACITY
    }
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            stack_top: defaults::STACK_TOP,
            history_capacity: defaults::HISTORY_CAPACITY,
        }
    }
}

/// Instruction executor settings.
///
/// Both values are documented approximations: the interpreter has no linker, so it cannot know
/// where a symbol or a RIP-relative datum really lives.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Address used for unresolved symbolic `lea` sources
    #[serde(default = "ExecutorConfig::default_symbol_placeholder")]
    pub symbol_placeholder: u64,

    /// RIP-relative operands evaluate to `pc * rip_stride`
    #[serde(default = "ExecutorConfig::default_rip_stride")]
    pub rip_stride: u64,
}

impl ExecutorConfig {
    fn default_symbol_placeholder() -> u64 {
        defaults::SYMBOL_PLACEHOLDER
    }

    fn default_rip_stride() -> u64 {
        defaults::RIP_STRIDE
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            symbol_placeholder: defaults::SYMBOL_PLACEHOLDER,
            rip_stride: defaults::RIP_STRIDE,
        }
    }
}

/// C library emulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SyscallConfig {
    /// Maximum bytes read for one string
    #[serde(default = "SyscallConfig::default_max_string_len")]
    pub max_string_len: usize,

    /// First `malloc` address
    #[serde(default = "SyscallConfig::default_heap_base")]
    pub heap_base: u64,

    /// Base address for seeded prompt/format strings
    #[serde(default = "SyscallConfig::default_sample_data_base")]
    pub sample_data_base: u64,

    /// Seed sample strings when a program is loaded
    #[serde(default = "SyscallConfig::default_seed_sample_data")]
    pub seed_sample_data: bool,
}

impl SyscallConfig {
    fn default_max_string_len() -> usize {
        defaults::MAX_STRING_LEN
    }

    fn default_heap_base() -> u64 {
        defaults::HEAP_BASE
    }

    fn default_sample_data_base() -> u64 {
        defaults::SAMPLE_DATA_BASE
    }

    fn default_seed_sample_data() -> bool {
        true
    }
}

impl Default for SyscallConfig {
    fn default() -> Self {
        Self {
            max_string_len: defaults::MAX_STRING_LEN,
            heap_base: defaults::HEAP_BASE,
            sample_data_base: defaults::SAMPLE_DATA_BASE,
            seed_sample_data: true,
        }
    }
}

/// Execution controller settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Trace ring capacity
    #[serde(default = "ControllerConfig::default_trace_capacity")]
    pub trace_capacity: usize,

    /// Steps per batch in `run()`; zero is treated as one
    #[serde(default = "ControllerConfig::default_batch_size")]
    pub batch_size: usize,
}

impl ControllerConfig {
    fn default_trace_capacity() -> usize {
        defaults::TRACE_CAPACITY
    }

    fn default_batch_size() -> usize {
        defaults::BATCH_SIZE
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            trace_capacity: defaults::TRACE_CAPACITY,
            batch_size: defaults::BATCH_SIZE,
        }
    }
}
