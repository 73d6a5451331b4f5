//! x86-64 listing interpreter CLI.
//!
//! This binary is a thin host around the interpreter library. It performs:
//! 1. **Run:** Load a radare2/objdump listing and run it to completion, stopping at breakpoints
//!    and answering `scanf` input requests from `--input` values or stdin.
//! 2. **Parse:** Print the parsed program, or the parse errors, as JSON.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use x86sim_core::common::{ParseError, ParseFailure};
use x86sim_core::config::Config;
use x86sim_core::core::arch::RegisterFormat;
use x86sim_core::isa::{self, ParsedProgram};
use x86sim_core::sim::{ExecutionController, RunOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "x86sim",
    author,
    version,
    about = "Step-through interpreter for disassembled x86-64 listings",
    long_about = concat!(
        "Execute a radare2 or objdump listing of an x86-64 function one instruction at a time.\n",
        "\nExamples:\n",
        "  x86sim run main.asm\n",
        "  x86sim run main.asm --break 3 --input 42 --stats\n",
        "  x86sim parse main.asm",
    )
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a listing and run it to completion.
    Run {
        /// Listing file (radare2 `pdf` or `objdump -d` output).
        file: PathBuf,

        /// JSON configuration file; omitted fields keep their defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Instruction index to stop at (repeatable).
        #[arg(long = "break", value_name = "INDEX")]
        breakpoints: Vec<usize>,

        /// Answer for a `scanf` call, used in order before falling back to stdin (repeatable).
        #[arg(long = "input", value_name = "TEXT")]
        inputs: Vec<String>,

        /// Write the JSON execution export here after the run.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Print run statistics.
        #[arg(long)]
        stats: bool,

        /// Print the final register values.
        #[arg(long)]
        registers: bool,

        /// Radix for register dumps.
        #[arg(long, value_enum, default_value_t = Radix::Hex)]
        radix: Radix,
    },

    /// Parse a listing and print the result as JSON.
    Parse {
        /// Listing file.
        file: PathBuf,
    },
}

/// Register dump radix.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Radix {
    Hex,
    Dec,
    Bin,
}

impl From<Radix> for RegisterFormat {
    fn from(radix: Radix) -> Self {
        match radix {
            Radix::Hex => Self::Hex,
            Radix::Dec => Self::Decimal,
            Radix::Bin => Self::Binary,
        }
    }
}

/// JSON document printed by `parse`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParseReport<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    program: Option<&'a ParsedProgram>,
    errors: &'a [ParseError],
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            file,
            config,
            breakpoints,
            inputs,
            export,
            stats,
            registers,
            radix,
        } => {
            let options = RunOptions {
                breakpoints,
                inputs: inputs.into(),
                export,
                stats,
                registers,
                format: radix.into(),
            };
            cmd_run(&file, config.as_deref(), options).await;
        }
        Commands::Parse { file } => cmd_parse(&file),
    }
}

struct RunOptions {
    breakpoints: Vec<usize>,
    inputs: VecDeque<String>,
    export: Option<PathBuf>,
    stats: bool,
    registers: bool,
    format: RegisterFormat,
}

/// Runs a listing, resuming after breakpoints and feeding input requests until it completes.
///
/// Exits with code 1 if the listing cannot be loaded or a step faults.
async fn cmd_run(file: &Path, config_path: Option<&Path>, mut options: RunOptions) {
    let config = match config_path {
        Some(path) => Config::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }),
        None => Config::default(),
    };
    debug!(?config, "configuration");
    let listing = read_listing(file);

    let mut controller = ExecutionController::new(config);
    if let Err(failure) = controller.load_program(&listing) {
        report_parse_failure(&failure);
        process::exit(1);
    }
    for &index in &options.breakpoints {
        if index >= controller.instructions().len() {
            eprintln!(
                "[!] Ignoring breakpoint {index}: program has {} instructions",
                controller.instructions().len()
            );
        }
        controller.add_breakpoint(index);
    }

    println!(
        "[*] Loaded {} instructions{}",
        controller.instructions().len(),
        controller
            .program()
            .function_name
            .as_deref()
            .map_or_else(String::new, |name| format!(" from {name}"))
    );

    let mut printed = 0;
    let exit_code = loop {
        let outcome = controller.run().await;
        printed = flush_output(&controller, printed);
        match outcome {
            RunOutcome::Completed => {
                println!("\n[*] Program completed");
                break 0;
            }
            RunOutcome::BreakpointHit { index } => {
                let text = controller.current_instruction().map_or_else(String::new, |instr| {
                    format!("{}  {}", instr.address, instr.text())
                });
                println!("[*] Breakpoint at instruction {index}: {text}");
            }
            RunOutcome::Paused => {
                println!("[*] Paused at instruction {}", controller.pc());
                break 0;
            }
            RunOutcome::InputRequired { prompt } => {
                let answer = options
                    .inputs
                    .pop_front()
                    .unwrap_or_else(|| read_stdin_line(&prompt));
                let result = controller.process_user_input(&answer);
                if let Some(err) = result.error {
                    eprintln!("[!] Input rejected: {err}");
                }
            }
            RunOutcome::Faulted { error } => {
                eprintln!("\n[!] FATAL: {error}");
                controller.cpu().registers().dump(options.format);
                break 1;
            }
        }
    };

    if let Some(path) = &options.export {
        write_export(&controller, path);
    }
    if options.registers && exit_code == 0 {
        println!("\n[*] Registers");
        controller.cpu().registers().dump(options.format);
    }
    if options.stats {
        controller.stats().print(controller.state());
    }
    let _ = io::stdout().flush();
    process::exit(exit_code);
}

/// Prints the parsed program, or the parse errors, as JSON.
fn cmd_parse(file: &Path) {
    let listing = read_listing(file);
    let parsed = isa::parse(&listing);
    let report = match &parsed {
        Ok(program) => ParseReport {
            success: true,
            program: Some(program),
            errors: &program.errors,
        },
        Err(failure) => ParseReport {
            success: false,
            program: None,
            errors: &failure.errors,
        },
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing parse result: {e}");
            process::exit(1);
        }
    }
    if parsed.is_err() {
        process::exit(1);
    }
}

fn read_listing(file: &Path) -> String {
    fs::read_to_string(file).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", file.display());
        process::exit(1);
    })
}

fn report_parse_failure(failure: &ParseFailure) {
    eprintln!("[!] {failure}");
    for err in &failure.errors {
        eprintln!("    {err}");
    }
}

/// Prints program output produced since `printed` bytes; returns the new offset.
fn flush_output(controller: &ExecutionController, printed: usize) -> usize {
    let output = controller.syscalls().output();
    if let Some(fresh) = output.get(printed..) {
        print!("{fresh}");
        let _ = io::stdout().flush();
    }
    output.len()
}

fn read_stdin_line(prompt: &str) -> String {
    print!("{prompt} ");
    let _ = io::stdout().flush();
    let mut line = String::new();
    if let Err(e) = io::stdin().lock().read_line(&mut line) {
        eprintln!("Error reading input: {e}");
        process::exit(1);
    }
    line.trim_end_matches(['\r', '\n']).to_string()
}

fn write_export(controller: &ExecutionController, path: &Path) {
    let json = controller.export_json().unwrap_or_else(|e| {
        eprintln!("Error serializing export: {e}");
        process::exit(1);
    });
    if let Err(e) = fs::write(path, json) {
        eprintln!("Error writing {}: {e}", path.display());
        process::exit(1);
    }
    println!("[*] Export written to {}", path.display());
}
