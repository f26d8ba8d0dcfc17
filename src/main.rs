//! RV32I Emulator - CLI Entry Point
//!
//! Commands:
//! - `rv32i-emu run <image>` - Load a program image and run it until it halts
//! - `rv32i-emu demo` - Square a number by repeated addition

use clap::{Parser, Subcommand};
use rv32i::{Cpu, CpuConfig, HaltReason, RegisterFile};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rv32i-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "A software model of a 32-bit RISC-V (RV32I) CPU")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program image until it halts
    Run {
        /// Path to the image (hex text, or raw little-endian `.bin`)
        image: String,
        /// Stop after this many steps even if the program has not halted
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// JSON file with CPU configuration
        #[arg(short, long)]
        config: Option<String>,
        /// Address space size in bytes (overrides the config file)
        #[arg(long)]
        memory_size: Option<usize>,
        /// Sample video memory every N instructions, 0 to disable (overrides the config file)
        #[arg(long)]
        vram_interval: Option<u64>,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Square a number by repeated addition; the result lands in x10
    Demo {
        /// Value to square
        #[arg(short, long, default_value = "10")]
        value: u32,
    },
}

/// Final machine state, for `--json`.
#[derive(Serialize)]
struct Snapshot {
    pc: u32,
    instructions: u64,
    halt: Option<HaltReason>,
    registers: [u32; 32],
}

/// `lw x5, 1024(x0)` followed by the squaring loop.
const SQUARE_PROGRAM: [u32; 9] = [
    0x4000_2283, // lw   x5, 1024(x0)
    0x0000_0313, // addi x6, x0, 0
    0x0002_8393, // addi x7, x5, 0
    0x0003_8863, // beq  x7, x0, 16
    0x0053_0333, // add  x6, x6, x5
    0xFFF3_8393, // addi x7, x7, -1
    0xFF5F_F06F, // jal  x0, -12
    0x0003_0513, // addi x10, x6, 0
    0x0000_0000, // halt
];

const SQUARE_INPUT: u32 = 1024;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Run { image, max_cycles, config, memory_size, vram_interval, json }) => {
            let mut cpu_config = match config {
                Some(path) => load_config(&path),
                None => CpuConfig::default(),
            };
            if let Some(size) = memory_size {
                cpu_config.memory_size = size;
            }
            if let Some(interval) = vram_interval {
                cpu_config.vram_sample_interval = interval;
            }
            run_image(&image, cpu_config, max_cycles, json);
        }
        Some(Commands::Demo { value }) => {
            run_demo(value);
        }
        None => {
            println!("RV32I Emulator v0.1.0");
            println!("A software model of a 32-bit RISC-V base integer CPU");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &str) -> CpuConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("❌ Failed to read config {}: {}", path, e);
            std::process::exit(1);
        }
    };

    match serde_json::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid config {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn run_image(path: &str, config: CpuConfig, max_cycles: Option<u64>, json: bool) {
    let image = match rv32i::load_image(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    if image.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    let mut cpu = Cpu::with_config(config);
    if let Err(e) = cpu.load_program(&image.words) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }
    tracing::info!(path, words = image.len(), "loaded image");

    let result = match max_cycles {
        Some(limit) => cpu.run_limited(limit),
        None => cpu.run().map(Some),
    };

    let halt = match result {
        Ok(halt) => halt,
        Err(e) => {
            eprintln!("❌ CPU error at PC={:#010x}: {}", cpu.pc, e);
            print_registers(&cpu);
            std::process::exit(1);
        }
    };

    if json {
        let snapshot = Snapshot {
            pc: cpu.pc,
            instructions: cpu.instructions,
            halt,
            registers: cpu.regs.snapshot(),
        };
        match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!("━━━ Result ━━━");
    println!("Instructions: {}", cpu.instructions);
    match halt {
        Some(reason) => println!("Halted: {:?}", reason),
        None => println!("⚠️  Reached max cycles limit. Use --max-cycles to increase."),
    }
    print_registers(&cpu);
}

fn run_demo(value: u32) {
    let mut cpu = Cpu::new();

    if let Err(e) = cpu.bus.write32(SQUARE_INPUT, value) {
        eprintln!("❌ Failed to store input: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = cpu.load_program(&SQUARE_PROGRAM) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    match cpu.run() {
        Ok(reason) => {
            println!("Halted: {:?} after {} instructions", reason, cpu.instructions);
            println!("Result: {}² = {}", value, cpu.regs.read(10));
        }
        Err(e) => {
            eprintln!("❌ CPU error at PC={:#010x}: {}", cpu.pc, e);
            std::process::exit(1);
        }
    }
}

fn print_registers(cpu: &Cpu) {
    println!("PC: {:#010x}", cpu.pc);
    let regs = cpu.regs.snapshot();
    for row in 0..8u8 {
        let line: Vec<String> = (0..4u8)
            .map(|col| {
                let index = row * 4 + col;
                format!(
                    "x{:<2} {:>4} = {:#010x}",
                    index,
                    RegisterFile::abi_name(index),
                    regs[index as usize]
                )
            })
            .collect();
        println!("{}", line.join("  "));
    }
}
