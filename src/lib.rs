//! # RV32I Emulator
//!
//! A software model of a 32-bit RISC-V CPU implementing the RV32I base
//! integer instruction set.
//!
//! The CPU fetches instruction words through a bus from a memory split into
//! RAM, video memory, a reserved dead zone and a peripheral block, decodes
//! them into a closed instruction enum, and executes them against a 32-entry
//! register file.

pub mod cpu;
pub mod program;

// Re-export commonly used types
pub use cpu::{Cpu, CpuConfig, CpuError, CpuState, HaltReason, Instruction, Memory, RegisterFile};
pub use cpu::decode::{decode, encode};
pub use program::{load_image, parse_hex, ImageError, ProgramImage};
