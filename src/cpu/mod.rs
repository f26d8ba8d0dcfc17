//! RV32I CPU model.
//!
//! This module implements the base integer instruction set:
//! - 32 general-purpose registers with x0 hard-wired to zero
//! - A 640 KiB region-mapped address space reached through a bus
//! - Decoding of the R, I, S, B, U, J and SYSTEM formats

pub mod memory;
pub mod registers;
pub mod bus;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError, Region};
pub use registers::RegisterFile;
pub use bus::{Bus, Control, Transaction};
pub use decode::{Instruction, IOpcode, IOperand, UOpcode, DecodeError};
pub use execute::{Cpu, CpuConfig, CpuError, CpuState, ControlEffect, HaltReason, StepOutcome};
