//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle and all RV32I instruction behaviors.

use crate::cpu::{Bus, Memory, RegisterFile};
use crate::cpu::decode::{self, Instruction, IOpcode, IOperand, UOpcode, DecodeError};
use crate::cpu::memory::{MemoryError, VIDEO_START};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

const ECALL: u32 = 0x0000_0073;
const EBREAK: u32 = 0x0010_0073;

/// Why the CPU stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// Fetched an all-zero word.
    EndOfProgram,
    /// The PC ran past the last complete word of the address space.
    EndOfMemory,
    Ecall,
    Ebreak,
}

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted cleanly.
    Halted(HaltReason),
    /// An instruction faulted; registers reflect the state before it.
    Faulted,
}

/// How an executed instruction affects the program counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlEffect {
    /// Advance to the next sequential instruction.
    FallThrough,
    /// The instruction already set the PC.
    Jumped,
    /// ECALL or EBREAK: stop without advancing.
    Halt(HaltReason),
}

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// An instruction retired and the CPU is still running.
    Executed { instr: Instruction, effect: ControlEffect },
    /// The CPU halted on this step.
    Halted(HaltReason),
}

/// Tunables for a CPU instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Address space size in bytes.
    pub memory_size: usize,
    /// Sample video memory every N retired instructions (0 disables).
    pub vram_sample_interval: u64,
    /// Number of video memory bytes in each sample.
    pub vram_sample_len: usize,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            memory_size: crate::cpu::memory::DEFAULT_CAPACITY,
            vram_sample_interval: 30,
            vram_sample_len: 1,
        }
    }
}

/// An RV32I hart with its bus and memory.
#[derive(Clone)]
pub struct Cpu {
    /// Integer registers.
    pub regs: RegisterFile,
    /// System bus; owns main memory.
    pub bus: Bus,
    /// Program counter (byte address).
    pub pc: u32,
    /// Current execution state.
    pub state: CpuState,
    /// Retired instruction count.
    pub instructions: u64,
    config: CpuConfig,
}

impl Cpu {
    /// Create a CPU with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default())
    }

    pub fn with_config(config: CpuConfig) -> Self {
        Self {
            regs: RegisterFile::new(),
            bus: Bus::new(Memory::new(config.memory_size)),
            pc: 0,
            state: CpuState::Running,
            instructions: 0,
            config,
        }
    }

    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    /// Reset registers, memory and PC.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.bus.memory_mut().clear();
        self.pc = 0;
        self.state = CpuState::Running;
        self.instructions = 0;
    }

    /// Load a program at address 0.
    pub fn load_program(&mut self, program: &[u32]) -> Result<(), MemoryError> {
        self.bus.memory_mut().load_program(0, program)
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> Result<StepOutcome, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        match self.try_step() {
            Ok(outcome) => {
                if let StepOutcome::Halted(reason) = outcome {
                    info!(pc = format_args!("{:#010x}", self.pc), ?reason, "halted");
                    self.state = CpuState::Halted(reason);
                }
                Ok(outcome)
            }
            Err(e) => {
                self.state = CpuState::Faulted;
                Err(e)
            }
        }
    }

    fn try_step(&mut self) -> Result<StepOutcome, CpuError> {
        // A full word no longer fits before the end of the address space
        if self.pc as u64 + 3 >= self.bus.memory().capacity() as u64 {
            return Ok(StepOutcome::Halted(HaltReason::EndOfMemory));
        }

        // Fetch
        let word = self.bus.read32(self.pc)?;
        if word == 0 {
            return Ok(StepOutcome::Halted(HaltReason::EndOfProgram));
        }

        // Decode
        let instr = decode::decode(word)?;
        trace!(pc = format_args!("{:#010x}", self.pc), word = format_args!("{:#010x}", word), %instr);

        // Execute
        let effect = self.execute(instr)?;
        self.instructions += 1;

        match effect {
            ControlEffect::FallThrough => self.pc = self.pc.wrapping_add(4),
            ControlEffect::Jumped => debug!(pc = format_args!("{:#010x}", self.pc), "jump"),
            ControlEffect::Halt(reason) => return Ok(StepOutcome::Halted(reason)),
        }

        let interval = self.config.vram_sample_interval;
        if interval != 0 && self.instructions % interval == 0 {
            self.sample_vram();
        }

        Ok(StepOutcome::Executed { instr, effect })
    }

    /// Run until halt or error.
    pub fn run(&mut self) -> Result<HaltReason, CpuError> {
        loop {
            if let StepOutcome::Halted(reason) = self.step()? {
                return Ok(reason);
            }
        }
    }

    /// Run for at most `max_steps` steps.
    ///
    /// Returns `None` if the budget ran out before the CPU halted.
    pub fn run_limited(&mut self, max_steps: u64) -> Result<Option<HaltReason>, CpuError> {
        for _ in 0..max_steps {
            if let StepOutcome::Halted(reason) = self.step()? {
                return Ok(Some(reason));
            }
        }
        Ok(None)
    }

    /// Execute a decoded instruction against the current PC.
    pub fn execute(&mut self, instr: Instruction) -> Result<ControlEffect, CpuError> {
        let illegal = CpuError::IllegalInstruction { pc: self.pc, instr };

        match instr {
            Instruction::R { rd, funct3, rs1, rs2, funct7 } => {
                let a = self.regs.read(rs1);
                let b = self.regs.read(rs2);
                let result = alu(funct3, funct7, a, b).ok_or(illegal)?;
                self.regs.write(rd, result);
            }

            Instruction::I { opcode: IOpcode::OpImm, rd, funct3, rs1, operand } => {
                let a = self.regs.read(rs1);
                let result = match operand {
                    IOperand::Shift { shamt, funct7 } => shift(funct3, funct7, a, shamt as u32),
                    IOperand::Imm(imm) => alu_imm(funct3, a, imm),
                };
                self.regs.write(rd, result.ok_or(illegal)?);
            }

            Instruction::I { opcode: IOpcode::Jalr, rd, rs1, operand: IOperand::Imm(imm), .. } => {
                let target = self.regs.read(rs1).wrapping_add_signed(imm) & !1;
                self.regs.write(rd, self.pc.wrapping_add(4));
                self.pc = target;
                return Ok(ControlEffect::Jumped);
            }

            Instruction::I { opcode: IOpcode::Load, rd, funct3, rs1, operand: IOperand::Imm(imm) } => {
                let address = self.regs.read(rs1).wrapping_add_signed(imm);
                let value = match funct3 {
                    0b000 => self.bus.read8(address)? as i8 as i32 as u32,   // LB
                    0b001 => self.bus.read16(address)? as i16 as i32 as u32, // LH
                    0b010 => self.bus.read32(address)?,                      // LW
                    0b100 => self.bus.read8(address)? as u32,                // LBU
                    0b101 => self.bus.read16(address)? as u32,               // LHU
                    _ => return Err(illegal),
                };
                self.regs.write(rd, value);
            }

            // Shift operands only decode under OP-IMM
            Instruction::I { operand: IOperand::Shift { .. }, .. } => return Err(illegal),

            Instruction::S { funct3, rs1, rs2, imm } => {
                let offset = decode::sign_extend(imm as u32 & 0xFFF, 12);
                let address = self.regs.read(rs1).wrapping_add_signed(offset);
                let value = self.regs.read(rs2);
                match funct3 {
                    0b000 => self.bus.write8(address, value as u8)?,   // SB
                    0b001 => self.bus.write16(address, value as u16)?, // SH
                    0b010 => self.bus.write32(address, value)?,        // SW
                    _ => return Err(illegal),
                }
            }

            Instruction::B { funct3, rs1, rs2, imm } => {
                let a = self.regs.read(rs1);
                let b = self.regs.read(rs2);
                let taken = match funct3 {
                    0b000 => a == b,                   // BEQ
                    0b001 => a != b,                   // BNE
                    0b100 => (a as i32) < (b as i32),  // BLT
                    0b101 => (a as i32) >= (b as i32), // BGE
                    0b110 => a < b,                    // BLTU
                    0b111 => a >= b,                   // BGEU
                    _ => return Err(illegal),
                };
                if taken {
                    self.pc = self.pc.wrapping_add_signed(imm);
                    return Ok(ControlEffect::Jumped);
                }
            }

            Instruction::U { opcode, rd, imm } => {
                let value = match opcode {
                    UOpcode::Lui => imm as u32,
                    UOpcode::Auipc => self.pc.wrapping_add_signed(imm),
                };
                self.regs.write(rd, value);
            }

            Instruction::J { rd, imm } => {
                self.regs.write(rd, self.pc.wrapping_add(4));
                self.pc = self.pc.wrapping_add_signed(imm);
                return Ok(ControlEffect::Jumped);
            }

            Instruction::System { raw } => match raw {
                ECALL => return Ok(ControlEffect::Halt(HaltReason::Ecall)),
                EBREAK => return Ok(ControlEffect::Halt(HaltReason::Ebreak)),
                _ => warn!(pc = format_args!("{:#010x}", self.pc), "unrecognized SYSTEM instruction {:#010x}", raw),
            },
        }

        Ok(ControlEffect::FallThrough)
    }

    /// Log the start of video memory as ASCII.
    fn sample_vram(&self) {
        let len = self.config.vram_sample_len;
        match self.bus.memory().dump(VIDEO_START, len) {
            Ok(bytes) => {
                let text: String = bytes
                    .iter()
                    .map(|&b| if (32..=126).contains(&b) { b as char } else { '.' })
                    .collect();
                info!(instructions = self.instructions, "vram: {}", text);
            }
            Err(e) => debug!("vram sample skipped: {}", e),
        }
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        matches!(self.state, CpuState::Halted(_))
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

/// R-type ALU. `None` for an undefined `(funct3, funct7)` pair.
fn alu(funct3: u8, funct7: u8, a: u32, b: u32) -> Option<u32> {
    let shamt = b & 0x1F;
    let result = match (funct3, funct7) {
        (0b000, 0b000_0000) => a.wrapping_add(b),
        (0b000, 0b010_0000) => a.wrapping_sub(b),
        (0b001, 0b000_0000) => a << shamt,
        (0b010, 0b000_0000) => ((a as i32) < (b as i32)) as u32,
        (0b011, 0b000_0000) => (a < b) as u32,
        (0b100, 0b000_0000) => a ^ b,
        (0b101, 0b000_0000) => a >> shamt,
        (0b101, 0b010_0000) => ((a as i32) >> shamt) as u32,
        (0b110, 0b000_0000) => a | b,
        (0b111, 0b000_0000) => a & b,
        _ => return None,
    };
    Some(result)
}

/// SLLI/SRLI/SRAI.
fn shift(funct3: u8, funct7: u8, a: u32, shamt: u32) -> Option<u32> {
    match (funct3, funct7) {
        (0b001, 0b000_0000) => Some(a << shamt),
        (0b101, 0b000_0000) => Some(a >> shamt),
        (0b101, 0b010_0000) => Some(((a as i32) >> shamt) as u32),
        _ => None,
    }
}

/// OP-IMM operations other than shifts.
fn alu_imm(funct3: u8, a: u32, imm: i32) -> Option<u32> {
    let result = match funct3 {
        0b000 => a.wrapping_add_signed(imm),
        0b010 => ((a as i32) < imm) as u32,
        0b011 => (a < imm as u32) as u32,
        0b100 => a ^ imm as u32,
        0b110 => a | imm as u32,
        0b111 => a & imm as u32,
        _ => return None,
    };
    Some(result)
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("pc", &format_args!("{:#010x}", self.pc))
            .field("state", &self.state)
            .field("instructions", &self.instructions)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("decode error: {0}")]
    DecodeError(#[from] DecodeError),

    #[error("illegal instruction at pc {pc:#010x}: {instr}")]
    IllegalInstruction { pc: u32, instr: Instruction },
}
