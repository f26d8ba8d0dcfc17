//! System bus between the CPU and memory.
//!
//! Every access goes through an explicit address/data/control handshake,
//! and the bus keeps the record of the most recent transaction so an
//! observer can inspect it without touching memory.

use crate::cpu::memory::{Memory, MemoryError};
use serde::{Serialize, Deserialize};

/// Control line state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Control {
    #[default]
    Idle,
    Read,
    Write,
}

impl std::fmt::Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Control::Idle => "IDLE",
            Control::Read => "READ",
            Control::Write => "WRITE",
        };
        f.write_str(name)
    }
}

/// The address, data and control lines as left by the last transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub address: u32,
    pub data: u32,
    pub control: Control,
}

/// The bus. Owns the memory it fronts.
#[derive(Debug, Clone)]
pub struct Bus {
    mem: Memory,
    lines: Transaction,
}

impl Bus {
    pub fn new(mem: Memory) -> Self {
        Self { mem, lines: Transaction::default() }
    }

    /// The current state of the bus lines.
    pub fn transaction(&self) -> Transaction {
        self.lines
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    pub fn read8(&mut self, address: u32) -> Result<u8, MemoryError> {
        self.read(address, |mem, a| mem.read_byte(a).map(u32::from)).map(|v| v as u8)
    }

    pub fn read16(&mut self, address: u32) -> Result<u16, MemoryError> {
        self.read(address, |mem, a| mem.read_half(a).map(u32::from)).map(|v| v as u16)
    }

    pub fn read32(&mut self, address: u32) -> Result<u32, MemoryError> {
        self.read(address, Memory::read_word)
    }

    pub fn write8(&mut self, address: u32, value: u8) -> Result<(), MemoryError> {
        self.write(address, value as u32, |mem, a, v| mem.write_byte(a, v as u8))
    }

    pub fn write16(&mut self, address: u32, value: u16) -> Result<(), MemoryError> {
        self.write(address, value as u32, |mem, a, v| mem.write_half(a, v as u16))
    }

    pub fn write32(&mut self, address: u32, value: u32) -> Result<(), MemoryError> {
        self.write(address, value, Memory::write_word)
    }

    fn read<F>(&mut self, address: u32, access: F) -> Result<u32, MemoryError>
    where
        F: FnOnce(&Memory, u32) -> Result<u32, MemoryError>,
    {
        self.lines.control = Control::Read;
        self.lines.address = address;
        let result = access(&self.mem, address);
        if let Ok(value) = result {
            self.lines.data = value;
        }
        self.lines.control = Control::Idle;
        result
    }

    fn write<F>(&mut self, address: u32, value: u32, access: F) -> Result<(), MemoryError>
    where
        F: FnOnce(&mut Memory, u32, u32) -> Result<(), MemoryError>,
    {
        self.lines.address = address;
        self.lines.data = value;
        self.lines.control = Control::Write;
        let result = access(&mut self.mem, address, value);
        self.lines.control = Control::Idle;
        result
    }
}
