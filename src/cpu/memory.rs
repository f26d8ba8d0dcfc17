//! Memory-mapped address space.
//!
//! The address space is a flat byte-addressable store split into four fixed
//! regions:
//!
//! | Region     | Range               |
//! |------------|---------------------|
//! | RAM        | `0x00000..=0x7FFFF` |
//! | Video      | `0x80000..=0x8FFFF` |
//! | Reserved   | `0x90000..=0x9FBFF` |
//! | Peripheral | `0x9FC00..=0x9FFFF` |
//!
//! Multi-byte accesses are little-endian and are composed from byte accesses
//! in increasing address order, so a halfword or word may straddle regions.

/// Default capacity: 640 KiB, exactly enough to reach the peripheral block.
pub const DEFAULT_CAPACITY: usize = 640 * 1024;

pub const RAM_START: u32 = 0x0_0000;
pub const RAM_END: u32 = 0x7_FFFF;
pub const VIDEO_START: u32 = 0x8_0000;
pub const VIDEO_END: u32 = 0x8_FFFF;
pub const RESERVED_START: u32 = 0x9_0000;
pub const RESERVED_END: u32 = 0x9_FBFF;
pub const PERIPHERAL_START: u32 = 0x9_FC00;
pub const PERIPHERAL_END: u32 = 0x9_FFFF;

/// Number of word-sized peripheral slots.
pub const PERIPHERAL_SLOTS: usize = 256;

const VIDEO_SIZE: usize = (VIDEO_END - VIDEO_START + 1) as usize;

/// The region an address resolves to, with its region-relative index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// General RAM; carries the byte offset.
    Ram(usize),
    /// Video memory; carries the byte offset from `VIDEO_START`.
    Video(usize),
    /// Dead zone: reads 0, writes are dropped.
    Reserved,
    /// Peripheral block; carries the slot index (offset / 4).
    Peripheral(usize),
}

/// Byte-addressable memory with region routing.
#[derive(Clone)]
pub struct Memory {
    capacity: usize,
    ram: Vec<u8>,
    vram: Vec<u8>,
    peripherals: [u32; PERIPHERAL_SLOTS],
}

impl Memory {
    /// Create a zeroed memory of `capacity` bytes.
    ///
    /// Regions sit at fixed offsets; anything at or past `capacity` is out
    /// of bounds even if it falls inside a region's range.
    pub fn new(capacity: usize) -> Self {
        let ram_size = capacity.min(RAM_END as usize + 1);
        Self {
            capacity,
            ram: vec![0; ram_size],
            vram: vec![0; VIDEO_SIZE],
            peripherals: [0; PERIPHERAL_SLOTS],
        }
    }

    /// Size of the address space in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Classify an address.
    pub fn region_of(&self, address: u32) -> Result<Region, MemoryError> {
        if address as usize >= self.capacity {
            return Err(MemoryError::OutOfBounds { address, len: 1 });
        }

        let region = match address {
            RAM_START..=RAM_END => Region::Ram((address - RAM_START) as usize),
            VIDEO_START..=VIDEO_END => Region::Video((address - VIDEO_START) as usize),
            RESERVED_START..=RESERVED_END => Region::Reserved,
            PERIPHERAL_START..=PERIPHERAL_END => {
                Region::Peripheral(((address - PERIPHERAL_START) / 4) as usize)
            }
            _ => return Err(MemoryError::OutOfBounds { address, len: 1 }),
        };
        Ok(region)
    }

    /// Read one byte.
    pub fn read_byte(&self, address: u32) -> Result<u8, MemoryError> {
        let value = match self.region_of(address)? {
            Region::Ram(offset) => self.ram[offset],
            Region::Video(offset) => self.vram[offset],
            Region::Reserved => 0,
            Region::Peripheral(slot) => self.peripherals[slot] as u8,
        };
        Ok(value)
    }

    /// Write one byte.
    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), MemoryError> {
        match self.region_of(address)? {
            Region::Ram(offset) => self.ram[offset] = value,
            Region::Video(offset) => self.vram[offset] = value,
            Region::Reserved => {}
            Region::Peripheral(slot) => self.peripherals[slot] = value as u32,
        }
        Ok(())
    }

    /// Read a little-endian halfword.
    pub fn read_half(&self, address: u32) -> Result<u16, MemoryError> {
        Ok(self.read_le(address, 2)? as u16)
    }

    /// Write a little-endian halfword.
    pub fn write_half(&mut self, address: u32, value: u16) -> Result<(), MemoryError> {
        self.write_le(address, 2, value as u32)
    }

    /// Read a little-endian word.
    pub fn read_word(&self, address: u32) -> Result<u32, MemoryError> {
        self.read_le(address, 4)
    }

    /// Write a little-endian word.
    pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), MemoryError> {
        self.write_le(address, 4, value)
    }

    fn read_le(&self, address: u32, len: u8) -> Result<u32, MemoryError> {
        self.check_span(address, len)?;
        let mut value = 0u32;
        for i in 0..len {
            let byte = self.read_byte(address + i as u32)?;
            value |= (byte as u32) << (8 * i);
        }
        Ok(value)
    }

    fn write_le(&mut self, address: u32, len: u8, value: u32) -> Result<(), MemoryError> {
        self.check_span(address, len)?;
        for i in 0..len {
            self.write_byte(address + i as u32, (value >> (8 * i)) as u8)?;
        }
        Ok(())
    }

    /// The last byte of a `len`-byte access must still be inside the
    /// address space, independent of region routing.
    fn check_span(&self, address: u32, len: u8) -> Result<(), MemoryError> {
        let last = address as u64 + (len as u64 - 1);
        if last >= self.capacity as u64 {
            return Err(MemoryError::OutOfBounds { address, len });
        }
        Ok(())
    }

    /// Zero every region.
    pub fn clear(&mut self) {
        self.ram.fill(0);
        self.vram.fill(0);
        self.peripherals = [0; PERIPHERAL_SLOTS];
    }

    /// Write instruction words sequentially starting at `start`.
    pub fn load_program(&mut self, start: u32, program: &[u32]) -> Result<(), MemoryError> {
        let size = program.len() * 4;
        let available = self.capacity.saturating_sub(start as usize);
        if size > available {
            return Err(MemoryError::ProgramTooLarge { size, available });
        }

        for (i, &word) in program.iter().enumerate() {
            self.write_word(start + (i as u32) * 4, word)?;
        }

        Ok(())
    }

    /// Read `len` bytes starting at `start` (for diagnostics).
    pub fn dump(&self, start: u32, len: usize) -> Result<Vec<u8>, MemoryError> {
        (0..len as u32)
            .map(|i| self.read_byte(start.wrapping_add(i)))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.ram.iter().chain(self.vram.iter()).filter(|b| **b != 0).count();

        f.debug_struct("Memory")
            .field("capacity", &self.capacity)
            .field("non_zero_bytes", &non_zero)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Access resolves outside every region or runs past the address space.
    OutOfBounds { address: u32, len: u8 },
    /// Program is too large to fit in memory.
    ProgramTooLarge { size: usize, available: usize },
}

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryError::OutOfBounds { address, len } => {
                write!(f, "{}-byte access at {:#07x} is out of bounds", len, address)
            }
            MemoryError::ProgramTooLarge { size, available } => {
                write!(f, "program size {} bytes exceeds available space {}", size, available)
            }
        }
    }
}

impl std::error::Error for MemoryError {}
