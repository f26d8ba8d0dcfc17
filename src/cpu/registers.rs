//! RV32I integer register file.
//!
//! 32 general-purpose registers, x0 through x31, each 32 bits wide.
//! Register x0 is hard-wired to zero: reads return 0 and writes are dropped.

use serde::{Serialize, Deserialize};

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 32;

/// ABI names, indexed by register number.
const ABI_NAMES: [&str; REGISTER_COUNT] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2",
    "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5",
    "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

/// The RV32I register file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    regs: [u32; REGISTER_COUNT],
}

impl RegisterFile {
    /// Create a new register file with every register zeroed.
    pub fn new() -> Self {
        Self { regs: [0; REGISTER_COUNT] }
    }

    /// Read register `index`. x0 always reads as zero.
    ///
    /// # Panics
    /// Panics if `index` is not a 5-bit register number.
    #[inline]
    pub fn read(&self, index: u8) -> u32 {
        assert!((index as usize) < REGISTER_COUNT, "register x{} out of range (x0-x31)", index);
        if index == 0 {
            0
        } else {
            self.regs[index as usize]
        }
    }

    /// Write register `index`. Writes to x0 are discarded.
    ///
    /// # Panics
    /// Panics if `index` is not a 5-bit register number.
    #[inline]
    pub fn write(&mut self, index: u8, value: u32) {
        assert!((index as usize) < REGISTER_COUNT, "register x{} out of range (x0-x31)", index);
        if index != 0 {
            self.regs[index as usize] = value;
        }
    }

    /// Zero every register.
    pub fn reset(&mut self) {
        self.regs = [0; REGISTER_COUNT];
    }

    /// Copy of all 32 registers, x0 first.
    pub fn snapshot(&self) -> [u32; REGISTER_COUNT] {
        let mut regs = self.regs;
        regs[0] = 0;
        regs
    }

    /// ABI name of a register (`a0` for x10 and so on).
    pub fn abi_name(index: u8) -> &'static str {
        ABI_NAMES.get(index as usize).copied().unwrap_or("?")
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only show non-zero registers
        let mut map = f.debug_map();
        for (i, value) in self.regs.iter().enumerate().skip(1) {
            if *value != 0 {
                map.entry(&format_args!("x{}", i), &format_args!("{:#010x}", value));
            }
        }
        map.finish()
    }
}
