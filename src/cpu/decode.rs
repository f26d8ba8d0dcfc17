//! Instruction decoder for RV32I.
//!
//! Every 32-bit instruction word carries its format in the low 7 bits.
//! The decoder splits the word into the fields that format defines and
//! reassembles the scattered immediate bits into a sign-extended `i32`.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Which of the three I-format opcodes an I-type instruction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IOpcode {
    /// Register-immediate ALU operations (`0010011`)
    OpImm,
    /// Jump and link register (`1100111`)
    Jalr,
    /// Loads (`0000011`)
    Load,
}

/// Second operand of an I-type instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IOperand {
    /// Sign-extended 12-bit immediate.
    Imm(i32),
    /// SLLI/SRLI/SRAI: shift amount plus the upper funct7 field.
    Shift { shamt: u8, funct7: u8 },
}

/// Which of the two U-format opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UOpcode {
    /// Load upper immediate (`0110111`)
    Lui,
    /// Add upper immediate to PC (`0010111`)
    Auipc,
}

/// Decoded RV32I instruction, one variant per encoding format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Register-register ALU operation.
    R { rd: u8, funct3: u8, rs1: u8, rs2: u8, funct7: u8 },

    /// Register-immediate ALU operation, JALR, or load.
    I { opcode: IOpcode, rd: u8, funct3: u8, rs1: u8, operand: IOperand },

    /// Store: `mem[rs1 + imm] := rs2`
    S { funct3: u8, rs1: u8, rs2: u8, imm: i32 },

    /// Conditional branch: `if cmp(rs1, rs2) then pc += imm`
    B { funct3: u8, rs1: u8, rs2: u8, imm: i32 },

    /// LUI/AUIPC; `imm` already holds the upper 20 bits in place.
    U { opcode: UOpcode, rd: u8, imm: i32 },

    /// JAL: `rd := pc + 4; pc += imm`
    J { rd: u8, imm: i32 },

    /// ECALL, EBREAK, or another SYSTEM encoding, kept verbatim.
    System { raw: u32 },
}

/// Major opcode values (bits 6-0).
struct Opcode;

impl Opcode {
    const OP: u32 = 0b011_0011;
    const OP_IMM: u32 = 0b001_0011;
    const JALR: u32 = 0b110_0111;
    const LOAD: u32 = 0b000_0011;
    const STORE: u32 = 0b010_0011;
    const BRANCH: u32 = 0b110_0011;
    const LUI: u32 = 0b011_0111;
    const AUIPC: u32 = 0b001_0111;
    const JAL: u32 = 0b110_1111;
    const SYSTEM: u32 = 0b111_0011;
}

/// Sign-extend the low `width` bits of `value`.
pub fn sign_extend(value: u32, width: u32) -> i32 {
    let shift = 32 - width;
    ((value << shift) as i32) >> shift
}

#[inline]
fn bits(word: u32, lo: u32, len: u32) -> u32 {
    (word >> lo) & ((1 << len) - 1)
}

/// Decode a 32-bit instruction word.
pub fn decode(word: u32) -> Result<Instruction, DecodeError> {
    let opcode = word & 0x7F;
    let rd = bits(word, 7, 5) as u8;
    let funct3 = bits(word, 12, 3) as u8;
    let rs1 = bits(word, 15, 5) as u8;
    let rs2 = bits(word, 20, 5) as u8;
    let funct7 = bits(word, 25, 7) as u8;

    let instruction = match opcode {
        Opcode::OP => Instruction::R { rd, funct3, rs1, rs2, funct7 },

        Opcode::OP_IMM | Opcode::JALR | Opcode::LOAD => {
            let i_opcode = match opcode {
                Opcode::OP_IMM => IOpcode::OpImm,
                Opcode::JALR => IOpcode::Jalr,
                _ => IOpcode::Load,
            };
            let operand = if i_opcode == IOpcode::OpImm && matches!(funct3, 0b001 | 0b101) {
                IOperand::Shift { shamt: rs2, funct7 }
            } else {
                IOperand::Imm(sign_extend(bits(word, 20, 12), 12))
            };
            Instruction::I { opcode: i_opcode, rd, funct3, rs1, operand }
        }

        Opcode::STORE => {
            let imm = (bits(word, 25, 7) << 5) | bits(word, 7, 5);
            Instruction::S { funct3, rs1, rs2, imm: sign_extend(imm, 12) }
        }

        Opcode::BRANCH => {
            let imm = (bits(word, 31, 1) << 12)
                | (bits(word, 7, 1) << 11)
                | (bits(word, 25, 6) << 5)
                | (bits(word, 8, 4) << 1);
            Instruction::B { funct3, rs1, rs2, imm: sign_extend(imm, 13) }
        }

        Opcode::LUI | Opcode::AUIPC => {
            let u_opcode = if opcode == Opcode::LUI { UOpcode::Lui } else { UOpcode::Auipc };
            Instruction::U { opcode: u_opcode, rd, imm: (word & 0xFFFF_F000) as i32 }
        }

        Opcode::JAL => {
            let imm = (bits(word, 31, 1) << 20)
                | (bits(word, 12, 8) << 12)
                | (bits(word, 20, 1) << 11)
                | (bits(word, 21, 10) << 1);
            Instruction::J { rd, imm: sign_extend(imm, 21) }
        }

        Opcode::SYSTEM => Instruction::System { raw: word },

        _ => return Err(DecodeError::UnknownOpcode { opcode: opcode as u8, word }),
    };

    Ok(instruction)
}

/// Encode an instruction back to its 32-bit word.
///
/// Fields are masked to their encoded width; bit 0 of B and J offsets is
/// dropped since those formats cannot represent it.
pub fn encode(instr: &Instruction) -> u32 {
    let reg = |r: u8, at: u32| (r as u32 & 0x1F) << at;
    let f3 = |f: u8| (f as u32 & 0x7) << 12;

    match *instr {
        Instruction::R { rd, funct3, rs1, rs2, funct7 } => {
            ((funct7 as u32 & 0x7F) << 25)
                | reg(rs2, 20)
                | reg(rs1, 15)
                | f3(funct3)
                | reg(rd, 7)
                | Opcode::OP
        }

        Instruction::I { opcode, rd, funct3, rs1, operand } => {
            let opcode = match opcode {
                IOpcode::OpImm => Opcode::OP_IMM,
                IOpcode::Jalr => Opcode::JALR,
                IOpcode::Load => Opcode::LOAD,
            };
            let upper = match operand {
                IOperand::Imm(imm) => (imm as u32 & 0xFFF) << 20,
                IOperand::Shift { shamt, funct7 } => {
                    ((funct7 as u32 & 0x7F) << 25) | reg(shamt, 20)
                }
            };
            upper | reg(rs1, 15) | f3(funct3) | reg(rd, 7) | opcode
        }

        Instruction::S { funct3, rs1, rs2, imm } => {
            let imm = imm as u32;
            (bits(imm, 5, 7) << 25)
                | reg(rs2, 20)
                | reg(rs1, 15)
                | f3(funct3)
                | (bits(imm, 0, 5) << 7)
                | Opcode::STORE
        }

        Instruction::B { funct3, rs1, rs2, imm } => {
            let imm = imm as u32;
            (bits(imm, 12, 1) << 31)
                | (bits(imm, 5, 6) << 25)
                | reg(rs2, 20)
                | reg(rs1, 15)
                | f3(funct3)
                | (bits(imm, 1, 4) << 8)
                | (bits(imm, 11, 1) << 7)
                | Opcode::BRANCH
        }

        Instruction::U { opcode, rd, imm } => {
            let opcode = match opcode {
                UOpcode::Lui => Opcode::LUI,
                UOpcode::Auipc => Opcode::AUIPC,
            };
            (imm as u32 & 0xFFFF_F000) | reg(rd, 7) | opcode
        }

        Instruction::J { rd, imm } => {
            let imm = imm as u32;
            (bits(imm, 20, 1) << 31)
                | (bits(imm, 1, 10) << 21)
                | (bits(imm, 11, 1) << 20)
                | (bits(imm, 12, 8) << 12)
                | reg(rd, 7)
                | Opcode::JAL
        }

        Instruction::System { raw } => raw,
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Instruction::R { rd, funct3, rs1, rs2, funct7 } => {
                write!(f, "R   x{}, x{}, x{}  (f3={:03b} f7={:07b})", rd, rs1, rs2, funct3, funct7)
            }
            Instruction::I { opcode, rd, funct3, rs1, operand: IOperand::Imm(imm) } => {
                write!(f, "I   x{}, x{}, {}  ({:?} f3={:03b})", rd, rs1, imm, opcode, funct3)
            }
            Instruction::I { rd, funct3, rs1, operand: IOperand::Shift { shamt, funct7 }, .. } => {
                write!(f, "I   x{}, x{}, {}  (shift f3={:03b} f7={:07b})", rd, rs1, shamt, funct3, funct7)
            }
            Instruction::S { funct3, rs1, rs2, imm } => {
                write!(f, "S   x{}, {}(x{})  (f3={:03b})", rs2, imm, rs1, funct3)
            }
            Instruction::B { funct3, rs1, rs2, imm } => {
                write!(f, "B   x{}, x{}, {:+}  (f3={:03b})", rs1, rs2, imm, funct3)
            }
            Instruction::U { opcode, rd, imm } => {
                write!(f, "U   x{}, {:#07x}  ({:?})", rd, (imm as u32) >> 12, opcode)
            }
            Instruction::J { rd, imm } => write!(f, "J   x{}, {:+}", rd, imm),
            Instruction::System { raw } => write!(f, "SYS {:#010x}", raw),
        }
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {opcode:#09b} in word {word:#010x}")]
    UnknownOpcode { opcode: u8, word: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x123, 12), 0x123);
        assert_eq!(sign_extend(0x800, 12), -2048);
        assert_eq!(sign_extend(0xFFF, 12), -1);
        assert_eq!(sign_extend(0x1FFE, 13), -2);
        assert_eq!(sign_extend(0x8000_0000, 32), i32::MIN);
    }

    #[test]
    fn test_decode_r_type() {
        // add x6, x6, x5
        assert_eq!(
            decode(0x0053_0333).unwrap(),
            Instruction::R { rd: 6, funct3: 0, rs1: 6, rs2: 5, funct7: 0 }
        );
        // sub x1, x2, x3
        assert_eq!(
            decode(0x4031_00B3).unwrap(),
            Instruction::R { rd: 1, funct3: 0, rs1: 2, rs2: 3, funct7: 0b010_0000 }
        );
    }

    #[test]
    fn test_decode_i_type_immediates() {
        // addi x7, x7, -1
        assert_eq!(
            decode(0xFFF3_8393).unwrap(),
            Instruction::I { opcode: IOpcode::OpImm, rd: 7, funct3: 0, rs1: 7, operand: IOperand::Imm(-1) }
        );
        // lw x5, 1024(x0)
        assert_eq!(
            decode(0x4000_2283).unwrap(),
            Instruction::I { opcode: IOpcode::Load, rd: 5, funct3: 0b010, rs1: 0, operand: IOperand::Imm(1024) }
        );
        // addi x1, x0, -2048 (most negative 12-bit immediate)
        assert_eq!(
            decode(0x8000_0093).unwrap(),
            Instruction::I { opcode: IOpcode::OpImm, rd: 1, funct3: 0, rs1: 0, operand: IOperand::Imm(-2048) }
        );
        // jalr x1, 8(x2)
        assert_eq!(
            decode(0x0081_00E7).unwrap(),
            Instruction::I { opcode: IOpcode::Jalr, rd: 1, funct3: 0, rs1: 2, operand: IOperand::Imm(8) }
        );
    }

    #[test]
    fn test_decode_shift_subtype() {
        // srai x1, x2, 3
        assert_eq!(
            decode(0x4031_5093).unwrap(),
            Instruction::I {
                opcode: IOpcode::OpImm,
                rd: 1,
                funct3: 0b101,
                rs1: 2,
                operand: IOperand::Shift { shamt: 3, funct7: 0b010_0000 },
            }
        );
        // slli x1, x1, 31
        assert_eq!(
            decode(0x01F0_9093).unwrap(),
            Instruction::I {
                opcode: IOpcode::OpImm,
                rd: 1,
                funct3: 0b001,
                rs1: 1,
                operand: IOperand::Shift { shamt: 31, funct7: 0 },
            }
        );
    }

    #[test]
    fn test_decode_s_type() {
        // sw x5, -4(x2)
        assert_eq!(
            decode(0xFE51_2E23).unwrap(),
            Instruction::S { funct3: 0b010, rs1: 2, rs2: 5, imm: -4 }
        );
        // sb x1, 2047(x0)
        assert_eq!(
            decode(0x7E10_0FA3).unwrap(),
            Instruction::S { funct3: 0, rs1: 0, rs2: 1, imm: 2047 }
        );
    }

    #[test]
    fn test_decode_b_type() {
        // beq x7, x0, +16
        assert_eq!(
            decode(0x0003_8863).unwrap(),
            Instruction::B { funct3: 0, rs1: 7, rs2: 0, imm: 16 }
        );
        // bne x0, x0, -2 must decode to -2, not 8190
        let word = encode(&Instruction::B { funct3: 1, rs1: 0, rs2: 0, imm: -2 });
        assert_eq!(word, 0xFE00_1FE3);
        assert_eq!(decode(word).unwrap(), Instruction::B { funct3: 1, rs1: 0, rs2: 0, imm: -2 });
        // most negative offset
        let word = encode(&Instruction::B { funct3: 0, rs1: 1, rs2: 2, imm: -4096 });
        assert_eq!(decode(word).unwrap(), Instruction::B { funct3: 0, rs1: 1, rs2: 2, imm: -4096 });
    }

    #[test]
    fn test_decode_u_type() {
        // lui x1, 0x12345
        assert_eq!(
            decode(0x1234_50B7).unwrap(),
            Instruction::U { opcode: UOpcode::Lui, rd: 1, imm: 0x1234_5000 }
        );
        // auipc x2, 0xFFFFF
        assert_eq!(
            decode(0xFFFF_F117).unwrap(),
            Instruction::U { opcode: UOpcode::Auipc, rd: 2, imm: -4096 }
        );
    }

    #[test]
    fn test_decode_j_type() {
        // jal x0, -12
        assert_eq!(decode(0xFF5F_F06F).unwrap(), Instruction::J { rd: 0, imm: -12 });
        // jal x1, +2048 (exercises imm[11] at bit 20)
        let word = encode(&Instruction::J { rd: 1, imm: 2048 });
        assert_eq!(word, 0x0010_00EF);
        assert_eq!(decode(word).unwrap(), Instruction::J { rd: 1, imm: 2048 });
        // most negative offset
        let word = encode(&Instruction::J { rd: 0, imm: -(1 << 20) });
        assert_eq!(decode(word).unwrap(), Instruction::J { rd: 0, imm: -(1 << 20) });
    }

    #[test]
    fn test_decode_system() {
        assert_eq!(decode(0x0000_0073).unwrap(), Instruction::System { raw: 0x0000_0073 });
        assert_eq!(decode(0x0010_0073).unwrap(), Instruction::System { raw: 0x0010_0073 });
    }

    #[test]
    fn test_unknown_opcode() {
        // FENCE (0001111) is not part of this model
        assert_eq!(
            decode(0x0FF0_000F),
            Err(DecodeError::UnknownOpcode { opcode: 0b000_1111, word: 0x0FF0_000F })
        );
        assert!(decode(0x0000_0000).is_err());
    }

    #[test]
    fn test_display() {
        let add = decode(0x0053_0333).unwrap();
        assert!(add.to_string().starts_with("R   x6, x6, x5"));
        assert_eq!(decode(0xFF5F_F06F).unwrap().to_string(), "J   x0, -12");
    }

    const KNOWN_OPCODES: [u32; 10] = [
        Opcode::OP, Opcode::OP_IMM, Opcode::JALR, Opcode::LOAD, Opcode::STORE,
        Opcode::BRANCH, Opcode::LUI, Opcode::AUIPC, Opcode::JAL, Opcode::SYSTEM,
    ];

    proptest! {
        #[test]
        fn prop_encode_inverts_decode(upper in any::<u32>(), pick in 0usize..KNOWN_OPCODES.len()) {
            let word = (upper & !0x7F) | KNOWN_OPCODES[pick];
            let instr = decode(word).unwrap();
            prop_assert_eq!(encode(&instr), word);
        }

        #[test]
        fn prop_branch_offsets(offset in -2048i32..2048) {
            let imm = offset * 2;
            let instr = Instruction::B { funct3: 0b100, rs1: 3, rs2: 4, imm };
            prop_assert_eq!(decode(encode(&instr)).unwrap(), instr);
        }

        #[test]
        fn prop_jump_offsets(offset in -(1i32 << 19)..(1 << 19)) {
            let instr = Instruction::J { rd: 1, imm: offset * 2 };
            prop_assert_eq!(decode(encode(&instr)).unwrap(), instr);
        }

        #[test]
        fn prop_store_offsets(imm in -2048i32..2048) {
            let instr = Instruction::S { funct3: 0b010, rs1: 8, rs2: 9, imm };
            prop_assert_eq!(decode(encode(&instr)).unwrap(), instr);
        }
    }
}
