//! # Instruction Set
//!
//! Opcodes and the fixed-width instruction encoding.
//!
//! Every instruction occupies one six-byte word, except `END` which is a
//! single byte. Operand bytes follow the opcode; unused trailing bytes are
//! padding and are never fetched.
//!
//! | Opcode | Mnemonic | Layout |
//! |---|---|---|
//! | 1 | MOV | op, dst, src, pad×3 |
//! | 2 | STR | op, addr reg, src reg, pad×3 |
//! | 16-19 | ADD/SUB/MUL/DIV | op, result, a, b, pad×2 |
//! | 20 | SWI | op, imm32 LE, pad |
//! | 22 | MVI | op, reg, imm32 LE |
//! | 99 | END | op |

use serde::{Deserialize, Serialize};

/// Bytes in a full instruction word
pub const INSTRUCTION_WIDTH: u32 = 6;

/// Byte value of the `END` opcode, also appended by the loader
pub const END_OPCODE: u8 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Mov,
    Str,
    Add,
    Sub,
    Mul,
    Div,
    Swi,
    Mvi,
    End,
}

impl Opcode {
    /// Decodes an opcode byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Opcode::Mov),
            2 => Some(Opcode::Str),
            16 => Some(Opcode::Add),
            17 => Some(Opcode::Sub),
            18 => Some(Opcode::Mul),
            19 => Some(Opcode::Div),
            20 => Some(Opcode::Swi),
            22 => Some(Opcode::Mvi),
            END_OPCODE => Some(Opcode::End),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Opcode::Mov => 1,
            Opcode::Str => 2,
            Opcode::Add => 16,
            Opcode::Sub => 17,
            Opcode::Mul => 18,
            Opcode::Div => 19,
            Opcode::Swi => 20,
            Opcode::Mvi => 22,
            Opcode::End => END_OPCODE,
        }
    }

    /// Bytes the program counter advances past this instruction
    pub fn width(self) -> u32 {
        match self {
            Opcode::End => 1,
            _ => INSTRUCTION_WIDTH,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mov => "MOV",
            Opcode::Str => "STR",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Swi => "SWI",
            Opcode::Mvi => "MVI",
            Opcode::End => "END",
        }
    }
}

/// Arithmetic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// A decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Mov { dst: u8, src: u8 },
    Str { addr: u8, src: u8 },
    Arith { op: ArithOp, result: u8, a: u8, b: u8 },
    Swi { code: i32 },
    Mvi { reg: u8, imm: i32 },
    End,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Mov { .. } => Opcode::Mov,
            Instruction::Str { .. } => Opcode::Str,
            Instruction::Arith { op, .. } => match op {
                ArithOp::Add => Opcode::Add,
                ArithOp::Sub => Opcode::Sub,
                ArithOp::Mul => Opcode::Mul,
                ArithOp::Div => Opcode::Div,
            },
            Instruction::Swi { .. } => Opcode::Swi,
            Instruction::Mvi { .. } => Opcode::Mvi,
            Instruction::End => Opcode::End,
        }
    }

    /// Encodes the instruction into its on-disk word
    pub fn encode(&self) -> Vec<u8> {
        let op = self.opcode().to_byte();
        match *self {
            Instruction::Mov { dst, src } => vec![op, dst, src, 0, 0, 0],
            Instruction::Str { addr, src } => vec![op, addr, src, 0, 0, 0],
            Instruction::Arith { result, a, b, .. } => vec![op, result, a, b, 0, 0],
            Instruction::Swi { code } => {
                let mut word = vec![op];
                word.extend_from_slice(&code.to_le_bytes());
                word.push(0);
                word
            }
            Instruction::Mvi { reg, imm } => {
                let mut word = vec![op, reg];
                word.extend_from_slice(&imm.to_le_bytes());
                word
            }
            Instruction::End => vec![op],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_bytes() {
        for byte in 0..=u8::MAX {
            if let Some(opcode) = Opcode::from_byte(byte) {
                assert_eq!(opcode.to_byte(), byte);
            }
        }
        assert_eq!(Opcode::from_byte(0), None);
        assert_eq!(Opcode::from_byte(3), None);
        assert_eq!(Opcode::from_byte(21), None);
    }

    #[test]
    fn test_widths() {
        assert_eq!(Opcode::Mvi.width(), 6);
        assert_eq!(Opcode::End.width(), 1);
    }

    #[test]
    fn test_encoding_layout() {
        assert_eq!(
            Instruction::Mvi { reg: 1, imm: 7 }.encode(),
            vec![22, 1, 7, 0, 0, 0]
        );
        assert_eq!(
            Instruction::Swi { code: 4 }.encode(),
            vec![20, 4, 0, 0, 0, 0]
        );
        assert_eq!(
            Instruction::Arith {
                op: ArithOp::Sub,
                result: 2,
                a: 0,
                b: 1
            }
            .encode(),
            vec![17, 2, 0, 1, 0, 0]
        );
        assert_eq!(Instruction::End.encode(), vec![99]);
    }

    #[test]
    fn test_negative_immediate_is_little_endian() {
        let word = Instruction::Mvi { reg: 0, imm: -1 }.encode();
        assert_eq!(&word[2..], &[0xff, 0xff, 0xff, 0xff]);
    }
}
