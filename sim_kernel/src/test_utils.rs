//! Test utilities for building programs and kernels
//!
//! `ProgramBuilder` assembles instructions straight into the binary
//! program format, so tests never need an external assembler.

use crate::config::KernelConfig;
use crate::isa::{ArithOp, Instruction, INSTRUCTION_WIDTH};
use crate::loader::encode_header;
use crate::program_source::InMemoryPrograms;
use crate::SimulatedKernel;

/// Assembles a program image: header plus body
#[derive(Debug, Clone, Default)]
pub struct ProgramBuilder {
    body: Vec<u8>,
    entry: u32,
    load_offset: i32,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.body.extend(instruction.encode());
        self
    }

    pub fn mov(self, dst: u8, src: u8) -> Self {
        self.instruction(Instruction::Mov { dst, src })
    }

    pub fn str(self, addr: u8, src: u8) -> Self {
        self.instruction(Instruction::Str { addr, src })
    }

    pub fn mvi(self, reg: u8, imm: i32) -> Self {
        self.instruction(Instruction::Mvi { reg, imm })
    }

    pub fn add(self, result: u8, a: u8, b: u8) -> Self {
        self.arith(ArithOp::Add, result, a, b)
    }

    pub fn sub(self, result: u8, a: u8, b: u8) -> Self {
        self.arith(ArithOp::Sub, result, a, b)
    }

    pub fn mul(self, result: u8, a: u8, b: u8) -> Self {
        self.arith(ArithOp::Mul, result, a, b)
    }

    pub fn div(self, result: u8, a: u8, b: u8) -> Self {
        self.arith(ArithOp::Div, result, a, b)
    }

    fn arith(self, op: ArithOp, result: u8, a: u8, b: u8) -> Self {
        self.instruction(Instruction::Arith { op, result, a, b })
    }

    pub fn swi(self, code: i32) -> Self {
        self.instruction(Instruction::Swi { code })
    }

    pub fn end(self) -> Self {
        self.instruction(Instruction::End)
    }

    /// `count` register moves, each one tick of CPU work
    pub fn busy(mut self, count: usize) -> Self {
        for _ in 0..count {
            self = self.mov(0, 0);
        }
        self
    }

    /// Raw bytes (data or deliberately invalid code)
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    /// Starts execution at the current end of the body
    pub fn entry_here(mut self) -> Self {
        self.entry = self.body.len() as u32;
        self
    }

    /// Sets the header's load offset; the entry point stays where it was
    pub fn load_offset(mut self, offset: i32) -> Self {
        self.load_offset = offset;
        self
    }

    /// Body length so far
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Virtual address of instruction `index`, assuming full-width words
    pub fn address_of(index: usize) -> u32 {
        index as u32 * INSTRUCTION_WIDTH
    }

    pub fn build(self) -> Vec<u8> {
        let initial_pc = self.entry as i32 + self.load_offset;
        let mut bytes = encode_header(self.body.len() as i32, initial_pc, self.load_offset).to_vec();
        bytes.extend(self.body);
        bytes
    }
}

/// Builds a kernel whose program source holds `programs`
pub fn kernel_with_programs(config: KernelConfig, programs: &[(&str, Vec<u8>)]) -> SimulatedKernel {
    let mut source = InMemoryPrograms::new();
    for (name, bytes) in programs {
        source.insert(*name, bytes.clone());
    }
    SimulatedKernel::with_config(config, Box::new(source))
        .unwrap_or_else(|err| panic!("invalid test configuration: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader;

    #[test]
    fn test_builder_output_parses() {
        let bytes = ProgramBuilder::new().mvi(0, 5).busy(2).end().build();
        let image = loader::parse(&bytes, 16, 1024).unwrap();
        assert_eq!(image.size, 19);
        assert_eq!(image.entry, 0);
        assert_eq!(image.backing_store[18], 99);
    }

    #[test]
    fn test_entry_and_offset() {
        let bytes = ProgramBuilder::new()
            .raw(&[0; 4])
            .entry_here()
            .end()
            .load_offset(100)
            .build();
        let image = loader::parse(&bytes, 16, 1024).unwrap();
        assert_eq!(image.entry, 4);
    }

    #[test]
    fn test_address_of() {
        assert_eq!(ProgramBuilder::address_of(3), 18);
    }
}
