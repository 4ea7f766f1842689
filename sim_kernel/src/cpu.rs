//! # CPU Execution Engine
//!
//! A single execution context running the fetch-decode-execute cycle.
//!
//! ## Philosophy
//!
//! The CPU owns registers and nothing else. Every byte it touches goes
//! through a [`MemoryBus`], which is where translation and page faults live,
//! and every instruction is one call to [`Cpu::step`]. Ticking the clock,
//! handling syscalls and retiring processes are the kernel's job; the CPU
//! only reports what the instruction asked for.

use crate::isa::{ArithOp, Instruction, Opcode};
use core_types::Pid;
use kernel_api::ExecutionFault;
use serde::{Deserialize, Serialize};

/// Number of general-purpose registers (`r0`..`r10`)
pub const GENERAL_REGISTERS: usize = 11;

/// Register file: general registers plus a distinct program counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegisterFile {
    pub general: [i32; GENERAL_REGISTERS],
    pub pc: u32,
}

impl RegisterFile {
    /// Creates a zeroed register file starting at `pc`
    pub fn at(pc: u32) -> Self {
        Self {
            general: [0; GENERAL_REGISTERS],
            pc,
        }
    }

    pub fn get(&self, reg: u8) -> Result<i32, ExecutionFault> {
        self.general
            .get(reg as usize)
            .copied()
            .ok_or(ExecutionFault::InvalidRegister(reg))
    }

    pub fn set(&mut self, reg: u8, value: i32) -> Result<(), ExecutionFault> {
        let slot = self
            .general
            .get_mut(reg as usize)
            .ok_or(ExecutionFault::InvalidRegister(reg))?;
        *slot = value;
        Ok(())
    }
}

/// Byte-addressed view of one process's virtual memory
pub trait MemoryBus {
    /// Reads one byte, faulting the page in if needed
    fn read_byte(&mut self, vaddr: u32) -> Result<u8, ExecutionFault>;

    /// Writes one byte, faulting the page in if needed and marking it dirty
    fn write_byte(&mut self, vaddr: u32, value: u8) -> Result<(), ExecutionFault>;

    /// Writes a little-endian word byte by byte
    fn write_word(&mut self, vaddr: u32, value: i32) -> Result<(), ExecutionFault> {
        for (offset, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_byte(offset_address(vaddr, offset as u32)?, byte)?;
        }
        Ok(())
    }
}

/// Outcome of one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing loaded on the CPU
    Idle,
    /// Ordinary instruction completed
    Continue,
    /// `SWI` with its code; the program counter is already past it
    Syscall(i32),
    /// `END` executed
    Halt,
}

/// The single CPU
#[derive(Debug, Default)]
pub struct Cpu {
    current: Option<(Pid, RegisterFile)>,
    kernel_mode: bool,
    instructions_retired: u64,
    syscalls: u64,
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process currently loaded, if any
    pub fn current_pid(&self) -> Option<Pid> {
        self.current.as_ref().map(|(pid, _)| *pid)
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    pub fn registers(&self) -> Option<&RegisterFile> {
        self.current.as_ref().map(|(_, regs)| regs)
    }

    pub fn registers_mut(&mut self) -> Option<&mut RegisterFile> {
        self.current.as_mut().map(|(_, regs)| regs)
    }

    /// Swaps execution contexts
    ///
    /// Returns the outgoing context so the caller can store it in its PCB,
    /// and loads `incoming` as-is: the program counter is never reset, so a
    /// preempted process resumes where it stopped.
    pub fn transition(
        &mut self,
        incoming: Option<(Pid, RegisterFile)>,
    ) -> Option<(Pid, RegisterFile)> {
        std::mem::replace(&mut self.current, incoming)
    }

    pub fn enter_kernel(&mut self) {
        self.kernel_mode = true;
        self.syscalls += 1;
    }

    pub fn exit_kernel(&mut self) {
        self.kernel_mode = false;
    }

    pub fn in_kernel_mode(&self) -> bool {
        self.kernel_mode
    }

    pub fn instructions_retired(&self) -> u64 {
        self.instructions_retired
    }

    pub fn syscall_count(&self) -> u64 {
        self.syscalls
    }

    /// Executes one instruction of the loaded process
    ///
    /// On a fault the registers are left as they were before the
    /// instruction, apart from any bytes already stored by `STR`.
    pub fn step(&mut self, bus: &mut dyn MemoryBus) -> Result<Step, ExecutionFault> {
        let Some((_, regs)) = self.current.as_mut() else {
            return Ok(Step::Idle);
        };

        let pc = regs.pc;
        let instruction = fetch(bus, pc)?;
        let mut step = Step::Continue;

        match instruction {
            Instruction::Mov { dst, src } => {
                let value = regs.get(src)?;
                regs.set(dst, value)?;
            }
            Instruction::Str { addr, src } => {
                let target = regs.get(addr)?;
                let value = regs.get(src)?;
                let target = u32::try_from(target)
                    .map_err(|_| ExecutionFault::AddressOutOfRange(target as i64))?;
                bus.write_word(target, value)?;
            }
            Instruction::Arith { op, result, a, b } => {
                let lhs = regs.get(a)?;
                let rhs = regs.get(b)?;
                let value = match op {
                    ArithOp::Add => lhs.wrapping_add(rhs),
                    ArithOp::Sub => lhs.wrapping_sub(rhs),
                    ArithOp::Mul => lhs.wrapping_mul(rhs),
                    ArithOp::Div => {
                        if rhs == 0 {
                            return Err(ExecutionFault::DivisionByZero);
                        }
                        lhs.wrapping_div(rhs)
                    }
                };
                regs.set(result, value)?;
            }
            Instruction::Swi { code } => step = Step::Syscall(code),
            Instruction::Mvi { reg, imm } => regs.set(reg, imm)?,
            Instruction::End => step = Step::Halt,
        }

        regs.pc = pc.saturating_add(instruction.opcode().width());
        self.instructions_retired += 1;
        Ok(step)
    }
}

fn offset_address(base: u32, offset: u32) -> Result<u32, ExecutionFault> {
    base.checked_add(offset)
        .ok_or(ExecutionFault::AddressOutOfRange(base as i64 + offset as i64))
}

fn fetch_operand(bus: &mut dyn MemoryBus, pc: u32, offset: u32) -> Result<u8, ExecutionFault> {
    bus.read_byte(offset_address(pc, offset)?)
}

fn fetch_imm(bus: &mut dyn MemoryBus, pc: u32, offset: u32) -> Result<i32, ExecutionFault> {
    let mut bytes = [0u8; 4];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = fetch_operand(bus, pc, offset + i as u32)?;
    }
    Ok(i32::from_le_bytes(bytes))
}

fn fetch_arith(bus: &mut dyn MemoryBus, pc: u32, op: ArithOp) -> Result<Instruction, ExecutionFault> {
    Ok(Instruction::Arith {
        op,
        result: fetch_operand(bus, pc, 1)?,
        a: fetch_operand(bus, pc, 2)?,
        b: fetch_operand(bus, pc, 3)?,
    })
}

/// Fetches and decodes the instruction at `pc`, reading only operand bytes
fn fetch(bus: &mut dyn MemoryBus, pc: u32) -> Result<Instruction, ExecutionFault> {
    let byte = bus.read_byte(pc)?;
    let opcode = Opcode::from_byte(byte).ok_or(ExecutionFault::InvalidOpcode {
        opcode: byte,
        address: pc,
    })?;

    match opcode {
        Opcode::Mov => Ok(Instruction::Mov {
            dst: fetch_operand(bus, pc, 1)?,
            src: fetch_operand(bus, pc, 2)?,
        }),
        Opcode::Str => Ok(Instruction::Str {
            addr: fetch_operand(bus, pc, 1)?,
            src: fetch_operand(bus, pc, 2)?,
        }),
        Opcode::Add => fetch_arith(bus, pc, ArithOp::Add),
        Opcode::Sub => fetch_arith(bus, pc, ArithOp::Sub),
        Opcode::Mul => fetch_arith(bus, pc, ArithOp::Mul),
        Opcode::Div => fetch_arith(bus, pc, ArithOp::Div),
        Opcode::Swi => Ok(Instruction::Swi {
            code: fetch_imm(bus, pc, 1)?,
        }),
        Opcode::Mvi => Ok(Instruction::Mvi {
            reg: fetch_operand(bus, pc, 1)?,
            imm: fetch_imm(bus, pc, 2)?,
        }),
        Opcode::End => Ok(Instruction::End),
    }
}
