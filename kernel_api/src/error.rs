//! Kernel error types

use core_types::Pid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned synchronously to the caller of the kernel API
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KernelError {
    /// Configuration was rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A program could not be loaded
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// No process with this pid exists
    #[error("Process not found: {0}")]
    ProcessNotFound(Pid),
}

/// Rejected configuration changes
///
/// A rejected change leaves every process untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Page size must be non-zero
    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),

    /// Frame count must be non-zero
    #[error("Invalid frame count: {0}")]
    InvalidFrameCount(usize),

    /// Quanta must be non-zero
    #[error("Invalid quantum: {0}")]
    InvalidQuantum(u64),

    /// Memory geometry cannot change while processes hold page tables
    #[error("Cannot change memory geometry while {0} process(es) are resident")]
    ProcessesResident(usize),

    /// The policy cannot be swapped while processes are queued in it
    #[error("Cannot change scheduling policy while {0} process(es) are ready")]
    SchedulerBusy(usize),

    /// A delay range has its bounds reversed
    #[error("Invalid delay range: {min}..={max}")]
    InvalidDelayRange { min: u64, max: u64 },

    /// A per-process frame quota must be non-zero
    #[error("Invalid per-process page limit: {0}")]
    InvalidMaxPages(usize),

    /// Page size times frame count exceeds the physical memory limit
    #[error("Physical memory of {frame_count} frames of {page_size} bytes exceeds the limit of {limit} bytes")]
    PhysicalMemoryTooLarge {
        page_size: usize,
        frame_count: usize,
        limit: usize,
    },
}

/// Program load failures
///
/// A load failure drops the affected job; scheduling continues with the rest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The program source has no program under this id
    #[error("Program not found: {0}")]
    NotFound(String),

    /// The program source failed to read the program
    #[error("Failed to read program {program}: {reason}")]
    Io { program: String, reason: String },

    /// Fewer bytes than the 12-byte header
    #[error("Program is {len} bytes, shorter than the 12-byte header")]
    TooShort { len: usize },

    /// The header declares a negative program size
    #[error("Program declares a negative size: {0}")]
    NegativeSize(i32),

    /// The declared size exceeds the configured maximum
    #[error("Program size {size} exceeds the maximum of {max} bytes")]
    Oversized { size: usize, max: usize },

    /// The body is shorter than the declared size
    #[error("Program declares {declared} bytes but only {actual} follow the header")]
    Truncated { declared: usize, actual: usize },

    /// The entry point lies outside the program body
    #[error("Entry point {initial_pc} (load offset {load_offset}) is outside a {size}-byte program")]
    InvalidEntryPoint {
        initial_pc: i32,
        load_offset: i32,
        size: usize,
    },
}

/// Faults raised while a process executes
///
/// Faults are fatal to the faulting process only. `OutOfMemory` retires the
/// process through the normal termination path; the rest abandon it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionFault {
    /// The fetched byte is not a known opcode
    #[error("Invalid instruction {opcode} at address {address}")]
    InvalidOpcode { opcode: u8, address: u32 },

    /// A register operand is out of range
    #[error("Invalid register: {0}")]
    InvalidRegister(u8),

    /// DIV with a zero divisor
    #[error("Division by zero")]
    DivisionByZero,

    /// A virtual address outside the process's address space
    #[error("Address {0} is outside the address space")]
    AddressOutOfRange(i64),

    /// No frame could be found or reclaimed for a page fault
    #[error("Out of memory: no evictable frame for {pid}")]
    OutOfMemory { pid: Pid },
}

impl ExecutionFault {
    /// Checks if the fault retires the process through normal termination
    pub fn finalizes_metrics(&self) -> bool {
        matches!(self, ExecutionFault::OutOfMemory { .. })
    }
}
