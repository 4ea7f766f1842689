//! Syscall gate at the user/kernel boundary.
//!
//! `SWI` carries a raw integer code. The gate turns it into a named
//! [`Syscall`] and records every crossing, so tests can assert exactly
//! which calls a program made and when. Unknown codes are recorded and
//! rejected; they never fault the caller.

use core_types::Pid;
use serde::{Deserialize, Serialize};

/// The syscall table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Syscall {
    /// Emit r0 to the console
    PrintR0,
    /// Emit r1 to the console
    PrintR1,
    /// Run the child program inline to completion
    Spawn,
    /// Burn a random number of ticks
    Wait,
    /// Block in the I/O queue
    Io,
    /// Create or open segment r1 with r0 words
    ShmOpen,
    /// Store r0 at index r2 of segment r1
    ShmWrite,
    /// Load index r2 of segment r1 into r0
    ShmRead,
    /// Remove segment r1
    ShmUnlink,
    /// Create semaphore r1 with initial count r0
    SemInit,
    /// Decrement semaphore r1, blocking when it goes negative
    SemWait,
    /// Increment semaphore r1, waking the oldest waiter
    SemSignal,
}

impl Syscall {
    pub fn from_code(code: i32) -> Option<Self> {
        let syscall = match code {
            0 => Syscall::PrintR0,
            1 => Syscall::PrintR1,
            2 => Syscall::Spawn,
            3 => Syscall::Wait,
            4 => Syscall::Io,
            5 => Syscall::ShmOpen,
            6 => Syscall::ShmWrite,
            7 => Syscall::ShmRead,
            8 => Syscall::ShmUnlink,
            9 => Syscall::SemInit,
            10 => Syscall::SemWait,
            11 => Syscall::SemSignal,
            _ => return None,
        };
        Some(syscall)
    }

    pub fn code(self) -> i32 {
        match self {
            Syscall::PrintR0 => 0,
            Syscall::PrintR1 => 1,
            Syscall::Spawn => 2,
            Syscall::Wait => 3,
            Syscall::Io => 4,
            Syscall::ShmOpen => 5,
            Syscall::ShmWrite => 6,
            Syscall::ShmRead => 7,
            Syscall::ShmUnlink => 8,
            Syscall::SemInit => 9,
            Syscall::SemWait => 10,
            Syscall::SemSignal => 11,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Syscall::PrintR0 => "print_r0",
            Syscall::PrintR1 => "print_r1",
            Syscall::Spawn => "spawn",
            Syscall::Wait => "wait",
            Syscall::Io => "io",
            Syscall::ShmOpen => "shm_open",
            Syscall::ShmWrite => "shm_write",
            Syscall::ShmRead => "shm_read",
            Syscall::ShmUnlink => "shm_unlink",
            Syscall::SemInit => "sem_init",
            Syscall::SemWait => "sem_wait",
            Syscall::SemSignal => "sem_signal",
        }
    }
}

/// Syscall audit event (for testing and verification).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyscallEvent {
    /// A known syscall was invoked
    Invoked {
        pid: Pid,
        syscall: Syscall,
        tick: u64,
    },
    /// An unknown code was rejected
    Rejected { pid: Pid, code: i32, tick: u64 },
}

/// Decodes syscall codes and keeps the audit trail
#[derive(Debug, Default)]
pub struct SyscallGate {
    audit_log: Vec<SyscallEvent>,
}

impl SyscallGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `code` for `pid`, recording the crossing
    pub fn enter(&mut self, pid: Pid, code: i32, tick: u64) -> Option<Syscall> {
        match Syscall::from_code(code) {
            Some(syscall) => {
                self.audit_log.push(SyscallEvent::Invoked { pid, syscall, tick });
                Some(syscall)
            }
            None => {
                self.audit_log.push(SyscallEvent::Rejected { pid, code, tick });
                None
            }
        }
    }

    pub fn audit_log(&self) -> &[SyscallEvent] {
        &self.audit_log
    }

    /// Syscalls invoked by `pid`, in order
    pub fn invoked_by(&self, pid: Pid) -> Vec<Syscall> {
        self.audit_log
            .iter()
            .filter_map(|event| match event {
                SyscallEvent::Invoked {
                    pid: caller,
                    syscall,
                    ..
                } if *caller == pid => Some(*syscall),
                _ => None,
            })
            .collect()
    }
}
