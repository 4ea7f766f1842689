//! Process lifecycle states and queue identities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a process
///
/// A process is created `New`, becomes `Ready` once its program is loaded
/// and it sits in a ready-queue policy, alternates between `Running` and
/// `Ready`/`Waiting`, and ends `Terminated`. A terminated process is never
/// revived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStatus {
    /// Admitted to the job queue, program not yet loaded
    New,
    /// Loaded and waiting in a ready-queue policy
    Ready,
    /// Owns the CPU
    Running,
    /// Blocked on I/O, a semaphore, or an inline child
    Waiting,
    /// Finished or abandoned
    Terminated,
}

impl ProcessStatus {
    /// Checks if the process has reached its terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessStatus::Terminated)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessStatus::New => "NEW",
            ProcessStatus::Ready => "READY",
            ProcessStatus::Running => "RUNNING",
            ProcessStatus::Waiting => "WAITING",
            ProcessStatus::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// Identity of the queue a process occupies
///
/// Every timeline burst is tagged with one of these. The ready-queue
/// variants are reported by the active scheduling policy; the rest are
/// owned by the scheduler itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueId {
    /// Waiting for `start_after` to pass
    Job,
    /// First-come first-served ready queue
    Fcfs,
    /// Round-robin ready queue
    RoundRobin,
    /// Multi-level feedback queue, level 1 (highest priority)
    MlfqLevel1,
    /// Multi-level feedback queue, level 2
    MlfqLevel2,
    /// Multi-level feedback queue, level 3 (FCFS tail)
    MlfqLevel3,
    /// On the CPU
    Running,
    /// In the I/O queue
    Io,
    /// Blocked on a semaphore or waiting for an inline child
    Blocked,
    /// Retired
    Terminated,
}

impl QueueId {
    /// Checks if this identity belongs to a ready-queue policy
    ///
    /// Time spent in these queues counts as waiting time.
    pub fn is_ready_queue(&self) -> bool {
        matches!(
            self,
            QueueId::Fcfs
                | QueueId::RoundRobin
                | QueueId::MlfqLevel1
                | QueueId::MlfqLevel2
                | QueueId::MlfqLevel3
        )
    }

    /// Returns the MLFQ level (1-3) for MLFQ identities
    pub fn mlfq_level(&self) -> Option<u8> {
        match self {
            QueueId::MlfqLevel1 => Some(1),
            QueueId::MlfqLevel2 => Some(2),
            QueueId::MlfqLevel3 => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueueId::Job => "JOB",
            QueueId::Fcfs => "FCFS",
            QueueId::RoundRobin => "RR",
            QueueId::MlfqLevel1 => "MLFQ-1",
            QueueId::MlfqLevel2 => "MLFQ-2",
            QueueId::MlfqLevel3 => "MLFQ-3",
            QueueId::Running => "RUNNING",
            QueueId::Io => "IO",
            QueueId::Blocked => "BLOCKED",
            QueueId::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_status() {
        assert!(ProcessStatus::Terminated.is_terminal());
        assert!(!ProcessStatus::Waiting.is_terminal());
        assert!(!ProcessStatus::New.is_terminal());
    }

    #[test]
    fn test_ready_queue_identities() {
        assert!(QueueId::Fcfs.is_ready_queue());
        assert!(QueueId::RoundRobin.is_ready_queue());
        assert!(QueueId::MlfqLevel3.is_ready_queue());
        assert!(!QueueId::Running.is_ready_queue());
        assert!(!QueueId::Io.is_ready_queue());
        assert!(!QueueId::Job.is_ready_queue());
    }

    #[test]
    fn test_mlfq_levels() {
        assert_eq!(QueueId::MlfqLevel1.mlfq_level(), Some(1));
        assert_eq!(QueueId::MlfqLevel2.mlfq_level(), Some(2));
        assert_eq!(QueueId::MlfqLevel3.mlfq_level(), Some(3));
        assert_eq!(QueueId::RoundRobin.mlfq_level(), None);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ProcessStatus::Running.to_string(), "RUNNING");
        assert_eq!(QueueId::MlfqLevel2.to_string(), "MLFQ-2");
    }
}
