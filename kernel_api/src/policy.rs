//! Scheduling policy descriptors

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which ready-queue policy the scheduler runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingPolicy {
    /// First-come first-served, never preempts
    Fcfs,
    /// Round-robin with a fixed quantum
    RoundRobin { quantum: u64 },
    /// Three-level feedback queue: RR(q1), RR(q2), FCFS
    Mlfq {
        level1_quantum: u64,
        level2_quantum: u64,
    },
}

impl SchedulingPolicy {
    /// Rejects zero quanta
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            SchedulingPolicy::Fcfs => Ok(()),
            SchedulingPolicy::RoundRobin { quantum } => non_zero(quantum),
            SchedulingPolicy::Mlfq {
                level1_quantum,
                level2_quantum,
            } => {
                non_zero(level1_quantum)?;
                non_zero(level2_quantum)
            }
        }
    }

    /// Short policy name used in reports
    pub fn name(&self) -> &'static str {
        match self {
            SchedulingPolicy::Fcfs => "fcfs",
            SchedulingPolicy::RoundRobin { .. } => "rr",
            SchedulingPolicy::Mlfq { .. } => "mlfq",
        }
    }

    /// Configured quanta, outermost level first. Empty for FCFS.
    pub fn quanta(&self) -> Vec<u64> {
        match *self {
            SchedulingPolicy::Fcfs => Vec::new(),
            SchedulingPolicy::RoundRobin { quantum } => vec![quantum],
            SchedulingPolicy::Mlfq {
                level1_quantum,
                level2_quantum,
            } => vec![level1_quantum, level2_quantum],
        }
    }
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        SchedulingPolicy::RoundRobin { quantum: 5 }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingPolicy::Fcfs => write!(f, "fcfs"),
            SchedulingPolicy::RoundRobin { quantum } => write!(f, "rr(q={})", quantum),
            SchedulingPolicy::Mlfq {
                level1_quantum,
                level2_quantum,
            } => write!(f, "mlfq(q1={}, q2={})", level1_quantum, level2_quantum),
        }
    }
}

fn non_zero(quantum: u64) -> Result<(), ConfigError> {
    if quantum == 0 {
        Err(ConfigError::InvalidQuantum(quantum))
    } else {
        Ok(())
    }
}
