//! Identifiers for system entities

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Process identifier
///
/// Pids are handed out in strictly increasing order by the process table
/// and are never reused within one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pid(u32);

impl Pid {
    /// Creates a pid from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the pid that follows this one
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Unique identifier for a scheduling epoch
///
/// Every call that drains the job queue produces one metrics report; the
/// epoch id lets an external metrics sink tell reports apart even when two
/// simulations run side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpochId(Uuid);

impl EpochId {
    /// Creates a new random epoch ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an epoch ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EpochId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Epoch({})", self.0)
    }
}
