//! # Inter-Process Communication
//!
//! Named shared-memory segments and counting semaphores.
//!
//! Both registries live beside the page tables, not inside them: a segment
//! is a word array addressed by key and index through syscalls, so it never
//! takes part in translation or eviction.

use core_types::Pid;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

/// Failures reported back to the calling process as `-1`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpcError {
    #[error("Segment {0} does not exist")]
    UnknownSegment(i32),

    #[error("Segment size must be positive, got {0}")]
    InvalidSegmentSize(i32),

    #[error("Segment {key} opened with {requested} words but holds {existing}")]
    SegmentSizeMismatch {
        key: i32,
        requested: usize,
        existing: usize,
    },

    #[error("Index {index} is outside segment {key}")]
    IndexOutOfRange { key: i32, index: i32 },

    #[error("Semaphore {0} does not exist")]
    UnknownSemaphore(i32),

    #[error("Semaphore {0} still has blocked waiters")]
    SemaphoreBusy(i32),
}

/// Shared-memory segments keyed by integer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedMemory {
    segments: BTreeMap<i32, Vec<i32>>,
}

impl SharedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates segment `key` with `words` zeroed words, or opens it if it
    /// already exists with that size
    pub fn open(&mut self, key: i32, words: i32) -> Result<(), IpcError> {
        let size = usize::try_from(words)
            .ok()
            .filter(|&size| size > 0)
            .ok_or(IpcError::InvalidSegmentSize(words))?;
        match self.segments.get(&key) {
            Some(existing) if existing.len() != size => Err(IpcError::SegmentSizeMismatch {
                key,
                requested: size,
                existing: existing.len(),
            }),
            Some(_) => Ok(()),
            None => {
                self.segments.insert(key, vec![0; size]);
                Ok(())
            }
        }
    }

    pub fn write(&mut self, key: i32, index: i32, value: i32) -> Result<(), IpcError> {
        let segment = self
            .segments
            .get_mut(&key)
            .ok_or(IpcError::UnknownSegment(key))?;
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| segment.get_mut(i))
            .ok_or(IpcError::IndexOutOfRange { key, index })?;
        *slot = value;
        Ok(())
    }

    pub fn read(&self, key: i32, index: i32) -> Result<i32, IpcError> {
        let segment = self
            .segments
            .get(&key)
            .ok_or(IpcError::UnknownSegment(key))?;
        usize::try_from(index)
            .ok()
            .and_then(|i| segment.get(i))
            .copied()
            .ok_or(IpcError::IndexOutOfRange { key, index })
    }

    pub fn unlink(&mut self, key: i32) -> Result<(), IpcError> {
        self.segments
            .remove(&key)
            .map(|_| ())
            .ok_or(IpcError::UnknownSegment(key))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Result of a semaphore wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemWait {
    /// The count stayed non-negative
    Acquired,
    /// The caller was queued and must leave the CPU
    Blocked,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Semaphore {
    count: i64,
    waiters: VecDeque<Pid>,
}

/// Counting semaphores keyed by integer, with FIFO waiters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Semaphores {
    semaphores: BTreeMap<i32, Semaphore>,
}

impl Semaphores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or resets semaphore `key`
    ///
    /// Resetting a semaphore that has blocked waiters is refused, since
    /// those waiters would never be woken.
    pub fn init(&mut self, key: i32, initial: i32) -> Result<(), IpcError> {
        if let Some(existing) = self.semaphores.get(&key) {
            if !existing.waiters.is_empty() {
                return Err(IpcError::SemaphoreBusy(key));
            }
        }
        self.semaphores.insert(
            key,
            Semaphore {
                count: initial as i64,
                waiters: VecDeque::new(),
            },
        );
        Ok(())
    }

    pub fn wait(&mut self, key: i32, pid: Pid) -> Result<SemWait, IpcError> {
        let semaphore = self
            .semaphores
            .get_mut(&key)
            .ok_or(IpcError::UnknownSemaphore(key))?;
        semaphore.count -= 1;
        if semaphore.count < 0 {
            semaphore.waiters.push_back(pid);
            Ok(SemWait::Blocked)
        } else {
            Ok(SemWait::Acquired)
        }
    }

    /// Decrements only if that would not block
    pub fn try_wait(&mut self, key: i32) -> Result<bool, IpcError> {
        let semaphore = self
            .semaphores
            .get_mut(&key)
            .ok_or(IpcError::UnknownSemaphore(key))?;
        if semaphore.count > 0 {
            semaphore.count -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Increments the count, returning the waiter to wake, if any
    pub fn signal(&mut self, key: i32) -> Result<Option<Pid>, IpcError> {
        let semaphore = self
            .semaphores
            .get_mut(&key)
            .ok_or(IpcError::UnknownSemaphore(key))?;
        semaphore.count += 1;
        if semaphore.count <= 0 {
            Ok(semaphore.waiters.pop_front())
        } else {
            Ok(None)
        }
    }

    pub fn count(&self, key: i32) -> Option<i64> {
        self.semaphores.get(&key).map(|semaphore| semaphore.count)
    }

    /// Every process blocked on any semaphore
    pub fn blocked(&self) -> Vec<(i32, Pid)> {
        self.semaphores
            .iter()
            .flat_map(|(key, semaphore)| semaphore.waiters.iter().map(move |pid| (*key, *pid)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_lifecycle() {
        let mut shm = SharedMemory::new();
        shm.open(7, 4).unwrap();
        shm.write(7, 2, 99).unwrap();
        assert_eq!(shm.read(7, 2), Ok(99));
        assert_eq!(shm.read(7, 0), Ok(0));

        // Reopening with the same size keeps the contents.
        shm.open(7, 4).unwrap();
        assert_eq!(shm.read(7, 2), Ok(99));

        shm.unlink(7).unwrap();
        assert_eq!(shm.read(7, 2), Err(IpcError::UnknownSegment(7)));
        assert!(shm.is_empty());
    }

    #[test]
    fn test_segment_errors() {
        let mut shm = SharedMemory::new();
        assert_eq!(shm.open(1, 0), Err(IpcError::InvalidSegmentSize(0)));
        shm.open(1, 2).unwrap();
        assert!(matches!(
            shm.open(1, 3),
            Err(IpcError::SegmentSizeMismatch { .. })
        ));
        assert_eq!(
            shm.write(1, 2, 5),
            Err(IpcError::IndexOutOfRange { key: 1, index: 2 })
        );
        assert_eq!(
            shm.read(1, -1),
            Err(IpcError::IndexOutOfRange { key: 1, index: -1 })
        );
        assert_eq!(shm.unlink(9), Err(IpcError::UnknownSegment(9)));
    }

    #[test]
    fn test_semaphore_blocks_fifo() {
        let mut sems = Semaphores::new();
        sems.init(1, 1).unwrap();
        assert_eq!(sems.wait(1, Pid::new(1)), Ok(SemWait::Acquired));
        assert_eq!(sems.wait(1, Pid::new(2)), Ok(SemWait::Blocked));
        assert_eq!(sems.wait(1, Pid::new(3)), Ok(SemWait::Blocked));
        assert_eq!(sems.count(1), Some(-2));
        assert_eq!(sems.blocked(), vec![(1, Pid::new(2)), (1, Pid::new(3))]);

        assert_eq!(sems.signal(1), Ok(Some(Pid::new(2))));
        assert_eq!(sems.signal(1), Ok(Some(Pid::new(3))));
        assert_eq!(sems.signal(1), Ok(None));
        assert_eq!(sems.count(1), Some(1));
    }

    #[test]
    fn test_semaphore_reinit_refused_with_waiters() {
        let mut sems = Semaphores::new();
        sems.init(3, 0).unwrap();
        sems.wait(3, Pid::new(1)).unwrap();
        assert_eq!(sems.init(3, 5), Err(IpcError::SemaphoreBusy(3)));
    }

    #[test]
    fn test_try_wait_never_blocks() {
        let mut sems = Semaphores::new();
        sems.init(2, 1).unwrap();
        assert_eq!(sems.try_wait(2), Ok(true));
        assert_eq!(sems.try_wait(2), Ok(false));
        assert_eq!(sems.count(2), Some(0));
        assert_eq!(sems.try_wait(4), Err(IpcError::UnknownSemaphore(4)));
    }
}
