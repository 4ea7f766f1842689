//! Processes blocked on simulated I/O

use core_types::Pid;
use std::collections::VecDeque;

/// One blocked process and the tick at which its I/O completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoRequest {
    pub pid: Pid,
    pub release_at: u64,
}

/// FIFO of processes waiting for I/O completion
#[derive(Debug, Default)]
pub struct IoQueue {
    requests: VecDeque<IoRequest>,
}

impl IoQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pid: Pid, release_at: u64) {
        self.requests.push_back(IoRequest { pid, release_at });
    }

    /// Removes every request due at `now`, in queue order
    pub fn release_due(&mut self, now: u64) -> Vec<Pid> {
        let mut released = Vec::new();
        self.requests.retain(|request| {
            if request.release_at <= now {
                released.push(request.pid);
                false
            } else {
                true
            }
        });
        released
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.requests.iter().any(|request| request.pid == pid)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> impl Iterator<Item = &IoRequest> {
        self.requests.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_due_in_fifo_order() {
        let mut queue = IoQueue::new();
        queue.push(Pid::new(1), 5);
        queue.push(Pid::new(2), 3);
        queue.push(Pid::new(3), 9);

        assert!(queue.release_due(2).is_empty());
        assert_eq!(queue.release_due(5), vec![Pid::new(1), Pid::new(2)]);
        assert!(queue.contains(Pid::new(3)));
        assert!(!queue.contains(Pid::new(1)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.release_due(100), vec![Pid::new(3)]);
        assert!(queue.is_empty());
    }
}
