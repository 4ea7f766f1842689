use super::ReadyQueue;
use crate::pcb::Pcb;
use core_types::{Pid, QueueId};
use std::collections::VecDeque;

/// Round-robin with a fixed quantum
#[derive(Debug)]
pub struct RoundRobinQueue {
    queue: VecDeque<Pid>,
    quantum: u64,
    /// Ticks charged to the running process in this quantum
    counter: u64,
    identity: QueueId,
}

impl RoundRobinQueue {
    pub fn new(quantum: u64) -> Self {
        Self::with_identity(quantum, QueueId::RoundRobin)
    }

    /// A round-robin queue reporting a different identity (MLFQ levels)
    pub(crate) fn with_identity(quantum: u64, identity: QueueId) -> Self {
        Self {
            queue: VecDeque::new(),
            quantum,
            counter: 0,
            identity,
        }
    }

    /// Ticks charged so far in the current quantum
    pub fn counter(&self) -> u64 {
        self.counter
    }
}

impl ReadyQueue for RoundRobinQueue {
    fn enqueue(&mut self, pcb: &Pcb) -> QueueId {
        self.queue.push_back(pcb.pid());
        self.identity
    }

    fn dequeue(&mut self) -> Option<Pid> {
        self.queue.pop_front()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn quantum_expired(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.quantum {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    fn reset_quantum(&mut self) {
        self.counter = 0;
    }

    fn queue_id(&self) -> QueueId {
        self.identity
    }

    fn quantum(&self) -> Option<u64> {
        Some(self.quantum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_every_quantum() {
        let mut queue = RoundRobinQueue::new(3);
        let expiries: Vec<bool> = (0..6).map(|_| queue.quantum_expired()).collect();
        assert_eq!(expiries, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_reset_starts_fresh_quantum() {
        let mut queue = RoundRobinQueue::new(2);
        assert!(!queue.quantum_expired());
        queue.reset_quantum();
        assert_eq!(queue.counter(), 0);
        assert!(!queue.quantum_expired());
        assert!(queue.quantum_expired());
    }

    #[test]
    fn test_rotation_order() {
        let mut queue = RoundRobinQueue::new(2);
        let a = Pcb::new(Pid::new(1), "a", 0, 0);
        let b = Pcb::new(Pid::new(2), "b", 0, 0);
        queue.enqueue(&a);
        queue.enqueue(&b);
        assert_eq!(queue.dequeue(), Some(Pid::new(1)));
        queue.enqueue(&a);
        assert_eq!(queue.dequeue(), Some(Pid::new(2)));
        assert_eq!(queue.dequeue(), Some(Pid::new(1)));
        assert_eq!(queue.dequeue(), None);
    }
}
