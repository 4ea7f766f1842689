use super::ReadyQueue;
use crate::pcb::Pcb;
use core_types::{Pid, QueueId};
use std::collections::VecDeque;

/// First-come first-served; the quantum never expires
#[derive(Debug, Default)]
pub struct FcfsQueue {
    queue: VecDeque<Pid>,
    identity: Option<QueueId>,
}

impl FcfsQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// An FCFS queue reporting a different identity (MLFQ level 3)
    pub(crate) fn with_identity(identity: QueueId) -> Self {
        Self {
            queue: VecDeque::new(),
            identity: Some(identity),
        }
    }
}

impl ReadyQueue for FcfsQueue {
    fn enqueue(&mut self, pcb: &Pcb) -> QueueId {
        self.queue.push_back(pcb.pid());
        self.queue_id()
    }

    fn dequeue(&mut self) -> Option<Pid> {
        self.queue.pop_front()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn quantum_expired(&mut self) -> bool {
        false
    }

    fn reset_quantum(&mut self) {}

    fn queue_id(&self) -> QueueId {
        self.identity.unwrap_or(QueueId::Fcfs)
    }

    fn quantum(&self) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order_and_no_expiry() {
        let mut queue = FcfsQueue::new();
        for raw in 1..=3 {
            let pcb = Pcb::new(Pid::new(raw), "p", 0, 0);
            assert_eq!(queue.enqueue(&pcb), QueueId::Fcfs);
        }
        for _ in 0..1000 {
            assert!(!queue.quantum_expired());
        }
        assert_eq!(queue.dequeue(), Some(Pid::new(1)));
        assert_eq!(queue.dequeue(), Some(Pid::new(2)));
        assert_eq!(queue.dequeue(), Some(Pid::new(3)));
        assert!(queue.is_empty());
        assert_eq!(queue.quantum(), None);
    }
}
