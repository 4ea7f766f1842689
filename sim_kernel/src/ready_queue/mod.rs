//! # Ready-Queue Policies
//!
//! One queueing interface, three policies.
//!
//! Queues hold pids, never PCBs; the process table owns every PCB. The
//! scheduler asks the active policy where a process goes, what runs next
//! and, once per running tick, whether the running process has used up its
//! quantum.

mod fcfs;
mod mlfq;
mod round_robin;

pub use fcfs::FcfsQueue;
pub use mlfq::{MlfqQueue, DEMOTION_THRESHOLD, STARVATION_LIMIT};
pub use round_robin::RoundRobinQueue;

use crate::pcb::Pcb;
use core_types::{Pid, QueueId};
use kernel_api::SchedulingPolicy;

/// Uniform interface over the scheduling policies
pub trait ReadyQueue: std::fmt::Debug {
    /// Queues `pcb`, returning the identity of the queue it landed in
    fn enqueue(&mut self, pcb: &Pcb) -> QueueId;

    /// Takes the next process to run
    fn dequeue(&mut self) -> Option<Pid>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Charges one running tick, returning true when the quantum is used up
    ///
    /// The counter resets after reporting expiry.
    fn quantum_expired(&mut self) -> bool;

    /// Starts a fresh quantum for a newly dispatched process
    fn reset_quantum(&mut self);

    /// Identity of the queue currently being served
    fn queue_id(&self) -> QueueId;

    /// Quantum of the queue currently being served; `None` means unbounded
    fn quantum(&self) -> Option<u64>;
}

/// Builds the ready queue for `policy`
pub fn build(policy: SchedulingPolicy) -> Box<dyn ReadyQueue> {
    match policy {
        SchedulingPolicy::Fcfs => Box::new(FcfsQueue::new()),
        SchedulingPolicy::RoundRobin { quantum } => Box::new(RoundRobinQueue::new(quantum)),
        SchedulingPolicy::Mlfq {
            level1_quantum,
            level2_quantum,
        } => Box::new(MlfqQueue::new(level1_quantum, level2_quantum)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_matches_policy() {
        assert_eq!(build(SchedulingPolicy::Fcfs).queue_id(), QueueId::Fcfs);
        let rr = build(SchedulingPolicy::RoundRobin { quantum: 3 });
        assert_eq!(rr.queue_id(), QueueId::RoundRobin);
        assert_eq!(rr.quantum(), Some(3));
        let mlfq = build(SchedulingPolicy::Mlfq {
            level1_quantum: 2,
            level2_quantum: 4,
        });
        assert_eq!(mlfq.queue_id(), QueueId::MlfqLevel1);
        assert_eq!(mlfq.quantum(), Some(2));
    }
}
