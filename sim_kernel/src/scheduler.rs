//! # Scheduler
//!
//! Moves processes between the job queue, the active ready-queue policy,
//! the CPU, the I/O queue and the terminated list.
//!
//! ## Philosophy
//!
//! - **Mechanism, not policy**: the ready-queue policy decides order and
//!   quantum; this module only performs the transitions.
//! - **Determinism first**: same inputs + same ticks => same schedule.
//! - **No hidden yields**: every transition is an explicit call, stamped
//!   with the tick it happened at and recorded in the audit log.
//!
//! Every transition also updates the PCB's status and timeline, so the
//! queue a pid sits in and the status of its PCB never disagree.

use crate::io_queue::IoQueue;
use crate::pcb::{Pcb, ProcessError};
use crate::ready_queue::{self, ReadyQueue};
use core_types::{Pid, ProcessStatus, QueueId};
use kernel_api::{ConfigError, ExecutionFault, SchedulingPolicy};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Reason a process left the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// `END` executed
    Normal,
    /// No frame could be found for a page fault
    ResourceExhaustion,
    /// Abandoned on an execution fault
    Failed(ExecutionFault),
    /// The program could not be loaded
    Rejected,
}

impl ExitReason {
    /// Classifies a fault: out-of-memory retires normally, the rest abandon
    pub fn from_fault(fault: ExecutionFault) -> Self {
        if fault.finalizes_metrics() {
            ExitReason::ResourceExhaustion
        } else {
            ExitReason::Failed(fault)
        }
    }

    /// Checks if the exit records completion time and counts in metrics
    pub fn finalizes_metrics(&self) -> bool {
        matches!(self, ExitReason::Normal | ExitReason::ResourceExhaustion)
    }
}

/// Scheduling event for audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    /// Added to the job queue
    Admitted { pid: Pid, tick: u64 },
    /// Placed in a ready queue
    Readied { pid: Pid, queue: QueueId, tick: u64 },
    /// Given the CPU
    Dispatched { pid: Pid, tick: u64 },
    /// Quantum expired while running
    Preempted { pid: Pid, tick: u64 },
    /// Left the CPU to wait in `queue`
    Blocked { pid: Pid, queue: QueueId, tick: u64 },
    /// Retired
    Exited {
        pid: Pid,
        reason: ExitReason,
        tick: u64,
    },
}

/// Queue orchestration for the simulated kernel
#[derive(Debug)]
pub struct Scheduler {
    policy: SchedulingPolicy,
    jobs: VecDeque<Pid>,
    ready: Box<dyn ReadyQueue>,
    io: IoQueue,
    terminated: Vec<Pid>,
    /// Audit log for scheduling events
    audit_log: Vec<ScheduleEvent>,
}

impl Scheduler {
    pub fn new(policy: SchedulingPolicy) -> Self {
        Self {
            policy,
            jobs: VecDeque::new(),
            ready: ready_queue::build(policy),
            io: IoQueue::new(),
            terminated: Vec::new(),
            audit_log: Vec::new(),
        }
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Replaces the ready-queue policy
    ///
    /// Refused while anything is queued in the current policy, since
    /// queued pids cannot be carried across policies.
    pub fn set_policy(&mut self, policy: SchedulingPolicy) -> Result<(), ConfigError> {
        policy.validate()?;
        if !self.ready.is_empty() {
            return Err(ConfigError::SchedulerBusy(self.ready.len()));
        }
        self.policy = policy;
        self.ready = ready_queue::build(policy);
        Ok(())
    }

    /// Adds a freshly created process to the job queue
    pub fn admit(&mut self, pid: Pid, now: u64) {
        self.jobs.push_back(pid);
        self.audit_log.push(ScheduleEvent::Admitted { pid, tick: now });
    }

    pub fn pop_job(&mut self) -> Option<Pid> {
        self.jobs.pop_front()
    }

    /// Puts a job whose start tick has not arrived back at the tail
    pub fn requeue_job(&mut self, pid: Pid) {
        self.jobs.push_back(pid);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Queues `pcb` in the active policy
    pub fn make_ready(&mut self, pcb: &mut Pcb, now: u64) -> Result<QueueId, ProcessError> {
        let ready = &mut self.ready;
        let queue = pcb.enter_ready(now, |pcb| ready.enqueue(pcb))?;
        self.audit_log.push(ScheduleEvent::Readied {
            pid: pcb.pid(),
            queue,
            tick: now,
        });
        Ok(queue)
    }

    /// Requeues a running process whose quantum expired
    pub fn preempt(&mut self, pcb: &mut Pcb, now: u64) -> Result<QueueId, ProcessError> {
        self.audit_log.push(ScheduleEvent::Preempted {
            pid: pcb.pid(),
            tick: now,
        });
        self.make_ready(pcb, now)
    }

    /// Takes the next pid from the active policy
    pub fn next_ready(&mut self) -> Option<Pid> {
        self.ready.dequeue()
    }

    /// Marks `pcb` running and starts a fresh quantum
    pub fn dispatch(&mut self, pcb: &mut Pcb, now: u64) -> Result<(), ProcessError> {
        pcb.set_status(ProcessStatus::Running, QueueId::Running, now)?;
        self.ready.reset_quantum();
        self.audit_log.push(ScheduleEvent::Dispatched {
            pid: pcb.pid(),
            tick: now,
        });
        Ok(())
    }

    /// Marks `pcb` running without touching the quantum
    ///
    /// Used for inline children and for parents resuming after them.
    pub fn resume(&mut self, pcb: &mut Pcb, now: u64) -> Result<(), ProcessError> {
        pcb.set_status(ProcessStatus::Running, QueueId::Running, now)?;
        self.audit_log.push(ScheduleEvent::Dispatched {
            pid: pcb.pid(),
            tick: now,
        });
        Ok(())
    }

    /// Charges one tick to the running process
    pub fn charge_tick(&mut self) -> bool {
        self.ready.quantum_expired()
    }

    /// Parks `pcb` in the I/O queue until `release_at`
    pub fn block_on_io(
        &mut self,
        pcb: &mut Pcb,
        now: u64,
        release_at: u64,
    ) -> Result<(), ProcessError> {
        pcb.set_status(ProcessStatus::Waiting, QueueId::Io, now)?;
        self.io.push(pcb.pid(), release_at);
        self.audit_log.push(ScheduleEvent::Blocked {
            pid: pcb.pid(),
            queue: QueueId::Io,
            tick: now,
        });
        Ok(())
    }

    /// Marks `pcb` waiting outside any queue (semaphore or inline child)
    pub fn block(&mut self, pcb: &mut Pcb, now: u64) -> Result<(), ProcessError> {
        pcb.set_status(ProcessStatus::Waiting, QueueId::Blocked, now)?;
        self.audit_log.push(ScheduleEvent::Blocked {
            pid: pcb.pid(),
            queue: QueueId::Blocked,
            tick: now,
        });
        Ok(())
    }

    /// Removes I/O requests due at `now`
    pub fn release_io(&mut self, now: u64) -> Vec<Pid> {
        self.io.release_due(now)
    }

    /// Terminates `pcb`
    pub fn retire(&mut self, pcb: &mut Pcb, reason: ExitReason, now: u64) -> Result<(), ProcessError> {
        pcb.terminate(reason, now)?;
        self.terminated.push(pcb.pid());
        self.audit_log.push(ScheduleEvent::Exited {
            pid: pcb.pid(),
            reason,
            tick: now,
        });
        Ok(())
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    pub fn has_io(&self) -> bool {
        !self.io.is_empty()
    }

    pub fn io_queue(&self) -> &IoQueue {
        &self.io
    }

    /// Pids in termination order
    pub fn terminated(&self) -> &[Pid] {
        &self.terminated
    }

    /// Identity of the ready queue currently being served
    pub fn serving_queue(&self) -> QueueId {
        self.ready.queue_id()
    }

    /// Quantum of the ready queue currently being served
    pub fn quantum(&self) -> Option<u64> {
        self.ready.quantum()
    }

    pub fn audit_log(&self) -> &[ScheduleEvent] {
        &self.audit_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rr(quantum: u64) -> Scheduler {
        Scheduler::new(SchedulingPolicy::RoundRobin { quantum })
    }

    #[test]
    fn test_job_queue_fifo() {
        let mut scheduler = rr(2);
        scheduler.admit(Pid::new(1), 0);
        scheduler.admit(Pid::new(2), 0);
        let first = scheduler.pop_job().unwrap();
        scheduler.requeue_job(first);
        assert_eq!(scheduler.pop_job(), Some(Pid::new(2)));
        assert_eq!(scheduler.pop_job(), Some(Pid::new(1)));
        assert_eq!(scheduler.pop_job(), None);
    }

    #[test]
    fn test_ready_dispatch_preempt_cycle() {
        let mut scheduler = rr(2);
        let mut pcb = Pcb::new(Pid::new(1), "a", 0, 0);

        assert_eq!(scheduler.make_ready(&mut pcb, 0), Ok(QueueId::RoundRobin));
        assert_eq!(pcb.status(), ProcessStatus::Ready);
        assert_eq!(scheduler.next_ready(), Some(Pid::new(1)));
        scheduler.dispatch(&mut pcb, 0).unwrap();
        assert_eq!(pcb.status(), ProcessStatus::Running);

        assert!(!scheduler.charge_tick());
        assert!(scheduler.charge_tick());
        scheduler.preempt(&mut pcb, 2).unwrap();
        assert_eq!(pcb.status(), ProcessStatus::Ready);
        assert_eq!(scheduler.ready_len(), 1);

        assert!(matches!(
            scheduler.audit_log().last(),
            Some(ScheduleEvent::Readied { .. })
        ));
    }

    #[test]
    fn test_io_block_and_release() {
        let mut scheduler = rr(2);
        let mut pcb = Pcb::new(Pid::new(1), "a", 0, 0);
        scheduler.dispatch(&mut pcb, 0).unwrap();
        scheduler.block_on_io(&mut pcb, 1, 4).unwrap();
        assert_eq!(pcb.status(), ProcessStatus::Waiting);
        assert!(scheduler.has_io());
        assert!(scheduler.release_io(3).is_empty());
        assert_eq!(scheduler.release_io(4), vec![Pid::new(1)]);
        assert!(!scheduler.has_io());
    }

    #[test]
    fn test_policy_change_refused_while_busy() {
        let mut scheduler = rr(2);
        let mut pcb = Pcb::new(Pid::new(1), "a", 0, 0);
        scheduler.make_ready(&mut pcb, 0).unwrap();
        assert_eq!(
            scheduler.set_policy(SchedulingPolicy::Fcfs),
            Err(ConfigError::SchedulerBusy(1))
        );
        scheduler.next_ready();
        scheduler.set_policy(SchedulingPolicy::Fcfs).unwrap();
        assert_eq!(scheduler.serving_queue(), QueueId::Fcfs);
        assert_eq!(scheduler.quantum(), None);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let mut scheduler = rr(2);
        assert_eq!(
            scheduler.set_policy(SchedulingPolicy::RoundRobin { quantum: 0 }),
            Err(ConfigError::InvalidQuantum(0))
        );
        assert_eq!(scheduler.policy(), SchedulingPolicy::RoundRobin { quantum: 2 });
    }

    #[test]
    fn test_retire_records_exit() {
        let mut scheduler = rr(2);
        let mut pcb = Pcb::new(Pid::new(1), "a", 0, 0);
        scheduler.dispatch(&mut pcb, 0).unwrap();
        scheduler.retire(&mut pcb, ExitReason::Normal, 3).unwrap();
        assert_eq!(scheduler.terminated(), &[Pid::new(1)]);
        assert_eq!(pcb.completion(), Some(3));
        assert!(scheduler.retire(&mut pcb, ExitReason::Normal, 4).is_err());
    }

    #[test]
    fn test_exit_reason_from_fault() {
        assert_eq!(
            ExitReason::from_fault(ExecutionFault::OutOfMemory { pid: Pid::new(1) }),
            ExitReason::ResourceExhaustion
        );
        assert_eq!(
            ExitReason::from_fault(ExecutionFault::DivisionByZero),
            ExitReason::Failed(ExecutionFault::DivisionByZero)
        );
        assert!(!ExitReason::Rejected.finalizes_metrics());
    }
}
