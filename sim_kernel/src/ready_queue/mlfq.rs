use super::{FcfsQueue, ReadyQueue, RoundRobinQueue};
use crate::pcb::Pcb;
use core_types::{Pid, QueueId};

/// Completion ratio below which a process drops a level
pub const DEMOTION_THRESHOLD: f64 = 0.8;

/// Full quanta served at one level before service moves on
pub const STARVATION_LIMIT: u32 = 5;

const LEVELS: usize = 3;

/// Three-level feedback queue: RR(q1), RR(q2), FCFS
///
/// Placement looks at the level a process last queued in and the fraction
/// of its recent CPU bursts that finished without a quantum cutoff:
///
/// - new processes start at level 1
/// - level 1 drops to level 2 below the threshold
/// - level 2 drops to level 3 below the threshold, rises to level 1 above it
/// - level 3 is terminal
///
/// Until a process has a full burst history its level does not change.
/// Service is strict priority, except that after [`STARVATION_LIMIT`] quantum
/// expiries at one level the next dequeue serves the next non-empty level.
#[derive(Debug)]
pub struct MlfqQueue {
    level1: RoundRobinQueue,
    level2: RoundRobinQueue,
    level3: FcfsQueue,
    /// Index of the level served last
    serving: usize,
    /// Quantum expiries at the serving level
    expiries: u32,
}

impl MlfqQueue {
    pub fn new(level1_quantum: u64, level2_quantum: u64) -> Self {
        Self {
            level1: RoundRobinQueue::with_identity(level1_quantum, QueueId::MlfqLevel1),
            level2: RoundRobinQueue::with_identity(level2_quantum, QueueId::MlfqLevel2),
            level3: FcfsQueue::with_identity(QueueId::MlfqLevel3),
            serving: 0,
            expiries: 0,
        }
    }

    fn level(&self, index: usize) -> &dyn ReadyQueue {
        match index {
            0 => &self.level1,
            1 => &self.level2,
            _ => &self.level3,
        }
    }

    fn level_mut(&mut self, index: usize) -> &mut dyn ReadyQueue {
        match index {
            0 => &mut self.level1,
            1 => &mut self.level2,
            _ => &mut self.level3,
        }
    }

    /// Level index (0-based) `pcb` belongs in
    fn placement(pcb: &Pcb) -> usize {
        let last = pcb.last_ready_queue().and_then(|queue| queue.mlfq_level());
        let ratio = pcb.burst_completion_ratio();
        match (last, ratio) {
            (Some(1), Some(ratio)) if ratio < DEMOTION_THRESHOLD => 1,
            (Some(2), Some(ratio)) if ratio < DEMOTION_THRESHOLD => 2,
            (Some(2), Some(ratio)) if ratio > DEMOTION_THRESHOLD => 0,
            (Some(2), _) => 1,
            (Some(3), _) => 2,
            _ => 0,
        }
    }

    /// Number of processes queued at `level` (1-3)
    pub fn level_len(&self, level: u8) -> usize {
        match level {
            1..=3 => self.level(level as usize - 1).len(),
            _ => 0,
        }
    }
}

impl ReadyQueue for MlfqQueue {
    fn enqueue(&mut self, pcb: &Pcb) -> QueueId {
        let level = Self::placement(pcb);
        self.level_mut(level).enqueue(pcb)
    }

    fn dequeue(&mut self) -> Option<Pid> {
        let target = if self.expiries >= STARVATION_LIMIT {
            (1..=LEVELS)
                .map(|step| (self.serving + step) % LEVELS)
                .find(|&level| !self.level(level).is_empty())
        } else {
            (0..LEVELS).find(|&level| !self.level(level).is_empty())
        }?;

        if target != self.serving {
            self.serving = target;
            self.expiries = 0;
        }
        self.level_mut(target).dequeue()
    }

    fn len(&self) -> usize {
        (0..LEVELS).map(|level| self.level(level).len()).sum()
    }

    fn quantum_expired(&mut self) -> bool {
        let expired = self.level_mut(self.serving).quantum_expired();
        if expired {
            self.expiries += 1;
        }
        expired
    }

    fn reset_quantum(&mut self) {
        self.level_mut(self.serving).reset_quantum();
    }

    fn queue_id(&self) -> QueueId {
        self.level(self.serving).queue_id()
    }

    fn quantum(&self) -> Option<u64> {
        self.level(self.serving).quantum()
    }
}
