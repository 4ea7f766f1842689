//! # Process Control Block
//!
//! Per-process kernel state: identity, registers, page table, backing
//! store, timeline and metrics.
//!
//! ## Timeline
//!
//! Every status change closes the open burst and opens the next, so the
//! bursts of a process partition its lifetime from arrival to its final
//! status change with no gaps or overlaps. Zero-length bursts are dropped.
//! Once terminated a PCB is immutable.

use crate::cpu::RegisterFile;
use crate::loader::ProgramImage;
use crate::page_table::PageTable;
use crate::scheduler::ExitReason;
use core_types::{Pid, ProcessStatus, QueueId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Bursts remembered for the completion ratio
pub const BURST_HISTORY: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Process {0} is already terminated")]
    AlreadyTerminated(Pid),
}

/// A closed interval spent in one queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Burst {
    pub queue: QueueId,
    pub start: u64,
    pub end: u64,
}

impl Burst {
    pub fn duration(&self) -> u64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone)]
pub struct Pcb {
    pid: Pid,
    program: String,
    start_after: u64,
    status: ProcessStatus,
    pub registers: RegisterFile,
    code_start: u32,
    program_size: usize,
    page_table: Option<PageTable>,
    backing_store: Vec<u8>,
    max_pages: Option<usize>,
    arrival: u64,
    first_run: Option<u64>,
    completion: Option<u64>,
    timeline: Vec<Burst>,
    open: Option<(QueueId, u64)>,
    outcomes: VecDeque<bool>,
    last_ready_queue: Option<QueueId>,
    parent: Option<Pid>,
    children: Vec<Pid>,
    page_faults: u64,
    exit: Option<ExitReason>,
}

impl Pcb {
    /// Creates a `New` process sitting in the job queue from `now`
    pub fn new(pid: Pid, program: impl Into<String>, start_after: u64, now: u64) -> Self {
        Self {
            pid,
            program: program.into(),
            start_after,
            status: ProcessStatus::New,
            registers: RegisterFile::default(),
            code_start: 0,
            program_size: 0,
            page_table: None,
            backing_store: Vec::new(),
            max_pages: None,
            arrival: now,
            first_run: None,
            completion: None,
            timeline: Vec::new(),
            open: Some((QueueId::Job, now)),
            outcomes: VecDeque::with_capacity(BURST_HISTORY),
            last_ready_queue: None,
            parent: None,
            children: Vec::new(),
            page_faults: 0,
            exit: None,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn start_after(&self) -> u64 {
        self.start_after
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    pub fn exit_reason(&self) -> Option<&ExitReason> {
        self.exit.as_ref()
    }

    /// Materializes the page table (all entries invalid) from a parsed image
    pub fn attach_image(&mut self, image: ProgramImage, pages: usize, max_pages: Option<usize>) {
        self.registers = RegisterFile::at(image.entry);
        self.code_start = image.entry;
        self.program_size = image.size;
        self.backing_store = image.backing_store;
        self.page_table = Some(PageTable::new(pages));
        self.max_pages = max_pages;
    }

    pub fn is_loaded(&self) -> bool {
        self.page_table.is_some()
    }

    pub fn code_start(&self) -> u32 {
        self.code_start
    }

    pub fn program_size(&self) -> usize {
        self.program_size
    }

    pub fn page_table(&self) -> Option<&PageTable> {
        self.page_table.as_ref()
    }

    pub fn page_table_mut(&mut self) -> Option<&mut PageTable> {
        self.page_table.as_mut()
    }

    pub fn backing_store(&self) -> &[u8] {
        &self.backing_store
    }

    pub fn backing_store_mut(&mut self) -> &mut [u8] {
        &mut self.backing_store
    }

    pub fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    /// Frames currently held
    pub fn resident_pages(&self) -> usize {
        self.page_table
            .as_ref()
            .map_or(0, |table| table.resident_count())
    }

    pub fn page_faults(&self) -> u64 {
        self.page_faults
    }

    pub fn record_page_fault(&mut self) {
        self.page_faults += 1;
    }

    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    pub fn set_parent(&mut self, parent: Pid) {
        self.parent = Some(parent);
    }

    pub fn children(&self) -> &[Pid] {
        &self.children
    }

    pub fn add_child(&mut self, child: Pid) {
        self.children.push(child);
    }

    /// Ready queue this process was last placed in
    pub fn last_ready_queue(&self) -> Option<QueueId> {
        self.last_ready_queue
    }

    /// Moves to `status`, closing the open burst and opening one in `queue`
    pub fn set_status(
        &mut self,
        status: ProcessStatus,
        queue: QueueId,
        now: u64,
    ) -> Result<(), ProcessError> {
        self.ensure_live()?;
        self.close_burst(status, now);
        self.open_burst(status, queue, now);
        Ok(())
    }

    /// Moves to `Ready`, letting `place` pick the queue
    ///
    /// The running burst is closed before `place` runs, so the placement
    /// sees the outcome of the burst that just ended.
    pub fn enter_ready(
        &mut self,
        now: u64,
        place: impl FnOnce(&Pcb) -> QueueId,
    ) -> Result<QueueId, ProcessError> {
        self.ensure_live()?;
        self.close_burst(ProcessStatus::Ready, now);
        let queue = place(self);
        self.last_ready_queue = Some(queue);
        self.open_burst(ProcessStatus::Ready, queue, now);
        Ok(queue)
    }

    /// Retires the process
    ///
    /// Completion time is recorded only for exits that finalize metrics;
    /// abandoned processes keep `completion() == None`.
    pub fn terminate(&mut self, reason: ExitReason, now: u64) -> Result<(), ProcessError> {
        self.ensure_live()?;
        self.close_burst(ProcessStatus::Terminated, now);
        self.status = ProcessStatus::Terminated;
        if reason.finalizes_metrics() {
            self.completion = Some(now);
        }
        self.exit = Some(reason);
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), ProcessError> {
        if self.status.is_terminal() {
            Err(ProcessError::AlreadyTerminated(self.pid))
        } else {
            Ok(())
        }
    }

    fn close_burst(&mut self, next: ProcessStatus, now: u64) {
        let Some((queue, start)) = self.open.take() else {
            return;
        };
        if queue == QueueId::Running {
            if self.outcomes.len() == BURST_HISTORY {
                self.outcomes.pop_front();
            }
            self.outcomes.push_back(next != ProcessStatus::Ready);
        }
        if now > start {
            self.timeline.push(Burst {
                queue,
                start,
                end: now,
            });
        }
    }

    fn open_burst(&mut self, status: ProcessStatus, queue: QueueId, now: u64) {
        if status == ProcessStatus::Running && self.first_run.is_none() {
            self.first_run = Some(now);
        }
        self.status = status;
        self.open = Some((queue, now));
    }

    /// Closed bursts, oldest first
    pub fn timeline(&self) -> &[Burst] {
        &self.timeline
    }

    /// The burst still in progress, as `(queue, start)`
    pub fn open_burst_info(&self) -> Option<(QueueId, u64)> {
        self.open
    }

    /// Fraction of the last five CPU bursts that ended without a quantum
    /// cutoff; `None` until five bursts have been recorded
    pub fn burst_completion_ratio(&self) -> Option<f64> {
        if self.outcomes.len() < BURST_HISTORY {
            return None;
        }
        let finished = self.outcomes.iter().filter(|finished| **finished).count();
        Some(finished as f64 / self.outcomes.len() as f64)
    }

    pub fn arrival(&self) -> u64 {
        self.arrival
    }

    pub fn completion(&self) -> Option<u64> {
        self.completion
    }

    pub fn first_run(&self) -> Option<u64> {
        self.first_run
    }

    pub fn turnaround(&self) -> Option<u64> {
        self.completion.map(|completion| completion - self.arrival)
    }

    /// Ticks spent in ready queues
    pub fn waiting(&self) -> u64 {
        self.timeline
            .iter()
            .filter(|burst| burst.queue.is_ready_queue())
            .map(Burst::duration)
            .sum()
    }

    /// Ticks from arrival to first dispatch
    pub fn response(&self) -> Option<u64> {
        self.first_run.map(|first| first - self.arrival)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_api::ExecutionFault;

    fn pcb() -> Pcb {
        Pcb::new(Pid::new(1), "prog", 0, 0)
    }

    #[test]
    fn test_new_process_sits_in_job_queue() {
        let pcb = pcb();
        assert_eq!(pcb.status(), ProcessStatus::New);
        assert_eq!(pcb.open_burst_info(), Some((QueueId::Job, 0)));
        assert!(!pcb.is_loaded());
    }

    #[test]
    fn test_timeline_partitions_lifetime() {
        let mut pcb = pcb();
        pcb.enter_ready(0, |_| QueueId::RoundRobin).unwrap();
        pcb.set_status(ProcessStatus::Running, QueueId::Running, 2).unwrap();
        pcb.enter_ready(4, |_| QueueId::RoundRobin).unwrap();
        pcb.set_status(ProcessStatus::Running, QueueId::Running, 7).unwrap();
        pcb.terminate(ExitReason::Normal, 9).unwrap();

        let timeline = pcb.timeline();
        assert_eq!(timeline.len(), 4);
        for pair in timeline.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        let total: u64 = timeline.iter().map(Burst::duration).sum();
        assert_eq!(total, pcb.completion().unwrap() - pcb.arrival());
        assert_eq!(pcb.waiting(), 5);
        assert_eq!(pcb.response(), Some(2));
        assert_eq!(pcb.turnaround(), Some(9));
    }

    #[test]
    fn test_zero_length_bursts_dropped() {
        let mut pcb = pcb();
        pcb.enter_ready(0, |_| QueueId::Fcfs).unwrap();
        pcb.set_status(ProcessStatus::Running, QueueId::Running, 0).unwrap();
        pcb.terminate(ExitReason::Normal, 3).unwrap();
        assert_eq!(pcb.timeline().len(), 1);
        assert_eq!(pcb.timeline()[0].queue, QueueId::Running);
    }

    #[test]
    fn test_terminated_is_immutable() {
        let mut pcb = pcb();
        pcb.terminate(ExitReason::Normal, 1).unwrap();
        assert_eq!(
            pcb.set_status(ProcessStatus::Ready, QueueId::Fcfs, 2),
            Err(ProcessError::AlreadyTerminated(Pid::new(1)))
        );
        assert!(pcb.terminate(ExitReason::Normal, 2).is_err());
        assert_eq!(pcb.completion(), Some(1));
    }

    #[test]
    fn test_abandoned_process_has_no_completion() {
        let mut pcb = pcb();
        pcb.set_status(ProcessStatus::Running, QueueId::Running, 0).unwrap();
        pcb.terminate(ExitReason::Failed(ExecutionFault::DivisionByZero), 4)
            .unwrap();
        assert_eq!(pcb.status(), ProcessStatus::Terminated);
        assert_eq!(pcb.completion(), None);
        assert_eq!(pcb.turnaround(), None);
    }

    #[test]
    fn test_completion_ratio_needs_five_bursts() {
        let mut pcb = pcb();
        let mut now = 0;
        for i in 0..5 {
            pcb.set_status(ProcessStatus::Running, QueueId::Running, now).unwrap();
            now += 1;
            if i % 2 == 0 {
                pcb.enter_ready(now, |_| QueueId::RoundRobin).unwrap();
            } else {
                pcb.set_status(ProcessStatus::Waiting, QueueId::Io, now).unwrap();
            }
            if i < 4 {
                assert_eq!(pcb.burst_completion_ratio(), None);
            }
        }
        // Bursts 0, 2, 4 were cut off; 1 and 3 ended in I/O.
        assert_eq!(pcb.burst_completion_ratio(), Some(0.4));
    }

    #[test]
    fn test_placement_sees_closed_burst() {
        let mut pcb = pcb();
        for now in 0..5 {
            pcb.set_status(ProcessStatus::Running, QueueId::Running, now * 2).unwrap();
            pcb.set_status(ProcessStatus::Waiting, QueueId::Io, now * 2 + 1).unwrap();
        }
        pcb.set_status(ProcessStatus::Running, QueueId::Running, 10).unwrap();
        let queue = pcb
            .enter_ready(11, |pcb| {
                assert_eq!(pcb.burst_completion_ratio(), Some(0.8));
                QueueId::MlfqLevel2
            })
            .unwrap();
        assert_eq!(queue, QueueId::MlfqLevel2);
        assert_eq!(pcb.last_ready_queue(), Some(QueueId::MlfqLevel2));
    }
}
