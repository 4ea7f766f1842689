//! Kernel API trait and job descriptors

use crate::error::KernelError;
use crate::metrics::MetricsReport;
use crate::policy::SchedulingPolicy;
use core_types::{Pid, ProcessStatus};
use serde::{Deserialize, Serialize};

/// A program to admit, and the tick before which it may not load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Program identifier handed to the program source
    pub program: String,
    /// Earliest tick at which the job may be loaded
    pub start_after: u64,
}

impl JobSpec {
    /// Creates a job that may load immediately
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            start_after: 0,
        }
    }

    /// Delays loading until the clock reaches `tick`
    pub fn with_start_after(mut self, tick: u64) -> Self {
        self.start_after = tick;
        self
    }
}

/// One row of the process listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub pid: Pid,
    pub program: String,
    pub status: ProcessStatus,
    pub frames_used: usize,
    pub page_faults: u64,
}

/// Snapshot of physical memory occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub page_size: usize,
    pub total_frames: usize,
    pub used_frames: usize,
    pub free_frames: usize,
    pub page_faults: u64,
}

/// The kernel surface exposed to a shell
///
/// Everything is driven by explicit calls. Nothing runs between calls, so a
/// caller observes the machine only at epoch boundaries or while it is idle.
///
/// # Example
///
/// ```ignore
/// kernel.set_scheduling_policy(SchedulingPolicy::RoundRobin { quantum: 2 })?;
/// let report = kernel.execute(&[JobSpec::new("a"), JobSpec::new("b")])?;
/// println!("throughput {}", report.throughput);
/// ```
pub trait KernelApi {
    /// Admits jobs to the job queue, returning the pid assigned to each
    ///
    /// Processes are created `New`; programs are only read when the job is
    /// popped in `process_jobs`.
    fn schedule(&mut self, jobs: &[JobSpec]) -> Result<Vec<Pid>, KernelError>;

    /// Drains the job queue and runs until the ready and I/O queues are empty
    fn process_jobs(&mut self) -> MetricsReport;

    /// Schedules `jobs` and runs one epoch
    fn execute(&mut self, jobs: &[JobSpec]) -> Result<MetricsReport, KernelError> {
        self.schedule(jobs)?;
        Ok(self.process_jobs())
    }

    /// Swaps the ready-queue policy
    fn set_scheduling_policy(&mut self, policy: SchedulingPolicy) -> Result<(), KernelError>;

    /// Changes the page size; refused while processes are resident
    fn set_page_size(&mut self, page_size: usize) -> Result<(), KernelError>;

    /// Changes the number of physical frames; refused while processes are resident
    fn set_frame_count(&mut self, frame_count: usize) -> Result<(), KernelError>;

    /// Caps the frames each process may hold before it must evict its own
    /// pages. `None` removes the cap.
    fn set_max_pages_per_process(&mut self, max_pages: Option<usize>) -> Result<(), KernelError>;

    /// Renders physical memory (`None`) or one process's state as text
    fn core_dump(&self, pid: Option<Pid>) -> Result<String, KernelError>;

    /// Lists every process the kernel knows, in pid order
    fn list_processes(&self) -> Vec<ProcessSummary>;

    /// Current physical memory occupancy
    fn memory_usage(&self) -> MemoryUsage;

    /// Current clock tick
    fn now(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_spec_builder() {
        let job = JobSpec::new("hello").with_start_after(7);
        assert_eq!(job.program, "hello");
        assert_eq!(job.start_after, 7);
        assert_eq!(JobSpec::new("x").start_after, 0);
    }

    #[test]
    fn test_process_summary_serializes() {
        let row = ProcessSummary {
            pid: Pid::new(2),
            program: "p".to_string(),
            status: ProcessStatus::Ready,
            frames_used: 3,
            page_faults: 4,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"Ready\""));
        let back: ProcessSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
