//! Resilience Test Utilities
//!
//! This crate provides shared utilities for scenario and property tests.
//!
//! ## Test Philosophy
//!
//! - **Isolation under faults**: one process failing never stops the others
//! - **Determinism**: every run is reproducible from its configuration seed
//! - **Conservation**: frames in use always match the valid page entries
//! - **Accounting**: every tick of a process lifetime lands in exactly one burst

use core_types::Pid;
use kernel_api::{JobSpec, KernelApi, MetricsReport};
use sim_kernel::pcb::Pcb;
use sim_kernel::SimulatedKernel;

/// Schedules one job per program (all starting immediately) and drains them
pub fn run_programs(kernel: &mut SimulatedKernel, programs: &[&str]) -> (Vec<Pid>, MetricsReport) {
    let jobs: Vec<JobSpec> = programs.iter().map(|name| JobSpec::new(*name)).collect();
    let pids = kernel.schedule(&jobs).expect("Failed to schedule jobs");
    let report = kernel.process_jobs();
    (pids, report)
}

/// Looks up a PCB that must exist
pub fn pcb(kernel: &SimulatedKernel, pid: Pid) -> &Pcb {
    kernel
        .pcb(pid)
        .unwrap_or_else(|| panic!("process {} missing", pid))
}

/// Asserts the timeline of a finished process covers its lifetime exactly
pub fn assert_timeline_partition(pcb: &Pcb) {
    let completion = pcb.completion().expect("process has no completion time");
    let timeline = pcb.timeline();
    assert!(!timeline.is_empty(), "{} has an empty timeline", pcb.pid());
    assert_eq!(timeline[0].start, pcb.arrival(), "{} starts late", pcb.pid());
    for pair in timeline.windows(2) {
        assert_eq!(pair[0].end, pair[1].start, "{} has a gap or overlap", pcb.pid());
    }
    let total: u64 = timeline.iter().map(|burst| burst.duration()).sum();
    assert_eq!(total, completion - pcb.arrival());
}
