//! # Simulated Kernel
//!
//! A didactic kernel driving a small virtual CPU under one deterministic
//! tick clock.
//!
//! ## Purpose
//!
//! The simulated kernel exists to compare scheduling policies and demand
//! paging side by side:
//! - Runs under `cargo test`
//! - Deterministic (one clock, seeded randomness, no real concurrency)
//! - Inspectable (every PCB, frame and queue is reachable)
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! Nothing here is global. The clock, frame table, process table and IPC
//! registries are owned by [`SimulatedKernel`] and passed explicitly to
//! whatever needs them, so any number of simulations can run side by side.
//!
//! ## Execution Model
//!
//! One instruction per step. Every completed instruction except `END`
//! advances the clock by one tick, and every tick runs the per-tick work:
//! due I/O requests are released to the ready queue, then the running
//! process is charged a tick of quantum and preempted when it runs out.
//! A process that leaves the CPU for I/O does so before its tick elapses.
//!
//! The spawn syscall runs the child program inline, to completion, while
//! the parent waits. It is a blocking call and not a fork: ticks during
//! the child's run release I/O but never preempt.

pub mod config;
pub mod cpu;
pub mod diagnostics;
pub mod frame_table;
pub mod io_queue;
pub mod ipc;
pub mod isa;
pub mod loader;
pub mod memory;
pub mod metrics;
pub mod page_table;
pub mod pcb;
pub mod process_table;
pub mod program_source;
pub mod ready_queue;
pub mod scheduler;
pub mod syscall_gate;
pub mod test_utils;
pub mod timer;

pub use config::{DelayRange, KernelConfig};
pub use program_source::{DirectoryPrograms, InMemoryPrograms};
pub use scheduler::ExitReason;

use core_types::{Pid, ProcessStatus};
use cpu::{Cpu, RegisterFile, Step};
use diagnostics::Diagnostics;
use ipc::{IpcError, SemWait, Semaphores, SharedMemory};
use kernel_api::{
    ConfigError, ExecutionFault, JobSpec, KernelApi, KernelError, LoadError, MemoryUsage,
    MetricsReport, MetricsSink, ProcessSummary, ProgramSource, SchedulingPolicy,
};
use memory::{MemoryManager, ProcessBus};
use metrics::MetricsHistory;
use pcb::{Pcb, ProcessError};
use process_table::ProcessTable;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use services_logger::{LogEntry, LogLevel, LogSink, MemoryLog};
use std::fmt::Write as _;
use syscall_gate::{Syscall, SyscallEvent, SyscallGate};
use timer::Clock;

/// One value printed by a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLine {
    pub pid: Pid,
    pub register: u8,
    pub value: i32,
}

/// Simulated kernel state
///
/// Unlike a real kernel, this state is directly accessible for testing.
pub struct SimulatedKernel {
    config: KernelConfig,
    clock: Clock,
    memory: MemoryManager,
    processes: ProcessTable,
    scheduler: Scheduler,
    cpu: Cpu,
    gate: SyscallGate,
    shared_memory: SharedMemory,
    semaphores: Semaphores,
    programs: Box<dyn ProgramSource>,
    diagnostics: Diagnostics,
    metrics: MetricsHistory,
    metrics_sink: Option<Box<dyn MetricsSink>>,
    rng: StdRng,
    console: Vec<ConsoleLine>,
    /// Processes whose metrics belong to the current epoch
    epoch_members: Vec<Pid>,
    /// Nesting depth of inline spawns in progress
    spawn_depth: usize,
}

impl SimulatedKernel {
    /// Creates a kernel with the default configuration
    pub fn new(programs: Box<dyn ProgramSource>) -> Self {
        Self::build(KernelConfig::default(), programs)
    }

    /// Creates a kernel with a custom configuration
    pub fn with_config(
        config: KernelConfig,
        programs: Box<dyn ProgramSource>,
    ) -> Result<Self, KernelError> {
        config.validate()?;
        Ok(Self::build(config, programs))
    }

    fn build(config: KernelConfig, programs: Box<dyn ProgramSource>) -> Self {
        Self {
            clock: Clock::new(),
            memory: MemoryManager::new(
                config.page_size,
                config.frame_count,
                config.reference_reset_interval,
            ),
            processes: ProcessTable::new(),
            scheduler: Scheduler::new(config.policy),
            cpu: Cpu::new(),
            gate: SyscallGate::new(),
            shared_memory: SharedMemory::new(),
            semaphores: Semaphores::new(),
            programs,
            diagnostics: Diagnostics::new(),
            metrics: MetricsHistory::new(),
            metrics_sink: None,
            rng: StdRng::seed_from_u64(config.rng_seed),
            console: Vec::new(),
            epoch_members: Vec::new(),
            spawn_depth: 0,
            config,
        }
    }

    /// Forwards every epoch report to `sink` as well as the history
    pub fn with_metrics_sink(mut self, sink: Box<dyn MetricsSink>) -> Self {
        self.metrics_sink = Some(sink);
        self
    }

    /// Forwards every log entry to `sink` as well as the retained log
    pub fn with_log_mirror(mut self, sink: Box<dyn LogSink>) -> Self {
        self.diagnostics.set_mirror(sink);
        self
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn pcb(&self, pid: Pid) -> Option<&Pcb> {
        self.processes.get(pid)
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn shared_memory(&self) -> &SharedMemory {
        &self.shared_memory
    }

    pub fn semaphores(&self) -> &Semaphores {
        &self.semaphores
    }

    /// Retained diagnostics; `log().errors()` is the error dump
    pub fn log(&self) -> &MemoryLog {
        self.diagnostics.retained()
    }

    pub fn clear_log(&mut self) {
        self.diagnostics.clear();
    }

    pub fn console_output(&self) -> &[ConsoleLine] {
        &self.console
    }

    pub fn metrics_history(&self) -> &[MetricsReport] {
        self.metrics.reports()
    }

    pub fn syscall_audit(&self) -> &[SyscallEvent] {
        self.gate.audit_log()
    }

    fn note(&mut self, entry: LogEntry) {
        let entry = entry.with_tick(self.clock.now());
        self.diagnostics.record(entry);
    }

    /// Runs a scheduler transition on `pid`'s PCB, logging refusals
    fn transition<T>(
        &mut self,
        pid: Pid,
        op: impl FnOnce(&mut Scheduler, &mut Pcb, u64) -> Result<T, ProcessError>,
    ) -> Option<T> {
        let now = self.clock.now();
        let Some(pcb) = self.processes.get_mut(pid) else {
            self.note(LogEntry::new(LogLevel::Error, "no such process").with_source(pid));
            return None;
        };
        match op(&mut self.scheduler, pcb, now) {
            Ok(value) => Some(value),
            Err(err) => {
                self.note(LogEntry::new(LogLevel::Error, err.to_string()).with_source(pid));
                None
            }
        }
    }

    fn draw(&mut self, range: DelayRange) -> u64 {
        self.rng.gen_range(range.min..=range.max)
    }

    /// Advances the clock, running the per-tick work for each tick
    fn advance(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.clock.tick(1);
            while let Some(tick) = self.clock.poll() {
                self.on_tick(tick);
            }
        }
    }

    fn on_tick(&mut self, tick: u64) {
        for pid in self.scheduler.release_io(tick) {
            self.note(LogEntry::new(LogLevel::Debug, "I/O complete").with_source(pid));
            self.make_ready(pid);
        }
        if self.spawn_depth == 0 && !self.cpu.is_idle() && self.scheduler.charge_tick() {
            self.preempt_current();
        }
    }

    fn make_ready(&mut self, pid: Pid) {
        self.transition(pid, |scheduler, pcb, now| scheduler.make_ready(pcb, now));
    }

    fn save_context(&mut self, pid: Pid, registers: RegisterFile) {
        if let Some(pcb) = self.processes.get_mut(pid) {
            pcb.registers = registers;
        }
    }

    /// Takes the running process off the CPU, storing its registers
    fn unload_current(&mut self) -> Option<Pid> {
        let (pid, registers) = self.cpu.transition(None)?;
        self.save_context(pid, registers);
        Some(pid)
    }

    /// Puts `pid` on the CPU with its saved registers
    fn load_on_cpu(&mut self, pid: Pid) {
        let Some(registers) = self.processes.get(pid).map(|pcb| pcb.registers) else {
            return;
        };
        if let Some((outgoing, saved)) = self.cpu.transition(Some((pid, registers))) {
            self.save_context(outgoing, saved);
        }
    }

    fn dispatch(&mut self, pid: Pid) {
        if self
            .transition(pid, |scheduler, pcb, now| scheduler.dispatch(pcb, now))
            .is_some()
        {
            self.load_on_cpu(pid);
        }
    }

    fn preempt_current(&mut self) {
        let Some(pid) = self.unload_current() else {
            return;
        };
        self.transition(pid, |scheduler, pcb, now| scheduler.preempt(pcb, now));
        if let Some(next) = self.scheduler.next_ready() {
            self.dispatch(next);
        }
    }

    /// Retires the running process
    fn finish_current(&mut self, reason: ExitReason) {
        if let Some(pid) = self.unload_current() {
            self.retire(pid, reason);
        }
    }

    fn retire(&mut self, pid: Pid, reason: ExitReason) {
        self.memory.release(&mut self.processes, pid);
        if self
            .transition(pid, |scheduler, pcb, now| scheduler.retire(pcb, reason, now))
            .is_some()
        {
            self.note(
                LogEntry::new(LogLevel::Info, "process terminated")
                    .with_source(pid)
                    .with_field("reason", format!("{:?}", reason)),
            );
        }
    }

    fn fault_current(&mut self, fault: ExecutionFault) {
        let pid = self.cpu.current_pid();
        let mut entry = LogEntry::new(LogLevel::Error, fault.to_string());
        if let Some(pid) = pid {
            entry = entry.with_source(pid);
        }
        self.note(entry);
        self.finish_current(ExitReason::from_fault(fault));
    }

    /// Executes one instruction of the running process
    fn step_current(&mut self) {
        let Some(pid) = self.cpu.current_pid() else {
            return;
        };
        let now = self.clock.now();
        let result = {
            let mut bus = ProcessBus::new(
                &mut self.memory,
                &mut self.processes,
                pid,
                now,
                &mut self.diagnostics,
            );
            self.cpu.step(&mut bus)
        };

        match result {
            Ok(Step::Idle) => {}
            Ok(Step::Continue) => self.advance(1),
            Ok(Step::Syscall(code)) => {
                self.cpu.enter_kernel();
                self.handle_syscall(pid, code);
                self.cpu.exit_kernel();
                // a blocking syscall may have handed the CPU to someone else
                if self.cpu.current_pid().map_or(true, |current| current == pid) {
                    self.advance(1);
                }
            }
            Ok(Step::Halt) => self.finish_current(ExitReason::Normal),
            Err(fault) => self.fault_current(fault),
        }
    }

    /// Reads and parses `pid`'s program, materializing its page table
    fn load_image(&mut self, pid: Pid) -> Result<usize, LoadError> {
        let program = self
            .processes
            .get(pid)
            .map(|pcb| pcb.program().to_string())
            .unwrap_or_default();
        let bytes = self.programs.read_program(&program)?;
        let page_size = self.memory.page_size();
        let image = loader::parse(&bytes, page_size, self.config.max_program_bytes)?;
        let pages = image.pages(page_size);
        if let Some(pcb) = self.processes.get_mut(pid) {
            pcb.attach_image(image, pages, self.config.max_pages_per_process);
        }
        Ok(pages)
    }

    fn load_job(&mut self, pid: Pid) {
        match self.load_image(pid) {
            Ok(pages) => {
                self.note(
                    LogEntry::new(LogLevel::Info, "program loaded")
                        .with_source(pid)
                        .with_field("pages", pages),
                );
                self.make_ready(pid);
            }
            Err(err) => self.reject(pid, err),
        }
    }

    fn reject(&mut self, pid: Pid, err: LoadError) {
        self.note(LogEntry::new(LogLevel::Error, err.to_string()).with_source(pid));
        self.transition(pid, |scheduler, pcb, now| {
            scheduler.retire(pcb, ExitReason::Rejected, now)
        });
    }

    fn register(&self, index: usize) -> i32 {
        self.cpu
            .registers()
            .map_or(0, |registers| registers.general[index])
    }

    fn set_r0(&mut self, value: i32) {
        if let Some(registers) = self.cpu.registers_mut() {
            registers.general[0] = value;
        }
    }

    fn handle_syscall(&mut self, pid: Pid, code: i32) {
        let Some(syscall) = self.gate.enter(pid, code, self.clock.now()) else {
            self.note(
                LogEntry::new(LogLevel::Error, "unknown syscall")
                    .with_source(pid)
                    .with_field("code", code),
            );
            return;
        };

        let (r0, r1, r2) = (self.register(0), self.register(1), self.register(2));
        match syscall {
            Syscall::PrintR0 => self.print(pid, 0, r0),
            Syscall::PrintR1 => self.print(pid, 1, r1),
            Syscall::Spawn => self.spawn_child(pid),
            Syscall::Wait => {
                let range = self.config.wait_delay;
                let delay = self.draw(range);
                self.advance(delay);
            }
            Syscall::Io => self.start_io(pid),
            Syscall::ShmOpen => {
                let result = self.shared_memory.open(r1, r0).map(|_| 0);
                self.ipc_result(pid, syscall, result);
            }
            Syscall::ShmWrite => {
                let result = self.shared_memory.write(r1, r2, r0).map(|_| 0);
                self.ipc_result(pid, syscall, result);
            }
            Syscall::ShmRead => {
                let result = self.shared_memory.read(r1, r2);
                self.ipc_result(pid, syscall, result);
            }
            Syscall::ShmUnlink => {
                let result = self.shared_memory.unlink(r1).map(|_| 0);
                self.ipc_result(pid, syscall, result);
            }
            Syscall::SemInit => {
                let result = self.semaphores.init(r1, r0).map(|_| 0);
                self.ipc_result(pid, syscall, result);
            }
            Syscall::SemWait => self.sem_wait(pid, r1),
            Syscall::SemSignal => match self.semaphores.signal(r1) {
                Ok(waiter) => {
                    self.set_r0(0);
                    if let Some(waiter) = waiter {
                        self.make_ready(waiter);
                    }
                }
                Err(err) => self.ipc_result(pid, syscall, Err(err)),
            },
        }
    }

    /// Writes an IPC result to r0: the value, or -1 on failure
    fn ipc_result(&mut self, pid: Pid, syscall: Syscall, result: Result<i32, IpcError>) {
        match result {
            Ok(value) => self.set_r0(value),
            Err(err) => {
                self.note(
                    LogEntry::new(LogLevel::Warn, err.to_string())
                        .with_source(pid)
                        .with_field("syscall", syscall.name()),
                );
                self.set_r0(-1);
            }
        }
    }

    fn print(&mut self, pid: Pid, register: u8, value: i32) {
        self.console.push(ConsoleLine {
            pid,
            register,
            value,
        });
        self.note(
            LogEntry::new(LogLevel::Info, "print")
                .with_source(pid)
                .with_field("register", register)
                .with_field("value", value),
        );
    }

    fn start_io(&mut self, pid: Pid) {
        let range = self.config.io_delay;
        let delay = self.draw(range);
        if self.spawn_depth > 0 {
            // An inline child cannot leave the CPU; it waits out the I/O.
            self.advance(delay);
            return;
        }
        if self.unload_current().is_none() {
            return;
        }
        let release_at = self.clock.now() + delay;
        self.transition(pid, |scheduler, pcb, now| {
            scheduler.block_on_io(pcb, now, release_at)
        });
    }

    fn sem_wait(&mut self, pid: Pid, key: i32) {
        if self.spawn_depth > 0 {
            match self.semaphores.try_wait(key) {
                Ok(true) => self.set_r0(0),
                Ok(false) => {
                    self.note(
                        LogEntry::new(LogLevel::Warn, "semaphore wait would block an inline child")
                            .with_source(pid)
                            .with_field("key", key),
                    );
                    self.set_r0(-1);
                }
                Err(err) => self.ipc_result(pid, Syscall::SemWait, Err(err)),
            }
            return;
        }

        match self.semaphores.wait(key, pid) {
            Ok(SemWait::Acquired) => self.set_r0(0),
            Ok(SemWait::Blocked) => {
                self.set_r0(0);
                if self.unload_current().is_some() {
                    self.transition(pid, |scheduler, pcb, now| scheduler.block(pcb, now));
                }
            }
            Err(err) => self.ipc_result(pid, Syscall::SemWait, Err(err)),
        }
    }

    /// Runs the child program inline while `parent` waits
    fn spawn_child(&mut self, parent: Pid) {
        if self.spawn_depth >= self.config.max_spawn_depth {
            self.note(
                LogEntry::new(LogLevel::Error, "spawn nesting limit reached")
                    .with_source(parent)
                    .with_field("depth", self.spawn_depth),
            );
            return;
        }

        let now = self.clock.now();
        let program = self.config.child_program.clone();
        let child = self.processes.create(&program, now, now);
        self.epoch_members.push(child);
        if let Some(pcb) = self.processes.get_mut(child) {
            pcb.set_parent(parent);
        }
        if let Some(pcb) = self.processes.get_mut(parent) {
            pcb.add_child(child);
        }
        if let Err(err) = self.load_image(child) {
            self.reject(child, err);
            return;
        }

        if self.unload_current().is_none() {
            return;
        }
        self.transition(parent, |scheduler, pcb, now| scheduler.block(pcb, now));
        self.note(
            LogEntry::new(LogLevel::Info, "spawned child")
                .with_source(parent)
                .with_field("child", child),
        );

        self.spawn_depth += 1;
        if self
            .transition(child, |scheduler, pcb, now| scheduler.resume(pcb, now))
            .is_some()
        {
            self.load_on_cpu(child);
            while self.cpu.current_pid() == Some(child) {
                self.step_current();
            }
        }
        self.spawn_depth -= 1;

        if self
            .transition(parent, |scheduler, pcb, now| scheduler.resume(pcb, now))
            .is_some()
        {
            self.load_on_cpu(parent);
        }
    }

    /// Runs until the ready and I/O queues are both empty
    fn run_until_drained(&mut self) {
        loop {
            if self.cpu.is_idle() {
                if let Some(pid) = self.scheduler.next_ready() {
                    self.dispatch(pid);
                    continue;
                }
                if self.scheduler.has_io() {
                    self.advance(1);
                    continue;
                }
                break;
            }
            self.step_current();
        }
    }

    fn report_deadlocks(&mut self) {
        for (key, pid) in self.semaphores.blocked() {
            self.note(
                LogEntry::new(LogLevel::Warn, "deadlocked on semaphore")
                    .with_source(pid)
                    .with_field("key", key),
            );
        }
    }

    fn finish_epoch(&mut self, started_at: u64) -> MetricsReport {
        let finished_at = self.clock.now();
        let members = std::mem::take(&mut self.epoch_members);
        let report = metrics::epoch_report(
            self.scheduler.policy(),
            started_at,
            finished_at,
            members.iter().filter_map(|pid| self.processes.get(*pid)),
        );
        // Processes still blocked carry over to the next epoch.
        self.epoch_members = members
            .into_iter()
            .filter(|pid| {
                self.processes
                    .get(*pid)
                    .is_some_and(|pcb| !pcb.status().is_terminal())
            })
            .collect();

        self.metrics.record(&report);
        if let Some(sink) = self.metrics_sink.as_mut() {
            sink.record(&report);
        }
        self.note(
            LogEntry::new(LogLevel::Info, "epoch finished")
                .with_field("completed", report.completed)
                .with_field("throughput", report.throughput),
        );
        report
    }

    fn dump_process(&self, pid: Pid) -> Result<String, KernelError> {
        let pcb = self
            .processes
            .get(pid)
            .ok_or(KernelError::ProcessNotFound(pid))?;
        let registers = match self.cpu.current_pid() {
            Some(current) if current == pid => self.cpu.registers().copied(),
            _ => None,
        }
        .unwrap_or(pcb.registers);

        let mut out = String::new();
        let _ = writeln!(out, "Process {} ({}) {}", pid, pcb.program(), pcb.status());
        let general: Vec<String> = registers
            .general
            .iter()
            .enumerate()
            .map(|(index, value)| format!("r{}={}", index, value))
            .collect();
        let _ = writeln!(out, "Registers: {} pc={}", general.join(" "), registers.pc);

        let Some(table) = pcb.page_table() else {
            out.push_str("Not loaded\n");
            return Ok(out);
        };
        let page_size = self.memory.page_size();
        out.push_str("Page table:\n  vpn frame valid ref dirty\n");
        for (vpn, entry) in table.entries().iter().enumerate() {
            let frame = if entry.valid {
                entry.frame.to_string()
            } else {
                "-".to_string()
            };
            let _ = writeln!(
                out,
                "  {:>3} {:>5} {:>5} {:>3} {:>5}",
                vpn, frame, entry.valid as u8, entry.referenced as u8, entry.dirty as u8
            );
        }

        out.push_str("Virtual memory:\n");
        let mut image = Vec::with_capacity(table.len() * page_size);
        for (vpn, entry) in table.entries().iter().enumerate() {
            if entry.valid {
                image.extend_from_slice(self.memory.frame_bytes(entry.frame));
            } else {
                let start = vpn * page_size;
                let page = pcb.backing_store().get(start..start + page_size);
                image.extend_from_slice(page.unwrap_or_default());
            }
        }
        for (row, chunk) in image.chunks(6).enumerate() {
            let bytes: Vec<String> = chunk.iter().map(|byte| format!("{:02x}", byte)).collect();
            let _ = writeln!(out, "  {:04x}: {}", row * 6, bytes.join(" "));
        }
        Ok(out)
    }
}

impl KernelApi for SimulatedKernel {
    fn schedule(&mut self, jobs: &[JobSpec]) -> Result<Vec<Pid>, KernelError> {
        let now = self.clock.now();
        let mut pids = Vec::with_capacity(jobs.len());
        for job in jobs {
            let pid = self.processes.create(&job.program, job.start_after, now);
            self.epoch_members.push(pid);
            pids.push(pid);
            if job.program.is_empty() {
                self.reject(pid, LoadError::NotFound(job.program.clone()));
                continue;
            }
            self.scheduler.admit(pid, now);
            self.note(
                LogEntry::new(LogLevel::Info, "job scheduled")
                    .with_source(pid)
                    .with_field("program", &job.program)
                    .with_field("start_after", job.start_after),
            );
        }
        Ok(pids)
    }

    fn process_jobs(&mut self) -> MetricsReport {
        let started_at = self.clock.now();
        while let Some(pid) = self.scheduler.pop_job() {
            let start_after = self.processes.get(pid).map_or(0, |pcb| pcb.start_after());
            if self.clock.now() >= start_after {
                self.load_job(pid);
            } else {
                self.scheduler.requeue_job(pid);
                self.advance(1);
            }
        }
        self.run_until_drained();
        self.report_deadlocks();
        self.finish_epoch(started_at)
    }

    fn set_scheduling_policy(&mut self, policy: SchedulingPolicy) -> Result<(), KernelError> {
        self.scheduler.set_policy(policy)?;
        self.config.policy = policy;
        self.note(LogEntry::new(LogLevel::Info, "scheduling policy changed").with_field("policy", policy));
        Ok(())
    }

    fn set_page_size(&mut self, page_size: usize) -> Result<(), KernelError> {
        config::validate_geometry(page_size, self.config.frame_count)?;
        self.ensure_no_residents()?;
        self.config.page_size = page_size;
        self.rebuild_memory();
        Ok(())
    }

    fn set_frame_count(&mut self, frame_count: usize) -> Result<(), KernelError> {
        config::validate_geometry(self.config.page_size, frame_count)?;
        self.ensure_no_residents()?;
        self.config.frame_count = frame_count;
        self.rebuild_memory();
        Ok(())
    }

    fn set_max_pages_per_process(&mut self, max_pages: Option<usize>) -> Result<(), KernelError> {
        config::validate_max_pages(max_pages)?;
        self.config.max_pages_per_process = max_pages;
        Ok(())
    }

    fn core_dump(&self, pid: Option<Pid>) -> Result<String, KernelError> {
        match pid {
            Some(pid) => self.dump_process(pid),
            None => {
                let frames = self.memory.frames();
                let mut out = format!(
                    "Physical memory: page size {}, {}/{} frames used\n",
                    self.memory.page_size(),
                    frames.used_count(),
                    frames.len()
                );
                out.push_str(&self.memory.dump_frames());
                Ok(out)
            }
        }
    }

    fn list_processes(&self) -> Vec<ProcessSummary> {
        self.processes
            .iter()
            .map(|pcb| ProcessSummary {
                pid: pcb.pid(),
                program: pcb.program().to_string(),
                status: pcb.status(),
                frames_used: pcb.resident_pages(),
                page_faults: pcb.page_faults(),
            })
            .collect()
    }

    fn memory_usage(&self) -> MemoryUsage {
        let frames = self.memory.frames();
        MemoryUsage {
            page_size: self.memory.page_size(),
            total_frames: frames.len(),
            used_frames: frames.used_count(),
            free_frames: frames.free_count(),
            page_faults: self.memory.page_faults(),
        }
    }

    fn now(&self) -> u64 {
        self.clock.now()
    }
}

impl SimulatedKernel {
    fn ensure_no_residents(&self) -> Result<(), ConfigError> {
        match self.processes.resident_count() {
            0 => Ok(()),
            resident => Err(ConfigError::ProcessesResident(resident)),
        }
    }

    fn rebuild_memory(&mut self) {
        self.memory = MemoryManager::new(
            self.config.page_size,
            self.config.frame_count,
            self.config.reference_reset_interval,
        );
        self.note(
            LogEntry::new(LogLevel::Info, "memory reconfigured")
                .with_field("page_size", self.config.page_size)
                .with_field("frames", self.config.frame_count),
        );
    }

    /// Statuses of every process, in pid order
    pub fn statuses(&self) -> Vec<(Pid, ProcessStatus)> {
        self.processes
            .iter()
            .map(|pcb| (pcb.pid(), pcb.status()))
            .collect()
    }
}

impl std::fmt::Debug for SimulatedKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedKernel")
            .field("now", &self.clock.now())
            .field("processes", &self.processes.len())
            .field("scheduler", &self.scheduler)
            .field("running", &self.cpu.current_pid())
            .finish()
    }
}
