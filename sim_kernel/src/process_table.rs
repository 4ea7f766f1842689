//! Registry of every process the kernel has created

use crate::pcb::Pcb;
use core_types::Pid;
use std::collections::{BTreeMap, HashMap};

/// Owns every PCB, keyed by pid
///
/// Queues elsewhere hold pids only. Pids start at 1 and increase
/// monotonically. The program index maps a program identifier to every pid
/// created from it, oldest first.
#[derive(Debug)]
pub struct ProcessTable {
    processes: BTreeMap<Pid, Pcb>,
    by_program: HashMap<String, Vec<Pid>>,
    next_pid: Pid,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            processes: BTreeMap::new(),
            by_program: HashMap::new(),
            next_pid: Pid::new(1),
        }
    }

    /// Creates a `New` process and returns its pid
    pub fn create(&mut self, program: &str, start_after: u64, now: u64) -> Pid {
        let pid = self.next_pid;
        self.next_pid = pid.next();
        self.processes
            .insert(pid, Pcb::new(pid, program, start_after, now));
        self.by_program
            .entry(program.to_string())
            .or_default()
            .push(pid);
        pid
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.processes.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.processes.get_mut(&pid)
    }

    /// Pids created from `program`
    pub fn pids_for_program(&self, program: &str) -> &[Pid] {
        self.by_program
            .get(program)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All PCBs in pid order
    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.processes.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pcb> {
        self.processes.values_mut()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Loaded processes that have not terminated
    pub fn resident_count(&self) -> usize {
        self.processes
            .values()
            .filter(|pcb| pcb.is_loaded() && !pcb.status().is_terminal())
            .count()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
