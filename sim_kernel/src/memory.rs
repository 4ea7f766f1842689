//! # Virtual Memory Manager
//!
//! Demand paging over a fixed pool of physical frames.
//!
//! ## Fault Handling
//!
//! A fault on page `vpn` of process `p` finds a frame in this order:
//!
//! 1. A free frame, while `p` holds fewer frames than its quota.
//! 2. One of `p`'s own resident pages, chosen by an enhanced second-chance
//!    sweep (unreferenced clean, then unreferenced dirty, then clear the
//!    referenced bits and sweep again).
//! 3. If `p` holds nothing: an unreferenced frame of another process, by a
//!    global sweep with its own hand. When no candidate exists and the
//!    reference-reset interval has elapsed, every referenced bit is cleared
//!    and the sweep retried once.
//! 4. Otherwise the fault is fatal: out of memory.
//!
//! Dirty victims are written back to their owner's backing store, and the
//! owner's entry is invalidated so it faults again on next touch.

use crate::cpu::MemoryBus;
use crate::frame_table::FrameTable;
use crate::process_table::ProcessTable;
use core_types::Pid;
use kernel_api::ExecutionFault;
use services_logger::{LogEntry, LogLevel, LogSink};
use std::fmt::Write as _;

/// Kind of memory access being translated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug)]
pub struct MemoryManager {
    page_size: usize,
    frames: FrameTable,
    physical: Vec<u8>,
    /// `(owner, vpn)` of each occupied frame
    owners: Vec<Option<(Pid, usize)>>,
    global_hand: usize,
    page_faults: u64,
    evictions: u64,
    reference_reset_interval: Option<u64>,
    last_reference_reset: u64,
}

impl MemoryManager {
    pub fn new(page_size: usize, frame_count: usize, reference_reset_interval: Option<u64>) -> Self {
        Self {
            page_size,
            frames: FrameTable::new(frame_count),
            physical: vec![0; page_size * frame_count],
            owners: vec![None; frame_count],
            global_hand: 0,
            page_faults: 0,
            evictions: 0,
            reference_reset_interval,
            last_reference_reset: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    pub fn frame_owner(&self, frame: usize) -> Option<(Pid, usize)> {
        self.owners.get(frame).copied().flatten()
    }

    /// Faults handled since creation
    pub fn page_faults(&self) -> u64 {
        self.page_faults
    }

    /// Pages taken from a resident process to satisfy a fault
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Bytes of one physical frame
    pub fn frame_bytes(&self, frame: usize) -> &[u8] {
        let start = frame * self.page_size;
        &self.physical[start..start + self.page_size]
    }

    pub fn read_physical(&self, address: usize) -> u8 {
        self.physical.get(address).copied().unwrap_or(0)
    }

    pub fn write_physical(&mut self, address: usize, value: u8) {
        if let Some(byte) = self.physical.get_mut(address) {
            *byte = value;
        }
    }

    /// Translates `vaddr` for `pid`, faulting the page in if needed
    ///
    /// Sets the referenced bit, and the dirty bit for writes. Returns the
    /// physical address.
    pub fn translate(
        &mut self,
        processes: &mut ProcessTable,
        pid: Pid,
        vaddr: u32,
        access: Access,
        now: u64,
        log: &mut dyn LogSink,
    ) -> Result<usize, ExecutionFault> {
        let out_of_range = ExecutionFault::AddressOutOfRange(vaddr as i64);
        let vpn = vaddr as usize / self.page_size;
        let offset = vaddr as usize % self.page_size;

        let valid = processes
            .get(pid)
            .and_then(|pcb| pcb.page_table())
            .and_then(|table| table.entry(vpn))
            .map(|entry| entry.valid)
            .ok_or(out_of_range)?;
        if !valid {
            self.handle_fault(processes, pid, vpn, now, log)?;
        }

        let entry = processes
            .get_mut(pid)
            .and_then(|pcb| pcb.page_table_mut())
            .and_then(|table| table.entry_mut(vpn))
            .ok_or(out_of_range)?;
        entry.referenced = true;
        if access == Access::Write {
            entry.dirty = true;
        }
        Ok(entry.frame * self.page_size + offset)
    }

    fn handle_fault(
        &mut self,
        processes: &mut ProcessTable,
        pid: Pid,
        vpn: usize,
        now: u64,
        log: &mut dyn LogSink,
    ) -> Result<(), ExecutionFault> {
        self.page_faults += 1;
        let (resident, max_pages) = match processes.get_mut(pid) {
            Some(pcb) => {
                pcb.record_page_fault();
                (pcb.resident_pages(), pcb.max_pages())
            }
            None => return Err(ExecutionFault::OutOfMemory { pid }),
        };

        let under_quota = max_pages.map_or(true, |max| resident < max);
        let free = if under_quota {
            self.frames.allocate()
        } else {
            None
        };

        let frame = match free {
            Some(frame) => frame,
            None if resident > 0 => self
                .evict_local(processes, pid, now, log)
                .ok_or(ExecutionFault::OutOfMemory { pid })?,
            None => self
                .evict_global(processes, pid, now, log)
                .ok_or(ExecutionFault::OutOfMemory { pid })?,
        };

        self.load_page(processes, pid, vpn, frame);
        log.record(
            LogEntry::new(LogLevel::Debug, "page fault")
                .with_source(pid)
                .with_tick(now)
                .with_field("vpn", vpn)
                .with_field("frame", frame),
        );
        Ok(())
    }

    fn evict_local(
        &mut self,
        processes: &mut ProcessTable,
        pid: Pid,
        now: u64,
        log: &mut dyn LogSink,
    ) -> Option<usize> {
        let vpn = processes.get_mut(pid)?.page_table_mut()?.select_victim()?;
        self.evict(processes, pid, vpn, now, log)
    }

    fn evict_global(
        &mut self,
        processes: &mut ProcessTable,
        pid: Pid,
        now: u64,
        log: &mut dyn LogSink,
    ) -> Option<usize> {
        if let Some((owner, vpn)) = self.sweep_global(processes, pid) {
            return self.evict(processes, owner, vpn, now, log);
        }
        if !self.reference_reset_due(now) {
            return None;
        }
        self.reset_references(processes, now);
        log.record(
            LogEntry::new(LogLevel::Info, "cleared referenced bits")
                .with_source(pid)
                .with_tick(now),
        );
        let (owner, vpn) = self.sweep_global(processes, pid)?;
        self.evict(processes, owner, vpn, now, log)
    }

    /// Finds an unreferenced frame of another process, clean before dirty
    fn sweep_global(&mut self, processes: &ProcessTable, pid: Pid) -> Option<(Pid, usize)> {
        let count = self.owners.len();
        for want_dirty in [false, true] {
            for step in 0..count {
                let frame = (self.global_hand + step) % count;
                let Some((owner, vpn)) = self.owners[frame] else {
                    continue;
                };
                if owner == pid {
                    continue;
                }
                let eligible = processes
                    .get(owner)
                    .and_then(|pcb| pcb.page_table())
                    .and_then(|table| table.entry(vpn))
                    .is_some_and(|entry| !entry.referenced && entry.dirty == want_dirty);
                if eligible {
                    self.global_hand = (frame + 1) % count;
                    return Some((owner, vpn));
                }
            }
        }
        None
    }

    fn reference_reset_due(&self, now: u64) -> bool {
        self.reference_reset_interval
            .is_some_and(|interval| now.saturating_sub(self.last_reference_reset) >= interval)
    }

    fn reset_references(&mut self, processes: &mut ProcessTable, now: u64) {
        for pcb in processes.iter_mut() {
            if let Some(table) = pcb.page_table_mut() {
                table.clear_referenced();
            }
        }
        self.last_reference_reset = now;
    }

    /// Unmaps `owner`'s page `vpn`, writing it back if dirty, and returns
    /// its frame still marked occupied
    fn evict(
        &mut self,
        processes: &mut ProcessTable,
        owner: Pid,
        vpn: usize,
        now: u64,
        log: &mut dyn LogSink,
    ) -> Option<usize> {
        let page_size = self.page_size;
        let pcb = processes.get_mut(owner)?;
        let entry = pcb.page_table_mut()?.invalidate(vpn)?;
        let frame = entry.frame;
        if entry.dirty {
            let start = frame * page_size;
            let page = &self.physical[start..start + page_size];
            let store = pcb.backing_store_mut();
            store[vpn * page_size..(vpn + 1) * page_size].copy_from_slice(page);
        }
        self.owners[frame] = None;
        self.evictions += 1;
        log.record(
            LogEntry::new(LogLevel::Debug, "evicted page")
                .with_source(owner)
                .with_tick(now)
                .with_field("vpn", vpn)
                .with_field("frame", frame)
                .with_field("dirty", entry.dirty),
        );
        Some(frame)
    }

    fn load_page(&mut self, processes: &mut ProcessTable, pid: Pid, vpn: usize, frame: usize) {
        let page_size = self.page_size;
        let Some(pcb) = processes.get_mut(pid) else {
            return;
        };
        let start = vpn * page_size;
        let target = frame * page_size;
        self.physical[target..target + page_size]
            .copy_from_slice(&pcb.backing_store()[start..start + page_size]);
        if let Some(table) = pcb.page_table_mut() {
            table.map(vpn, frame);
        }
        self.owners[frame] = Some((pid, vpn));
    }

    /// Returns every frame held by `pid` to the free pool, zeroed
    ///
    /// Releasing a process that holds nothing is a no-op.
    pub fn release(&mut self, processes: &mut ProcessTable, pid: Pid) {
        let page_size = self.page_size;
        let Some(table) = processes.get_mut(pid).and_then(|pcb| pcb.page_table_mut()) else {
            return;
        };
        let resident: Vec<(usize, usize)> = table
            .resident()
            .map(|(vpn, entry)| (vpn, entry.frame))
            .collect();
        for (vpn, frame) in resident {
            table.invalidate(vpn);
            self.physical[frame * page_size..(frame + 1) * page_size].fill(0);
            self.owners[frame] = None;
            self.frames.release(frame);
        }
    }

    /// Checks frame conservation against the process table
    ///
    /// The occupied count must equal the valid entries of live processes,
    /// and every valid entry must be the recorded owner of its frame.
    pub fn is_consistent(&self, processes: &ProcessTable) -> bool {
        let mut valid = 0;
        for pcb in processes.iter() {
            let Some(table) = pcb.page_table() else {
                continue;
            };
            for (vpn, entry) in table.resident() {
                valid += 1;
                if pcb.status().is_terminal()
                    || !self.frames.is_occupied(entry.frame)
                    || self.frame_owner(entry.frame) != Some((pcb.pid(), vpn))
                {
                    return false;
                }
            }
        }
        valid == self.frames.used_count()
    }

    /// Renders every occupied frame, six bytes per row
    pub fn dump_frames(&self) -> String {
        let mut out = String::new();
        for frame in 0..self.frames.len() {
            let Some((owner, vpn)) = self.frame_owner(frame) else {
                continue;
            };
            let _ = writeln!(out, "Frame {} ({} page {}):", frame, owner, vpn);
            let base = frame * self.page_size;
            for (row, chunk) in self.frame_bytes(frame).chunks(6).enumerate() {
                let bytes: Vec<String> = chunk.iter().map(|byte| format!("{:02x}", byte)).collect();
                let _ = writeln!(out, "  {:04x}: {}", base + row * 6, bytes.join(" "));
            }
        }
        if out.is_empty() {
            out.push_str("(no frames in use)\n");
        }
        out
    }
}

/// The CPU's view of one process's memory
pub struct ProcessBus<'a> {
    memory: &'a mut MemoryManager,
    processes: &'a mut ProcessTable,
    pid: Pid,
    now: u64,
    log: &'a mut dyn LogSink,
}

impl<'a> ProcessBus<'a> {
    pub fn new(
        memory: &'a mut MemoryManager,
        processes: &'a mut ProcessTable,
        pid: Pid,
        now: u64,
        log: &'a mut dyn LogSink,
    ) -> Self {
        Self {
            memory,
            processes,
            pid,
            now,
            log,
        }
    }
}

impl MemoryBus for ProcessBus<'_> {
    fn read_byte(&mut self, vaddr: u32) -> Result<u8, ExecutionFault> {
        let address = self.memory.translate(
            self.processes,
            self.pid,
            vaddr,
            Access::Read,
            self.now,
            self.log,
        )?;
        Ok(self.memory.read_physical(address))
    }

    fn write_byte(&mut self, vaddr: u32, value: u8) -> Result<(), ExecutionFault> {
        let address = self.memory.translate(
            self.processes,
            self.pid,
            vaddr,
            Access::Write,
            self.now,
            self.log,
        )?;
        self.memory.write_physical(address, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ProgramImage;
    use services_logger::MemoryLog;

    const PAGE: usize = 16;

    /// Loads a process whose page `n` is filled with byte `n + 1`
    fn load(table: &mut ProcessTable, pages: usize, max_pages: Option<usize>) -> Pid {
        let pid = table.create("p", 0, 0);
        let backing_store = (0..pages * PAGE).map(|i| (i / PAGE + 1) as u8).collect();
        let image = ProgramImage {
            size: pages * PAGE - 1,
            entry: 0,
            backing_store,
        };
        table.get_mut(pid).unwrap().attach_image(image, pages, max_pages);
        pid
    }

    fn touch(memory: &mut MemoryManager, table: &mut ProcessTable, pid: Pid, vpn: usize) -> Result<usize, ExecutionFault> {
        let mut log = MemoryLog::new();
        memory.translate(table, pid, (vpn * PAGE) as u32, Access::Read, 0, &mut log)
    }

    #[test]
    fn test_fault_loads_page_from_backing_store() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(PAGE, 4, None);
        let pid = load(&mut table, 3, None);

        let address = touch(&mut memory, &mut table, pid, 2).unwrap();
        assert_eq!(memory.read_physical(address), 3);
        let entry = *table.get(pid).unwrap().page_table().unwrap().entry(2).unwrap();
        assert!(entry.valid && entry.referenced);
        assert!(memory.frames().is_occupied(entry.frame));
        assert_eq!(memory.page_faults(), 1);
        assert_eq!(table.get(pid).unwrap().page_faults(), 1);
        assert!(memory.is_consistent(&table));

        // A second touch does not fault.
        touch(&mut memory, &mut table, pid, 2).unwrap();
        assert_eq!(memory.page_faults(), 1);
    }

    #[test]
    fn test_out_of_range_address() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(PAGE, 4, None);
        let pid = load(&mut table, 1, None);
        assert_eq!(
            touch(&mut memory, &mut table, pid, 1),
            Err(ExecutionFault::AddressOutOfRange(PAGE as i64))
        );
    }

    #[test]
    fn test_quota_forces_local_eviction() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(PAGE, 8, None);
        let pid = load(&mut table, 4, Some(2));

        for vpn in 0..4 {
            touch(&mut memory, &mut table, pid, vpn).unwrap();
        }
        assert_eq!(table.get(pid).unwrap().resident_pages(), 2);
        assert_eq!(memory.frames().used_count(), 2);
        assert!(memory.is_consistent(&table));
    }

    #[test]
    fn test_dirty_victim_written_back() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(PAGE, 1, None);
        let pid = load(&mut table, 2, None);
        let mut log = MemoryLog::new();

        let address = memory
            .translate(&mut table, pid, 3, Access::Write, 0, &mut log)
            .unwrap();
        memory.write_physical(address, 0xAB);
        // Page 1 evicts page 0, which must reach the backing store.
        touch(&mut memory, &mut table, pid, 1).unwrap();
        assert_eq!(table.get(pid).unwrap().backing_store()[3], 0xAB);

        let address = touch(&mut memory, &mut table, pid, 0).unwrap();
        assert_eq!(memory.read_physical(address + 3), 0xAB);
    }

    #[test]
    fn test_global_eviction_takes_unreferenced_frame() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(PAGE, 1, None);
        let a = load(&mut table, 1, None);
        let b = load(&mut table, 1, None);

        touch(&mut memory, &mut table, a, 0).unwrap();
        table.get_mut(a).unwrap().page_table_mut().unwrap().clear_referenced();

        touch(&mut memory, &mut table, b, 0).unwrap();
        assert!(!table.get(a).unwrap().page_table().unwrap().entry(0).unwrap().valid);
        assert_eq!(memory.frame_owner(0), Some((b, 0)));
        assert_eq!(memory.evictions(), 1);
        assert!(memory.is_consistent(&table));
    }

    #[test]
    fn test_referenced_frames_exhaust_memory() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(PAGE, 1, None);
        let a = load(&mut table, 1, None);
        let b = load(&mut table, 1, None);

        touch(&mut memory, &mut table, a, 0).unwrap();
        assert_eq!(
            touch(&mut memory, &mut table, b, 0),
            Err(ExecutionFault::OutOfMemory { pid: b })
        );
        assert_eq!(memory.frame_owner(0), Some((a, 0)));
        assert!(memory.is_consistent(&table));
    }

    #[test]
    fn test_reference_reset_gives_second_chance() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(PAGE, 1, Some(10));
        let a = load(&mut table, 1, None);
        let b = load(&mut table, 1, None);
        let mut log = MemoryLog::new();

        touch(&mut memory, &mut table, a, 0).unwrap();
        assert!(memory
            .translate(&mut table, b, 0, Access::Read, 5, &mut log)
            .is_err());
        assert!(memory
            .translate(&mut table, b, 0, Access::Read, 10, &mut log)
            .is_ok());
        assert_eq!(memory.frame_owner(0), Some((b, 0)));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(PAGE, 4, None);
        let pid = load(&mut table, 2, None);
        touch(&mut memory, &mut table, pid, 0).unwrap();
        touch(&mut memory, &mut table, pid, 1).unwrap();

        memory.release(&mut table, pid);
        assert_eq!(memory.frames().used_count(), 0);
        assert!(memory.frame_bytes(0).iter().all(|byte| *byte == 0));
        memory.release(&mut table, pid);
        assert_eq!(memory.frames().used_count(), 0);
        assert_eq!(table.get(pid).unwrap().resident_pages(), 0);
        assert!(memory.is_consistent(&table));
    }

    #[test]
    fn test_dump_lists_occupied_frames() {
        let mut table = ProcessTable::new();
        let mut memory = MemoryManager::new(PAGE, 2, None);
        assert_eq!(memory.dump_frames(), "(no frames in use)\n");
        let pid = load(&mut table, 1, None);
        touch(&mut memory, &mut table, pid, 0).unwrap();
        let dump = memory.dump_frames();
        assert!(dump.starts_with("Frame 0 (P1 page 0):"));
        assert!(dump.contains("  0000: 01 01 01 01 01 01"));
        assert!(!dump.contains("Frame 1"));
    }
}
