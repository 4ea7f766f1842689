//! Per-process page tables and the local second-chance sweep

use serde::{Deserialize, Serialize};

/// One virtual page's mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageTableEntry {
    /// Physical frame, meaningful only while `valid`
    pub frame: usize,
    pub valid: bool,
    pub referenced: bool,
    pub dirty: bool,
}

impl PageTableEntry {
    /// `(referenced, dirty)` class used by the second-chance sweep
    pub fn class(&self) -> (bool, bool) {
        (self.referenced, self.dirty)
    }
}

/// Page table owned by a single process
///
/// Entries start invalid; pages are brought in on first touch. The table
/// carries its own clock hand for local victim selection so that repeated
/// sweeps resume where the last one stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTable {
    entries: Vec<PageTableEntry>,
    hand: usize,
}

/// Victim classes in preference order: unreferenced clean, then unreferenced dirty
const SWEEP_CLASSES: [(bool, bool); 2] = [(false, false), (false, true)];

impl PageTable {
    /// Creates a table of `pages` invalid entries
    pub fn new(pages: usize) -> Self {
        Self {
            entries: vec![PageTableEntry::default(); pages],
            hand: 0,
        }
    }

    /// Number of virtual pages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, vpn: usize) -> Option<&PageTableEntry> {
        self.entries.get(vpn)
    }

    pub fn entry_mut(&mut self, vpn: usize) -> Option<&mut PageTableEntry> {
        self.entries.get_mut(vpn)
    }

    pub fn entries(&self) -> &[PageTableEntry] {
        &self.entries
    }

    /// Number of valid entries
    pub fn resident_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.valid).count()
    }

    /// `(vpn, entry)` pairs for every valid entry
    pub fn resident(&self) -> impl Iterator<Item = (usize, &PageTableEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.valid)
    }

    /// Maps `vpn` to `frame`, freshly loaded: referenced, clean
    pub fn map(&mut self, vpn: usize, frame: usize) {
        if let Some(entry) = self.entries.get_mut(vpn) {
            *entry = PageTableEntry {
                frame,
                valid: true,
                referenced: true,
                dirty: false,
            };
        }
    }

    /// Invalidates `vpn`, returning the entry as it was
    pub fn invalidate(&mut self, vpn: usize) -> Option<PageTableEntry> {
        let entry = self.entries.get_mut(vpn)?;
        let previous = *entry;
        *entry = PageTableEntry::default();
        Some(previous)
    }

    /// Clears every referenced bit
    pub fn clear_referenced(&mut self) {
        for entry in &mut self.entries {
            entry.referenced = false;
        }
    }

    /// Picks a resident page to evict
    ///
    /// Sweeps from the hand for an unreferenced clean page, then an
    /// unreferenced dirty one. If every resident page is referenced, all
    /// referenced bits are cleared and the sweep runs again, so a victim is
    /// always found when anything is resident.
    pub fn select_victim(&mut self) -> Option<usize> {
        if self.resident_count() == 0 {
            return None;
        }
        for _ in 0..2 {
            for class in SWEEP_CLASSES {
                if let Some(vpn) = self.sweep(class) {
                    self.hand = (vpn + 1) % self.entries.len();
                    return Some(vpn);
                }
            }
            self.clear_referenced();
        }
        None
    }

    fn sweep(&self, class: (bool, bool)) -> Option<usize> {
        let len = self.entries.len();
        (0..len)
            .map(|offset| (self.hand + offset) % len)
            .find(|&vpn| {
                let entry = &self.entries[vpn];
                entry.valid && entry.class() == class
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_is_all_invalid() {
        let table = PageTable::new(3);
        assert_eq!(table.len(), 3);
        assert!(table.entries().iter().all(|entry| !entry.valid));
        assert_eq!(table.resident_count(), 0);
    }

    #[test]
    fn test_map_and_invalidate() {
        let mut table = PageTable::new(2);
        table.map(1, 7);
        let entry = table.entry(1).unwrap();
        assert!(entry.valid && entry.referenced && !entry.dirty);
        assert_eq!(entry.frame, 7);

        let old = table.invalidate(1).unwrap();
        assert_eq!(old.frame, 7);
        assert!(!table.entry(1).unwrap().valid);
    }

    #[test]
    fn test_victim_prefers_clean_unreferenced() {
        let mut table = PageTable::new(3);
        table.map(0, 0);
        table.map(1, 1);
        table.map(2, 2);
        table.clear_referenced();
        table.entry_mut(0).unwrap().dirty = true;
        table.entry_mut(1).unwrap().referenced = true;

        assert_eq!(table.select_victim(), Some(2));
    }

    #[test]
    fn test_victim_falls_back_to_dirty() {
        let mut table = PageTable::new(2);
        table.map(0, 0);
        table.map(1, 1);
        table.clear_referenced();
        table.entry_mut(0).unwrap().dirty = true;
        table.entry_mut(1).unwrap().referenced = true;

        assert_eq!(table.select_victim(), Some(0));
    }

    #[test]
    fn test_all_referenced_gets_second_chance() {
        let mut table = PageTable::new(2);
        table.map(0, 0);
        table.map(1, 1);

        assert_eq!(table.select_victim(), Some(0));
        assert!(table.entries().iter().all(|entry| !entry.referenced));
        // The hand moved past the first victim.
        assert_eq!(table.select_victim(), Some(1));
    }

    #[test]
    fn test_no_victim_when_nothing_resident() {
        let mut table = PageTable::new(4);
        assert_eq!(table.select_victim(), None);
    }
}
