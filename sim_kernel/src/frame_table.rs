//! Physical frame occupancy

/// Occupancy bit-vector over all physical frames
///
/// The table knows nothing about owners. The memory manager keeps ownership
/// alongside and upholds that the occupied count equals the number of valid
/// page-table entries across live processes.
#[derive(Debug, Clone)]
pub struct FrameTable {
    occupied: Vec<bool>,
    used: usize,
}

impl FrameTable {
    /// Creates a table with `frame_count` free frames
    pub fn new(frame_count: usize) -> Self {
        Self {
            occupied: vec![false; frame_count],
            used: 0,
        }
    }

    /// Claims the lowest-numbered free frame
    pub fn allocate(&mut self) -> Option<usize> {
        let frame = self.occupied.iter().position(|taken| !taken)?;
        self.occupied[frame] = true;
        self.used += 1;
        Some(frame)
    }

    /// Returns a frame to the free pool. Releasing a free frame is a no-op.
    pub fn release(&mut self, frame: usize) {
        if let Some(slot) = self.occupied.get_mut(frame) {
            if *slot {
                *slot = false;
                self.used -= 1;
            }
        }
    }

    pub fn is_occupied(&self, frame: usize) -> bool {
        self.occupied.get(frame).copied().unwrap_or(false)
    }

    /// Total number of frames
    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }

    pub fn used_count(&self) -> usize {
        self.used
    }

    pub fn free_count(&self) -> usize {
        self.occupied.len() - self.used
    }

    pub fn has_free(&self) -> bool {
        self.used < self.occupied.len()
    }
}
