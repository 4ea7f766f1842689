//! Kernel configuration

use kernel_api::{ConfigError, SchedulingPolicy};
use serde::{Deserialize, Serialize};

/// Inclusive range of ticks a randomized delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

impl DelayRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Rejects reversed bounds and zero-length delays
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min == 0 || self.min > self.max {
            return Err(ConfigError::InvalidDelayRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Simulated kernel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Bytes per page and per frame
    pub page_size: usize,
    /// Physical frames
    pub frame_count: usize,
    /// Ready-queue policy at boot
    pub policy: SchedulingPolicy,
    /// Frames a process may hold before it must evict its own pages
    pub max_pages_per_process: Option<usize>,
    /// Program run by the spawn syscall
    pub child_program: String,
    /// Ticks an I/O request takes
    pub io_delay: DelayRange,
    /// Ticks the wait syscall burns
    pub wait_delay: DelayRange,
    /// Seed for every randomized delay
    pub rng_seed: u64,
    /// Minimum ticks between global clears of the referenced bits
    pub reference_reset_interval: Option<u64>,
    /// Largest program body accepted by the loader
    pub max_program_bytes: usize,
    /// Deepest allowed nesting of inline spawns
    pub max_spawn_depth: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            page_size: 16,
            frame_count: 16,
            policy: SchedulingPolicy::default(),
            max_pages_per_process: None,
            child_program: "child".to_string(),
            io_delay: DelayRange::new(1, 10),
            wait_delay: DelayRange::new(1, 20),
            rng_seed: 0x5eed,
            reference_reset_interval: Some(50),
            max_program_bytes: 64 * 1024,
            max_spawn_depth: 8,
        }
    }
}

impl KernelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_frame_count(mut self, frame_count: usize) -> Self {
        self.frame_count = frame_count;
        self
    }

    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_pages_per_process(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages_per_process = max_pages;
        self
    }

    pub fn with_child_program(mut self, program: impl Into<String>) -> Self {
        self.child_program = program.into();
        self
    }

    pub fn with_io_delay(mut self, min: u64, max: u64) -> Self {
        self.io_delay = DelayRange::new(min, max);
        self
    }

    pub fn with_wait_delay(mut self, min: u64, max: u64) -> Self {
        self.wait_delay = DelayRange::new(min, max);
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    pub fn with_reference_reset_interval(mut self, interval: Option<u64>) -> Self {
        self.reference_reset_interval = interval;
        self
    }

    pub fn with_max_program_bytes(mut self, max: usize) -> Self {
        self.max_program_bytes = max;
        self
    }

    pub fn with_max_spawn_depth(mut self, depth: usize) -> Self {
        self.max_spawn_depth = depth;
        self
    }

    /// Checks every field, reporting the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_geometry(self.page_size, self.frame_count)?;
        validate_max_pages(self.max_pages_per_process)?;
        self.policy.validate()?;
        self.io_delay.validate()?;
        self.wait_delay.validate()
    }
}

/// Largest simulated physical memory, in bytes
pub const MAX_PHYSICAL_BYTES: usize = 64 * 1024 * 1024;

/// Checks a page size and frame count together
///
/// Both must be non-zero and their product must fit in
/// [`MAX_PHYSICAL_BYTES`].
pub(crate) fn validate_geometry(page_size: usize, frame_count: usize) -> Result<(), ConfigError> {
    if page_size == 0 {
        return Err(ConfigError::InvalidPageSize(page_size));
    }
    if frame_count == 0 {
        return Err(ConfigError::InvalidFrameCount(frame_count));
    }
    match page_size.checked_mul(frame_count) {
        Some(bytes) if bytes <= MAX_PHYSICAL_BYTES => Ok(()),
        _ => Err(ConfigError::PhysicalMemoryTooLarge {
            page_size,
            frame_count,
            limit: MAX_PHYSICAL_BYTES,
        }),
    }
}

pub(crate) fn validate_max_pages(max_pages: Option<usize>) -> Result<(), ConfigError> {
    match max_pages {
        Some(0) => Err(ConfigError::InvalidMaxPages(0)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.page_size, 16);
        assert_eq!(config.frame_count, 16);
        assert_eq!(config.policy, SchedulingPolicy::RoundRobin { quantum: 5 });
        assert_eq!(config.io_delay, DelayRange::new(1, 10));
        assert_eq!(config.wait_delay, DelayRange::new(1, 20));
        assert_eq!(config.reference_reset_interval, Some(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = KernelConfig::new()
            .with_page_size(32)
            .with_frame_count(4)
            .with_policy(SchedulingPolicy::Fcfs)
            .with_child_program("kid")
            .with_io_delay(2, 2);
        assert_eq!(config.page_size, 32);
        assert_eq!(config.frame_count, 4);
        assert_eq!(config.child_program, "kid");
        assert_eq!(config.io_delay, DelayRange::new(2, 2));
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            KernelConfig::new().with_page_size(0).validate(),
            Err(ConfigError::InvalidPageSize(0))
        );
        assert_eq!(
            KernelConfig::new().with_frame_count(0).validate(),
            Err(ConfigError::InvalidFrameCount(0))
        );
        assert_eq!(
            KernelConfig::new().with_io_delay(5, 2).validate(),
            Err(ConfigError::InvalidDelayRange { min: 5, max: 2 })
        );
        assert_eq!(
            KernelConfig::new()
                .with_policy(SchedulingPolicy::Mlfq {
                    level1_quantum: 2,
                    level2_quantum: 0
                })
                .validate(),
            Err(ConfigError::InvalidQuantum(0))
        );
        assert_eq!(
            KernelConfig::new()
                .with_max_pages_per_process(Some(0))
                .validate(),
            Err(ConfigError::InvalidMaxPages(0))
        );
    }

    #[test]
    fn test_geometry_limit() {
        assert!(validate_geometry(16, 16).is_ok());
        assert!(validate_geometry(1024, MAX_PHYSICAL_BYTES / 1024).is_ok());
        assert_eq!(
            validate_geometry(usize::MAX / 2, 16),
            Err(ConfigError::PhysicalMemoryTooLarge {
                page_size: usize::MAX / 2,
                frame_count: 16,
                limit: MAX_PHYSICAL_BYTES,
            })
        );
        assert!(matches!(
            KernelConfig::new().with_frame_count(MAX_PHYSICAL_BYTES).validate(),
            Err(ConfigError::PhysicalMemoryTooLarge { .. })
        ));
    }

    #[test]
    fn test_config_json() {
        let config = KernelConfig::new().with_rng_seed(7);
        let json = serde_json::to_string(&config).unwrap();
        let back: KernelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
