//! # Kernel API
//!
//! The surface of the simulated kernel, as seen by a shell or a test.
//!
//! ## Philosophy
//!
//! The kernel provides **mechanisms**; the collaborators around it are
//! traits:
//! - Programs arrive through a [`ProgramSource`], never a filesystem path
//! - Epoch metrics leave through a [`MetricsSink`]
//! - Every error is a value returned to the caller
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A shell (command parsing lives outside)
//! - An assembler (programs arrive pre-assembled)
//! - A renderer (metrics are data, charts are someone else's job)

pub mod error;
pub mod kernel;
pub mod metrics;
pub mod policy;
pub mod program;

pub use error::{ConfigError, ExecutionFault, KernelError, LoadError};
pub use kernel::{JobSpec, KernelApi, MemoryUsage, ProcessSummary};
pub use metrics::{MetricsReport, MetricsSink, ProcessMetricsRow};
pub use policy::SchedulingPolicy;
pub use program::ProgramSource;
