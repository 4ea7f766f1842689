//! # Core Types
//!
//! This crate defines the fundamental types shared by every part of the
//! simulated machine.
//!
//! ## Philosophy
//!
//! - **Identity is explicit**: processes are named by a monotonic [`Pid`],
//!   never by a position in some global array.
//! - **State is typed**: lifecycle states and queue identities are enums,
//!   not magic integers.
//! - **Everything is serialisable**: reports and summaries built from these
//!   types can leave the simulation as JSON.
//!
//! ## Key Types
//!
//! - [`Pid`]: Monotonic process identifier
//! - [`EpochId`]: Unique identifier for one scheduling epoch's report
//! - [`ProcessStatus`]: Process lifecycle state
//! - [`QueueId`]: Which queue (or the CPU) a process occupied during a burst

pub mod ids;
pub mod process;

pub use ids::{EpochId, Pid};
pub use process::{ProcessStatus, QueueId};
