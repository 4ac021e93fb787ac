//! Kernel backend internals
//!
//! Kernel state, scheduler, task control blocks, wait lists and the
//! compile-time configuration shared with the registry.

pub mod config;
pub mod critical;
pub mod cs_cell;
pub mod error;
pub mod kernel;
pub mod list;
pub mod prio;
pub mod sched;
pub mod task;
pub mod types;
pub(crate) mod wait;
