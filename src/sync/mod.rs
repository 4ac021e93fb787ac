//! Synchronization primitives
//!
//! Message queues, mutexes and software timers used by the kernel registry.

pub mod mutex;
pub mod queue;
pub mod ring;
pub mod timer;
