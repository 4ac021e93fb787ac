//! Core type definitions for the kernel backend
//!
//! These types provide strong typing for RTOS primitives.

/// Task priority (0 = highest priority)
pub type OsPrio = u8;

/// Tick counter type
pub type OsTick = u32;

/// Stack element type
pub type OsStkElement = u32;

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsTaskState {
    /// Created but not yet handed to the scheduler
    Dormant = 0,
    /// Task is ready to run
    Ready = 1,
    /// Task is pending on a kernel object without a deadline
    Pend = 2,
    /// Task is pending with timeout
    PendTimeout = 3,
    /// Task body returned; never scheduled again
    Exited = 4,
}

/// Pend status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsPendStatus {
    /// Woken by a post
    Ok = 0,
    /// Deadline expired
    Timeout = 1,
}
