//! Sensor telemetry node over a backend-agnostic RTOS registry
//!
//! - A resource registry of threads, timers, queues and mutexes with one
//!   contract and two backends: a μC/OS-III style preemptive kernel for
//!   Cortex-M4, and host threads for development machines
//! - A telemetry pipeline on top: periodic sensor sampling, interrupt-fed
//!   byte queues, and a line command parser selecting the report encoding

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(all(target_arch = "arm", not(feature = "std")))]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod sync;
pub mod port;
pub mod registry;
pub mod app;

// ============ Re-exports ============

pub use crate::core::config;
pub use crate::core::critical;
pub use crate::core::error;
pub use crate::core::error::{OsError, OsResult};
pub use crate::core::kernel;
pub use crate::core::list;
pub use crate::core::prio;
pub use crate::core::sched;
pub use crate::core::task;
pub use crate::core::types;
pub(crate) use crate::core::wait;

pub use registry::{Registry, Timeout};

#[cfg(feature = "pac")]
pub use stm32_metapac as pac;
