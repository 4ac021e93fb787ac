//! Interrupt-masked storage for kernel and registry tables

use core::cell::UnsafeCell;

use crate::critical::CriticalSection;

/// Storage reachable only while a [`CriticalSection`] token is held
///
/// Every table in the kernel backend lives in one of these. Single-core with
/// interrupts masked means at most one `&mut` exists at a time.
pub struct CsCell<T>(UnsafeCell<T>);

unsafe impl<T> Sync for CsCell<T> {}

impl<T> CsCell<T> {
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub fn get<'cs>(&'cs self, _cs: &'cs CriticalSection) -> &'cs mut T {
        unsafe { &mut *self.0.get() }
    }

    /// # Safety
    /// No other reference may be live: interrupts are already masked (PendSV,
    /// SysTick) or the scheduler has not started.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_unchecked(&self) -> &mut T {
        unsafe { &mut *self.0.get() }
    }
}
