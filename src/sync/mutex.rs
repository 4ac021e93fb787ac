//! Mutex with priority inheritance
//!
//! Binary lock with at most one holder. A task that blocks on a mutex held
//! by a lower priority task lends its priority to the holder until release.
//! Interrupt handlers may take the lock with a zero wait, and so may code
//! running before the scheduler starts.

use core::ptr::NonNull;

use crate::critical::{is_isr_context, CriticalSection};
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::list::PendList;
use crate::sched;
use crate::task::OsTcb;
use crate::wait::{self, Attempt};

/// Who holds a mutex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    /// A kernel task
    Task(NonNull<OsTcb>),
    /// Interrupt context, or start-up code before multitasking
    Context,
}

impl Holder {
    /// Identity of the caller
    pub fn current() -> Self {
        if is_isr_context() {
            return Holder::Context;
        }
        match unsafe { kernel::tcb_cur_ptr() } {
            Some(tcb) => Holder::Task(tcb),
            None => Holder::Context,
        }
    }
}

/// Mutex
pub struct OsMutex {
    /// Tasks waiting on this mutex
    pend_list: PendList,
    holder: Option<Holder>,
}

impl OsMutex {
    pub const fn new() -> Self {
        OsMutex {
            pend_list: PendList::new(),
            holder: None,
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.holder.is_some()
    }

    /// One acquire attempt on behalf of `caller`
    ///
    /// A busy mutex is not re-entrant: the holder asking again waits like
    /// anyone else. A task about to wait boosts a lower priority holder.
    pub(crate) fn try_lock(&mut self, caller: Holder, _cs: &CriticalSection) -> Attempt<()> {
        let Some(holder) = self.holder else {
            self.holder = Some(caller);
            return Attempt::Done(());
        };

        if let (Holder::Task(cur), Holder::Task(owner)) = (caller, holder) {
            let cur_prio = unsafe { cur.as_ref() }.prio;
            if cur_prio < unsafe { owner.as_ref() }.prio {
                unsafe { sched::os_task_change_prio(owner, cur_prio) };
            }
        }

        Attempt::Wait(&mut self.pend_list)
    }

    /// Release on behalf of `caller`
    ///
    /// Restores the caller's base priority and hands the mutex to nobody;
    /// the first waiter is made ready and retries. Returns whether a task
    /// was woken.
    pub(crate) fn unlock(&mut self, caller: Holder, cs: &CriticalSection) -> OsResult<bool> {
        if self.holder != Some(caller) {
            return Err(OsError::MutexNotOwner);
        }

        if let Holder::Task(cur) = caller {
            let base_prio = unsafe { cur.as_ref() }.base_prio;
            unsafe { sched::os_task_change_prio(cur, base_prio) };
        }

        self.holder = None;
        Ok(wait::os_pend_wake_one(&mut self.pend_list, cs).is_some())
    }
}

impl Default for OsMutex {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsMutex {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critical::critical_section;

    #[test]
    fn test_context_lock_cycle() {
        let mut mutex = OsMutex::new();

        critical_section(|cs| {
            assert!(matches!(mutex.try_lock(Holder::Context, cs), Attempt::Done(())));
            assert!(mutex.is_locked());
            assert!(matches!(mutex.try_lock(Holder::Context, cs), Attempt::Wait(_)));
            assert_eq!(mutex.unlock(Holder::Context, cs), Ok(false));
            assert!(!mutex.is_locked());
        });
    }

    #[test]
    fn test_unlock_when_free_fails() {
        let mut mutex = OsMutex::new();
        critical_section(|cs| {
            assert_eq!(mutex.unlock(Holder::Context, cs), Err(OsError::MutexNotOwner));
        });
    }
}
