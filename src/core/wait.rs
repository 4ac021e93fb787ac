//! Blocking and waking on kernel objects
//!
//! Kernel objects keep wait lists of pending tasks. A blocked task is woken
//! either by a post on the object or by its deadline expiring in the tick
//! handler. A woken task retries its operation, so a post only has to make
//! the first waiter ready.

use core::ptr::NonNull;

use crate::critical::{critical_section, is_isr_context, CriticalSection};
use crate::error::{OsError, OsResult};
use crate::kernel::{self, KERNEL, SCHED};
use crate::list::PendList;
use crate::registry::Timeout;
use crate::sched;
use crate::task::OsTcb;
use crate::types::{OsPendStatus, OsTaskState, OsTick};

/// Outcome of one attempt at a kernel object operation
pub(crate) enum Attempt<T> {
    /// The operation completed
    Done(T),
    /// The object is busy; wait on this list before retrying
    Wait(*mut PendList),
}

/// Tick budget of a timed wait, measured from the first attempt
///
/// Elapsed time is taken as a wrapping difference, so the full `OsTick`
/// range is usable as a budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Deadline {
    start: OsTick,
    total: OsTick,
}

impl Deadline {
    pub(crate) fn new(start: OsTick, total: OsTick) -> Self {
        Self { start, total }
    }

    /// Ticks left at `now`, or `None` once the budget is spent
    pub(crate) fn remaining(&self, now: OsTick) -> Option<OsTick> {
        let elapsed = now.wrapping_sub(self.start);
        self.total.checked_sub(elapsed).filter(|&left| left > 0)
    }
}

enum Step<T> {
    Done(T),
    Fail(OsError),
    Blocked,
}

/// Run `attempt` until it completes or `timeout` runs out
///
/// `attempt` runs with interrupts masked. Zero-wait calls never block and
/// are the only kind accepted from ISR context.
pub(crate) fn os_pend_retry<T, F>(timeout: Timeout, mut attempt: F) -> OsResult<T>
where
    F: FnMut(&CriticalSection) -> Attempt<T>,
{
    let deadline = match timeout {
        Timeout::Millis(ms) => Some(Deadline::new(KERNEL.tick_get(), kernel::os_ms_to_ticks(ms))),
        _ => None,
    };

    loop {
        let step = critical_section(|cs| {
            let list = match attempt(cs) {
                Attempt::Done(value) => return Step::Done(value),
                Attempt::Wait(list) => list,
            };

            if timeout == Timeout::Poll {
                return Step::Fail(OsError::Timeout);
            }
            if is_isr_context() {
                return Step::Fail(OsError::PendIsr);
            }
            if !KERNEL.is_running() {
                return Step::Fail(OsError::OsNotRunning);
            }

            let ticks = match deadline {
                Some(deadline) => match deadline.remaining(KERNEL.tick_get()) {
                    Some(left) => Some(left),
                    None => return Step::Fail(OsError::Timeout),
                },
                None => None,
            };

            unsafe { os_pend_block(list, ticks) };
            Step::Blocked
        });

        match step {
            Step::Done(value) => return Ok(value),
            Step::Fail(err) => return Err(err),
            Step::Blocked => {
                sched::os_sched();

                let status = critical_section(|_cs| unsafe {
                    kernel::tcb_cur_ptr().map(|tcb| tcb.as_ref().pend_status)
                });
                if status == Some(OsPendStatus::Timeout) {
                    return Err(OsError::Timeout);
                }
            }
        }
    }
}

/// Move the current task from its ready list onto `list`
///
/// # Safety
/// Interrupts must be masked, the kernel must be running and `list` must
/// outlive the wait.
unsafe fn os_pend_block(list: *mut PendList, ticks: Option<OsTick>) {
    let Some(cur) = (unsafe { kernel::tcb_cur_ptr() }) else {
        return;
    };
    let tcb = unsafe { &mut *cur.as_ptr() };

    unsafe {
        sched::os_rdy_list_remove(cur);
        (*list).insert_by_prio(cur);
    }
    tcb.pend_list = list;
    tcb.pend_status = OsPendStatus::Ok;

    match ticks {
        Some(ticks) => {
            tcb.tick_remain = ticks;
            tcb.task_state = OsTaskState::PendTimeout;
            unsafe { SCHED.get_unchecked().tick_list.insert_tail(cur) };
        }
        None => {
            tcb.tick_remain = 0;
            tcb.task_state = OsTaskState::Pend;
        }
    }
}

/// Make the highest priority waiter on `list` ready
///
/// Returns the woken task, if any. Does not reschedule; callers run
/// [`sched::os_sched`] once they leave the critical section.
pub(crate) fn os_pend_wake_one(list: &mut PendList, _cs: &CriticalSection) -> Option<NonNull<OsTcb>> {
    let head = list.head()?;
    let tcb = unsafe { &mut *head.as_ptr() };

    unsafe {
        list.remove(head);
        if tcb.task_state == OsTaskState::PendTimeout {
            SCHED.get_unchecked().tick_list.remove(head);
        }
    }

    tcb.pend_list = core::ptr::null_mut();
    tcb.pend_status = OsPendStatus::Ok;
    tcb.tick_remain = 0;
    tcb.task_state = OsTaskState::Ready;
    unsafe { sched::os_rdy_list_insert(head) };

    Some(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_budgets_still_wait() {
        let now = 100;
        for total in [1 << 31, OsTick::MAX] {
            let deadline = Deadline::new(now, total);
            assert_eq!(deadline.remaining(now), Some(total));
            assert_eq!(deadline.remaining(now + 10), Some(total - 10));
        }
    }

    #[test]
    fn test_budget_across_tick_wrap() {
        let deadline = Deadline::new(OsTick::MAX - 5, 10);
        assert_eq!(deadline.remaining(OsTick::MAX), Some(5));
        assert_eq!(deadline.remaining(3), Some(1));
        assert_eq!(deadline.remaining(4), None);
        assert_eq!(deadline.remaining(50), None);
    }

    #[test]
    fn test_max_millis_maps_to_full_budget() {
        let total = kernel::os_ms_to_ticks(u32::MAX);
        assert_eq!(total, OsTick::MAX);
        assert_eq!(Deadline::new(7, total).remaining(7), Some(OsTick::MAX));
    }

    #[test]
    fn test_poll_fails_before_blocking() {
        let mut attempts = 0;
        let result: OsResult<()> = os_pend_retry(Timeout::Poll, |_cs| {
            attempts += 1;
            Attempt::Wait(core::ptr::null_mut())
        });
        assert_eq!(result, Err(OsError::Timeout));
        assert_eq!(attempts, 1);
    }
}
