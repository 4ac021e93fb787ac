//! Scheduler
//!
//! Priority-based preemptive scheduler. Ready tasks of equal priority run in
//! FIFO order; a task keeps the CPU until it blocks or a higher priority task
//! becomes ready.

use core::ptr::NonNull;

use crate::critical::critical_section;
use crate::kernel::{self, CPU_STATE, SCHED};
use crate::task::OsTcb;
use crate::types::OsPrio;

/// Main scheduling point
///
/// Picks the highest priority ready task and pends a context switch if it is
/// not the running one. Safe from ISR context: PendSV has the lowest
/// exception priority, so the switch happens once every active handler has
/// returned.
pub fn os_sched() {
    if !kernel::KERNEL.is_running() {
        return;
    }

    critical_section(|cs| {
        let sched = SCHED.get(cs);
        let high_prio = sched.ready.highest();

        if let Some(high_rdy) = sched.rdy_list[high_prio as usize].head() {
            unsafe {
                CPU_STATE.prio_high_rdy = high_prio;
                CPU_STATE.tcb_high_rdy = high_rdy.as_ptr();

                if high_rdy.as_ptr() != CPU_STATE.tcb_cur {
                    crate::port::os_ctx_sw();
                }
            }
        }
    });
}

/// Make a task ready
///
/// # Safety
/// Interrupts must be masked and `tcb` must not be on a ready list.
pub(crate) unsafe fn os_rdy_list_insert(tcb: NonNull<OsTcb>) {
    let prio = unsafe { tcb.as_ref() }.prio;
    let sched = unsafe { SCHED.get_unchecked() };

    unsafe { sched.rdy_list[prio as usize].insert_tail(tcb) };
    sched.ready.insert(prio);
}

/// Remove a task from its ready list
///
/// # Safety
/// Interrupts must be masked and `tcb` must be on its ready list.
pub(crate) unsafe fn os_rdy_list_remove(tcb: NonNull<OsTcb>) {
    let prio = unsafe { tcb.as_ref() }.prio;
    let sched = unsafe { SCHED.get_unchecked() };
    let rdy_list = &mut sched.rdy_list[prio as usize];

    unsafe { rdy_list.remove(tcb) };
    if rdy_list.is_empty() {
        sched.ready.remove(prio);
    }
}

/// Move a task to a different priority
///
/// Ready tasks change lists; blocked tasks only record the new priority.
///
/// # Safety
/// Interrupts must be masked.
pub(crate) unsafe fn os_task_change_prio(tcb: NonNull<OsTcb>, new_prio: OsPrio) {
    let tcb_ref = unsafe { &mut *tcb.as_ptr() };
    if tcb_ref.prio == new_prio {
        return;
    }

    if tcb_ref.task_state == crate::types::OsTaskState::Ready {
        unsafe { os_rdy_list_remove(tcb) };
        tcb_ref.prio = new_prio;
        unsafe { os_rdy_list_insert(tcb) };
    } else {
        tcb_ref.prio = new_prio;
    }
}
