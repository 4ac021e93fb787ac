//! Task control blocks and task creation
//!
//! Tasks are created dormant: stack frame built, nothing scheduled. The
//! kernel makes them ready all at once when multitasking starts.

use core::ptr::NonNull;

use crate::config::{CFG_PRIO_MAX, CFG_STK_SIZE_MIN};
use crate::critical::critical_section;
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::list::{PendList, TcbLinks};
use crate::registry::Runnable;
use crate::sched;
use crate::types::{OsPendStatus, OsPrio, OsStkElement, OsTaskState, OsTick};

/// Task entry point function type used by the port layer
pub type OsTaskFn = fn(*mut ()) -> !;

/// Task Control Block
#[repr(C)]
pub struct OsTcb {
    /// Saved stack pointer; kept first for the context switch
    pub stk_ptr: *mut OsStkElement,
    /// Base of stack
    pub stk_base: *mut OsStkElement,
    /// Stack size in words
    pub stk_size: usize,

    /// Task name
    pub name: &'static str,
    /// Body executed by the task
    pub entry: Option<&'static dyn Runnable>,

    /// Ready list links
    pub rdy_links: TcbLinks,
    /// Wait list links
    pub pend_links: TcbLinks,
    /// Tick list links
    pub tick_links: TcbLinks,

    /// Wait list the task is pending on
    pub pend_list: *mut PendList,
    /// Result of the last pend
    pub pend_status: OsPendStatus,
    /// Remaining ticks before the pend times out
    pub tick_remain: OsTick,

    /// Current priority
    pub prio: OsPrio,
    /// Base priority
    pub base_prio: OsPrio,
    /// Current task state
    pub task_state: OsTaskState,
}

impl OsTcb {
    /// Create a new, uninitialized TCB
    pub const fn new() -> Self {
        OsTcb {
            stk_ptr: core::ptr::null_mut(),
            stk_base: core::ptr::null_mut(),
            stk_size: 0,
            name: "",
            entry: None,
            rdy_links: TcbLinks::new(),
            pend_links: TcbLinks::new(),
            tick_links: TcbLinks::new(),
            pend_list: core::ptr::null_mut(),
            pend_status: OsPendStatus::Ok,
            tick_remain: 0,
            prio: 0,
            base_prio: 0,
            task_state: OsTaskState::Dormant,
        }
    }

    /// Check if task is pending
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self.task_state, OsTaskState::Pend | OsTaskState::PendTimeout)
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsTcb {}
unsafe impl Sync for OsTcb {}

/// Prepare a dormant task
///
/// Builds the initial stack frame so that the first switch to the task lands
/// in [`os_task_trampoline`], which runs `entry`.
///
/// # Arguments
/// * `tcb` - Task Control Block, must not move afterwards
/// * `name` - Task name for debugging
/// * `entry` - Task body
/// * `prio` - Task priority (0 = highest)
/// * `stack` - Stack memory, must not move afterwards
pub fn os_task_init(
    tcb: &mut OsTcb,
    name: &'static str,
    entry: &'static dyn Runnable,
    prio: OsPrio,
    stack: &mut [OsStkElement],
) -> OsResult<()> {
    if stack.len() < CFG_STK_SIZE_MIN {
        return Err(OsError::StkSizeInvalid);
    }

    if prio as usize >= CFG_PRIO_MAX {
        return Err(OsError::PrioInvalid);
    }

    *tcb = OsTcb::new();
    tcb.name = name;
    tcb.entry = Some(entry);
    tcb.prio = prio;
    tcb.base_prio = prio;

    let arg = core::ptr::addr_of_mut!(*tcb) as *mut ();
    tcb.stk_base = stack.as_mut_ptr();
    tcb.stk_size = stack.len();
    tcb.stk_ptr = unsafe {
        crate::port::os_task_stk_init(os_task_trampoline, arg, tcb.stk_base, tcb.stk_size)
    };

    Ok(())
}

/// First code a task runs: the body, then a permanent exit
fn os_task_trampoline(arg: *mut ()) -> ! {
    let tcb = arg as *const OsTcb;
    if let Some(entry) = unsafe { (*tcb).entry } {
        entry.run();
    }

    crate::warn!("task body returned");
    os_task_exit()
}

/// Remove the current task from scheduling for good
fn os_task_exit() -> ! {
    critical_section(|_cs| unsafe {
        if let Some(cur) = kernel::tcb_cur_ptr() {
            sched::os_rdy_list_remove(cur);
            (*cur.as_ptr()).task_state = OsTaskState::Exited;
        }
    });
    sched::os_sched();

    loop {
        crate::port::os_idle_wait();
    }
}

/// Make a dormant task ready to run
///
/// # Safety
/// `tcb` must point to an initialized, dormant TCB that outlives the kernel.
pub(crate) unsafe fn os_task_make_ready(tcb: NonNull<OsTcb>) {
    let tcb_ref = unsafe { &mut *tcb.as_ptr() };
    if tcb_ref.task_state != OsTaskState::Dormant {
        return;
    }
    tcb_ref.task_state = OsTaskState::Ready;
    unsafe { sched::os_rdy_list_insert(tcb) };
}
