//! Global kernel state and initialization
//!
//! This module manages the global OS state: initialization, starting the
//! scheduler, the tick handler and the current/next task bookkeeping used by
//! the context switch.

use core::ptr::NonNull;

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::{CFG_IDLE_STK_SIZE, CFG_PRIO_IDLE, CFG_PRIO_MAX, CFG_TICK_RATE_HZ};
use crate::critical::critical_section;
use crate::core::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::list::{ReadyList, TickList};
use crate::prio::ReadyMask;
use crate::registry::Runnable;
use crate::task::{self, OsTcb};
use crate::types::{OsPendStatus, OsPrio, OsStkElement, OsTaskState, OsTick};

// ============ Kernel State Structures ============

/// Atomic kernel flags
pub struct KernelFlags {
    initialized: AtomicBool,
    running: AtomicBool,
    tick_counter: AtomicU32,
}

impl KernelFlags {
    const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
            tick_counter: AtomicU32::new(0),
        }
    }

    /// Check if the OS is running
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Check if OS is initialized
    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Get current tick count
    #[inline(always)]
    pub fn tick_get(&self) -> OsTick {
        self.tick_counter.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn tick_increment(&self) -> OsTick {
        self.tick_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

/// Global kernel state instance
pub(crate) static KERNEL: KernelFlags = KernelFlags::new();

/// Scheduler state
pub struct SchedState {
    pub(crate) ready: ReadyMask,
    pub(crate) rdy_list: [ReadyList; CFG_PRIO_MAX],
    /// Tasks pending with a deadline
    pub(crate) tick_list: TickList,
}

impl SchedState {
    const fn new() -> Self {
        Self {
            ready: ReadyMask::new(),
            rdy_list: [const { ReadyList::new() }; CFG_PRIO_MAX],
            tick_list: TickList::new(),
        }
    }
}

/// Global scheduler state instance
pub(crate) static SCHED: CsCell<SchedState> = CsCell::new(SchedState::new());

/// Work the tick handler performs on behalf of the resource registry
pub trait TickHook: Sync {
    /// Called once per tick from the SysTick handler
    fn on_tick(&self);
}

static TICK_HOOK: CsCell<Option<&'static dyn TickHook>> = CsCell::new(None);

// ============ CPU/Context Switch State ============

/// CPU context switch state
#[repr(C)]
pub struct CpuState {
    /// Current running task's TCB pointer
    pub tcb_cur: *mut OsTcb,
    /// Highest priority ready task's TCB pointer
    pub tcb_high_rdy: *mut OsTcb,
    /// Current running task's priority
    pub prio_cur: OsPrio,
    /// Highest ready priority
    pub prio_high_rdy: OsPrio,
}

impl CpuState {
    pub const fn new() -> Self {
        Self {
            tcb_cur: core::ptr::null_mut(),
            tcb_high_rdy: core::ptr::null_mut(),
            prio_cur: 0,
            prio_high_rdy: 0,
        }
    }
}

/// Global CPU state instance
#[no_mangle]
#[used]
pub static mut CPU_STATE: CpuState = CpuState::new();

// ============ Idle Task ============

struct IdleTask;

impl Runnable for IdleTask {
    fn run(&self) {
        loop {
            crate::port::os_idle_wait();
        }
    }
}

static IDLE_TASK: IdleTask = IdleTask;
static IDLE_TCB: CsCell<OsTcb> = CsCell::new(OsTcb::new());
static IDLE_STK: CsCell<[OsStkElement; CFG_IDLE_STK_SIZE]> = CsCell::new([0; CFG_IDLE_STK_SIZE]);

// ============ Public API ============

/// Initialize the kernel
///
/// Clears the ready structures and creates the idle task. Calling it again
/// before the kernel runs is harmless.
///
/// # Returns
/// * `Ok(())` - Initialization successful
/// * `Err(OsError::OsRunning)` - OS is already running
pub fn os_init() -> OsResult<()> {
    if KERNEL.is_running() {
        return Err(OsError::OsRunning);
    }

    critical_section(|cs| {
        *SCHED.get(cs) = SchedState::new();

        let idle_tcb = IDLE_TCB.get(cs);
        task::os_task_init(idle_tcb, "Idle", &IDLE_TASK, CFG_PRIO_IDLE, IDLE_STK.get(cs))?;
        unsafe { task::os_task_make_ready(NonNull::from(idle_tcb)) };

        KERNEL.initialized.store(true, Ordering::Release);
        Ok(())
    })
}

/// Start multitasking
///
/// Makes every task yielded by `tasks` ready, installs the tick hook and
/// switches to the highest priority ready task. Does not return on success.
///
/// # Returns
/// * `Err(OsError::OsRunning)` - OS is already running
/// * `Err(OsError::OsNoAppTask)` - `tasks` was empty
pub fn os_start<I>(tasks: I, hook: &'static dyn TickHook) -> OsResult<()>
where
    I: IntoIterator<Item = NonNull<OsTcb>>,
{
    if KERNEL.is_running() {
        return Err(OsError::OsRunning);
    }

    if !KERNEL.is_initialized() {
        os_init()?;
    }

    critical_section(|cs| {
        let mut created = 0usize;
        for tcb in tasks {
            unsafe { task::os_task_make_ready(tcb) };
            created += 1;
        }
        if created == 0 {
            return Err(OsError::OsNoAppTask);
        }

        *TICK_HOOK.get(cs) = Some(hook);

        let sched = SCHED.get(cs);
        let high_prio = sched.ready.highest();
        let head = sched.rdy_list[high_prio as usize].head().ok_or(OsError::OsNoAppTask)?;

        unsafe {
            CPU_STATE.prio_high_rdy = high_prio;
            CPU_STATE.tcb_high_rdy = head.as_ptr();
        }

        KERNEL.running.store(true, Ordering::Release);
        Ok(())
    })?;

    crate::info!("kernel starting, tick {} Hz", CFG_TICK_RATE_HZ);
    crate::port::os_cpu_systick_init(crate::config::CFG_CPU_CLOCK_HZ / CFG_TICK_RATE_HZ);

    unsafe { crate::port::os_start_high_rdy() };

    Ok(())
}

/// Tick handler
///
/// Expires pend deadlines, then runs the registry's tick work (software
/// timers) in interrupt context.
pub fn os_tick_handler() {
    if !KERNEL.is_running() {
        return;
    }

    KERNEL.tick_increment();

    let hook = critical_section(|cs| {
        let mut current = SCHED.get(cs).tick_list.head();
        while let Some(tcb_ptr) = current {
            current = TickList::next_of(tcb_ptr);

            let tcb = unsafe { &mut *tcb_ptr.as_ptr() };
            tcb.tick_remain = tcb.tick_remain.saturating_sub(1);
            if tcb.tick_remain == 0 {
                unsafe { os_pend_expire(tcb_ptr) };
            }
        }

        *TICK_HOOK.get(cs)
    });

    if let Some(hook) = hook {
        hook.on_tick();
    }

    crate::sched::os_sched();
}

/// Convert milliseconds to ticks, rounding a non-zero duration up to one tick
#[inline]
pub fn os_ms_to_ticks(ms: u32) -> OsTick {
    let ticks = (ms as u64 * CFG_TICK_RATE_HZ as u64) / 1000;
    match ticks {
        0 if ms > 0 => 1,
        t => t.min(OsTick::MAX as u64) as OsTick,
    }
}

/// Take a task whose deadline passed off its wait list and make it ready
///
/// # Safety
/// Interrupts must be masked and `tcb` must be on the tick list.
unsafe fn os_pend_expire(tcb_ptr: NonNull<OsTcb>) {
    let tcb = unsafe { &mut *tcb_ptr.as_ptr() };

    unsafe {
        SCHED.get_unchecked().tick_list.remove(tcb_ptr);
        if let Some(list) = tcb.pend_list.as_mut() {
            list.remove(tcb_ptr);
        }
    }

    tcb.pend_list = core::ptr::null_mut();
    tcb.pend_status = OsPendStatus::Timeout;
    tcb.task_state = OsTaskState::Ready;
    unsafe { crate::sched::os_rdy_list_insert(tcb_ptr) };
}

// ============ Internal accessors for other modules ============

/// Get current TCB pointer as Option<NonNull>
#[inline]
pub(crate) unsafe fn tcb_cur_ptr() -> Option<NonNull<OsTcb>> {
    NonNull::new(unsafe { CPU_STATE.tcb_cur })
}
