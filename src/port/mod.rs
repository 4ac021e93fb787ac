//! CPU port
//!
//! Context switching, the tick timer and the initial task stack frame. Off
//! target the kernel backend never switches context: the registry is driven
//! through its zero-wait paths and the blocking paths report `OsNotRunning`.

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::*;

#[cfg(not(target_arch = "arm"))]
mod host {
    use crate::task::OsTaskFn;
    use crate::types::OsStkElement;

    pub unsafe fn os_start_high_rdy() {
        unreachable!("kernel backend only starts on target");
    }

    pub fn os_ctx_sw() {}

    pub fn os_idle_wait() {
        core::hint::spin_loop();
    }

    /// No frame is built; the returned pointer only has to lie in the stack
    pub unsafe fn os_task_stk_init(
        _task_fn: OsTaskFn,
        _arg: *mut (),
        stk_base: *mut OsStkElement,
        stk_size: usize,
    ) -> *mut OsStkElement {
        unsafe { stk_base.add(stk_size - 1) }
    }

    pub fn os_cpu_systick_init(_reload: u32) {}
}

#[cfg(not(target_arch = "arm"))]
pub use host::*;
