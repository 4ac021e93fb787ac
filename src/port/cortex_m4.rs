//! Cortex-M4 port implementation
//!
//! Context switching via the PendSV exception, kernel tick via SysTick.

#![allow(named_asm_labels)]

use core::arch::{asm, naked_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;

use crate::task::OsTaskFn;
use crate::types::OsStkElement;

/// Interrupt stack for MSP
#[no_mangle]
static mut INTERRUPT_STACK: [u64; 256] = [0xDEADBEEF_DEADBEEF; 256];

/// Initialize SysTick timer for system tick generation
///
/// `reload` is the number of core clock cycles per tick.
pub fn os_cpu_systick_init(reload: u32) {
    let mut p = unsafe { cortex_m::Peripherals::steal() };

    p.SYST.set_reload(reload - 1);
    p.SYST.clear_current();
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.enable_interrupt();
    p.SYST.enable_counter();
}

/// Start the highest priority ready task
///
/// Moves handler mode onto the dedicated interrupt stack and pends the first
/// switch. `tcb_cur` is null at this point, so PendSV saves nothing.
#[no_mangle]
#[allow(static_mut_refs)]
pub unsafe extern "C" fn os_start_high_rdy() {
    unsafe {
        let mut scb = cortex_m::Peripherals::steal().SCB;

        scb.set_priority(SystemHandler::PendSV, 0xF0);
        scb.set_priority(SystemHandler::SysTick, 0xE0);

        let msp_top = &INTERRUPT_STACK as *const _ as u32
            + core::mem::size_of_val(&INTERRUPT_STACK) as u32;

        asm!("msr msp, {0}", in(reg) msp_top);
        asm!("msr psp, {0}", in(reg) 0);

        crate::kernel::CPU_STATE.tcb_cur = core::ptr::null_mut();

        cortex_m::interrupt::enable();
        cortex_m::peripheral::SCB::set_pendsv();
    }
}

/// Request a context switch; taken once no other handler is active
#[inline(always)]
pub fn os_ctx_sw() {
    cortex_m::peripheral::SCB::set_pendsv();
}

/// Sleep until the next interrupt
#[inline(always)]
pub fn os_idle_wait() {
    cortex_m::asm::wfi();
}

/// Words the initial frame occupies: R4-R11 and EXC_RETURN saved by PendSV,
/// then R0-R3, R12, LR, PC and xPSR stacked by hardware
const FRAME_WORDS: usize = 17;

const FRAME_EXC_RETURN: usize = 8;
const FRAME_R0: usize = 9;
const FRAME_PC: usize = 15;
const FRAME_XPSR: usize = 16;

/// Thread mode, PSP, no FPU context
const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;
const XPSR_THUMB: u32 = 0x0100_0000;

/// Build the initial frame of a task stack
///
/// The task starts in `task_fn(arg)` in thread mode on PSP. `task_fn` never
/// returns, so the stacked LR stays zero.
pub unsafe fn os_task_stk_init(
    task_fn: OsTaskFn,
    arg: *mut (),
    stk_base: *mut OsStkElement,
    stk_size: usize,
) -> *mut OsStkElement {
    let mut frame = [0u32; FRAME_WORDS];
    frame[FRAME_EXC_RETURN] = EXC_RETURN_THREAD_PSP;
    frame[FRAME_R0] = arg as u32;
    frame[FRAME_PC] = (task_fn as usize as u32) | 1;
    frame[FRAME_XPSR] = XPSR_THUMB;

    unsafe {
        // AAPCS wants an 8-byte aligned stack on exception entry
        let top = ((stk_base.add(stk_size) as usize) & !7) as *mut u32;
        let bottom = top.sub(FRAME_WORDS);
        core::ptr::copy_nonoverlapping(frame.as_ptr(), bottom, FRAME_WORDS);

        // PendSV adds 4 before restoring
        bottom.sub(1) as *mut OsStkElement
    }
}

/// Save the outgoing stack pointer and return the incoming one
#[inline(never)]
#[no_mangle]
unsafe extern "C" fn pendsv_switch_context(cur_sp: *mut u32) -> *mut u32 {
    unsafe {
        let cpu = &raw mut crate::kernel::CPU_STATE;
        let cur_tcb = (*cpu).tcb_cur;

        if !cur_tcb.is_null() {
            (*cur_tcb).stk_ptr = cur_sp;
        }

        (*cpu).tcb_cur = (*cpu).tcb_high_rdy;
        (*cpu).prio_cur = (*cpu).prio_high_rdy;

        let new_tcb = (*cpu).tcb_cur;
        if new_tcb.is_null() {
            core::ptr::null_mut()
        } else {
            (*new_tcb).stk_ptr
        }
    }
}

/// PendSV exception handler - performs full context switch
///
/// 1. Save R4-R11, LR to current task's PSP (skip for the first task)
/// 2. Swap TCB pointers in `pendsv_switch_context`
/// 3. Restore R4-R11, LR from new task's stack
/// 4. Exception return
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    use crate::kernel::CPU_STATE;

    naked_asm!(
        "cpsid i",
        "dsb",
        "isb",

        "mrs r0, psp",

        "ldr r1, ={cpu_state}",
        "ldr r1, [r1]",
        "cbz r1, 1f",

        "stmdb r0!, {{r4-r11, lr}}",
        "sub r0, r0, #4",

        "1:",
        "bl pendsv_switch_context",

        "cbz r0, 2f",
        "add r0, r0, #4",
        "ldmia r0!, {{r4-r11, lr}}",
        "msr psp, r0",

        "2:",
        "cpsie i",
        "dsb",
        "isb",

        "bx lr",

        cpu_state = sym CPU_STATE,
    );
}

/// SysTick interrupt handler
#[no_mangle]
pub extern "C" fn SysTick() {
    crate::kernel::os_tick_handler();
}
