//! Kernel backend
//!
//! Registry over the preemptive kernel in this crate. Every object, thread
//! stack and queue buffer lives inside the registry itself, so the registry
//! must not move once anything has been allocated from it; keep it in a
//! `static`.
//!
//! Threads stay dormant until [`Registry::start_scheduler`]. Software timers
//! are counted down from the kernel tick, so their callbacks run in interrupt
//! context.

use core::ptr::NonNull;

use crate::config::{
    CFG_MUTEX_MAX, CFG_PRIO_IDLE, CFG_QUEUES_MAX, CFG_Q_POOL_BYTES, CFG_STK_POOL_WORDS,
    CFG_STK_SIZE_MIN, CFG_THREADS_MAX, CFG_TIMERS_MAX,
};
use crate::core::cs_cell::CsCell;
use crate::critical::critical_section;
use crate::error::{OsError, OsResult};
use crate::kernel::{self, TickHook, KERNEL};
use crate::registry::{
    MutexHandle, QueueHandle, Registry, Runnable, Table, ThreadHandle, Timeout, TimerHandle,
    TimerHandler,
};
use crate::sched;
use crate::sync::mutex::{Holder, OsMutex};
use crate::sync::queue::OsQueue;
use crate::sync::timer::OsTmr;
use crate::task::{self, OsTcb};
use crate::types::{OsPrio, OsStkElement};
use crate::wait;

/// Bump allocator over a fixed array
struct Pool<T, const N: usize> {
    mem: [T; N],
    used: usize,
}

impl<T: Copy, const N: usize> Pool<T, N> {
    const fn new(fill: T) -> Self {
        Pool { mem: [fill; N], used: 0 }
    }

    /// Carve `len` elements starting at a multiple of `align` elements
    fn carve(&mut self, len: usize, align: usize) -> Option<NonNull<T>> {
        let start = self.used.next_multiple_of(align);
        let end = start.checked_add(len)?;
        if end > N {
            return None;
        }
        self.used = end;
        NonNull::new(self.mem[start..].as_mut_ptr())
    }
}

/// Registry backed by the in-crate kernel
pub struct UcosRegistry {
    threads: CsCell<Table<OsTcb, CFG_THREADS_MAX>>,
    timers: CsCell<Table<OsTmr, CFG_TIMERS_MAX>>,
    queues: CsCell<Table<OsQueue, CFG_QUEUES_MAX>>,
    mutexes: CsCell<Table<OsMutex, CFG_MUTEX_MAX>>,
    stacks: CsCell<Pool<OsStkElement, CFG_STK_POOL_WORDS>>,
    buffers: CsCell<Pool<u8, CFG_Q_POOL_BYTES>>,
}

impl UcosRegistry {
    pub const fn new() -> Self {
        UcosRegistry {
            threads: CsCell::new(Table::new([const { OsTcb::new() }; CFG_THREADS_MAX])),
            timers: CsCell::new(Table::new([const { OsTmr::new() }; CFG_TIMERS_MAX])),
            queues: CsCell::new(Table::new([const { OsQueue::new() }; CFG_QUEUES_MAX])),
            mutexes: CsCell::new(Table::new([const { OsMutex::new() }; CFG_MUTEX_MAX])),
            stacks: CsCell::new(Pool::new(0)),
            buffers: CsCell::new(Pool::new(0)),
        }
    }

    fn ensure_not_started() -> OsResult<()> {
        if KERNEL.is_running() {
            return Err(OsError::OsRunning);
        }
        Ok(())
    }

    /// Check a queue handle and item length before any wait
    fn check_item(&self, queue: QueueHandle, len: usize) -> OsResult<()> {
        critical_section(|cs| {
            let q = self.queues.get(cs).get(queue.index())?;
            if q.item_size() != len {
                return Err(OsError::MsgSizeInvalid);
            }
            Ok(())
        })
    }
}

impl Default for UcosRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for UcosRegistry {
    fn allocate_thread(
        &self,
        entry: &'static dyn Runnable,
        priority: OsPrio,
        stack_size: usize,
    ) -> OsResult<ThreadHandle> {
        Self::ensure_not_started()?;
        if priority >= CFG_PRIO_IDLE {
            return Err(OsError::PrioInvalid);
        }
        if stack_size < CFG_STK_SIZE_MIN {
            return Err(OsError::StkSizeInvalid);
        }

        critical_section(|cs| {
            let threads = self.threads.get(cs);
            let Some(tcb) = threads.vacant() else {
                crate::warn!("thread table full");
                return Err(OsError::TaskNoMoreTcb);
            };

            let base = self.stacks.get(cs).carve(stack_size, 2).ok_or(OsError::StkPoolEmpty)?;
            let stack = unsafe { core::slice::from_raw_parts_mut(base.as_ptr(), stack_size) };
            task::os_task_init(tcb, "app", entry, priority, stack)?;

            let index = threads.commit();
            crate::debug!("thread {} allocated, prio {}", index, priority);
            Ok(ThreadHandle::new(index))
        })
    }

    fn allocate_timer(
        &self,
        periodic: bool,
        callback: &'static dyn TimerHandler,
    ) -> OsResult<TimerHandle> {
        Self::ensure_not_started()?;

        critical_section(|cs| {
            let timers = self.timers.get(cs);
            let Some(tmr) = timers.vacant() else {
                crate::warn!("timer table full");
                return Err(OsError::TmrNoMore);
            };
            tmr.create(periodic, callback);
            Ok(TimerHandle::new(timers.commit()))
        })
    }

    fn start_timer(&self, timer: TimerHandle, period_ms: u32) -> OsResult<()> {
        if period_ms == 0 {
            return Err(OsError::TmrInvalidPeriod);
        }

        let ticks = kernel::os_ms_to_ticks(period_ms);
        critical_section(|cs| {
            self.timers.get(cs).get(timer.index())?.start(ticks);
            Ok(())
        })
    }

    fn allocate_queue(&self, capacity: usize, item_size: usize) -> OsResult<QueueHandle> {
        Self::ensure_not_started()?;
        if capacity == 0 || item_size == 0 {
            return Err(OsError::QSizeInvalid);
        }
        let bytes = capacity.checked_mul(item_size).ok_or(OsError::QPoolEmpty)?;

        critical_section(|cs| {
            let queues = self.queues.get(cs);
            let Some(queue) = queues.vacant() else {
                crate::warn!("queue table full");
                return Err(OsError::QNoMore);
            };

            let storage = self.buffers.get(cs).carve(bytes, 1).ok_or(OsError::QPoolEmpty)?;
            unsafe { queue.create(storage.as_ptr(), capacity, item_size) };

            let index = queues.commit();
            crate::debug!("queue {} allocated, {} x {} bytes", index, capacity, item_size);
            Ok(QueueHandle::new(index))
        })
    }

    fn queue_send(&self, queue: QueueHandle, item: &[u8], timeout: Timeout) -> OsResult<()> {
        self.check_item(queue, item.len())?;

        let index = queue.index();
        let woke = wait::os_pend_retry(timeout, |cs| {
            self.queues.get(cs).live_mut()[index].try_send(item, cs)
        })?;
        if woke {
            sched::os_sched();
        }
        Ok(())
    }

    fn queue_receive(&self, queue: QueueHandle, item: &mut [u8], timeout: Timeout) -> OsResult<()> {
        self.check_item(queue, item.len())?;

        let index = queue.index();
        let woke = wait::os_pend_retry(timeout, |cs| {
            self.queues.get(cs).live_mut()[index].try_receive(item, cs)
        })?;
        if woke {
            sched::os_sched();
        }
        Ok(())
    }

    fn allocate_mutex(&self) -> OsResult<MutexHandle> {
        Self::ensure_not_started()?;

        critical_section(|cs| {
            let mutexes = self.mutexes.get(cs);
            let Some(mutex) = mutexes.vacant() else {
                crate::warn!("mutex table full");
                return Err(OsError::MutexNoMore);
            };
            *mutex = OsMutex::new();
            Ok(MutexHandle::new(mutexes.commit()))
        })
    }

    fn mutex_acquire(&self, mutex: MutexHandle, timeout: Timeout) -> OsResult<()> {
        let index = mutex.index();
        critical_section(|cs| self.mutexes.get(cs).get(index).map(|_| ()))?;

        let caller = Holder::current();
        wait::os_pend_retry(timeout, |cs| {
            self.mutexes.get(cs).live_mut()[index].try_lock(caller, cs)
        })
    }

    fn mutex_release(&self, mutex: MutexHandle) -> OsResult<()> {
        let caller = Holder::current();
        critical_section(|cs| self.mutexes.get(cs).get(mutex.index())?.unlock(caller, cs))?;

        // The release may also have dropped an inherited priority
        sched::os_sched();
        Ok(())
    }

    fn start_scheduler(&'static self) -> ! {
        // SAFETY: multitasking has not started, so nothing else touches the
        // thread table; from here on it is only reached through the kernel.
        let threads = unsafe { self.threads.get_unchecked() };
        crate::info!("starting scheduler with {} threads", threads.len());

        let tasks = threads.live_mut().iter_mut().map(NonNull::from);
        if let Err(_err) = kernel::os_start(tasks, self) {
            crate::error!("scheduler failed to start: {}", _err);
        }

        loop {
            crate::port::os_idle_wait();
        }
    }
}

impl TickHook for UcosRegistry {
    fn on_tick(&self) {
        let mut fired: [Option<&'static dyn TimerHandler>; CFG_TIMERS_MAX] = [None; CFG_TIMERS_MAX];

        critical_section(|cs| {
            for (slot, tmr) in fired.iter_mut().zip(self.timers.get(cs).live_mut()) {
                *slot = tmr.tick();
            }
        });

        for handler in fired.into_iter().flatten() {
            handler.on_expiry();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;
    impl Runnable for Idle {
        fn run(&self) {}
    }

    static IDLE: Idle = Idle;

    #[test]
    fn test_thread_args_rejected() {
        let registry = UcosRegistry::new();
        assert_eq!(
            registry.allocate_thread(&IDLE, CFG_PRIO_IDLE, 128).err(),
            Some(OsError::PrioInvalid)
        );
        assert_eq!(
            registry.allocate_thread(&IDLE, 5, CFG_STK_SIZE_MIN - 1).err(),
            Some(OsError::StkSizeInvalid)
        );
        assert_eq!(
            registry.allocate_thread(&IDLE, 5, CFG_STK_POOL_WORDS + 1).err(),
            Some(OsError::StkPoolEmpty)
        );
    }

    #[test]
    fn test_queue_pool_exhaustion() {
        let registry = UcosRegistry::new();
        assert!(registry.allocate_queue(CFG_Q_POOL_BYTES, 1).is_ok());
        assert_eq!(registry.allocate_queue(1, 1).err(), Some(OsError::QPoolEmpty));
        assert_eq!(registry.allocate_queue(0, 1).err(), Some(OsError::QSizeInvalid));
    }

    #[test]
    fn test_timers_fire_from_tick() {
        use portable_atomic::{AtomicU32, Ordering};

        struct Count(AtomicU32);
        impl TimerHandler for Count {
            fn on_expiry(&self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }
        static COUNT: Count = Count(AtomicU32::new(0));

        let registry = UcosRegistry::new();
        let timer = registry.allocate_timer(true, &COUNT).unwrap();
        assert_eq!(registry.start_timer(timer, 0).err(), Some(OsError::TmrInvalidPeriod));
        registry.start_timer(timer, 2).unwrap();

        for _ in 0..6 {
            registry.on_tick();
        }
        assert_eq!(COUNT.0.load(Ordering::Relaxed), 3);
    }
}
