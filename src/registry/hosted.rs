//! Hosted backend
//!
//! The registry contract over `std::thread`, `Mutex` and `Condvar`, for
//! running the pipeline on a development host. Thread priorities are
//! recorded but the host OS schedules the threads.
//!
//! Interrupt context is simulated per thread: timer callbacks and closures
//! passed to [`interrupt`] run with the flag set, and blocking registry
//! calls made there fail with [`OsError::PendIsr`] as they do on the kernel
//! backend.

use std::cell::Cell;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use std::vec::Vec;

use portable_atomic::{AtomicBool, Ordering};

use crate::config::{
    CFG_MUTEX_MAX, CFG_PRIO_IDLE, CFG_QUEUES_MAX, CFG_Q_POOL_BYTES, CFG_STK_POOL_WORDS,
    CFG_STK_SIZE_MIN, CFG_THREADS_MAX, CFG_TIMERS_MAX,
};
use crate::error::{OsError, OsResult};
use crate::registry::{
    MutexHandle, QueueHandle, Registry, Runnable, ThreadHandle, Timeout, TimerHandle, TimerHandler,
};
use crate::sync::ring::Ring;
use crate::types::OsPrio;

// ============ Simulated interrupt context ============

thread_local! {
    static IN_INTERRUPT: Cell<bool> = const { Cell::new(false) };
}

/// Run `f` as if it were an interrupt handler
pub fn interrupt<R>(f: impl FnOnce() -> R) -> R {
    let outer = IN_INTERRUPT.with(|flag| flag.replace(true));
    let result = f();
    IN_INTERRUPT.with(|flag| flag.set(outer));
    result
}

/// Whether the calling thread is inside [`interrupt`]
pub fn in_interrupt() -> bool {
    IN_INTERRUPT.with(Cell::get)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wait on `cond` until `attempt` succeeds or `timeout` runs out
fn pend<S, T>(
    state: &Mutex<S>,
    cond: &Condvar,
    started: bool,
    timeout: Timeout,
    mut attempt: impl FnMut(&mut S) -> Option<T>,
) -> OsResult<T> {
    let deadline = match timeout {
        Timeout::Millis(ms) => Some(Instant::now() + Duration::from_millis(ms.into())),
        _ => None,
    };

    let mut guard = lock(state);
    loop {
        if let Some(value) = attempt(&mut guard) {
            return Ok(value);
        }

        if timeout.is_poll() {
            return Err(OsError::Timeout);
        }
        if in_interrupt() {
            return Err(OsError::PendIsr);
        }
        if !started {
            return Err(OsError::OsNotRunning);
        }

        guard = match deadline {
            None => cond.wait(guard).unwrap_or_else(PoisonError::into_inner),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(OsError::Timeout);
                }
                cond.wait_timeout(guard, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        };
    }
}

// ============ Objects ============

struct ThreadSlot {
    entry: &'static dyn Runnable,
    priority: OsPrio,
}

struct QueueState {
    ring: Ring,
    storage: Vec<u8>,
}

struct HostedQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
}

impl HostedQueue {
    fn new(capacity: usize, item_size: usize) -> Self {
        let ring = Ring::new(capacity, item_size);
        let storage = std::vec![0; ring.storage_len()];
        HostedQueue {
            state: Mutex::new(QueueState { ring, storage }),
            changed: Condvar::new(),
        }
    }

    fn item_size(&self) -> usize {
        lock(&self.state).ring.item_size()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Holder {
    Thread(ThreadId),
    Interrupt,
}

impl Holder {
    fn current() -> Self {
        if in_interrupt() {
            Holder::Interrupt
        } else {
            Holder::Thread(thread::current().id())
        }
    }
}

struct HostedMutex {
    holder: Mutex<Option<Holder>>,
    released: Condvar,
}

struct TimerCtl {
    period: Option<Duration>,
    /// Bumped on every start so a waiting service thread rearms
    generation: u64,
}

struct HostedTimer {
    periodic: bool,
    callback: &'static dyn TimerHandler,
    ctl: Mutex<TimerCtl>,
    changed: Condvar,
}

impl HostedTimer {
    /// Body of the timer's service thread
    fn service(&self) {
        let mut ctl = lock(&self.ctl);
        loop {
            let Some(period) = ctl.period else {
                ctl = self.changed.wait(ctl).unwrap_or_else(PoisonError::into_inner);
                continue;
            };

            let generation = ctl.generation;
            let deadline = Instant::now() + period;
            let mut expired = false;
            while ctl.generation == generation {
                let now = Instant::now();
                if now >= deadline {
                    expired = true;
                    break;
                }
                ctl = self
                    .changed
                    .wait_timeout(ctl, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
            if !expired {
                continue;
            }

            if !self.periodic {
                ctl.period = None;
            }
            drop(ctl);
            interrupt(|| self.callback.on_expiry());
            ctl = lock(&self.ctl);
        }
    }
}

// ============ Registry ============

struct Tables {
    threads: Vec<ThreadSlot>,
    timers: Vec<Arc<HostedTimer>>,
    queues: Vec<Arc<HostedQueue>>,
    mutexes: Vec<Arc<HostedMutex>>,
    stack_words: usize,
    queue_bytes: usize,
}

/// Registry backed by host threads
pub struct HostedRegistry {
    tables: Mutex<Tables>,
    started: AtomicBool,
}

impl HostedRegistry {
    pub const fn new() -> Self {
        HostedRegistry {
            tables: Mutex::new(Tables {
                threads: Vec::new(),
                timers: Vec::new(),
                queues: Vec::new(),
                mutexes: Vec::new(),
                stack_words: 0,
                queue_bytes: 0,
            }),
            started: AtomicBool::new(false),
        }
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn ensure_not_started(&self) -> OsResult<()> {
        if self.is_started() {
            return Err(OsError::OsRunning);
        }
        Ok(())
    }

    fn queue(&self, queue: QueueHandle, len: usize) -> OsResult<Arc<HostedQueue>> {
        let queue = lock(&self.tables)
            .queues
            .get(queue.index())
            .cloned()
            .ok_or(OsError::ObjInvalid)?;
        if queue.item_size() != len {
            return Err(OsError::MsgSizeInvalid);
        }
        Ok(queue)
    }

    fn mutex(&self, mutex: MutexHandle) -> OsResult<Arc<HostedMutex>> {
        lock(&self.tables)
            .mutexes
            .get(mutex.index())
            .cloned()
            .ok_or(OsError::ObjInvalid)
    }

    /// Spawn every allocated thread and timer service thread
    ///
    /// Returns instead of parking, so tests can keep driving the pipeline
    /// from the calling thread.
    pub fn launch(&self) -> OsResult<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(OsError::OsRunning);
        }

        let tables = lock(&self.tables);
        for (index, slot) in tables.threads.iter().enumerate() {
            let entry = slot.entry;
            thread::Builder::new()
                .name(std::format!("thread-{index}-prio-{}", slot.priority))
                .spawn(move || entry.run())
                .map_err(|_| OsError::TaskNoMoreTcb)?;
        }

        for (index, timer) in tables.timers.iter().enumerate() {
            let timer = Arc::clone(timer);
            thread::Builder::new()
                .name(std::format!("timer-{index}"))
                .spawn(move || timer.service())
                .map_err(|_| OsError::TmrNoMore)?;
        }

        crate::info!("hosted registry launched {} threads", tables.threads.len());
        Ok(())
    }
}

impl Default for HostedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for HostedRegistry {
    fn allocate_thread(
        &self,
        entry: &'static dyn Runnable,
        priority: OsPrio,
        stack_size: usize,
    ) -> OsResult<ThreadHandle> {
        self.ensure_not_started()?;
        if priority >= CFG_PRIO_IDLE {
            return Err(OsError::PrioInvalid);
        }
        if stack_size < CFG_STK_SIZE_MIN {
            return Err(OsError::StkSizeInvalid);
        }

        let mut tables = lock(&self.tables);
        if tables.threads.len() == CFG_THREADS_MAX {
            crate::warn!("thread table full");
            return Err(OsError::TaskNoMoreTcb);
        }
        let words = tables.stack_words.next_multiple_of(2) + stack_size;
        if words > CFG_STK_POOL_WORDS {
            return Err(OsError::StkPoolEmpty);
        }

        tables.stack_words = words;
        tables.threads.push(ThreadSlot { entry, priority });
        Ok(ThreadHandle::new(tables.threads.len() - 1))
    }

    fn allocate_timer(
        &self,
        periodic: bool,
        callback: &'static dyn TimerHandler,
    ) -> OsResult<TimerHandle> {
        self.ensure_not_started()?;

        let mut tables = lock(&self.tables);
        if tables.timers.len() == CFG_TIMERS_MAX {
            crate::warn!("timer table full");
            return Err(OsError::TmrNoMore);
        }

        tables.timers.push(Arc::new(HostedTimer {
            periodic,
            callback,
            ctl: Mutex::new(TimerCtl {
                period: None,
                generation: 0,
            }),
            changed: Condvar::new(),
        }));
        Ok(TimerHandle::new(tables.timers.len() - 1))
    }

    fn start_timer(&self, timer: TimerHandle, period_ms: u32) -> OsResult<()> {
        if period_ms == 0 {
            return Err(OsError::TmrInvalidPeriod);
        }

        let timer = lock(&self.tables)
            .timers
            .get(timer.index())
            .cloned()
            .ok_or(OsError::ObjInvalid)?;

        let mut ctl = lock(&timer.ctl);
        ctl.period = Some(Duration::from_millis(period_ms.into()));
        ctl.generation = ctl.generation.wrapping_add(1);
        timer.changed.notify_all();
        Ok(())
    }

    fn allocate_queue(&self, capacity: usize, item_size: usize) -> OsResult<QueueHandle> {
        self.ensure_not_started()?;
        if capacity == 0 || item_size == 0 {
            return Err(OsError::QSizeInvalid);
        }
        let bytes = capacity.checked_mul(item_size).ok_or(OsError::QPoolEmpty)?;

        let mut tables = lock(&self.tables);
        if tables.queues.len() == CFG_QUEUES_MAX {
            crate::warn!("queue table full");
            return Err(OsError::QNoMore);
        }
        let used = tables.queue_bytes + bytes;
        if used > CFG_Q_POOL_BYTES {
            return Err(OsError::QPoolEmpty);
        }

        tables.queue_bytes = used;
        tables.queues.push(Arc::new(HostedQueue::new(capacity, item_size)));
        Ok(QueueHandle::new(tables.queues.len() - 1))
    }

    fn queue_send(&self, queue: QueueHandle, item: &[u8], timeout: Timeout) -> OsResult<()> {
        let queue = self.queue(queue, item.len())?;

        pend(&queue.state, &queue.changed, self.is_started(), timeout, |state| {
            let QueueState { ring, storage } = state;
            ring.push(storage, item).then_some(())
        })?;
        queue.changed.notify_all();
        Ok(())
    }

    fn queue_receive(&self, queue: QueueHandle, item: &mut [u8], timeout: Timeout) -> OsResult<()> {
        let queue = self.queue(queue, item.len())?;

        pend(&queue.state, &queue.changed, self.is_started(), timeout, |state| {
            let QueueState { ring, storage } = state;
            ring.pop(storage, item).then_some(())
        })?;
        queue.changed.notify_all();
        Ok(())
    }

    fn allocate_mutex(&self) -> OsResult<MutexHandle> {
        self.ensure_not_started()?;

        let mut tables = lock(&self.tables);
        if tables.mutexes.len() == CFG_MUTEX_MAX {
            crate::warn!("mutex table full");
            return Err(OsError::MutexNoMore);
        }

        tables.mutexes.push(Arc::new(HostedMutex {
            holder: Mutex::new(None),
            released: Condvar::new(),
        }));
        Ok(MutexHandle::new(tables.mutexes.len() - 1))
    }

    fn mutex_acquire(&self, mutex: MutexHandle, timeout: Timeout) -> OsResult<()> {
        let mutex = self.mutex(mutex)?;
        let caller = Holder::current();

        pend(&mutex.holder, &mutex.released, self.is_started(), timeout, |holder| {
            if holder.is_some() {
                return None;
            }
            *holder = Some(caller);
            Some(())
        })
    }

    fn mutex_release(&self, mutex: MutexHandle) -> OsResult<()> {
        let mutex = self.mutex(mutex)?;

        let mut holder = lock(&mutex.holder);
        if *holder != Some(Holder::current()) {
            return Err(OsError::MutexNotOwner);
        }
        *holder = None;
        mutex.released.notify_one();
        Ok(())
    }

    fn start_scheduler(&'static self) -> ! {
        if let Err(_err) = self.launch() {
            crate::error!("scheduler failed to start: {}", _err);
        }

        loop {
            thread::park();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_rules() {
        let registry = HostedRegistry::new();
        let queue = registry.allocate_queue(1, 1).unwrap();
        let mut out = [0u8; 1];

        assert_eq!(
            registry.queue_receive(queue, &mut out, Timeout::Forever).err(),
            Some(OsError::OsNotRunning)
        );
        registry.launch().unwrap();
        assert_eq!(
            interrupt(|| registry.queue_receive(queue, &mut out, Timeout::Forever)).err(),
            Some(OsError::PendIsr)
        );
        assert_eq!(
            registry.queue_receive(queue, &mut out, Timeout::Millis(5)).err(),
            Some(OsError::Timeout)
        );
        assert!(!in_interrupt());
    }

    #[test]
    fn test_interrupt_held_mutex() {
        let registry = HostedRegistry::new();
        let mutex = registry.allocate_mutex().unwrap();

        interrupt(|| registry.mutex_try_acquire(mutex)).unwrap();
        assert_eq!(registry.mutex_release(mutex).err(), Some(OsError::MutexNotOwner));
        assert_eq!(registry.mutex_try_acquire(mutex).err(), Some(OsError::Timeout));
        interrupt(|| registry.mutex_release(mutex)).unwrap();
        registry.mutex_try_acquire(mutex).unwrap();
    }

    #[test]
    fn test_interrupts_share_one_holder() {
        let registry: &'static HostedRegistry = Box::leak(Box::new(HostedRegistry::new()));
        let mutex = registry.allocate_mutex().unwrap();

        interrupt(|| registry.mutex_try_acquire(mutex)).unwrap();
        std::thread::spawn(move || interrupt(|| registry.mutex_release(mutex)))
            .join()
            .unwrap()
            .unwrap();
        registry.mutex_try_acquire(mutex).unwrap();
    }
}
