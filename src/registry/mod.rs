//! Resource registry
//!
//! Fixed-capacity tables of threads, timers, queues and mutexes behind one
//! trait. Everything above this module is written against [`Registry`] and
//! runs unchanged on either backend:
//!
//! - [`UcosRegistry`]: the preemptive kernel in this crate
//! - [`HostedRegistry`]: std threads, for development hosts and tests
//!
//! Handles are plain indices wrapped in per-kind newtypes. Allocation failure
//! is an `Err`, never a handle, so handle 0 is always a real object.

mod table;
pub mod ucos;

#[cfg(any(test, feature = "std"))]
pub mod hosted;

pub use table::Table;
pub use ucos::UcosRegistry;

#[cfg(any(test, feature = "std"))]
pub use hosted::HostedRegistry;

use crate::error::OsResult;
use crate::types::OsPrio;

// ============ Handlers ============

/// Body of a registry thread
///
/// `run` is entered once when the scheduler starts. It normally loops
/// forever; a thread whose body returns is retired.
pub trait Runnable: Sync {
    fn run(&self);
}

/// Software timer callback
///
/// Runs in interrupt context on the kernel backend: it must not block, so
/// every registry call it makes has to use [`Timeout::Poll`].
pub trait TimerHandler: Sync {
    fn on_expiry(&self);
}

// ============ Handles ============

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name(u8);

        impl $name {
            #[inline]
            pub(crate) const fn new(index: usize) -> Self {
                $name(index as u8)
            }

            /// Table index of the object
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(
    /// Thread allocated from a registry
    ThreadHandle
);
handle!(
    /// Software timer allocated from a registry
    TimerHandle
);
handle!(
    /// Message queue allocated from a registry
    QueueHandle
);
handle!(
    /// Mutex allocated from a registry
    MutexHandle
);

// ============ Timeouts ============

/// How long a registry call may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Try once and never block; the only mode legal in interrupt context
    Poll,
    /// Block up to this many milliseconds
    Millis(u32),
    /// Block until the operation succeeds
    Forever,
}

impl Timeout {
    /// Map a signed millisecond count: negative waits forever, zero polls
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            ms if ms < 0 => Timeout::Forever,
            0 => Timeout::Poll,
            ms => Timeout::Millis(ms.min(u32::MAX as i64) as u32),
        }
    }

    #[inline]
    pub fn is_poll(self) -> bool {
        self == Timeout::Poll
    }
}

// ============ Registry ============

/// Scheduler resources with a uniform contract across backends
///
/// Allocation happens once, before [`Registry::start_scheduler`]. Queue and
/// mutex operations may be called from threads, timer callbacks and
/// interrupt handlers; from the latter two only with [`Timeout::Poll`].
///
/// A zero-wait miss (queue full or empty, mutex held) and an expired wait
/// both report [`OsError::Timeout`](crate::error::OsError::Timeout).
pub trait Registry: Sync {
    /// Create a thread that starts running `entry` with the scheduler
    ///
    /// `priority` 0 is the most urgent. `stack_size` is in stack words.
    fn allocate_thread(
        &self,
        entry: &'static dyn Runnable,
        priority: OsPrio,
        stack_size: usize,
    ) -> OsResult<ThreadHandle>;

    /// Create a stopped software timer
    fn allocate_timer(
        &self,
        periodic: bool,
        callback: &'static dyn TimerHandler,
    ) -> OsResult<TimerHandle>;

    /// Arm a timer to fire after `period_ms`, and every `period_ms` after
    /// that when periodic
    fn start_timer(&self, timer: TimerHandle, period_ms: u32) -> OsResult<()>;

    /// Create a FIFO queue of `capacity` items of `item_size` bytes
    fn allocate_queue(&self, capacity: usize, item_size: usize) -> OsResult<QueueHandle>;

    /// Copy `item` to the back of the queue
    fn queue_send(&self, queue: QueueHandle, item: &[u8], timeout: Timeout) -> OsResult<()>;

    /// Copy the front item of the queue into `item`
    fn queue_receive(&self, queue: QueueHandle, item: &mut [u8], timeout: Timeout) -> OsResult<()>;

    /// Create an unlocked mutex
    fn allocate_mutex(&self) -> OsResult<MutexHandle>;

    /// Take the mutex only if it is free; never blocks
    fn mutex_try_acquire(&self, mutex: MutexHandle) -> OsResult<()> {
        self.mutex_acquire(mutex, Timeout::Poll)
    }

    /// Take the mutex, waiting up to `timeout`
    fn mutex_acquire(&self, mutex: MutexHandle, timeout: Timeout) -> OsResult<()>;

    /// Give the mutex back; only its holder may release it
    ///
    /// Holders are tracked per task. Every interrupt context shares a single
    /// holder identity, so any ISR may release a lock another ISR took. On the
    /// kernel backend start-up code before the scheduler runs shares that same
    /// identity.
    fn mutex_release(&self, mutex: MutexHandle) -> OsResult<()>;

    /// Start every allocated thread and timer service; never returns
    fn start_scheduler(&'static self) -> !;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_from_millis() {
        assert_eq!(Timeout::from_millis(-1), Timeout::Forever);
        assert_eq!(Timeout::from_millis(i64::MIN), Timeout::Forever);
        assert_eq!(Timeout::from_millis(0), Timeout::Poll);
        assert_eq!(Timeout::from_millis(25), Timeout::Millis(25));
        assert_eq!(Timeout::from_millis(i64::MAX), Timeout::Millis(u32::MAX));
        assert!(Timeout::Poll.is_poll());
    }

    #[test]
    fn test_handle_index() {
        assert_eq!(QueueHandle::new(0).index(), 0);
        assert_eq!(ThreadHandle::new(7).index(), 7);
        assert_ne!(MutexHandle::new(0), MutexHandle::new(1));
    }
}
