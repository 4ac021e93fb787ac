//! Message queue
//!
//! Bounded FIFO of fixed-size items copied by value. Storage is a byte slice
//! carved from the registry's queue pool.

use crate::critical::CriticalSection;
use crate::list::PendList;
use crate::sync::ring::Ring;
use crate::wait::{self, Attempt};

/// Kernel message queue
pub struct OsQueue {
    storage: *mut u8,
    ring: Ring,
    /// Tasks waiting for space
    senders: PendList,
    /// Tasks waiting for an item
    receivers: PendList,
}

impl OsQueue {
    pub const fn new() -> Self {
        OsQueue {
            storage: core::ptr::null_mut(),
            ring: Ring::new(0, 0),
            senders: PendList::new(),
            receivers: PendList::new(),
        }
    }

    /// Bind the queue to its storage
    ///
    /// # Safety
    /// `storage` must point to `capacity * item_size` bytes that stay in
    /// place and unaliased for the life of the queue.
    pub unsafe fn create(&mut self, storage: *mut u8, capacity: usize, item_size: usize) {
        let ring = Ring::new(capacity, item_size);

        self.storage = storage;
        self.ring = ring;
        self.senders = PendList::new();
        self.receivers = PendList::new();
    }

    #[inline]
    pub fn item_size(&self) -> usize {
        self.ring.item_size()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    fn storage(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.storage, self.ring.storage_len()) }
    }

    /// One send attempt; on success wakes the first waiting receiver
    ///
    /// The `bool` tells whether a task was woken and a reschedule is due.
    pub(crate) fn try_send(&mut self, item: &[u8], cs: &CriticalSection) -> Attempt<bool> {
        let mut ring = self.ring;
        if ring.push(self.storage(), item) {
            self.ring = ring;
            Attempt::Done(wait::os_pend_wake_one(&mut self.receivers, cs).is_some())
        } else {
            Attempt::Wait(&mut self.senders)
        }
    }

    /// One receive attempt; on success wakes the first waiting sender
    pub(crate) fn try_receive(&mut self, out: &mut [u8], cs: &CriticalSection) -> Attempt<bool> {
        let mut ring = self.ring;
        if ring.pop(self.storage(), out) {
            self.ring = ring;
            Attempt::Done(wait::os_pend_wake_one(&mut self.senders, cs).is_some())
        } else {
            Attempt::Wait(&mut self.receivers)
        }
    }
}

impl Default for OsQueue {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsQueue {}
