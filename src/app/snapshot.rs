//! Sensor snapshot guarded by a registry mutex

use core::cell::UnsafeCell;

use crate::app::config::SENSOR_COUNT;
use crate::error::OsResult;
use crate::registry::{MutexHandle, Registry, Timeout};

/// The latest full set of readings
///
/// The array is only reachable while holding the registry mutex, so a reader
/// never sees a half-written snapshot.
pub struct SharedSnapshot<R: Registry + 'static> {
    registry: &'static R,
    mutex: MutexHandle,
    data: UnsafeCell<[i8; SENSOR_COUNT]>,
}

// Access to `data` is serialized by the registry mutex
unsafe impl<R: Registry> Sync for SharedSnapshot<R> {}

impl<R: Registry> SharedSnapshot<R> {
    pub const fn new(registry: &'static R, mutex: MutexHandle) -> Self {
        SharedSnapshot {
            registry,
            mutex,
            data: UnsafeCell::new([0; SENSOR_COUNT]),
        }
    }

    /// Overwrite the snapshot if the lock is free right now
    ///
    /// Never blocks, so it is usable from timer callbacks.
    pub fn try_update(&self, fill: impl FnOnce(&mut [i8; SENSOR_COUNT])) -> OsResult<()> {
        self.registry.mutex_try_acquire(self.mutex)?;
        fill(unsafe { &mut *self.data.get() });
        self.registry.mutex_release(self.mutex)
    }

    /// Run `f` on the snapshot, waiting up to `timeout` for the lock
    pub fn read<T>(&self, timeout: Timeout, f: impl FnOnce(&[i8; SENSOR_COUNT]) -> T) -> OsResult<T> {
        self.registry.mutex_acquire(self.mutex, timeout)?;
        let value = f(unsafe { &*self.data.get() });
        self.registry.mutex_release(self.mutex)?;
        Ok(value)
    }
}
