//! Periodic sensor sampling

use crate::app::platform::SensorBank;
use crate::app::Shared;
use crate::registry::{Registry, TimerHandler};

/// Timer callback refreshing the snapshot
///
/// Runs where timers run, which may be interrupt context: if the formatter
/// holds the snapshot the cycle is skipped rather than waited for.
pub struct SensorSampler<R: Registry + 'static, S: SensorBank + 'static> {
    shared: &'static Shared<R>,
    sensors: &'static S,
}

impl<R: Registry, S: SensorBank> SensorSampler<R, S> {
    pub const fn new(shared: &'static Shared<R>, sensors: &'static S) -> Self {
        SensorSampler { shared, sensors }
    }

    /// Take one sample of every sensor; false if the cycle was skipped
    pub fn sample(&self) -> bool {
        let result = self.shared.snapshot.try_update(|data| {
            for (index, reading) in data.iter_mut().enumerate() {
                *reading = self.sensors.read_sensor(index as u8);
            }
        });

        if result.is_err() {
            crate::trace!("sample skipped, snapshot busy");
        }
        result.is_ok()
    }
}

impl<R: Registry, S: SensorBank> TimerHandler for SensorSampler<R, S> {
    fn on_expiry(&self) {
        self.sample();
    }
}
