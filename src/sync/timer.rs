//! Software timers
//!
//! Counted down by the tick handler. Expiry callbacks run in interrupt
//! context, after the timer table has been released.

use crate::registry::TimerHandler;
use crate::types::OsTick;

/// Software timer
pub struct OsTmr {
    handler: Option<&'static dyn TimerHandler>,
    periodic: bool,
    /// Reload value in ticks
    period: OsTick,
    /// Ticks left until expiry
    remain: OsTick,
    active: bool,
}

impl OsTmr {
    pub const fn new() -> Self {
        OsTmr {
            handler: None,
            periodic: false,
            period: 0,
            remain: 0,
            active: false,
        }
    }

    pub fn create(&mut self, periodic: bool, handler: &'static dyn TimerHandler) {
        *self = OsTmr::new();
        self.periodic = periodic;
        self.handler = Some(handler);
    }

    /// Arm the timer; a running timer restarts with the new period
    pub fn start(&mut self, period: OsTick) {
        self.period = period.max(1);
        self.remain = self.period;
        self.active = true;
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Advance by one tick; returns the handler when the timer fires
    pub fn tick(&mut self) -> Option<&'static dyn TimerHandler> {
        if !self.active {
            return None;
        }

        self.remain -= 1;
        if self.remain > 0 {
            return None;
        }

        if self.periodic {
            self.remain = self.period;
        } else {
            self.active = false;
        }
        self.handler
    }
}

impl Default for OsTmr {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portable_atomic::{AtomicU32, Ordering};

    struct Counter(AtomicU32);

    impl TimerHandler for Counter {
        fn on_expiry(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    static PERIODIC: Counter = Counter(AtomicU32::new(0));
    static ONE_SHOT: Counter = Counter(AtomicU32::new(0));

    fn run(tmr: &mut OsTmr, ticks: u32) {
        for _ in 0..ticks {
            if let Some(handler) = tmr.tick() {
                handler.on_expiry();
            }
        }
    }

    #[test]
    fn test_periodic_reloads() {
        let mut tmr = OsTmr::new();
        tmr.create(true, &PERIODIC);
        run(&mut tmr, 5);
        assert_eq!(PERIODIC.0.load(Ordering::Relaxed), 0);

        tmr.start(3);
        run(&mut tmr, 10);
        assert_eq!(PERIODIC.0.load(Ordering::Relaxed), 3);
        assert!(tmr.is_active());
    }

    #[test]
    fn test_one_shot_stops() {
        let mut tmr = OsTmr::new();
        tmr.create(false, &ONE_SHOT);
        tmr.start(2);
        run(&mut tmr, 10);
        assert_eq!(ONE_SHOT.0.load(Ordering::Relaxed), 1);
        assert!(!tmr.is_active());
    }
}
