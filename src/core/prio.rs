//! Ready-priority mask
//!
//! The kernel backend has exactly 32 priority levels, so one word tracks which
//! levels hold ready tasks. Priority 0 sits in the most significant bit and the
//! highest ready level is the leading-zero count.

use crate::config::{CFG_PRIO_IDLE, CFG_PRIO_MAX};
use crate::types::OsPrio;

const _: () = assert!(CFG_PRIO_MAX == u32::BITS as usize);

/// One bit per priority level with at least one ready task
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct ReadyMask(u32);

impl ReadyMask {
    pub const fn new() -> Self {
        ReadyMask(0)
    }

    #[inline]
    const fn bit(prio: OsPrio) -> u32 {
        0x8000_0000 >> prio
    }

    #[inline]
    pub fn insert(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_MAX);
        self.0 |= Self::bit(prio);
    }

    #[inline]
    pub fn remove(&mut self, prio: OsPrio) {
        self.0 &= !Self::bit(prio);
    }

    #[inline]
    pub fn contains(&self, prio: OsPrio) -> bool {
        self.0 & Self::bit(prio) != 0
    }

    /// Highest ready level; the idle level when nothing is ready
    #[inline]
    pub fn highest(&self) -> OsPrio {
        match self.0 {
            0 => CFG_PRIO_IDLE,
            bits => bits.leading_zeros() as OsPrio,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_tracks_removals() {
        let mut mask = ReadyMask::new();
        assert_eq!(mask.highest(), CFG_PRIO_IDLE);

        mask.insert(5);
        mask.insert(3);
        assert!(mask.contains(5));
        assert!(!mask.contains(4));
        assert_eq!(mask.highest(), 3);

        mask.remove(3);
        assert_eq!(mask.highest(), 5);
        mask.remove(5);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_extreme_levels() {
        let mut mask = ReadyMask::new();
        mask.insert(CFG_PRIO_IDLE);
        assert_eq!(mask.highest(), CFG_PRIO_IDLE);
        mask.insert(0);
        assert_eq!(mask.highest(), 0);
    }
}
