//! Fixed-item ring buffer bookkeeping
//!
//! Both registry backends store queue items in a flat byte buffer of
//! `capacity * item_size` bytes; this type tracks head and length over it.

/// Ring buffer state over externally owned storage
#[derive(Debug, Clone, Copy)]
pub struct Ring {
    item_size: usize,
    capacity: usize,
    head: usize,
    len: usize,
}

impl Ring {
    pub const fn new(capacity: usize, item_size: usize) -> Self {
        Ring {
            item_size,
            capacity,
            head: 0,
            len: 0,
        }
    }

    /// Bytes of storage the ring needs
    #[inline]
    pub const fn storage_len(&self) -> usize {
        self.capacity * self.item_size
    }

    #[inline]
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Copy `item` in at the tail; false when full
    pub fn push(&mut self, storage: &mut [u8], item: &[u8]) -> bool {
        debug_assert_eq!(item.len(), self.item_size);
        if self.is_full() {
            return false;
        }

        let slot = (self.head + self.len) % self.capacity;
        let start = slot * self.item_size;
        storage[start..start + self.item_size].copy_from_slice(item);
        self.len += 1;
        true
    }

    /// Copy the head item out into `out`; false when empty
    pub fn pop(&mut self, storage: &[u8], out: &mut [u8]) -> bool {
        debug_assert_eq!(out.len(), self.item_size);
        if self.is_empty() {
            return false;
        }

        let start = self.head * self.item_size;
        out.copy_from_slice(&storage[start..start + self.item_size]);
        self.head = (self.head + 1) % self.capacity;
        self.len -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_around() {
        let mut ring = Ring::new(3, 2);
        let mut storage = [0u8; 6];
        let mut out = [0u8; 2];

        assert!(ring.push(&mut storage, &[1, 1]));
        assert!(ring.push(&mut storage, &[2, 2]));
        assert!(ring.pop(&storage, &mut out));
        assert_eq!(out, [1, 1]);

        assert!(ring.push(&mut storage, &[3, 3]));
        assert!(ring.push(&mut storage, &[4, 4]));
        assert!(ring.is_full());
        assert!(!ring.push(&mut storage, &[5, 5]));

        for expected in [2u8, 3, 4] {
            assert!(ring.pop(&storage, &mut out));
            assert_eq!(out, [expected, expected]);
        }
        assert!(!ring.pop(&storage, &mut out));
    }
}
