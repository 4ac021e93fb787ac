//! Append-only object table

use crate::error::{OsError, OsResult};

/// Fixed table whose first `count` slots are live
///
/// Slots are claimed in order and never released, so an index below
/// `count` stays valid for the life of the table.
pub struct Table<T, const N: usize> {
    items: [T; N],
    count: usize,
}

impl<T, const N: usize> Table<T, N> {
    pub const fn new(items: [T; N]) -> Self {
        Table { items, count: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// The next free slot, without claiming it
    pub fn vacant(&mut self) -> Option<&mut T> {
        self.items.get_mut(self.count)
    }

    /// Claim the slot returned by [`Table::vacant`]; returns its index
    pub fn commit(&mut self) -> usize {
        debug_assert!(self.count < N);
        let index = self.count;
        self.count += 1;
        index
    }

    /// Live slot at `index`
    pub fn get(&mut self, index: usize) -> OsResult<&mut T> {
        if index < self.count {
            Ok(&mut self.items[index])
        } else {
            Err(OsError::ObjInvalid)
        }
    }

    /// Live slots in allocation order
    pub fn live_mut(&mut self) -> &mut [T] {
        &mut self.items[..self.count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_until_full() {
        let mut table: Table<u32, 2> = Table::new([0; 2]);
        assert!(table.get(0).is_err());

        *table.vacant().unwrap() = 10;
        assert_eq!(table.commit(), 0);
        *table.vacant().unwrap() = 20;
        assert_eq!(table.commit(), 1);

        assert!(table.is_full());
        assert!(table.vacant().is_none());
        assert_eq!(*table.get(0).unwrap(), 10);
        assert_eq!(table.get(2).err(), Some(OsError::ObjInvalid));
        assert_eq!(table.live_mut(), &[10, 20]);
    }
}
