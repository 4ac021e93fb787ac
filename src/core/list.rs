//! Intrusive doubly linked lists of TCBs
//!
//! A TCB sits on up to three lists at once: a ready list, the wait list of
//! the object it pends on, and the tick list while it has a deadline. Each
//! list kind uses its own pair of links inside the TCB, selected by a marker
//! type.

use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::task::OsTcb;

/// Next/previous links of one list kind
#[derive(Debug, Clone, Copy)]
pub struct TcbLinks {
    pub next: Option<NonNull<OsTcb>>,
    pub prev: Option<NonNull<OsTcb>>,
}

impl TcbLinks {
    pub const fn new() -> Self {
        TcbLinks { next: None, prev: None }
    }
}

/// Selects which links of a TCB a list threads through
pub trait LinkKind {
    fn links(tcb: &mut OsTcb) -> &mut TcbLinks;
}

/// Ready list links
pub struct ReadyLink;
/// Wait list links
pub struct PendLink;
/// Tick (deadline) list links
pub struct TickLink;

impl LinkKind for ReadyLink {
    #[inline(always)]
    fn links(tcb: &mut OsTcb) -> &mut TcbLinks {
        &mut tcb.rdy_links
    }
}

impl LinkKind for PendLink {
    #[inline(always)]
    fn links(tcb: &mut OsTcb) -> &mut TcbLinks {
        &mut tcb.pend_links
    }
}

impl LinkKind for TickLink {
    #[inline(always)]
    fn links(tcb: &mut OsTcb) -> &mut TcbLinks {
        &mut tcb.tick_links
    }
}

/// Doubly linked list of TCBs
///
/// All mutation happens with interrupts masked; the list never owns its
/// nodes.
pub struct TcbList<L: LinkKind> {
    head: Option<NonNull<OsTcb>>,
    tail: Option<NonNull<OsTcb>>,
    _kind: PhantomData<L>,
}

pub type ReadyList = TcbList<ReadyLink>;
pub type PendList = TcbList<PendLink>;
pub type TickList = TcbList<TickLink>;

impl<L: LinkKind> TcbList<L> {
    pub const fn new() -> Self {
        TcbList {
            head: None,
            tail: None,
            _kind: PhantomData,
        }
    }

    #[inline]
    pub fn head(&self) -> Option<NonNull<OsTcb>> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<NonNull<OsTcb>> {
        self.tail
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Next node after `tcb` on this list
    #[inline]
    pub fn next_of(tcb: NonNull<OsTcb>) -> Option<NonNull<OsTcb>> {
        L::links(unsafe { &mut *tcb.as_ptr() }).next
    }

    /// Append at the tail (FIFO)
    ///
    /// # Safety
    /// `tcb` must be valid and not already on a list of this kind.
    pub unsafe fn insert_tail(&mut self, tcb: NonNull<OsTcb>) {
        let links = L::links(unsafe { &mut *tcb.as_ptr() });
        links.next = None;
        links.prev = self.tail;

        match self.tail {
            Some(tail) => L::links(unsafe { &mut *tail.as_ptr() }).next = Some(tcb),
            None => self.head = Some(tcb),
        }
        self.tail = Some(tcb);
    }

    /// Insert keeping the list ordered by priority, FIFO among equals
    ///
    /// # Safety
    /// `tcb` must be valid and not already on a list of this kind.
    pub unsafe fn insert_by_prio(&mut self, tcb: NonNull<OsTcb>) {
        let prio = unsafe { tcb.as_ref() }.prio;

        let mut current = self.head;
        let mut prev: Option<NonNull<OsTcb>> = None;
        while let Some(cur) = current {
            if prio < unsafe { cur.as_ref() }.prio {
                break;
            }
            prev = current;
            current = Self::next_of(cur);
        }

        let links = L::links(unsafe { &mut *tcb.as_ptr() });
        links.prev = prev;
        links.next = current;

        match prev {
            Some(p) => L::links(unsafe { &mut *p.as_ptr() }).next = Some(tcb),
            None => self.head = Some(tcb),
        }
        match current {
            Some(c) => L::links(unsafe { &mut *c.as_ptr() }).prev = Some(tcb),
            None => self.tail = Some(tcb),
        }
    }

    /// Unlink `tcb`
    ///
    /// # Safety
    /// `tcb` must currently be on this list.
    pub unsafe fn remove(&mut self, tcb: NonNull<OsTcb>) {
        let links = *L::links(unsafe { &mut *tcb.as_ptr() });

        match links.prev {
            Some(prev) => L::links(unsafe { &mut *prev.as_ptr() }).next = links.next,
            None => self.head = links.next,
        }
        match links.next {
            Some(next) => L::links(unsafe { &mut *next.as_ptr() }).prev = links.prev,
            None => self.tail = links.prev,
        }

        *L::links(unsafe { &mut *tcb.as_ptr() }) = TcbLinks::new();
    }
}

impl<L: LinkKind> Default for TcbList<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcb(prio: u8) -> OsTcb {
        let mut t = OsTcb::new();
        t.prio = prio;
        t
    }

    fn collect<L: LinkKind>(list: &TcbList<L>) -> [u8; 4] {
        let mut out = [0xFF; 4];
        let mut cur = list.head();
        let mut i = 0;
        while let Some(p) = cur {
            out[i] = unsafe { p.as_ref() }.prio;
            i += 1;
            cur = TcbList::<L>::next_of(p);
        }
        out
    }

    #[test]
    fn test_fifo_and_remove() {
        let mut a = tcb(1);
        let mut b = tcb(2);
        let mut c = tcb(3);
        let mut list = ReadyList::new();

        unsafe {
            list.insert_tail(NonNull::from(&mut a));
            list.insert_tail(NonNull::from(&mut b));
            list.insert_tail(NonNull::from(&mut c));
        }
        assert_eq!(collect(&list), [1, 2, 3, 0xFF]);

        unsafe { list.remove(NonNull::from(&mut b)) };
        assert_eq!(collect(&list), [1, 3, 0xFF, 0xFF]);

        unsafe {
            list.remove(NonNull::from(&mut a));
            list.remove(NonNull::from(&mut c));
        }
        assert!(list.is_empty());
        assert!(list.tail().is_none());
    }

    #[test]
    fn test_priority_order_keeps_fifo_among_equals() {
        let mut low = tcb(9);
        let mut high = tcb(2);
        let mut first_mid = tcb(5);
        let mut second_mid = tcb(5);
        let mut list = PendList::new();

        unsafe {
            list.insert_by_prio(NonNull::from(&mut low));
            list.insert_by_prio(NonNull::from(&mut first_mid));
            list.insert_by_prio(NonNull::from(&mut high));
            list.insert_by_prio(NonNull::from(&mut second_mid));
        }

        assert_eq!(collect(&list), [2, 5, 5, 9]);
        assert_eq!(list.head(), Some(NonNull::from(&mut high)));
        assert_eq!(TcbList::<PendLink>::next_of(NonNull::from(&mut high)), Some(NonNull::from(&mut first_mid)));
    }
}
