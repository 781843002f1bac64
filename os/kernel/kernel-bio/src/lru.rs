//! Index-linked circular lists over a fixed node arena.
//!
//! The arena holds one node per buffer slot followed by one sentinel node per
//! list. A list is identified by its sentinel; `sentinel.next` is the most
//! recently used end, `sentinel.prev` the least recently used end. A node that
//! is on no list points at itself.
//!
//! Links are atomics only so the arena can be shared; every access happens
//! while holding the lock of the [`Bucket`] the node belongs to (or, for a
//! detached node, by the single thread that detached it), and that lock orders
//! the accesses.

use alloc::boxed::Box;
use core::sync::atomic::{AtomicUsize, Ordering};

struct Node {
    prev: AtomicUsize,
    next: AtomicUsize,
}

impl Node {
    const fn detached(at: usize) -> Self {
        Self {
            prev: AtomicUsize::new(at),
            next: AtomicUsize::new(at),
        }
    }
}

pub(crate) struct Links {
    slots: usize,
    nodes: Box<[Node]>,
}

impl Links {
    pub(crate) fn new(slots: usize, lists: usize) -> Self {
        Self {
            slots,
            nodes: (0..slots + lists).map(Node::detached).collect(),
        }
    }

    #[inline]
    pub(crate) const fn sentinel(&self, list: usize) -> usize {
        self.slots + list
    }

    #[inline]
    fn next(&self, at: usize) -> usize {
        self.nodes[at].next.load(Ordering::Relaxed)
    }

    #[inline]
    fn prev(&self, at: usize) -> usize {
        self.nodes[at].prev.load(Ordering::Relaxed)
    }

    #[inline]
    fn set_next(&self, at: usize, to: usize) {
        self.nodes[at].next.store(to, Ordering::Relaxed);
    }

    #[inline]
    fn set_prev(&self, at: usize, to: usize) {
        self.nodes[at].prev.store(to, Ordering::Relaxed);
    }
}

/// One hash bucket's list. Lives inside the bucket's spin lock, so holding
/// `&mut Bucket` means holding that lock.
pub(crate) struct Bucket {
    head: usize,
}

impl Bucket {
    pub(crate) const fn new(head: usize) -> Self {
        Self { head }
    }

    /// Links the detached `slot` in at the most recently used end.
    pub(crate) fn push_front(&mut self, links: &Links, slot: usize) {
        debug_assert_eq!(links.next(slot), slot, "slot {slot} is still linked");
        let first = links.next(self.head);
        links.set_next(slot, first);
        links.set_prev(slot, self.head);
        links.set_prev(first, slot);
        links.set_next(self.head, slot);
    }

    /// Links the detached `slot` in at the least recently used end.
    pub(crate) fn push_back(&mut self, links: &Links, slot: usize) {
        debug_assert_eq!(links.next(slot), slot, "slot {slot} is still linked");
        let last = links.prev(self.head);
        links.set_prev(slot, last);
        links.set_next(slot, self.head);
        links.set_next(last, slot);
        links.set_prev(self.head, slot);
    }

    /// Detaches `slot`, which must be on this bucket's list.
    pub(crate) fn unlink(&mut self, links: &Links, slot: usize) {
        debug_assert_ne!(slot, self.head, "cannot unlink the sentinel");
        let prev = links.prev(slot);
        let next = links.next(slot);
        links.set_next(prev, next);
        links.set_prev(next, prev);
        links.set_next(slot, slot);
        links.set_prev(slot, slot);
    }

    /// Makes `slot` the most recently used entry.
    pub(crate) fn move_to_front(&mut self, links: &Links, slot: usize) {
        self.unlink(links, slot);
        self.push_front(links, slot);
    }

    /// Slots from most to least recently used.
    pub(crate) fn mru<'a>(&'a self, links: &'a Links) -> Iter<'a> {
        Iter {
            links,
            at: self.head,
            end: self.head,
            forward: true,
        }
    }

    /// Slots from least to most recently used.
    pub(crate) fn lru<'a>(&'a self, links: &'a Links) -> Iter<'a> {
        Iter {
            links,
            at: self.head,
            end: self.head,
            forward: false,
        }
    }
}

pub(crate) struct Iter<'a> {
    links: &'a Links,
    at: usize,
    end: usize,
    forward: bool,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let step = if self.forward {
            self.links.next(self.at)
        } else {
            self.links.prev(self.at)
        };
        if step == self.end {
            return None;
        }
        self.at = step;
        Some(step)
    }
}
