//! Sentinel-anchored intrusive ring.

use alloc::boxed::Box;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use super::entry::{Linked, ListEntry};
use super::policy::{AccessStrategy, Counting, CountingStrategy, LockedAccess, SharedAccess};
use crate::sync::ScopedLock;

/// Doubly-linked ring of externally owned entries.
///
/// The list never allocates or frees entries; it only threads their
/// embedded [`ListEntry`] fields together. Every operation except
/// [`is_empty`](Self::is_empty) runs entirely under the `A` policy's lock,
/// callbacks included. Callbacks must not touch the same list again, and
/// under [`LockedAccess`] they run at DISPATCH_LEVEL and must not block.
pub struct IntrusiveList<E: Linked, A: AccessStrategy = LockedAccess, C: CountingStrategy = Counting> {
    /// Boxed so the entries' back-pointers survive moves of the list.
    head: Box<ListEntry>,
    access: A,
    counter: C,
    _entries: PhantomData<NonNull<E>>,
}

// SAFETY: entries are only reached through the list's own operations, and
// handing the list to another thread hands over the entries with it.
unsafe impl<E, A, C> Send for IntrusiveList<E, A, C>
where
    E: Linked + Send,
    A: AccessStrategy + Send,
    C: CountingStrategy + Send,
{
}

// SAFETY: with a shared access policy every operation is serialized by the
// policy's lock. Callbacks see `&E` and popped entries may leave for other
// threads, hence `E: Send + Sync`.
unsafe impl<E, A, C> Sync for IntrusiveList<E, A, C>
where
    E: Linked + Send + Sync,
    A: SharedAccess,
    C: CountingStrategy + Sync,
{
}

impl<E: Linked, A: AccessStrategy, C: CountingStrategy> IntrusiveList<E, A, C> {
    /// Empty list.
    pub fn new() -> Self {
        let head = Box::new(ListEntry::new());
        head.make_head();
        Self {
            head,
            access: A::default(),
            counter: C::default(),
            _entries: PhantomData,
        }
    }

    /// Unlocked peek. Only a hint when other threads use the list.
    pub fn is_empty(&self) -> bool {
        self.head.flink() == self.sentinel()
    }

    /// Unlinks and returns the first entry, or `None` if the list is empty.
    pub fn pop(&self) -> Option<NonNull<E>> {
        let _guard = ScopedLock::new(&self.access);
        // SAFETY: the lock is held.
        unsafe { self.pop_locked() }
    }

    /// Links `entry` at the head. Returns the new count (zero for a
    /// non-counting list).
    ///
    /// # Safety
    ///
    /// `entry` must point to a live value that is not linked on any list
    /// through the same field. It must stay at the same address, and must
    /// not be dropped or mutably borrowed, until it has been unlinked again.
    pub unsafe fn push(&self, entry: NonNull<E>) -> u32 {
        // SAFETY: forwarded from the caller.
        let links = unsafe { E::links(entry) };
        let _guard = ScopedLock::new(&self.access);
        // SAFETY: the lock is held and the sentinel is always linked.
        unsafe { link_after(self.sentinel(), links) };
        self.counter.increment()
    }

    /// Links `entry` at the tail. Returns the new count (zero for a
    /// non-counting list).
    ///
    /// # Safety
    ///
    /// Same as [`push`](Self::push).
    pub unsafe fn push_back(&self, entry: NonNull<E>) -> u32 {
        // SAFETY: forwarded from the caller.
        let links = unsafe { E::links(entry) };
        let _guard = ScopedLock::new(&self.access);
        // SAFETY: the lock is held; the sentinel's blink is the tail.
        unsafe { link_after(self.head.blink(), links) };
        self.counter.increment()
    }

    /// Unlinks `entry`.
    ///
    /// # Safety
    ///
    /// `entry` must currently be linked on this list.
    pub unsafe fn remove(&self, entry: NonNull<E>) {
        // SAFETY: forwarded from the caller.
        let links = unsafe { E::links(entry) };
        let _guard = ScopedLock::new(&self.access);
        // SAFETY: the lock is held and the entry is on this list.
        unsafe { unlink(links.as_ptr()) };
        self.counter.decrement();
    }

    /// Visits every entry head to tail, leaving them linked.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&E),
    {
        let _guard = ScopedLock::new(&self.access);
        let sentinel = self.sentinel();
        let mut current = self.head.flink();
        while current != sentinel {
            // SAFETY: linked entries stay live until unlinked, and only
            // this list unlinks them while the lock is held.
            unsafe {
                let next = (*current).flink();
                f(entry_of::<E>(current).as_ref());
                current = next;
            }
        }
    }

    /// Unlinks every entry head to tail, passing each to `f` after it has
    /// left the list. `f` may free it.
    pub fn for_each_detached<F>(&self, mut f: F)
    where
        F: FnMut(NonNull<E>),
    {
        let _guard = ScopedLock::new(&self.access);
        // SAFETY: the lock is held for the whole drain.
        while let Some(entry) = unsafe { self.pop_locked() } {
            f(entry);
        }
    }

    /// Single pass: entries matching `predicate` are unlinked and then
    /// passed to `f`; the rest stay linked in their original order.
    pub fn for_each_detached_if<P, F>(&self, mut predicate: P, mut f: F)
    where
        P: FnMut(&E) -> bool,
        F: FnMut(NonNull<E>),
    {
        let _guard = ScopedLock::new(&self.access);
        let sentinel = self.sentinel();
        let mut current = self.head.flink();
        while current != sentinel {
            // SAFETY: as in `for_each`. The successor is read before the
            // current entry is unlinked or handed to `f`.
            unsafe {
                let next = (*current).flink();
                let entry = entry_of::<E>(current);
                if predicate(entry.as_ref()) {
                    unlink(current);
                    self.counter.decrement();
                    f(entry);
                }
                current = next;
            }
        }
    }

    /// # Safety
    ///
    /// The access lock must be held.
    unsafe fn pop_locked(&self) -> Option<NonNull<E>> {
        let first = self.head.flink();
        if first == self.sentinel() {
            return None;
        }
        // SAFETY: `first` is a linked entry of this list.
        unsafe {
            unlink(first);
            self.counter.decrement();
            Some(entry_of::<E>(first))
        }
    }

    fn sentinel(&self) -> *mut ListEntry {
        ptr::from_ref(&*self.head).cast_mut()
    }
}

impl<E: Linked, A: AccessStrategy> IntrusiveList<E, A, Counting> {
    /// Number of linked entries.
    pub fn count(&self) -> u32 {
        let _guard = ScopedLock::new(&self.access);
        self.counter.get()
    }
}

impl<E: Linked, A: AccessStrategy, C: CountingStrategy> Default for IntrusiveList<E, A, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Linked, A: AccessStrategy, C: CountingStrategy> Drop for IntrusiveList<E, A, C> {
    fn drop(&mut self) {
        // Leave no entry pointing at the freed sentinel.
        if !self.is_empty() {
            klog::debug!("IntrusiveList dropped with entries still linked");
            self.for_each_detached(|_| {});
        }
    }
}

impl<E: Linked, A: AccessStrategy, C: CountingStrategy> fmt::Debug for IntrusiveList<E, A, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrusiveList")
            .field("is_empty", &self.is_empty())
            .finish_non_exhaustive()
    }
}

/// Links `entry` between `prev` and its successor.
///
/// # Safety
///
/// `prev` must be linked in a ring whose lock is held; `entry` must be
/// live and unlinked.
unsafe fn link_after(prev: *mut ListEntry, entry: NonNull<ListEntry>) {
    // SAFETY: both pointers are live per the contract.
    unsafe {
        let links = entry.as_ref();
        debug_assert!(!links.is_linked(), "entry is already on a list");
        let next = (*prev).flink();
        links.set_flink(next);
        links.set_blink(prev);
        (*next).set_blink(entry.as_ptr());
        (*prev).set_flink(entry.as_ptr());
    }
}

/// Unlinks `entry` from its ring and clears its links.
///
/// # Safety
///
/// `entry` must be linked in a ring whose lock is held.
unsafe fn unlink(entry: *mut ListEntry) {
    // SAFETY: a linked entry's neighbours are live per the contract.
    unsafe {
        let links = &*entry;
        debug_assert!(links.is_linked(), "entry is not on a list");
        let next = links.flink();
        let prev = links.blink();
        (*prev).set_flink(next);
        (*next).set_blink(prev);
        links.clear();
    }
}

/// # Safety
///
/// `links` must be the non-sentinel link field of a live `E`.
unsafe fn entry_of<E: Linked>(links: *mut ListEntry) -> NonNull<E> {
    // SAFETY: forwarded from the caller; linked pointers are never null.
    unsafe { E::from_links(NonNull::new_unchecked(links)) }
}
