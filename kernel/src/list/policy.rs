//! Access and counting policies for [`IntrusiveList`](super::IntrusiveList).
//!
//! Both are type parameters, so a list that needs neither a lock nor a
//! count pays for neither.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::sync::{Lock, SpinLock};

/// How a list serializes its operations.
pub trait AccessStrategy: Lock + Default {}

/// Access strategies that make a list safe to share between threads.
///
/// # Safety
///
/// `lock`/`unlock` must provide mutual exclusion across threads.
pub unsafe trait SharedAccess: AccessStrategy + Sync {}

/// Serializes every list operation with an embedded [`SpinLock`].
#[derive(Debug, Default)]
pub struct LockedAccess {
    lock: SpinLock,
}

impl Lock for LockedAccess {
    #[inline]
    fn lock(&self) {
        self.lock.lock();
    }

    #[inline]
    unsafe fn unlock(&self) {
        // SAFETY: forwarded from the caller.
        unsafe { self.lock.unlock() };
    }
}

impl AccessStrategy for LockedAccess {}

// SAFETY: SpinLock excludes across processors.
unsafe impl SharedAccess for LockedAccess {}

/// No locking. The owner serializes access itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawAccess;

impl Lock for RawAccess {
    #[inline]
    fn lock(&self) {}

    #[inline]
    unsafe fn unlock(&self) {}
}

impl AccessStrategy for RawAccess {}

/// How a list tracks its length. Called with the list's lock held.
pub trait CountingStrategy: Default {
    /// Records an insertion and returns the new count.
    fn increment(&self) -> u32;

    /// Records a removal.
    fn decrement(&self);
}

/// Maintains the number of linked entries.
#[derive(Debug, Default)]
pub struct Counting {
    count: AtomicU32,
}

impl Counting {
    pub fn get(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl CountingStrategy for Counting {
    #[inline]
    fn increment(&self) -> u32 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    fn decrement(&self) {
        let previous = self.count.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(previous > 0, "list count underflow");
    }
}

/// Keeps no count; insertions report zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonCounting;

impl CountingStrategy for NonCounting {
    #[inline]
    fn increment(&self) -> u32 {
        0
    }

    #[inline]
    fn decrement(&self) {}
}
