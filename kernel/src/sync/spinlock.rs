// =============================================================================
// WdmKit: Ticket Spinlock
// =============================================================================
//
// A ticket spinlock provides mutual exclusion between processors without
// ever blocking. Threads acquire the lock in FIFO order, preventing
// starvation.
//
// HOW IT WORKS:
//   - Two counters: `next_ticket` and `now_serving`
//   - To lock: atomically increment `next_ticket`, get your ticket number.
//     Spin until `now_serving` equals your ticket.
//   - To unlock: increment `now_serving`, which lets the next waiter proceed.
//
// IRQL:
//   Acquiring raises the caller to DISPATCH_LEVEL first. Otherwise:
//     1. Thread A holds lock L at PASSIVE_LEVEL
//     2. The dispatcher preempts A on the same processor
//     3. Thread B (or a DPC) tries to acquire L
//     4. B spins on a processor A can never run on again until B yields,
//        and B never yields
//
//   The level that was current before the raise is stored in the lock by
//   the owner and restored on unlock. Only the owner touches it, so it
//   needs no atomics of its own.
//
// RULES FOR THE HOLDER:
//   - No blocking, waiting or sleeping (the scheduler is masked)
//   - No pageable memory
//   - No second `lock()` on the same instance (deadlocks, not reentrant)
//   - `unlock()` exactly once, from the thread that locked
//
// Breaking a rule the platform can see ends in a bug check.
// =============================================================================

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, Ordering};

use khal::irql::{self, Irql};
use khal::{bug_check, BugCheck};

use super::scoped::Lock;

/// A ticket-based spinlock that runs its holder at DISPATCH_LEVEL.
///
/// The lock protects no data of its own; it serializes whatever the caller
/// decides it guards. Pair it with [`ScopedLock`](super::ScopedLock) so the
/// release cannot be forgotten:
///
/// ```
/// use wdmkit::sync::{SpinLock, SpinLocker};
///
/// let lock = SpinLock::new();
/// {
///     let _held = SpinLocker::new(&lock);
///     // critical section at DISPATCH_LEVEL
/// } // released here
/// assert!(!lock.is_locked());
/// ```
pub struct SpinLock {
    /// The next ticket to be dispensed (atomically incremented by each locker).
    next_ticket: AtomicU32,

    /// The ticket number currently being served (incremented on unlock).
    now_serving: AtomicU32,

    /// IRQL of the owner before it acquired. Written and read only by the
    /// current owner.
    saved_irql: UnsafeCell<Irql>,
}

// SAFETY: `saved_irql` is only accessed by the thread that currently owns
// the lock; ownership hand-off goes through the Acquire/Release pair on
// `now_serving`.
unsafe impl Send for SpinLock {}
unsafe impl Sync for SpinLock {}

impl SpinLock {
    /// Creates an unlocked spinlock.
    pub const fn new() -> Self {
        Self {
            next_ticket: AtomicU32::new(0),
            now_serving: AtomicU32::new(0),
            saved_irql: UnsafeCell::new(Irql::Passive),
        }
    }

    /// Acquires the lock, raising the caller to DISPATCH_LEVEL.
    ///
    /// Spins (never yields) while another owner holds it. Callers above
    /// DISPATCH_LEVEL are bug-checked.
    pub fn lock(&self) {
        irql::require_at_most(Irql::Dispatch, "SpinLock::lock");
        let previous = irql::raise_to_dispatch();

        // Relaxed is fine for taking the ticket; the Acquire load in the
        // spin loop is what orders us after the previous owner.
        let my_ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        while self.now_serving.load(Ordering::Acquire) != my_ticket {
            core::hint::spin_loop();
        }

        // SAFETY: we own the lock.
        unsafe { *self.saved_irql.get() = previous };
    }

    /// Acquires the lock only if it is free right now.
    ///
    /// On success the caller is at DISPATCH_LEVEL and must [`unlock`]
    /// later. On failure the IRQL is left untouched.
    ///
    /// [`unlock`]: SpinLock::unlock
    pub fn try_lock(&self) -> bool {
        irql::require_at_most(Irql::Dispatch, "SpinLock::try_lock");
        let previous = irql::raise_to_dispatch();

        // Acquire pairs with the Release in `unlock`: a ticket taken from
        // this value must see the previous owner's writes.
        let current = self.now_serving.load(Ordering::Acquire);
        let taken = self
            .next_ticket
            .compare_exchange(
                current,
                current.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok();

        if taken {
            // SAFETY: we own the lock.
            unsafe { *self.saved_irql.get() = previous };
        } else {
            irql::lower(previous);
        }
        taken
    }

    /// Releases the lock and restores the IRQL saved by the owner.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the lock through a successful
    /// [`lock`](SpinLock::lock) or [`try_lock`](SpinLock::try_lock) that has
    /// not been released yet.
    pub unsafe fn unlock(&self) {
        if !self.is_locked() {
            bug_check(BugCheck::SpinLockNotOwned, format_args!("unlock of a free spinlock"));
        }

        // Read before releasing: the next owner overwrites it.
        // SAFETY: caller owns the lock.
        let previous = unsafe { *self.saved_irql.get() };

        // Release publishes every write made under the lock to the next
        // owner before it observes the new `now_serving`.
        self.now_serving.fetch_add(1, Ordering::Release);
        irql::lower(previous);
    }

    /// Returns whether some thread holds the lock. Racy snapshot, for
    /// diagnostics and assertions only.
    pub fn is_locked(&self) -> bool {
        self.next_ticket.load(Ordering::Relaxed) != self.now_serving.load(Ordering::Relaxed)
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for SpinLock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl Lock for SpinLock {
    #[inline]
    fn lock(&self) {
        SpinLock::lock(self);
    }

    #[inline]
    unsafe fn unlock(&self) {
        // SAFETY: forwarded caller contract.
        unsafe { SpinLock::unlock(self) }
    }
}
