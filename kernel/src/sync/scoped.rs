//! Scoped lock acquisition.
//!
//! [`ScopedLock`] acquires in its constructor and releases in `Drop`, so the
//! release happens exactly once on every way out of the scope: fall-through,
//! early `return`, `?` propagation and unwinding alike.

use core::fmt;
use core::marker::PhantomData;

/// Something that can be locked and unlocked as a pair.
///
/// `unlock` is `unsafe` because releasing a lock the caller does not hold
/// breaks every other holder's exclusion.
pub trait Lock {
    /// Acquires the lock, waiting as long as it takes.
    fn lock(&self);

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the lock through a `lock` call that has
    /// not been matched by an `unlock` yet.
    unsafe fn unlock(&self);
}

/// RAII owner of a held lock.
///
/// Not `Clone`: the obligation to unlock cannot be duplicated. Not `Send`:
/// the release must run on the acquiring thread, which owns the saved IRQL.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ScopedLock<'a, T: Lock + ?Sized> {
    lock: &'a T,
    _not_send: PhantomData<*const ()>,
}

impl<'a, T: Lock + ?Sized> ScopedLock<'a, T> {
    /// Acquires `lock` and returns the guard that will release it.
    #[inline]
    pub fn new(lock: &'a T) -> Self {
        lock.lock();
        Self {
            lock,
            _not_send: PhantomData,
        }
    }

    /// The lock this guard holds.
    pub fn lock(&self) -> &'a T {
        self.lock
    }
}

impl<T: Lock + ?Sized> Drop for ScopedLock<'_, T> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: the guard exists only while the lock is held, and it is
        // dropped exactly once.
        unsafe { self.lock.unlock() };
    }
}

impl<T: Lock + ?Sized> fmt::Debug for ScopedLock<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScopedLock { .. }")
    }
}

/// Guard over a [`SpinLock`](super::SpinLock).
pub type SpinLocker<'a> = ScopedLock<'a, super::SpinLock>;

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// Counts lock/unlock calls and checks they alternate.
    #[derive(Default)]
    struct Probe {
        held: Cell<bool>,
        locks: Cell<u32>,
        unlocks: Cell<u32>,
    }

    impl Lock for Probe {
        fn lock(&self) {
            assert!(!self.held.get(), "double lock");
            self.held.set(true);
            self.locks.set(self.locks.get() + 1);
        }

        unsafe fn unlock(&self) {
            assert!(self.held.get(), "unlock without lock");
            self.held.set(false);
            self.unlocks.set(self.unlocks.get() + 1);
        }
    }

    fn guarded(probe: &Probe, path: u8) -> Result<u8, &'static str> {
        let _guard = ScopedLock::new(probe);
        assert!(probe.held.get());
        if path == 0 {
            return Ok(0);
        }
        let value: Result<u8, &'static str> = if path == 1 { Err("failed") } else { Ok(path) };
        let value = value?;
        Ok(value + 1)
    }

    #[test]
    fn releases_once_on_every_exit_path() {
        let probe = Probe::default();

        assert_eq!(guarded(&probe, 0), Ok(0));
        assert_eq!(guarded(&probe, 1), Err("failed"));
        assert_eq!(guarded(&probe, 2), Ok(3));

        assert_eq!(probe.locks.get(), 3);
        assert_eq!(probe.unlocks.get(), 3);
        assert!(!probe.held.get());
    }

    #[test]
    fn releases_during_unwind() {
        let probe = Probe::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ScopedLock::new(&probe);
            panic!("fault inside the critical section");
        }));

        assert!(result.is_err());
        assert_eq!(probe.locks.get(), 1);
        assert_eq!(probe.unlocks.get(), 1);
    }

    #[test]
    fn spin_locker_holds_for_its_scope() {
        let lock = super::super::SpinLock::new();
        {
            let guard = SpinLocker::new(&lock);
            assert!(guard.lock().is_locked());
            assert_eq!(khal::irql::current(), khal::Irql::Dispatch);
        }
        assert!(!lock.is_locked());
        assert_eq!(khal::irql::current(), khal::Irql::Passive);
    }
}
