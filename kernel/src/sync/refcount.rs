//! Atomic reference counter.
//!
//! Counts holders of a shared object. The counter never destroys anything
//! itself: the owning object decides what reaching zero means, using the
//! value [`RefCounter::release`] hands back rather than a separate read.

use core::sync::atomic::{AtomicI32, Ordering};

/// Signed 32-bit reference counter. Starts at zero.
#[derive(Debug, Default)]
pub struct RefCounter {
    counter: AtomicI32,
}

impl RefCounter {
    /// Creates a counter holding `initial`.
    pub const fn new(initial: i32) -> Self {
        Self {
            counter: AtomicI32::new(initial),
        }
    }

    /// Adds one reference.
    #[inline]
    pub fn add_ref(&self) {
        // Callers already hold a reference, so nothing needs ordering here.
        self.counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `count` references.
    #[inline]
    pub fn add_ref_by(&self, count: i32) {
        self.counter.fetch_add(count, Ordering::Relaxed);
    }

    /// Drops one reference and returns the count left.
    ///
    /// A return of zero means the caller released the last reference.
    #[inline]
    #[must_use = "the remaining count tells whether this was the last reference"]
    pub fn release(&self) -> i32 {
        self.release_by(1)
    }

    /// Drops `count` references and returns the count left.
    #[inline]
    #[must_use = "the remaining count tells whether these were the last references"]
    pub fn release_by(&self, count: i32) -> i32 {
        // Release orders this holder's writes before the decrement; the
        // Acquire half lets whoever reaches zero see every other holder's.
        self.counter
            .fetch_sub(count, Ordering::AcqRel)
            .wrapping_sub(count)
    }

    /// Current count. Stale as soon as it is returned.
    #[inline]
    pub fn get(&self) -> i32 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl From<&RefCounter> for i32 {
    fn from(counter: &RefCounter) -> i32 {
        counter.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::vec::Vec;

    #[test]
    fn release_reports_remaining_count() {
        let refs = RefCounter::default();
        refs.add_ref();
        refs.add_ref_by(3);
        assert_eq!(refs.get(), 4);

        assert_eq!(refs.release(), 3);
        assert_eq!(refs.release_by(2), 1);
        assert_eq!(refs.release(), 0);
        assert_eq!(i32::from(&refs), 0);
    }

    #[test]
    fn count_may_go_negative() {
        let refs = RefCounter::new(1);
        assert_eq!(refs.release_by(3), -2);
        refs.add_ref_by(2);
        assert_eq!(refs.get(), 0);
    }

    #[test]
    fn exactly_one_releaser_sees_zero() {
        const HOLDERS: i32 = 8;
        let refs = Arc::new(RefCounter::new(HOLDERS));

        let zero_hits: i32 = (0..HOLDERS)
            .map(|_| {
                let refs = Arc::clone(&refs);
                thread::spawn(move || i32::from(refs.release() == 0))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .sum();

        assert_eq!(zero_hits, 1);
    }
}
