//! Tagged pool allocation.
//!
//! Every allocation made by this crate carries a four-character tag so the
//! platform's pool diagnostics can attribute memory to its owner. A
//! [`Pool`] also keeps its own accounting (live allocations, live bytes,
//! failed requests) and can be capped, which is how low-memory paths are
//! exercised.
//!
//! Allocation never aborts: running out of memory is reported as
//! [`Error::ResourceExhausted`](crate::Error::ResourceExhausted) and counted.

use alloc::vec::Vec;
use core::fmt;
use core::mem::size_of;
use core::ops::Deref;
use core::sync::atomic::{AtomicUsize, Ordering};

use bitflags::bitflags;
use khal::irql::{self, Irql};
use khal::{bug_check, BugCheck};

use crate::status::{Error, Result};

/// Four-character pool tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolTag(u32);

impl PoolTag {
    /// Tag from a multi-character literal as written in source, first
    /// character most significant (`'SUHR'` in C).
    pub const fn from_literal(chars: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(chars))
    }

    /// Raw tag value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Tag bytes in memory order, as pool dumps show them.
    pub const fn as_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for PoolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            let c = if byte.is_ascii_graphic() { byte as char } else { '.' };
            fmt::Write::write_char(f, c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for PoolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolTag('{}')", self)
    }
}

/// Tag carried by every allocation this crate makes.
pub const WDMKIT_POOL_TAG: PoolTag = PoolTag::from_literal(*b"SUHR");

bitflags! {
    /// Allocation flags. Exactly one of `NON_PAGED` / `PAGED` is required.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PoolFlags: u32 {
        /// Skip zero-filling; the buffer starts empty and is filled by the
        /// caller.
        const UNINITIALIZED = 0x0000_0002;
        /// Resident memory, usable at any IRQL.
        const NON_PAGED     = 0x0000_0040;
        /// Pageable memory, only usable at APC_LEVEL or below.
        const PAGED         = 0x0000_0100;
    }
}

/// Snapshot of a pool's accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub tag: PoolTag,
    /// Allocations not yet freed.
    pub outstanding: usize,
    /// Bytes held by outstanding allocations.
    pub bytes_in_use: usize,
    /// Requests that could not be satisfied.
    pub failures: usize,
}

/// An accounted allocation source.
pub struct Pool {
    tag: PoolTag,
    /// Cap on `bytes_in_use`; `usize::MAX` when unlimited.
    limit: usize,
    bytes_in_use: AtomicUsize,
    outstanding: AtomicUsize,
    failures: AtomicUsize,
}

/// The default non-paged pool.
pub static NON_PAGED_POOL: Pool = Pool::new(WDMKIT_POOL_TAG);

impl Pool {
    /// Unlimited pool whose allocations carry `tag`.
    pub const fn new(tag: PoolTag) -> Self {
        Self::with_limit(tag, usize::MAX)
    }

    /// Pool that refuses to hold more than `limit` bytes at once.
    pub const fn with_limit(tag: PoolTag, limit: usize) -> Self {
        Self {
            tag,
            limit,
            bytes_in_use: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn tag(&self) -> PoolTag {
        self.tag
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            tag: self.tag,
            outstanding: self.outstanding.load(Ordering::Relaxed),
            bytes_in_use: self.bytes_in_use.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Allocates room for `count` elements of `T`.
    ///
    /// Unless `UNINITIALIZED` is given the buffer comes back filled with
    /// `T::default()` over its whole capacity; otherwise it starts empty.
    /// Malformed flags are a bug check, as is a paged request above
    /// APC_LEVEL.
    pub fn allocate<T: Copy + Default>(
        &self,
        flags: PoolFlags,
        count: usize,
    ) -> Result<PoolBuffer<'_, T>> {
        let paged = flags.contains(PoolFlags::PAGED);
        if paged == flags.contains(PoolFlags::NON_PAGED) {
            bug_check(
                BugCheck::BadPoolCaller,
                format_args!("pool '{}' request with flags {:?}", self.tag, flags),
            );
        }
        if paged {
            irql::require_at_most(Irql::Apc, "paged pool allocation");
        }

        let bytes = match count.checked_mul(size_of::<T>()) {
            Some(bytes) => bytes,
            None => return Err(self.fail(usize::MAX)),
        };
        let reserved = self
            .bytes_in_use
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                used.checked_add(bytes).filter(|&total| total <= self.limit)
            })
            .is_ok();
        if !reserved {
            return Err(self.fail(bytes));
        }

        let mut data = Vec::new();
        if data.try_reserve_exact(count).is_err() {
            self.bytes_in_use.fetch_sub(bytes, Ordering::Relaxed);
            return Err(self.fail(bytes));
        }
        if !flags.contains(PoolFlags::UNINITIALIZED) {
            data.resize(count, T::default());
        }

        self.outstanding.fetch_add(1, Ordering::Relaxed);
        Ok(PoolBuffer {
            pool: self,
            data,
            capacity: count,
            bytes,
        })
    }

    fn fail(&self, bytes: usize) -> Error {
        self.failures.fetch_add(1, Ordering::Relaxed);
        klog::warn!("pool '{}': cannot allocate {} bytes", self.tag, bytes);
        Error::ResourceExhausted
    }

    fn free(&self, bytes: usize) {
        self.bytes_in_use.fetch_sub(bytes, Ordering::Relaxed);
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("stats", &self.stats())
            .field("limit", &self.limit)
            .finish()
    }
}

/// A fixed-capacity buffer owned by a [`Pool`]. Never grows; dropping it
/// returns its bytes to the pool's accounting.
pub struct PoolBuffer<'p, T> {
    pool: &'p Pool,
    data: Vec<T>,
    capacity: usize,
    bytes: usize,
}

impl<T: Copy> PoolBuffer<'_, T> {
    /// Elements the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `items` if they fit. Returns `false`, copying nothing, when
    /// they do not.
    pub fn extend_from_slice(&mut self, items: &[T]) -> bool {
        if items.len() > self.capacity - self.data.len() {
            return false;
        }
        self.data.extend_from_slice(items);
        true
    }

    /// Mutable view of the filled part.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn tag(&self) -> PoolTag {
        self.pool.tag
    }
}

impl<T> Deref for PoolBuffer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> Drop for PoolBuffer<'_, T> {
    fn drop(&mut self) {
        self.pool.free(self.bytes);
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolBuffer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuffer")
            .field("tag", &self.pool.tag)
            .field("capacity", &self.capacity)
            .field("data", &self.data)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    const TEST_TAG: PoolTag = PoolTag::from_literal(*b"tseT");

    #[test]
    fn tag_displays_in_memory_order() {
        assert_eq!(WDMKIT_POOL_TAG.raw(), 0x5355_4852);
        assert_eq!(format!("{}", WDMKIT_POOL_TAG), "RHUS");
        assert_eq!(format!("{:?}", TEST_TAG), "PoolTag('Test')");
    }

    #[test]
    fn zeroed_and_uninitialized_buffers() {
        let pool = Pool::new(TEST_TAG);

        let mut zeroed = pool.allocate::<u16>(PoolFlags::NON_PAGED, 4).unwrap();
        assert_eq!(&*zeroed, &[0, 0, 0, 0]);
        zeroed.as_mut_slice()[1] = 7;
        zeroed.as_mut_slice()[3] = 9;
        assert_eq!(&*zeroed, &[0, 7, 0, 9]);

        let mut filled = pool
            .allocate::<u16>(PoolFlags::NON_PAGED | PoolFlags::UNINITIALIZED, 3)
            .unwrap();
        assert!(filled.is_empty());
        assert!(filled.extend_from_slice(&[1, 2]));
        assert!(!filled.extend_from_slice(&[3, 4]));
        assert!(filled.extend_from_slice(&[3]));
        assert_eq!(&*filled, &[1, 2, 3]);
        assert_eq!(filled.capacity(), 3);
        assert_eq!(filled.tag(), TEST_TAG);
    }

    #[test]
    fn accounting_follows_buffer_lifetime() {
        let pool = Pool::new(TEST_TAG);
        let first = pool.allocate::<u16>(PoolFlags::NON_PAGED, 8).unwrap();
        let second = pool.allocate::<u32>(PoolFlags::PAGED, 2).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.outstanding, 2);
        assert_eq!(stats.bytes_in_use, 16 + 8);

        drop(first);
        assert_eq!(pool.stats().bytes_in_use, 8);
        drop(second);
        assert_eq!(pool.stats().outstanding, 0);
        assert_eq!(pool.stats().bytes_in_use, 0);
    }

    #[test]
    fn limit_rejects_and_counts_failures() {
        let pool = Pool::with_limit(TEST_TAG, 10);
        let held = pool.allocate::<u16>(PoolFlags::NON_PAGED, 4).unwrap();

        let refused = pool.allocate::<u16>(PoolFlags::NON_PAGED, 2);
        assert_eq!(refused.unwrap_err(), Error::ResourceExhausted);
        let overflow = pool.allocate::<u64>(PoolFlags::NON_PAGED, usize::MAX);
        assert_eq!(overflow.unwrap_err(), Error::ResourceExhausted);

        let stats = pool.stats();
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.bytes_in_use, 8);

        drop(held);
        assert!(pool.allocate::<u16>(PoolFlags::NON_PAGED, 5).is_ok());
    }

    #[test]
    fn non_paged_allocation_is_legal_at_dispatch() {
        let pool = Pool::new(TEST_TAG);
        let previous = irql::raise_to_dispatch();
        let buffer = pool.allocate::<u8>(PoolFlags::NON_PAGED, 16);
        irql::lower(previous);
        assert_eq!(buffer.unwrap().len(), 16);
    }

    #[test]
    #[should_panic(expected = "IRQL_NOT_LESS_OR_EQUAL")]
    fn paged_allocation_at_dispatch_is_fatal() {
        let pool = Pool::new(TEST_TAG);
        irql::raise_to_dispatch();
        let _ = pool.allocate::<u8>(PoolFlags::PAGED, 16);
    }

    #[test]
    #[should_panic(expected = "BAD_POOL_CALLER")]
    fn pool_type_is_required() {
        let pool = Pool::new(TEST_TAG);
        let _ = pool.allocate::<u8>(PoolFlags::UNINITIALIZED, 1);
    }
}
