//! Link field and the entry contract.

use core::fmt;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicPtr, Ordering};

/// Forward/backward links embedded in every list entry.
///
/// Links are atomics so that the unlocked emptiness peek on a list is a
/// defined read. All updates happen under the list's access policy, so
/// `Relaxed` is enough; the lock orders them.
///
/// An entry that is not on any list has null links.
pub struct ListEntry {
    flink: AtomicPtr<ListEntry>,
    blink: AtomicPtr<ListEntry>,
}

impl ListEntry {
    /// Unlinked entry.
    pub const fn new() -> Self {
        Self {
            flink: AtomicPtr::new(ptr::null_mut()),
            blink: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Whether the entry is currently on a list. Racy unless the caller
    /// holds that list's lock.
    pub fn is_linked(&self) -> bool {
        !self.flink().is_null()
    }

    #[inline]
    pub(crate) fn flink(&self) -> *mut ListEntry {
        self.flink.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn blink(&self) -> *mut ListEntry {
        self.blink.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_flink(&self, next: *mut ListEntry) {
        self.flink.store(next, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn set_blink(&self, prev: *mut ListEntry) {
        self.blink.store(prev, Ordering::Relaxed);
    }

    /// Points both links at `self`: the shape of an empty list head.
    pub(crate) fn make_head(&self) {
        let this = ptr::from_ref(self).cast_mut();
        self.set_flink(this);
        self.set_blink(this);
    }

    pub(crate) fn clear(&self) {
        self.set_flink(ptr::null_mut());
        self.set_blink(ptr::null_mut());
    }
}

impl Default for ListEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListEntry")
            .field("flink", &self.flink())
            .field("blink", &self.blink())
            .finish()
    }
}

/// A type that can live on an [`IntrusiveList`](super::IntrusiveList).
///
/// Implement it with [`impl_linked!`](crate::impl_linked) rather than by
/// hand.
///
/// # Safety
///
/// `links` must return a pointer to a `ListEntry` stored inside `*this`,
/// the same field for every value, and `from_links` must invert it exactly.
pub unsafe trait Linked {
    /// The embedded link field of `this`.
    ///
    /// # Safety
    ///
    /// `this` must point to a live `Self`.
    unsafe fn links(this: NonNull<Self>) -> NonNull<ListEntry>;

    /// The value whose link field is `links`.
    ///
    /// # Safety
    ///
    /// `links` must have been produced by [`Linked::links`] for a value
    /// that is still live.
    unsafe fn from_links(links: NonNull<ListEntry>) -> NonNull<Self>;
}

/// Implements [`Linked`](crate::list::Linked) for a struct through one of
/// its `ListEntry` fields.
///
/// ```
/// use wdmkit::list::ListEntry;
///
/// struct Request {
///     id: u32,
///     link: ListEntry,
/// }
///
/// wdmkit::impl_linked!(Request, link);
/// ```
#[macro_export]
macro_rules! impl_linked {
    ($ty:ty, $field:ident) => {
        // SAFETY: `links` projects to the field and `from_links` subtracts
        // the same field's offset.
        unsafe impl $crate::list::Linked for $ty {
            #[inline]
            unsafe fn links(
                this: ::core::ptr::NonNull<Self>,
            ) -> ::core::ptr::NonNull<$crate::list::ListEntry> {
                // SAFETY: the caller guarantees `this` points to a live value.
                unsafe {
                    ::core::ptr::NonNull::new_unchecked(::core::ptr::addr_of_mut!(
                        (*this.as_ptr()).$field
                    ))
                }
            }

            #[inline]
            unsafe fn from_links(
                links: ::core::ptr::NonNull<$crate::list::ListEntry>,
            ) -> ::core::ptr::NonNull<Self> {
                let offset = ::core::mem::offset_of!($ty, $field);
                // SAFETY: `links` sits `offset` bytes into a live value.
                unsafe { links.byte_sub(offset).cast::<Self>() }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node {
        _value: u64,
        link: ListEntry,
    }

    crate::impl_linked!(Node, link);

    #[test]
    fn new_entry_is_unlinked() {
        let entry = ListEntry::new();
        assert!(!entry.is_linked());
        entry.make_head();
        assert!(entry.is_linked());
        entry.clear();
        assert!(!entry.is_linked());
    }

    #[test]
    fn links_round_trip_to_container() {
        let node = Node {
            _value: 7,
            link: ListEntry::new(),
        };
        let this = NonNull::from(&node);
        // SAFETY: `node` is live for the whole test.
        let links = unsafe { Node::links(this) };
        assert_eq!(links.as_ptr().cast_const(), ptr::from_ref(&node.link));
        assert_eq!(unsafe { Node::from_links(links) }, this);
    }
}
