//! Intrusive doubly-linked list.
//!
//! Entries embed a [`ListEntry`] and are owned by the caller; the list
//! only links them. Locking and counting are chosen per list through type
//! parameters:
//!
//! | policy          | effect                                          |
//! |-----------------|-------------------------------------------------|
//! | `LockedAccess`  | every operation under an embedded `SpinLock`    |
//! | `RawAccess`     | no locking; the list is not `Sync`              |
//! | `Counting`      | maintains `count()`, push returns the new count |
//! | `NonCounting`   | no count, push returns 0                        |
//!
//! ```
//! use core::ptr::NonNull;
//! use wdmkit::list::{IntrusiveList, ListEntry};
//!
//! struct Request {
//!     id: u32,
//!     link: ListEntry,
//! }
//! wdmkit::impl_linked!(Request, link);
//!
//! let first = Request { id: 1, link: ListEntry::new() };
//! let queue: IntrusiveList<Request> = IntrusiveList::new();
//!
//! // SAFETY: `first` outlives its time on the list and is not moved.
//! unsafe { queue.push_back(NonNull::from(&first)) };
//! assert_eq!(queue.count(), 1);
//!
//! let popped = queue.pop().unwrap();
//! assert_eq!(unsafe { popped.as_ref() }.id, 1);
//! assert!(queue.is_empty());
//! ```

pub mod entry;
pub mod intrusive;
pub mod policy;

pub use entry::{Linked, ListEntry};
pub use intrusive::IntrusiveList;
pub use policy::{
    AccessStrategy, Counting, CountingStrategy, LockedAccess, NonCounting, RawAccess, SharedAccess,
};
