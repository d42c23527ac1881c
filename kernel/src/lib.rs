// =============================================================================
// WdmKit: Driver Core Library
// =============================================================================
//
// The primitives every driver subsystem in this tree is built from. Nothing
// here talks to hardware; platform services (IRQL, thread alerts, clock,
// bug checks, console) come from `khal`.
//
// WHAT LIVES WHERE:
//   sync    → SpinLock, ScopedLock, RefCounter, WaitableEvent
//   list    → IntrusiveList and its locking/counting policies
//   memory  → tagged, accounted pool allocation
//   string  → OwnedString, a pool copy of a NUL-terminated wide input
//   status  → platform status codes and the crate error type
//
// IRQL RULES (enforced by bug checks, not by error values):
//   - Holding a SpinLock runs the holder at DISPATCH_LEVEL.
//   - WaitableEvent::wait blocks, so it needs APC_LEVEL or below.
//   - Paged pool needs APC_LEVEL or below.
//   Waiting under a spinlock, or inside a callback of a locked list, is
//   therefore always fatal.
//
// =============================================================================

// =============================================================================
// Crate-level attributes
// =============================================================================
//
// #![no_std]: the code runs where no operating system services exist
//   beyond what `khal` provides. We use `core` and `alloc` only.
//
// Unit tests run on the host and pull in `std` for threads and formatting.
// =============================================================================

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

// =============================================================================
// Module declarations
// =============================================================================

/// Intrusive lists and their policies.
pub mod list;

/// Tagged pool allocation.
pub mod memory;

/// Platform status codes and the crate error type.
pub mod status;

/// Owned wide strings.
pub mod string;

/// Synchronization primitives.
pub mod sync;

// =============================================================================
// Re-exports
// =============================================================================

pub use list::{IntrusiveList, Linked, ListEntry, LockedAccess, RawAccess, Counting, NonCounting};
pub use memory::{Pool, PoolFlags, PoolTag, NON_PAGED_POOL, WDMKIT_POOL_TAG};
pub use status::{Error, InputError, Result, Status};
pub use string::OwnedString;
pub use sync::{
    EventKind, Lock, RefCounter, ScopedLock, SpinLock, SpinLocker, WaitStatus, WaitableEvent,
};
