// =============================================================================
// WdmKit: Synchronization Primitives
// =============================================================================
//
// Driver code can't use std::sync. These primitives follow the platform's
// IRQL rules instead:
//
//   SpinLock        acquire raises to DISPATCH_LEVEL, release restores
//   ScopedLock      releases any `Lock` on every exit path
//   RefCounter      atomic, never destroys anything by itself
//   WaitableEvent   blocks, so only at APC_LEVEL or below
//
// NEVER wait on an event while holding a spinlock. The IRQL check turns
// that mistake into an immediate bug check instead of a hang.
// =============================================================================

pub mod event;
pub mod refcount;
pub mod scoped;
pub mod spinlock;

pub use event::{EventKind, WaitStatus, WaitableEvent};
pub use refcount::RefCounter;
pub use scoped::{Lock, ScopedLock, SpinLocker};
pub use spinlock::SpinLock;
