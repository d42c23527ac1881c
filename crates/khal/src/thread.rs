//! Kernel thread objects.
//!
//! A thread can be alerted by any other thread holding its handle. The
//! alert stays pending until an alertable wait consumes it, so an alert
//! sent before the target starts waiting is not lost. Blocking is built on
//! host parking: a wake-up delivered before the target blocks makes the
//! next block return at once.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::Instant;

/// Source of thread ids. Ids are never reused.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct KThread {
    id: u64,
    alerted: AtomicBool,
    thread: Thread,
}

/// Shared handle to a kernel thread.
#[derive(Clone)]
pub struct ThreadHandle {
    inner: Arc<KThread>,
}

thread_local! {
    static CURRENT: ThreadHandle = ThreadHandle {
        inner: Arc::new(KThread {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            alerted: AtomicBool::new(false),
            thread: thread::current(),
        }),
    };
}

/// Returns the handle of the calling thread.
pub fn current() -> ThreadHandle {
    CURRENT.with(ThreadHandle::clone)
}

impl ThreadHandle {
    /// Unique id of this thread.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Delivers an alert and wakes the thread if it is blocked.
    ///
    /// Returns whether an alert was already pending.
    pub fn alert(&self) -> bool {
        let was_pending = self.inner.alerted.swap(true, Ordering::AcqRel);
        self.inner.thread.unpark();
        was_pending
    }

    /// Returns whether an alert is pending, without consuming it.
    pub fn is_alerted(&self) -> bool {
        self.inner.alerted.load(Ordering::Acquire)
    }

    /// Consumes a pending alert. Returns whether one was pending.
    pub fn take_alert(&self) -> bool {
        self.inner.alerted.swap(false, Ordering::AcqRel)
    }

    /// Wakes the thread if it is blocked in [`block`].
    pub fn wake(&self) {
        self.inner.thread.unpark();
    }

    /// Returns whether both handles name the same thread.
    pub fn same_thread(&self, other: &ThreadHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl core::fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.inner.id)
            .field("alerted", &self.is_alerted())
            .finish()
    }
}

/// Blocks the calling thread until it is woken or `deadline` passes.
///
/// May return early for no reason; callers re-check their condition.
pub fn block(deadline: Option<Instant>) {
    match deadline {
        None => thread::park(),
        Some(at) => {
            let now = Instant::now();
            if at > now {
                thread::park_timeout(at - now);
            }
        }
    }
}
