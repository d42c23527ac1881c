//! Waitable event.
//!
//! A two-state dispatcher object. Threads block in [`WaitableEvent::wait`]
//! until the event is signaled, their timeout expires, or (for alertable
//! waits) another thread alerts them.
//!
//! Two kinds exist:
//!   - Notification: stays signaled until [`reset`](WaitableEvent::reset);
//!     every waiter is released.
//!   - Synchronization: releasing one waiter resets it, so each `set` lets
//!     exactly one wait through.
//!
//! Waiting blocks, so it is only legal at APC_LEVEL or below. A poll
//! (timeout of zero) never blocks and is allowed up to DISPATCH_LEVEL.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use khal::irql::{self, Irql};
use khal::thread::{self, ThreadHandle};
use khal::time;
use spin::Mutex;

use crate::status::Status;

pub use khal::time::{absolute_timeout, relative_timeout};

/// What a set event does to its waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventKind {
    /// Manual reset; releases all waiters.
    #[default]
    Notification,
    /// Auto reset; releases one waiter per set.
    Synchronization,
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The event was signaled.
    Success,
    /// The timeout expired first.
    Timeout,
    /// An alert was delivered to the waiting thread.
    Alerted,
}

impl WaitStatus {
    /// Platform status equivalent.
    pub const fn status(self) -> Status {
        match self {
            WaitStatus::Success => Status::SUCCESS,
            WaitStatus::Timeout => Status::TIMEOUT,
            WaitStatus::Alerted => Status::ALERTED,
        }
    }
}

impl From<WaitStatus> for Status {
    fn from(status: WaitStatus) -> Self {
        status.status()
    }
}

/// A thread registered in `wait`, in arrival order.
#[derive(Debug)]
struct Waiter {
    thread: ThreadHandle,
    /// Set by `set` under the waiter lock: this wait has been released.
    satisfied: AtomicBool,
}

impl Waiter {
    fn is_satisfied(&self) -> bool {
        self.satisfied.load(Ordering::Acquire)
    }

    fn satisfy(&self) {
        self.satisfied.store(true, Ordering::Release);
        self.thread.wake();
    }
}

/// A binary event threads can wait on.
#[derive(Debug)]
pub struct WaitableEvent {
    kind: EventKind,
    signaled: AtomicBool,
    /// Threads currently blocked in `wait`.
    waiters: Mutex<Vec<Arc<Waiter>>>,
}

impl WaitableEvent {
    /// Creates an event of `kind`, initially signaled if `signaled`.
    pub const fn new(kind: EventKind, signaled: bool) -> Self {
        Self {
            kind,
            signaled: AtomicBool::new(signaled),
            waiters: Mutex::new(Vec::new()),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Signals the event. Returns the previous state.
    ///
    /// Threads already blocked are released at this point, so a `reset`
    /// right after cannot take the signal back from them. A notification
    /// event releases every waiter and stays signaled. A synchronization
    /// event hands itself to the longest waiter and stays not-signaled;
    /// with nobody waiting it stays signaled for the next wait.
    pub fn set(&self) -> bool {
        let waiters = self.waiters.lock();
        match self.kind {
            EventKind::Notification => {
                let previous = self.signaled.swap(true, Ordering::AcqRel);
                for waiter in waiters.iter() {
                    waiter.satisfy();
                }
                previous
            }
            EventKind::Synchronization => {
                match waiters.iter().find(|waiter| !waiter.is_satisfied()) {
                    Some(waiter) => {
                        waiter.satisfy();
                        self.signaled.load(Ordering::Acquire)
                    }
                    None => self.signaled.swap(true, Ordering::AcqRel),
                }
            }
        }
    }

    /// Returns the event to not-signaled. Returns the previous state.
    pub fn reset(&self) -> bool {
        self.signaled.swap(false, Ordering::AcqRel)
    }

    /// Current state. Racy snapshot.
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    /// Waits for the event.
    ///
    /// - `with_timeout == false`: waits until signaled (or alerted).
    /// - `with_timeout == true`: `timeout` is in 100 ns units; negative is
    ///   relative to now, positive is an absolute system time, zero polls.
    /// - `alertable`: an alert delivered to this thread ends the wait with
    ///   [`WaitStatus::Alerted`]. A non-alertable wait leaves alerts pending.
    ///
    /// When several outcomes are ready at once, signaled beats alerted beats
    /// timed out.
    ///
    /// Blocking above APC_LEVEL (including under a spinlock or inside a
    /// locked list callback) is bug-checked. Polls are allowed up to
    /// DISPATCH_LEVEL.
    pub fn wait(&self, with_timeout: bool, timeout: i64, alertable: bool) -> WaitStatus {
        let poll = with_timeout && time::is_poll(timeout);
        let limit = if poll { Irql::Dispatch } else { Irql::Apc };
        irql::require_at_most(limit, "WaitableEvent::wait");

        let me = thread::current();
        if let Some(status) = self.check(&me, alertable) {
            return status;
        }
        if poll {
            return WaitStatus::Timeout;
        }

        let deadline = if with_timeout { time::deadline(timeout) } else { None };
        let waiter = Arc::new(Waiter {
            thread: me.clone(),
            satisfied: AtomicBool::new(false),
        });
        self.waiters.lock().push(Arc::clone(&waiter));

        let mut took_signal = false;
        let mut status = loop {
            // Registered before checking, so a `set` racing with us either
            // shows up here or wakes the block below.
            if waiter.is_satisfied() {
                break WaitStatus::Success;
            }
            if let Some(status) = self.check(&me, alertable) {
                took_signal = status == WaitStatus::Success;
                break status;
            }
            if deadline.is_some_and(time::has_expired) {
                break WaitStatus::Timeout;
            }
            thread::block(deadline);
        };

        // Once unregistered, `set` can no longer pick us.
        if self.remove_waiter(&waiter) {
            if took_signal && self.kind == EventKind::Synchronization {
                // Released twice: by the flag and by a `set`. Pass one on.
                self.set();
            } else if status == WaitStatus::Alerted {
                // The signal wins; the alert stays pending.
                me.alert();
            }
            status = WaitStatus::Success;
        }
        if status != WaitStatus::Success {
            klog::trace!("event wait on thread {} ended: {:?}", me.id(), status);
        }
        status
    }

    /// Consumes the signal or a pending alert, in that order of precedence.
    fn check(&self, me: &ThreadHandle, alertable: bool) -> Option<WaitStatus> {
        if self.try_acquire() {
            Some(WaitStatus::Success)
        } else if alertable && me.take_alert() {
            Some(WaitStatus::Alerted)
        } else {
            None
        }
    }

    fn try_acquire(&self) -> bool {
        match self.kind {
            EventKind::Notification => self.signaled.load(Ordering::Acquire),
            EventKind::Synchronization => self
                .signaled
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
        }
    }

    /// Unregisters `waiter`. Returns whether `set` released it.
    fn remove_waiter(&self, waiter: &Arc<Waiter>) -> bool {
        let mut waiters = self.waiters.lock();
        if let Some(index) = waiters.iter().position(|w| Arc::ptr_eq(w, waiter)) {
            // Keeps arrival order for synchronization hand-off.
            waiters.remove(index);
        }
        waiter.is_satisfied()
    }

    #[cfg(test)]
    fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }
}

impl Default for WaitableEvent {
    fn default() -> Self {
        Self::new(EventKind::Notification, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[test]
    fn signaled_notification_event_releases_every_wait() {
        let event = WaitableEvent::new(EventKind::Notification, true);
        assert_eq!(event.wait(false, 0, false), WaitStatus::Success);
        assert_eq!(event.wait(true, 0, false), WaitStatus::Success);
        assert!(event.is_signaled());
    }

    #[test]
    fn synchronization_event_resets_after_one_wait() {
        let event = WaitableEvent::new(EventKind::Synchronization, false);
        assert!(!event.set());
        assert_eq!(event.wait(true, 0, false), WaitStatus::Success);
        assert!(!event.is_signaled());
        assert_eq!(event.wait(true, 0, false), WaitStatus::Timeout);
    }

    #[test]
    fn set_and_reset_report_previous_state() {
        let event = WaitableEvent::default();
        assert_eq!(event.kind(), EventKind::Notification);
        assert!(!event.set());
        assert!(event.set());
        assert!(event.reset());
        assert!(!event.reset());
    }

    #[test]
    fn poll_on_clear_event_times_out_at_dispatch() {
        let event = WaitableEvent::default();
        let previous = irql::raise_to_dispatch();
        let status = event.wait(true, 0, false);
        irql::lower(previous);
        assert_eq!(status, WaitStatus::Timeout);
        assert_eq!(Status::from(status), Status::TIMEOUT);
    }

    #[test]
    fn relative_timeout_expires() {
        let event = WaitableEvent::default();
        let start = std::time::Instant::now();
        let status = event.wait(true, relative_timeout(Duration::from_millis(30)), false);
        assert_eq!(status, WaitStatus::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(event.waiter_count(), 0);
    }

    #[test]
    fn pending_alert_ends_alertable_wait_only() {
        let event = WaitableEvent::default();
        let me = thread::current();
        me.alert();

        // Not alertable: the alert stays pending.
        assert_eq!(event.wait(true, 0, false), WaitStatus::Timeout);
        assert!(me.is_alerted());

        assert_eq!(event.wait(false, 0, true), WaitStatus::Alerted);
        assert!(!me.is_alerted());
        assert_eq!(WaitStatus::Alerted.status(), Status::ALERTED);
    }

    #[test]
    fn signal_takes_precedence_over_alert() {
        let event = WaitableEvent::new(EventKind::Notification, true);
        let me = thread::current();
        me.alert();
        assert_eq!(event.wait(false, 0, true), WaitStatus::Success);
        assert!(me.take_alert());
    }

    fn blocked_waiter(event: &Arc<WaitableEvent>) -> std::thread::JoinHandle<WaitStatus> {
        let worker = {
            let event = Arc::clone(event);
            std::thread::spawn(move || {
                event.wait(true, relative_timeout(Duration::from_secs(5)), false)
            })
        };
        while event.waiter_count() == 0 {
            std::thread::yield_now();
        }
        worker
    }

    #[test]
    fn reset_after_set_cannot_strand_registered_waiter() {
        for kind in [EventKind::Notification, EventKind::Synchronization] {
            let event = Arc::new(WaitableEvent::new(kind, false));
            let worker = blocked_waiter(&event);

            event.set();
            event.reset();

            assert_eq!(worker.join().unwrap(), WaitStatus::Success);
            assert_eq!(event.waiter_count(), 0);
        }
    }

    #[test]
    fn synchronization_set_goes_to_registered_waiter_first() {
        let event = Arc::new(WaitableEvent::new(EventKind::Synchronization, false));
        let worker = blocked_waiter(&event);

        assert!(!event.set());
        assert!(!event.is_signaled());
        assert_eq!(event.wait(true, 0, false), WaitStatus::Timeout);
        assert_eq!(worker.join().unwrap(), WaitStatus::Success);

        // Nobody waiting: the next set stays signaled for one wait.
        assert!(!event.set());
        assert_eq!(event.wait(true, 0, false), WaitStatus::Success);
        assert!(!event.is_signaled());
    }

    #[test]
    #[should_panic(expected = "IRQL_NOT_LESS_OR_EQUAL")]
    fn blocking_wait_at_dispatch_is_fatal() {
        let event = WaitableEvent::default();
        irql::raise_to_dispatch();
        event.wait(true, relative_timeout(Duration::from_millis(1)), false);
    }
}
