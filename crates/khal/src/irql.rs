//! Interrupt request level (IRQL).
//!
//! Each processor runs at an IRQL. Raising it masks every interrupt source
//! at or below the new level, which is how spinlock holders keep competing
//! code paths off their processor. While a thread runs above `Apc` it must
//! not block, wait or touch pageable memory.
//!
//! The level is tracked per thread. A thread that raises must lower back to
//! the exact level it saved, in LIFO order with any nested raises.

use core::cell::Cell;
use core::fmt;

use crate::bugcheck::{bug_check, BugCheck};

/// An interrupt request level. Ordering follows masking strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Irql {
    /// Normal thread execution. Everything is allowed.
    Passive = 0,
    /// Asynchronous procedure calls are masked.
    Apc = 1,
    /// Thread dispatching is masked. Spinlocks are held at this level.
    Dispatch = 2,
    /// Everything is masked.
    High = 15,
}

impl Irql {
    /// Raw numeric level.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Irql::Passive => "PASSIVE_LEVEL",
            Irql::Apc => "APC_LEVEL",
            Irql::Dispatch => "DISPATCH_LEVEL",
            Irql::High => "HIGH_LEVEL",
        }
    }
}

impl fmt::Display for Irql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

thread_local! {
    static CURRENT: Cell<Irql> = const { Cell::new(Irql::Passive) };
}

/// Returns the IRQL of the calling thread.
#[inline]
pub fn current() -> Irql {
    CURRENT.with(Cell::get)
}

/// Raises the calling thread to `new` and returns the level it ran at.
///
/// Raising to a level below the current one is a fatal fault.
pub fn raise(new: Irql) -> Irql {
    let old = current();
    if new < old {
        bug_check(
            BugCheck::IrqlNotGreaterOrEqual,
            format_args!("raise to {} from {}", new, old),
        );
    }
    CURRENT.with(|level| level.set(new));
    old
}

/// Shorthand for `raise(Irql::Dispatch)`.
#[inline]
pub fn raise_to_dispatch() -> Irql {
    raise(Irql::Dispatch)
}

/// Lowers the calling thread back to `new`, normally the value returned by
/// the matching [`raise`].
///
/// Lowering to a level above the current one is a fatal fault.
pub fn lower(new: Irql) {
    let old = current();
    if new > old {
        bug_check(
            BugCheck::IrqlNotLessOrEqual,
            format_args!("lower to {} from {}", new, old),
        );
    }
    CURRENT.with(|level| level.set(new));
}

/// Bug-checks unless the calling thread runs at `max` or below.
///
/// `operation` names the caller in the stop message.
pub fn require_at_most(max: Irql, operation: &str) {
    let level = current();
    if level > max {
        bug_check(
            BugCheck::IrqlNotLessOrEqual,
            format_args!("{} called at {} (limit {})", operation, level, max),
        );
    }
}
