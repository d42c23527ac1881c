//! Fatal system faults.
//!
//! A bug check is how contract violations end: broken locking discipline,
//! waiting at raised IRQL, touching pageable memory at DISPATCH. Nothing
//! above this layer catches or translates them. The stop line goes to the
//! console and the calling thread panics.

use core::fmt;

use crate::console;

/// Stop codes raised by the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BugCheck {
    /// A raise targeted a level below the current one.
    IrqlNotGreaterOrEqual = 0x09,
    /// An operation ran above the highest IRQL it tolerates.
    IrqlNotLessOrEqual = 0x0A,
    /// A spinlock was released by a thread that does not hold it.
    SpinLockNotOwned = 0x10,
    /// A pool request was malformed.
    BadPoolCaller = 0xC2,
}

impl BugCheck {
    /// Raw stop code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BugCheck::IrqlNotGreaterOrEqual => "IRQL_NOT_GREATER_OR_EQUAL",
            BugCheck::IrqlNotLessOrEqual => "IRQL_NOT_LESS_OR_EQUAL",
            BugCheck::SpinLockNotOwned => "SPIN_LOCK_NOT_OWNED",
            BugCheck::BadPoolCaller => "BAD_POOL_CALLER",
        }
    }
}

impl fmt::Display for BugCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x} {}", self.code(), self.as_str())
    }
}

/// Stops the calling thread with `code`.
#[cold]
#[track_caller]
pub fn bug_check(code: BugCheck, detail: fmt::Arguments<'_>) -> ! {
    console::write_fmt(format_args!("\x1b[1;31m*** STOP {}: {}\x1b[0m\n", code, detail));
    panic!("*** STOP {}: {}", code, detail)
}
