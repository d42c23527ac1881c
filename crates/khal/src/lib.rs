//! Hardware Abstraction Layer.
//!
//! The platform services the driver core runs on: interrupt request
//! levels, thread alerts and blocking, the system clock, fatal faults and
//! the debug console. This implementation models them in-process so the
//! core can run under a hosted test harness.

pub mod bugcheck;
pub mod console;
pub mod irql;
pub mod thread;
pub mod time;

pub use bugcheck::{bug_check, BugCheck};
pub use irql::Irql;
pub use thread::ThreadHandle;
