//! System time and wait timeouts.
//!
//! Times are counted in 100 ns ticks. System time starts at 1601-01-01 UTC.
//! A wait timeout is a signed tick count:
//!   - negative: relative interval from now
//!   - positive: absolute system time
//!   - zero:     poll, never block

use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

pub use std::time::Instant;

/// Ticks per second (100 ns resolution).
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Nanoseconds per tick.
const NANOS_PER_TICK: u64 = 100;

/// Seconds between 1601-01-01 and 1970-01-01.
const EPOCH_DELTA_SECONDS: i64 = 11_644_473_600;

/// Current system time in ticks since 1601-01-01 UTC.
pub fn system_time() -> i64 {
    let since_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    let unix_ticks = (since_unix.as_nanos() / NANOS_PER_TICK as u128) as i64;
    unix_ticks.saturating_add(EPOCH_DELTA_SECONDS * TICKS_PER_SECOND)
}

/// Converts a duration to ticks, saturating at `i64::MAX`.
pub fn to_ticks(duration: Duration) -> i64 {
    let ticks = duration.as_nanos() / NANOS_PER_TICK as u128;
    i64::try_from(ticks).unwrap_or(i64::MAX)
}

/// Relative timeout for `duration`, in wait-timeout encoding.
pub fn relative_timeout(duration: Duration) -> i64 {
    -to_ticks(duration)
}

/// Absolute timeout `duration` from now, in wait-timeout encoding.
pub fn absolute_timeout(duration: Duration) -> i64 {
    system_time().saturating_add(to_ticks(duration)).max(1)
}

/// Returns whether `timeout` asks for a poll rather than a wait.
#[inline]
pub fn is_poll(timeout: i64) -> bool {
    timeout == 0
}

/// Resolves a wait timeout to the instant it expires.
///
/// `None` means the expiry lies beyond what the host clock can represent;
/// callers treat it as an unbounded wait.
pub fn deadline(timeout: i64) -> Option<Instant> {
    let now = Instant::now();
    match timeout {
        0 => Some(now),
        t if t < 0 => now.checked_add(ticks_to_duration(t.unsigned_abs())),
        t => {
            let remaining = t.saturating_sub(system_time());
            if remaining <= 0 {
                Some(now)
            } else {
                now.checked_add(ticks_to_duration(remaining as u64))
            }
        }
    }
}

/// Returns whether `deadline` has passed.
#[inline]
pub fn has_expired(deadline: Instant) -> bool {
    Instant::now() >= deadline
}

fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_nanos(ticks.saturating_mul(NANOS_PER_TICK))
}
