//! Kernel logging subsystem.
//!
//! Level-filtered macros that write to the platform console. Records sent
//! through the `log` facade land in the same sink once [`init`] has run.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

mod bridge;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => " INFO",
            Level::Warn => " WARN",
            Level::Error => "ERROR",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Level::Trace => "\x1b[90m", // Gray
            Level::Debug => "\x1b[36m", // Cyan
            Level::Info => "\x1b[32m",  // Green
            Level::Warn => "\x1b[33m",  // Yellow
            Level::Error => "\x1b[31m", // Red
        }
    }

    const fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            _ => Level::Error,
        }
    }
}

#[cfg(feature = "verbose")]
const DEFAULT_LEVEL: Level = Level::Trace;
#[cfg(not(feature = "verbose"))]
const DEFAULT_LEVEL: Level = Level::Info;

/// Least severe level that is still emitted.
static MAX_LEVEL: AtomicU8 = AtomicU8::new(DEFAULT_LEVEL as u8);

/// Initialize the kernel logger (sets up the console and the `log` bridge)
pub fn init() {
    khal::console::init();
    bridge::install(max_level());
}

/// Change the least severe level that is emitted.
pub fn set_max_level(level: Level) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
    bridge::sync_filter(level);
}

/// Least severe level that is currently emitted.
pub fn max_level() -> Level {
    Level::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

/// Whether a record at `level` would be emitted.
#[inline]
pub fn enabled(level: Level) -> bool {
    level >= max_level()
}

/// Log a message with a specific level
pub fn log(level: Level, args: fmt::Arguments) {
    if !enabled(level) {
        return;
    }
    khal::console::write_fmt(format_args!(
        "{}[{}]\x1b[0m {}\n",
        level.color(),
        level.as_str(),
        args
    ));
}

/// Print to the console without formatting
pub fn print(args: fmt::Arguments) {
    khal::console::write_fmt(args);
}

/// Log at TRACE level
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Trace, format_args!($($arg)*))
    };
}

/// Log at DEBUG level
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Debug, format_args!($($arg)*))
    };
}

/// Log at INFO level
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Info, format_args!($($arg)*))
    };
}

/// Log at WARN level
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Warn, format_args!($($arg)*))
    };
}

/// Log at ERROR level
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Error, format_args!($($arg)*))
    };
}

/// Print without newline
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::print(format_args!($($arg)*))
    };
}

/// Print with newline
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => {{
        $crate::print(format_args!($($arg)*));
        $crate::print(format_args!("\n"));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_by_severity() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Warn < Level::Error);
        for level in [Level::Trace, Level::Debug, Level::Info, Level::Warn, Level::Error] {
            assert_eq!(Level::from_u8(level as u8), level);
        }
    }

    // One test owns the global filter and the console capture.
    #[test]
    fn filter_and_bridge_share_the_console() {
        init();
        set_max_level(Level::Warn);
        assert!(!enabled(Level::Info));
        assert!(enabled(Level::Error));

        khal::console::start_capture();
        crate::info!("suppressed {}", 1);
        crate::warn!("pool {} exhausted", "SUHR");
        ::log::error!("bridged {}", 42);
        ::log::debug!("filtered by bridge");
        let out = khal::console::take_capture();

        assert!(!out.contains("suppressed"));
        assert!(out.contains("[ WARN]\x1b[0m pool SUHR exhausted"));
        assert!(out.contains("bridged 42"));
        assert!(!out.contains("filtered by bridge"));

        set_max_level(DEFAULT_LEVEL);
    }
}
