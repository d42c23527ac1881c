//! Adapter from the `log` facade to the kernel console.

use crate::Level;

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl ::log::Log for KernelLogger {
    fn enabled(&self, metadata: &::log::Metadata<'_>) -> bool {
        crate::enabled(from_facade(metadata.level()))
    }

    fn log(&self, record: &::log::Record<'_>) {
        let level = from_facade(record.level());
        if crate::enabled(level) {
            crate::log(level, format_args!("{}: {}", record.target(), record.args()));
        }
    }

    fn flush(&self) {}
}

/// Installs the adapter as the process-wide `log` sink. A logger that was
/// installed earlier (by us or anyone else) is left in place.
pub(crate) fn install(level: Level) {
    if ::log::set_logger(&LOGGER).is_ok() {
        sync_filter(level);
    }
}

/// Mirrors the kernel filter into the facade so disabled records are
/// dropped before they are formatted.
pub(crate) fn sync_filter(level: Level) {
    ::log::set_max_level(to_facade(level).to_level_filter());
}

fn from_facade(level: ::log::Level) -> Level {
    match level {
        ::log::Level::Trace => Level::Trace,
        ::log::Level::Debug => Level::Debug,
        ::log::Level::Info => Level::Info,
        ::log::Level::Warn => Level::Warn,
        ::log::Level::Error => Level::Error,
    }
}

fn to_facade(level: Level) -> ::log::Level {
    match level {
        Level::Trace => ::log::Level::Trace,
        Level::Debug => ::log::Level::Debug,
        Level::Info => ::log::Level::Info,
        Level::Warn => ::log::Level::Warn,
        Level::Error => ::log::Level::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_mapping_round_trips() {
        for level in [Level::Trace, Level::Debug, Level::Info, Level::Warn, Level::Error] {
            assert_eq!(from_facade(to_facade(level)), level);
        }
    }
}
