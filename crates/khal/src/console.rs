//! Debug console.
//!
//! Stands in for the kernel debugger port. Output goes to the host's
//! standard error, one complete write per lock hold so that lines from
//! different threads never interleave. A capture buffer can be switched on
//! to collect output instead, which is how the logger is tested.

use core::fmt;
use std::string::String;

use spin::Mutex;

/// Console driver state.
pub struct Console {
    initialized: bool,
    capture: Option<String>,
}

impl Console {
    /// Create a new uninitialized console.
    const fn new() -> Self {
        Self {
            initialized: false,
            capture: None,
        }
    }

    /// Mark the console ready for output.
    pub fn init(&mut self) {
        self.initialized = true;
    }

    /// Write a string to the console.
    pub fn write_str(&mut self, s: &str) {
        match self.capture.as_mut() {
            Some(buffer) => buffer.push_str(s),
            None => std::eprint!("{}", s),
        }
    }
}

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Console::write_str(self, s);
        Ok(())
    }
}

/// Global console instance.
static CONSOLE: Mutex<Console> = Mutex::new(Console::new());

/// Initialize the global console.
pub fn init() {
    let mut console = CONSOLE.lock();
    if !console.initialized {
        console.init();
    }
}

/// Returns whether [`init`] has run.
pub fn is_initialized() -> bool {
    CONSOLE.lock().initialized
}

/// Write a string to the console.
pub fn write_str(s: &str) {
    CONSOLE.lock().write_str(s);
}

/// Write formatted arguments to the console.
pub fn write_fmt(args: fmt::Arguments<'_>) {
    use fmt::Write;
    // Console::write_str never fails.
    let _ = CONSOLE.lock().write_fmt(args);
}

/// Redirect console output into a buffer until [`take_capture`].
pub fn start_capture() {
    CONSOLE.lock().capture = Some(String::new());
}

/// Stop capturing and return everything written since [`start_capture`].
pub fn take_capture() -> String {
    CONSOLE.lock().capture.take().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_collects_formatted_output() {
        init();
        assert!(is_initialized());

        start_capture();
        write_str("alpha ");
        write_fmt(format_args!("{}-{:02}", "beta", 7));
        let captured = take_capture();

        assert!(captured.contains("alpha beta-07"));
        assert!(take_capture().is_empty());
    }
}
