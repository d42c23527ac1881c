// =============================================================================
// WdmKit: Status Codes and Errors
// =============================================================================
//
// Two layers:
//   - `Status` is the raw 32-bit platform status code that crosses the
//     driver boundary. Bits 31..30 carry severity: 00 success,
//     01 informational, 10 warning, 11 error. Anything below 0x8000_0000
//     counts as success.
//   - `Error` is the closed set of recoverable failures this core returns.
//     Every variant maps to exactly one `Status`.
//
// Contract violations (bad lock discipline, waiting at raised IRQL) are
// NOT errors. They end in a bug check.
// =============================================================================

use core::fmt;

/// A platform status code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(u32);

impl Status {
    pub const SUCCESS: Status = Status(0x0000_0000);
    pub const ALERTED: Status = Status(0x0000_0101);
    pub const TIMEOUT: Status = Status(0x0000_0102);
    pub const INVALID_PARAMETER: Status = Status(0xC000_000D);
    pub const INSUFFICIENT_RESOURCES: Status = Status(0xC000_009A);

    /// Wraps a raw status value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw status value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `NT_SUCCESS`: success and informational codes.
    pub const fn is_success(self) -> bool {
        self.0 < 0x8000_0000
    }

    /// Error severity (bits 31..30 both set).
    pub const fn is_error(self) -> bool {
        self.0 >> 30 == 0b11
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Status::SUCCESS => "STATUS_SUCCESS",
            Status::ALERTED => "STATUS_ALERTED",
            Status::TIMEOUT => "STATUS_TIMEOUT",
            Status::INVALID_PARAMETER => "STATUS_INVALID_PARAMETER",
            Status::INSUFFICIENT_RESOURCES => "STATUS_INSUFFICIENT_RESOURCES",
            _ => return None,
        })
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({:#010x})", name, self.0),
            None => write!(f, "Status({:#010x})", self.0),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

/// Why an input string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// No NUL terminator inside the supplied bounds.
    #[error("string is not NUL-terminated within {bound} characters")]
    MissingTerminator { bound: usize },
    /// More characters than a counted string can describe.
    #[error("string of {len} characters exceeds the limit of {max}")]
    TooLong { len: usize, max: usize },
}

/// Recoverable failures returned by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The pool could not satisfy an allocation.
    #[error("insufficient pool resources")]
    ResourceExhausted,
    /// The caller passed malformed input.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
}

impl Error {
    /// Platform status equivalent.
    pub const fn status(self) -> Status {
        match self {
            Error::ResourceExhausted => Status::INSUFFICIENT_RESOURCES,
            Error::InvalidInput(_) => Status::INVALID_PARAMETER,
        }
    }
}

impl From<Error> for Status {
    fn from(error: Error) -> Self {
        error.status()
    }
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;
