//! Owned wide-character string.
//!
//! [`OwnedString`] keeps a pool-allocated copy of a NUL-terminated UTF-16
//! input, terminator included, and exposes the counted-string view the
//! platform uses (`length` / `maximum_length` in bytes).

use alloc::string::String;
use core::fmt;
use core::mem::size_of;

use crate::memory::{Pool, PoolBuffer, PoolFlags, NON_PAGED_POOL};
use crate::status::{InputError, Result};

/// Longest content a counted string can describe: its byte length must
/// fit in a `u16` alongside the terminator.
pub const MAX_CHARS: usize = (u16::MAX as usize / size_of::<u16>()) - 1;

/// A wide string owned in a tagged pool.
///
/// Either empty (never created, or destroyed) or holding a buffer with the
/// content followed by one NUL.
pub struct OwnedString<'p> {
    pool: &'p Pool,
    buffer: Option<PoolBuffer<'p, u16>>,
}

impl OwnedString<'static> {
    /// Empty string allocating from [`NON_PAGED_POOL`].
    pub fn new() -> Self {
        Self::new_in(&NON_PAGED_POOL)
    }
}

impl<'p> OwnedString<'p> {
    /// Empty string allocating from `pool`.
    pub const fn new_in(pool: &'p Pool) -> Self {
        Self { pool, buffer: None }
    }

    /// Copies `input` up to and including its first NUL.
    ///
    /// The terminator must lie inside the slice and the content may not
    /// exceed [`MAX_CHARS`]. Input is validated before anything is
    /// allocated. A string that already holds a buffer releases it first,
    /// so on any error the string is left empty.
    pub fn create(&mut self, input: &[u16]) -> Result<()> {
        self.destroy();

        let len = validate(input).inspect_err(|error| {
            klog::debug!("OwnedString::create rejected input: {}", error);
        })?;

        let mut buffer = self
            .pool
            .allocate::<u16>(PoolFlags::NON_PAGED | PoolFlags::UNINITIALIZED, len + 1)?;
        // Capacity is exactly len + 1, so the copy always fits.
        let copied = buffer.extend_from_slice(&input[..=len]);
        debug_assert!(copied);

        self.buffer = Some(buffer);
        Ok(())
    }

    /// Releases the buffer, if any. Calling it again does nothing.
    pub fn destroy(&mut self) {
        self.buffer = None;
    }

    pub fn is_created(&self) -> bool {
        self.buffer.is_some()
    }

    /// Content without the terminator. Empty when not created.
    pub fn as_wide(&self) -> &[u16] {
        match &self.buffer {
            Some(buffer) => &buffer[..buffer.len() - 1],
            None => &[],
        }
    }

    /// Content followed by its NUL, or `None` when not created.
    pub fn as_wide_with_nul(&self) -> Option<&[u16]> {
        self.buffer.as_deref()
    }

    /// Content length in characters.
    pub fn len(&self) -> usize {
        self.as_wide().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer size in characters, terminator included. Zero when not
    /// created.
    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, |buffer| buffer.capacity())
    }

    /// Content length in bytes, as a counted string reports it.
    pub fn length(&self) -> u16 {
        // MAX_CHARS keeps both byte counts within u16.
        (self.len() * size_of::<u16>()) as u16
    }

    /// Buffer size in bytes, as a counted string reports it.
    pub fn maximum_length(&self) -> u16 {
        (self.capacity() * size_of::<u16>()) as u16
    }

    /// Decodes the content, replacing invalid UTF-16 with U+FFFD.
    pub fn to_string_lossy(&self) -> String {
        char::decode_utf16(self.as_wide().iter().copied())
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}

impl Default for OwnedString<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OwnedString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.buffer {
            Some(_) => f
                .debug_struct("OwnedString")
                .field("value", &self.to_string_lossy())
                .field("length", &self.length())
                .field("maximum_length", &self.maximum_length())
                .finish(),
            None => f.write_str("OwnedString(<empty>)"),
        }
    }
}

/// Returns the content length of a NUL-terminated input.
fn validate(input: &[u16]) -> core::result::Result<usize, InputError> {
    let len = input
        .iter()
        .position(|&c| c == 0)
        .ok_or(InputError::MissingTerminator { bound: input.len() })?;
    if len > MAX_CHARS {
        return Err(InputError::TooLong { len, max: MAX_CHARS });
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::PoolTag;
    use crate::status::Error;
    use alloc::vec;
    use alloc::vec::Vec;

    fn wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(Some(0)).collect()
    }

    #[test]
    fn limit_matches_counted_string_maximum() {
        assert_eq!(MAX_CHARS, 32_766);
    }

    #[test]
    fn create_copies_content_and_terminator() {
        let pool = Pool::new(PoolTag::from_literal(*b"1tsT"));
        let mut s = OwnedString::new_in(&pool);
        s.create(&wide("usb\\hub")).unwrap();

        assert!(s.is_created());
        assert_eq!(s.len(), 7);
        assert_eq!(s.capacity(), 8);
        assert_eq!(s.length(), 14);
        assert_eq!(s.maximum_length(), 16);
        assert_eq!(s.to_string_lossy(), "usb\\hub");
        assert_eq!(s.as_wide_with_nul().unwrap().last(), Some(&0));
        assert_eq!(pool.stats().bytes_in_use, 16);
    }

    #[test]
    fn content_stops_at_first_nul() {
        let mut s = OwnedString::new();
        s.create(&[b'a' as u16, 0, b'b' as u16, 0]).unwrap();
        assert_eq!(s.as_wide(), &[b'a' as u16]);
        assert_eq!(s.capacity(), 2);
    }

    #[test]
    fn empty_input_still_holds_terminator() {
        let mut s = OwnedString::new();
        s.create(&[0]).unwrap();
        assert!(s.is_created());
        assert!(s.is_empty());
        assert_eq!(s.maximum_length(), 2);
    }

    #[test]
    fn unterminated_input_is_rejected_before_allocating() {
        let pool = Pool::new(PoolTag::from_literal(*b"2tsT"));
        let mut s = OwnedString::new_in(&pool);
        let err = s.create(&[b'x' as u16; 4]).unwrap_err();
        assert_eq!(err, Error::InvalidInput(InputError::MissingTerminator { bound: 4 }));
        assert!(!s.is_created());
        assert_eq!(pool.stats().outstanding, 0);
        assert_eq!(pool.stats().failures, 0);
    }

    #[test]
    fn overlong_input_is_rejected() {
        let mut input = vec![b'x' as u16; MAX_CHARS + 1];
        input.push(0);
        let mut s = OwnedString::new();
        let err = s.create(&input).unwrap_err();
        assert_eq!(err, Error::InvalidInput(InputError::TooLong { len: MAX_CHARS + 1, max: MAX_CHARS }));

        input.remove(0);
        s.create(&input).unwrap();
        assert_eq!(s.length(), 65_532);
        assert_eq!(s.maximum_length(), 65_534);
    }

    #[test]
    fn recreate_releases_previous_buffer() {
        let pool = Pool::new(PoolTag::from_literal(*b"3tsT"));
        let mut s = OwnedString::new_in(&pool);
        s.create(&wide("first")).unwrap();
        s.create(&wide("2nd")).unwrap();
        assert_eq!(s.to_string_lossy(), "2nd");
        assert_eq!(pool.stats().outstanding, 1);

        // A failed create leaves the string empty, not holding the old value.
        assert!(s.create(&[b'x' as u16]).is_err());
        assert!(!s.is_created());
        assert_eq!(pool.stats().outstanding, 0);
    }

    #[test]
    fn drop_returns_buffer_to_pool() {
        let pool = Pool::new(PoolTag::from_literal(*b"4tsT"));
        {
            let mut s = OwnedString::new_in(&pool);
            s.create(&wide("gone")).unwrap();
            assert_eq!(pool.stats().outstanding, 1);
        }
        assert_eq!(pool.stats().outstanding, 0);
        assert_eq!(pool.stats().bytes_in_use, 0);
    }

    #[test]
    fn lossy_decoding_replaces_lone_surrogates() {
        let mut s = OwnedString::new();
        s.create(&[0xD800, b'a' as u16, 0]).unwrap();
        assert_eq!(s.to_string_lossy(), "\u{FFFD}a");
    }

    #[test]
    fn debug_output() {
        let mut s = OwnedString::new();
        assert_eq!(alloc::format!("{:?}", s), "OwnedString(<empty>)");
        s.create(&wide("ab")).unwrap();
        assert_eq!(
            alloc::format!("{:?}", s),
            "OwnedString { value: \"ab\", length: 4, maximum_length: 6 }"
        );
    }
}
