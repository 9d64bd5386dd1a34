//! Truncation-safe formatting into fixed-size byte buffers.
//!
//! Everything that renders diagnostics into caller-supplied memory goes
//! through [`format_bounded`] (or the [`format_bounded!`] macro), which
//! follows the classic `snprintf` contract but cannot overrun:
//!
//! - The capacity `n` is the length of the destination slice. Pass
//!   `&mut storage[..n]` to declare a smaller capacity than the storage has.
//! - The output is always NUL-terminated when `n > 0`, so at most `n - 1`
//!   content bytes are written.
//! - Nothing is ever written at an index `>= n`.
//!
//! ```
//! use flow_context::{FormatError, format_bounded};
//!
//! let mut buf = [0xFFu8; 8];
//! assert_eq!(format_bounded!(&mut buf[..6], "hello"), Ok(5));
//! assert_eq!(&buf[..6], b"hello\0");
//! assert_eq!(buf[6], 0xFF);
//!
//! assert_eq!(
//!     format_bounded!(&mut buf[..3], "hello"),
//!     Err(FormatError::Truncated { written: 2 })
//! );
//! assert_eq!(&buf[..3], b"he\0");
//! ```
//!
//! [`format_bounded!`]: crate::format_bounded

use alloc::string::String;
use core::fmt::{self, Write};

/// Why [`format_bounded`] could not produce the complete output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The destination had no room at all, not even for the terminator.
    /// Nothing was written.
    #[error("destination buffer has zero capacity")]
    ZeroCapacity,
    /// The output did not fit. The buffer holds the first `written` bytes
    /// followed by a terminator.
    #[error("output truncated to {written} bytes")]
    Truncated {
        /// Number of content bytes written before the terminator
        written: usize,
    },
    /// A formatting trait implementation returned an error part way
    /// through. The buffer holds the `written` bytes produced before that,
    /// followed by a terminator.
    #[error("formatting failed after {written} bytes")]
    Formatting {
        /// Number of content bytes written before the terminator
        written: usize,
    },
}

impl FormatError {
    /// The failure value C callers expect in place of a character count.
    pub const SENTINEL: i64 = -1;

    /// Returns [`FormatError::SENTINEL`].
    ///
    /// Useful when a result must cross a boundary that speaks in
    /// `snprintf`-style return codes.
    #[inline]
    pub const fn as_sentinel(self) -> i64 {
        Self::SENTINEL
    }
}

/// Collapses a formatting result into the `snprintf`-style convention: the
/// number of bytes written, or [`FormatError::SENTINEL`].
#[inline]
pub fn result_as_sentinel(result: Result<usize, FormatError>) -> i64 {
    match result {
        // A slice can never be longer than `isize::MAX`
        Ok(written) => written as i64,
        Err(error) => error.as_sentinel(),
    }
}

/// A [`fmt::Write`] sink over a byte buffer that silently stops once the
/// buffer is full and remembers that it had to.
///
/// The writer reserves the last byte of the buffer for a terminator, which is
/// only written by [`BoundedWriter::finish`].
#[derive(Debug)]
pub struct BoundedWriter<'a> {
    buffer: &'a mut [u8],
    len: usize,
    truncated: bool,
    failed: bool,
}

impl<'a> BoundedWriter<'a> {
    /// Creates a writer that fills `buffer` from the start.
    #[inline]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            len: 0,
            truncated: false,
            failed: false,
        }
    }

    /// Number of content bytes accepted so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no content has been accepted yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if some output has been dropped for lack of space.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Writes the terminator and reports the outcome.
    pub fn finish(self) -> Result<usize, FormatError> {
        let Some(terminator) = self.buffer.get_mut(self.len) else {
            return Err(FormatError::ZeroCapacity);
        };
        *terminator = 0;
        if self.truncated {
            Err(FormatError::Truncated { written: self.len })
        } else if self.failed {
            Err(FormatError::Formatting { written: self.len })
        } else {
            Ok(self.len)
        }
    }

    /// Content bytes still available, leaving room for the terminator.
    #[inline]
    fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(1).saturating_sub(self.len)
    }
}

impl Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let take = bytes.len().min(self.remaining());
        self.buffer[self.len..self.len + take].copy_from_slice(&bytes[..take]);
        self.len += take;
        if take < bytes.len() {
            self.truncated = true;
            // Stop the formatting machinery early; nothing more can fit.
            return Err(fmt::Error);
        }
        Ok(())
    }
}

/// Formats `args` into `buffer` without ever writing past its end.
///
/// On success returns the number of content bytes written (the terminator
/// sits right after them). See the [module documentation](self) for the full
/// contract.
pub fn format_bounded(buffer: &mut [u8], args: fmt::Arguments<'_>) -> Result<usize, FormatError> {
    if buffer.is_empty() {
        return Err(FormatError::ZeroCapacity);
    }
    let mut writer = BoundedWriter::new(buffer);
    // Running out of room is already recorded by the writer.
    if writer.write_fmt(args).is_err() && !writer.is_truncated() {
        writer.failed = true;
    }
    writer.finish()
}

/// Appends `args` to `target` while keeping it at most `max_len` bytes long.
///
/// Output is cut on a character boundary. Returns `true` if anything was
/// dropped. As long as `target` already has `max_len` bytes of capacity this
/// never allocates.
pub(crate) fn write_limited(target: &mut String, max_len: usize, args: fmt::Arguments<'_>) -> bool {
    let mut limited = LimitedString {
        target,
        max_len,
        truncated: false,
    };
    let failed = limited.write_fmt(args).is_err();
    failed || limited.truncated
}

/// [`fmt::Write`] adapter behind [`write_limited`].
struct LimitedString<'a> {
    target: &'a mut String,
    max_len: usize,
    truncated: bool,
}

impl Write for LimitedString<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.max_len.saturating_sub(self.target.len());
        if s.len() <= room {
            self.target.push_str(s);
            return Ok(());
        }
        let mut end = room;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.target.push_str(&s[..end]);
        self.truncated = true;
        Err(fmt::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte_buffer_only_holds_terminator() {
        let mut buf = [3u8, 25];
        assert_eq!(
            format_bounded(&mut buf[..1], format_args!("hello")),
            Err(FormatError::Truncated { written: 0 })
        );
        assert_eq!(buf, [0, 25]);
    }

    #[test]
    fn test_zero_capacity_writes_nothing() {
        let mut buf = [25u8];
        assert_eq!(
            format_bounded(&mut buf[..0], format_args!("hello")),
            Err(FormatError::ZeroCapacity)
        );
        assert_eq!(buf, [25]);
    }

    #[test]
    fn test_insufficient_buffer_truncates() {
        let mut buf = [23u8, 24, 25, 26];
        assert!(format_bounded(&mut buf[..3], format_args!("hello")).is_err());
        assert_eq!(buf, [b'h', b'e', 0, 26]);
    }

    #[test]
    fn test_sufficient_buffer() {
        let mut buf = [0u8; 7];
        buf[6] = 25;
        assert_eq!(format_bounded(&mut buf[..6], format_args!("hello")), Ok(5));
        assert_eq!(buf[5], 0);
        assert_eq!(buf[6], 25);
    }

    #[test]
    fn test_exact_fit_leaves_bytes_after_terminator_alone() {
        let mut buf = [9u8; 10];
        assert_eq!(format_bounded(&mut buf, format_args!("{}-{}", 12, "ab")), Ok(5));
        assert_eq!(&buf[..6], b"12-ab\0");
        assert!(buf[6..].iter().all(|&b| b == 9));
    }

    #[test]
    fn test_every_capacity_respects_contract() {
        let content = "The quick brown fox";
        for n in 0..=content.len() + 3 {
            let mut storage = [0xEEu8; 32];
            let result = format_bounded(&mut storage[..n], format_args!("{content}"));
            if n == 0 {
                assert_eq!(result, Err(FormatError::ZeroCapacity));
                assert!(storage.iter().all(|&b| b == 0xEE));
                continue;
            }
            let k = content.len();
            let written = k.min(n - 1);
            assert_eq!(&storage[..written], &content.as_bytes()[..written]);
            assert_eq!(storage[written], 0);
            assert!(storage[n..].iter().all(|&b| b == 0xEE));
            if k < n {
                assert_eq!(result, Ok(k));
            } else {
                assert_eq!(result, Err(FormatError::Truncated { written }));
            }
        }
    }

    #[test]
    fn test_failing_display_is_not_reported_as_truncation() {
        struct Failing;

        impl fmt::Display for Failing {
            fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
                Err(fmt::Error)
            }
        }

        let mut buf = [0xEEu8; 16];
        assert_eq!(
            format_bounded(&mut buf, format_args!("ab{}cd", Failing)),
            Err(FormatError::Formatting { written: 2 })
        );
        assert_eq!(&buf[..3], b"ab\0");
        assert!(buf[3..].iter().all(|&b| b == 0xEE));

        // Running out of room first still reads as truncation.
        assert_eq!(
            format_bounded(&mut buf[..2], format_args!("ab{}", Failing)),
            Err(FormatError::Truncated { written: 1 })
        );
        assert_eq!(
            result_as_sentinel(Err(FormatError::Formatting { written: 2 })),
            FormatError::SENTINEL
        );
    }

    #[test]
    fn test_sentinel_conversion() {
        assert_eq!(result_as_sentinel(Ok(5)), 5);
        assert_eq!(result_as_sentinel(Err(FormatError::ZeroCapacity)), -1);
        assert_eq!(
            result_as_sentinel(Err(FormatError::Truncated { written: 3 })),
            FormatError::SENTINEL
        );
    }

    #[test]
    fn test_writer_streams_multiple_pieces() {
        let mut buf = [0u8; 8];
        let mut writer = BoundedWriter::new(&mut buf);
        assert!(writer.write_str("abc").is_ok());
        assert!(writer.write_str("defgh").is_err());
        assert!(writer.is_truncated());
        assert_eq!(writer.len(), 7);
        assert_eq!(writer.finish(), Err(FormatError::Truncated { written: 7 }));
        assert_eq!(&buf, b"abcdefg\0");
    }

    #[test]
    fn test_write_limited_cuts_on_char_boundary() {
        let mut s = String::new();
        assert!(write_limited(&mut s, 2, format_args!("a{}b", 'ñ')));
        assert_eq!(s, "a");

        let mut s = String::new();
        assert!(!write_limited(&mut s, 64, format_args!("short")));
        assert_eq!(s, "short");

        let mut s = String::with_capacity(4);
        let capacity = s.capacity();
        assert!(write_limited(&mut s, 4, format_args!("{}", "far too long")));
        assert_eq!(s, "far ");
        assert_eq!(s.capacity(), capacity);
    }
}
