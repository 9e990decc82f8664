//! Byte-to-line assembly shared by both serial links.
//!
//! Serial receive paths hand bytes to a [`LineReceiver`], which accumulates
//! them into a bounded buffer and emits at most one completed line per
//! invocation. The modem and GPS links each own an instance; neither ever
//! observes a partial line.

use heapless::String;

/// Source of buffered serial bytes, typically a UART receive FIFO.
pub trait ByteSource {
    /// Removes and returns the next buffered byte, if any.
    fn poll_byte(&mut self) -> Option<u8>;
}

impl<I> ByteSource for I
where
    I: Iterator<Item = u8>,
{
    fn poll_byte(&mut self) -> Option<u8> {
        self.next()
    }
}

/// One completed line handed to the owning subsystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line<const CAP: usize> {
    text: String<CAP>,
    truncated: bool,
}

impl<const CAP: usize> Line<CAP> {
    /// Text of the line, terminator stripped.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `true` when bytes were dropped because the line outgrew the buffer.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Accumulates serial bytes into terminator-delimited lines.
///
/// `CAP` bounds the stored text. An overlong line is truncated rather than
/// wrapped: surplus bytes are dropped, the line stays logically non-empty,
/// and the eventual [`Line`] reports the loss via [`Line::is_truncated`].
#[derive(Debug, Default)]
pub struct LineReceiver<const CAP: usize> {
    buffer: String<CAP>,
    pending: bool,
    truncated: bool,
}

impl<const CAP: usize> LineReceiver<CAP> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
            pending: false,
            truncated: false,
        }
    }

    /// Feeds a single byte, returning a completed line when `byte`
    /// terminates one.
    ///
    /// `\n` and `\r` both terminate; a terminator arriving on an empty
    /// buffer is ignored, which collapses CR+LF pairs into a single line.
    /// Both links speak 7-bit ASCII, so non-ASCII bytes are treated as
    /// lost data rather than stored.
    pub fn push(&mut self, byte: u8) -> Option<Line<CAP>> {
        if byte == b'\n' || byte == b'\r' {
            if !self.pending {
                return None;
            }
            let text = core::mem::take(&mut self.buffer);
            let truncated = self.truncated;
            self.pending = false;
            self.truncated = false;
            return Some(Line { text, truncated });
        }

        self.pending = true;
        if byte.is_ascii() && self.buffer.push(byte as char).is_ok() {
            return None;
        }
        self.truncated = true;
        None
    }

    /// Drains `source` until the first completed line, leaving any further
    /// buffered bytes for the next call.
    pub fn feed<S: ByteSource>(&mut self, source: &mut S) -> Option<Line<CAP>> {
        while let Some(byte) = source.poll_byte() {
            if let Some(line) = self.push(byte) {
                return Some(line);
            }
        }
        None
    }

    /// `true` when bytes are buffered toward an unfinished line.
    #[must_use]
    pub const fn has_partial(&self) -> bool {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_lines<const CAP: usize>(input: &[u8]) -> heapless::Vec<Line<CAP>, 8> {
        let mut receiver = LineReceiver::<CAP>::new();
        let mut lines = heapless::Vec::new();
        for &byte in input {
            if let Some(line) = receiver.push(byte) {
                lines.push(line).unwrap();
            }
        }
        lines
    }

    #[test]
    fn crlf_collapses_to_one_line() {
        let lines = collect_lines::<32>(b"OK\r\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_str(), "OK");
        assert!(!lines[0].is_truncated());
    }

    #[test]
    fn bare_terminators_are_ignored() {
        let lines = collect_lines::<32>(b"\r\n\r\nOK\n\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_str(), "OK");
    }

    #[test]
    fn overflow_truncates_and_flags() {
        let lines = collect_lines::<4>(b"ABCDEFG\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_str(), "ABCD");
        assert!(lines[0].is_truncated());
    }

    #[test]
    fn truncation_flag_resets_for_next_line() {
        let lines = collect_lines::<4>(b"ABCDEFG\nOK\n");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].is_truncated());
        assert_eq!(lines[1].as_str(), "OK");
        assert!(!lines[1].is_truncated());
    }

    #[test]
    fn dropped_bytes_keep_line_nonempty() {
        // Every byte of the line is dropped, yet the terminator still
        // completes a (truncated, empty) line instead of being ignored.
        let mut receiver = LineReceiver::<4>::new();
        for _ in 0..10 {
            assert!(receiver.push(0xFF).is_none());
        }
        let line = receiver.push(b'\n').unwrap();
        assert_eq!(line.as_str(), "");
        assert!(line.is_truncated());
    }

    #[test]
    fn feed_returns_after_first_line() {
        let mut receiver = LineReceiver::<32>::new();
        let mut source = b"first\r\nsecond\r\n".iter().copied();

        let first = receiver.feed(&mut source).unwrap();
        assert_eq!(first.as_str(), "first");

        let second = receiver.feed(&mut source).unwrap();
        assert_eq!(second.as_str(), "second");

        assert!(receiver.feed(&mut source).is_none());
        assert!(!receiver.has_partial());
    }

    #[test]
    fn partial_line_survives_between_feeds() {
        let mut receiver = LineReceiver::<32>::new();
        let mut head = b"+CER".iter().copied();
        assert!(receiver.feed(&mut head).is_none());
        assert!(receiver.has_partial());

        let mut tail = b"EG: 5\r\n".iter().copied();
        let line = receiver.feed(&mut tail).unwrap();
        assert_eq!(line.as_str(), "+CEREG: 5");
    }
}
