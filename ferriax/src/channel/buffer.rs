//! Pattern buffer with output normalization and tail-search optimization.
//!
//! Only the last N bytes of the buffer are searched for patterns, rather than
//! the entire output. Prompts always arrive at the end of a reply, and for
//! large outputs searching everything after every read gets expensive.

use memchr::{memchr, memrchr};
use regex::bytes::{Match, Regex};

/// Longest incomplete escape sequence held back between reads. Anything
/// longer is flushed as is.
const MAX_HELD_ESCAPE: usize = 256;

/// Buffer for accumulating child output and searching it for patterns.
#[derive(Debug)]
pub struct PatternBuffer {
    /// The accumulated, normalized output.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns (0 = everything).
    search_depth: usize,

    /// Strip ANSI escape codes on extend.
    strip_ansi: bool,

    /// Raw bytes from the end of the last read that cannot be normalized
    /// yet: a lone `\r`, a partial UTF-8 character or an unterminated
    /// escape sequence.
    pending: Vec<u8>,
}

impl PatternBuffer {
    /// Create a new pattern buffer.
    ///
    /// # Arguments
    ///
    /// * `search_depth` - Number of bytes from the end to search for patterns.
    ///   Zero disables the optimization.
    /// * `strip_ansi` - Remove ANSI escape sequences from incoming data.
    pub fn new(search_depth: usize, strip_ansi: bool) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            strip_ansi,
            pending: Vec::new(),
        }
    }

    /// Extend the buffer with raw terminal data.
    ///
    /// `\r\n` is folded into `\n`, then ANSI codes are stripped if enabled.
    /// A `\r\n` pair, a UTF-8 character or an escape sequence split across
    /// two reads is held back until it is complete.
    pub fn extend(&mut self, data: &[u8]) {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(data);

        let hold = incomplete_tail(&input, self.strip_ansi);
        self.pending = input.split_off(hold);
        self.normalize(&input);
    }

    /// Normalize whatever is still held back, complete or not.
    ///
    /// Called once the child has closed its end.
    pub fn flush(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        self.normalize(&pending);
    }

    fn normalize(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let folded = fold_crlf(data);
        if self.strip_ansi {
            self.buffer
                .extend_from_slice(&strip_ansi_escapes::strip(&folded));
        } else {
            self.buffer.extend_from_slice(&folded);
        }
    }

    /// Offset where tail searches begin.
    fn tail_start(&self) -> usize {
        if self.search_depth == 0 {
            0
        } else {
            self.buffer.len().saturating_sub(self.search_depth)
        }
    }

    /// Search the tail of the buffer for the pattern.
    ///
    /// Returns `(start, end)` byte offsets relative to the full buffer.
    pub fn search_tail(&self, pattern: &Regex) -> Option<(usize, usize)> {
        let start = self.tail_start();
        pattern
            .find(&self.buffer[start..])
            .map(|m| (start + m.start(), start + m.end()))
    }

    /// Search the entire buffer for a pattern.
    pub fn search_full(&self, pattern: &Regex) -> Option<Match<'_>> {
        pattern.find(&self.buffer)
    }

    /// Check if the tail contains a pattern match.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    /// Remove everything up to `end` and return it split at `start`.
    ///
    /// Bytes after `end` stay buffered for the next search.
    pub fn split_match(&mut self, start: usize, end: usize) -> (Vec<u8>, Vec<u8>) {
        let rest = self.buffer.split_off(end);
        let matched = self.buffer.split_off(start);
        let before = std::mem::replace(&mut self.buffer, rest);
        (before, matched)
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        self.pending.clear();
        std::mem::take(&mut self.buffer)
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending.clear();
    }
}

/// Fold `\r\n` pairs into `\n`. Lone `\r` bytes are kept.
fn fold_crlf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut rest = data;

    while let Some(pos) = memchr(b'\r', rest) {
        out.extend_from_slice(&rest[..pos]);
        if rest.get(pos + 1) == Some(&b'\n') {
            out.push(b'\n');
            rest = &rest[pos + 2..];
        } else {
            out.push(b'\r');
            rest = &rest[pos + 1..];
        }
    }
    out.extend_from_slice(rest);
    out
}

/// Offset of the first byte that has to wait for the next read.
///
/// Returns `data.len()` when everything can be normalized now.
fn incomplete_tail(data: &[u8], escapes: bool) -> usize {
    let mut hold = data.len();

    if data.last() == Some(&b'\r') {
        hold = data.len() - 1;
    }

    if let Some(start) = partial_utf8_start(data) {
        hold = hold.min(start);
    }

    if escapes
        && let Some(esc) = memrchr(0x1b, data)
        && data.len() - esc <= MAX_HELD_ESCAPE
        && !escape_complete(&data[esc..])
    {
        hold = hold.min(esc);
    }

    hold
}

/// Start of a UTF-8 character cut off at the end of `data`.
fn partial_utf8_start(data: &[u8]) -> Option<usize> {
    let tail = data.len().saturating_sub(3);
    let lead = (tail..data.len())
        .rev()
        .find(|&i| data[i] & 0b1100_0000 != 0b1000_0000)?;

    let width = match data[lead] {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return None,
    };
    (data.len() - lead < width).then_some(lead)
}

/// Whether `seq`, starting at an ESC byte, holds a whole escape sequence.
fn escape_complete(seq: &[u8]) -> bool {
    match seq.get(1) {
        None => false,
        // CSI: parameters and intermediates up to a final byte.
        Some(b'[') => seq[2..].iter().any(|b| (0x40..=0x7E).contains(b)),
        // OSC and friends: up to BEL or ST. An ST starts with ESC, so a
        // trailing `ESC \` is found as its own complete sequence.
        Some(b']' | b'P' | b'_' | b'^') => memchr(0x07, &seq[2..]).is_some(),
        // Character set designation takes one more byte.
        Some(b'(' | b')' | b'*' | b'+') => seq.len() > 2,
        Some(_) => true,
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(4096, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = PatternBuffer::new(100, true);
        buffer.extend(b"Hello, world!");
        assert_eq!(buffer.as_slice(), b"Hello, world!");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = PatternBuffer::new(100, true);
        buffer.extend(b"\x1b[32mGreen text\x1b[0m");
        assert_eq!(buffer.as_slice(), b"Green text");
    }

    #[test]
    fn test_ansi_kept_when_disabled() {
        let mut buffer = PatternBuffer::new(100, false);
        buffer.extend(b"\x1b[1mx");
        assert_eq!(buffer.as_slice(), b"\x1b[1mx");
    }

    #[test]
    fn test_crlf_folding() {
        let mut buffer = PatternBuffer::new(100, false);
        buffer.extend(b"Welcome\r\n(1) -> ");
        assert_eq!(buffer.as_slice(), b"Welcome\n(1) -> ");
    }

    #[test]
    fn test_crlf_split_across_reads() {
        let mut buffer = PatternBuffer::new(100, false);
        buffer.extend(b"line\r");
        buffer.extend(b"\nnext\rx");
        assert_eq!(buffer.as_slice(), b"line\nnext\rx");
    }

    #[test]
    fn test_utf8_split_across_reads() {
        let mut buffer = PatternBuffer::new(100, true);
        buffer.extend(b"x = \xC3");
        assert_eq!(buffer.as_slice(), b"x = ");
        buffer.extend(b"\xA9\n");
        assert_eq!(buffer.as_str_lossy(), "x = \u{e9}\n");
    }

    #[test]
    fn test_escape_split_across_reads() {
        let mut buffer = PatternBuffer::new(100, true);
        buffer.extend(b"a\x1b[3");
        buffer.extend(b"2mb");
        assert_eq!(buffer.as_slice(), b"ab");

        buffer.extend(b"\x1b]0;title");
        buffer.extend(b"\x07c\x1b");
        buffer.extend(b"(Bd");
        assert_eq!(buffer.as_slice(), b"abcd");
    }

    #[test]
    fn test_flush_releases_held_bytes() {
        let mut buffer = PatternBuffer::new(100, false);
        buffer.extend(b"end\r");
        assert_eq!(buffer.as_slice(), b"end");
        buffer.flush();
        assert_eq!(buffer.as_slice(), b"end\r");

        buffer.clear();
        buffer.extend(b"\xE2\x88");
        assert!(buffer.is_empty());
        buffer.flush();
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_tail_search() {
        let mut buffer = PatternBuffer::new(20, true);
        buffer.extend(&[b'x'; 100]);
        buffer.extend(b"\n(7) -> ");

        let pattern = Regex::new(r"\([0-9]+\) ->").unwrap();
        let (start, end) = buffer.search_tail(&pattern).unwrap();
        assert_eq!(&buffer.as_slice()[start..end], b"(7) ->");
        assert_eq!(start, 101);
    }

    #[test]
    fn test_tail_search_not_in_tail() {
        let mut buffer = PatternBuffer::new(10, true);
        buffer.extend(b"(1) ->");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"\([0-9]+\) ->").unwrap();
        assert!(buffer.search_tail(&pattern).is_none());
        assert!(buffer.search_full(&pattern).is_some());
    }

    #[test]
    fn test_zero_depth_searches_everything() {
        let mut buffer = PatternBuffer::new(0, true);
        buffer.extend(b"(1) ->");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"\([0-9]+\) ->").unwrap();
        assert!(buffer.tail_contains(&pattern));
    }

    #[test]
    fn test_split_match_keeps_remainder() {
        let mut buffer = PatternBuffer::new(0, true);
        buffer.extend(b"out\n(2) -> more");
        let (before, matched) = buffer.split_match(4, 10);
        assert_eq!(before, b"out\n");
        assert_eq!(matched, b"(2) ->");
        assert_eq!(buffer.as_slice(), b" more");
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = PatternBuffer::new(100, true);
        buffer.extend(b"test data");
        assert_eq!(buffer.take(), b"test data");
        assert!(buffer.is_empty());
    }
}
