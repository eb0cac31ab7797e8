//! Character reader with line-ending normalization.

use std::io::{self, Read};

/// Reads characters one at a time from a byte stream.
///
/// `\r`, `\r\n` and `\n` all present as a single `\n` to callers. The
/// column offset within the current logical line is tracked for
/// diagnostics.
pub struct Scanner<R> {
    reader: R,
    offset: usize,
    skip_lf: bool,
}

impl<R: Read> Scanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            skip_lf: false,
        }
    }

    /// Read the next character. `Ok(None)` means end of stream.
    ///
    /// Invalid UTF-8 sequences decode to U+FFFD.
    pub fn next(&mut self) -> io::Result<Option<char>> {
        loop {
            let Some(c) = self.read_char()? else {
                return Ok(None);
            };
            let skip = std::mem::take(&mut self.skip_lf);
            match c {
                '\n' if skip => continue,
                '\r' => {
                    self.skip_lf = true;
                    self.offset += 1;
                    return Ok(Some('\n'));
                },
                c => {
                    self.offset += 1;
                    return Ok(Some(c));
                },
            }
        }
    }

    /// Characters consumed since the last [`reset_offset`](Self::reset_offset).
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn reset_offset(&mut self) {
        self.offset = 0;
    }

    /// Release the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn read_char(&mut self) -> io::Result<Option<char>> {
        let Some(first) = self.read_byte()? else {
            return Ok(None);
        };
        let width = match first {
            0x00..=0x7F => return Ok(Some(first as char)),
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
        };
        let mut bytes = [first, 0, 0, 0];
        for slot in bytes.iter_mut().take(width).skip(1) {
            match self.read_byte()? {
                Some(b) => *slot = b,
                None => return Ok(Some(char::REPLACEMENT_CHARACTER)),
            }
        }
        Ok(Some(
            std::str::from_utf8(&bytes[..width])
                .ok()
                .and_then(|s| s.chars().next())
                .unwrap_or(char::REPLACEMENT_CHARACTER),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(input: &str) -> String {
        let mut scanner = Scanner::new(input.as_bytes());
        let mut out = String::new();
        while let Some(c) = scanner.next().unwrap() {
            out.push(c);
        }
        out
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(drain("echo hi"), "echo hi");
    }

    #[test]
    fn crlf_becomes_single_lf() {
        assert_eq!(drain("a\r\nb\r\n"), "a\nb\n");
    }

    #[test]
    fn lone_cr_becomes_lf() {
        assert_eq!(drain("a\rb\r"), "a\nb\n");
    }

    #[test]
    fn cr_cr_lf_yields_two_newlines() {
        assert_eq!(drain("a\r\r\nb"), "a\n\nb");
    }

    #[test]
    fn lf_lf_is_not_swallowed() {
        assert_eq!(drain("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn end_of_stream_is_none() {
        let mut scanner = Scanner::new(&b""[..]);
        assert_eq!(scanner.next().unwrap(), None);
        assert_eq!(scanner.next().unwrap(), None);
    }

    #[test]
    fn utf8_multibyte_decoded() {
        assert_eq!(drain("h\u{e9}llo \u{1F600}"), "h\u{e9}llo \u{1F600}");
    }

    #[test]
    fn invalid_utf8_is_replacement() {
        let mut scanner = Scanner::new(&[b'a', 0xFF, b'b'][..]);
        assert_eq!(scanner.next().unwrap(), Some('a'));
        assert_eq!(scanner.next().unwrap(), Some(char::REPLACEMENT_CHARACTER));
        assert_eq!(scanner.next().unwrap(), Some('b'));
    }

    #[test]
    fn truncated_sequence_is_replacement() {
        let mut scanner = Scanner::new(&[0xE2, 0x82][..]);
        assert_eq!(scanner.next().unwrap(), Some(char::REPLACEMENT_CHARACTER));
        assert_eq!(scanner.next().unwrap(), None);
    }

    #[test]
    fn offset_counts_and_resets() {
        let mut scanner = Scanner::new("ab\r\ncd".as_bytes());
        scanner.next().unwrap();
        scanner.next().unwrap();
        assert_eq!(scanner.offset(), 2);
        scanner.next().unwrap();
        scanner.reset_offset();
        assert_eq!(scanner.next().unwrap(), Some('c'));
        assert_eq!(scanner.offset(), 1);
    }
}
