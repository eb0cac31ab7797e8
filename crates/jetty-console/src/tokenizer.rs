//! Line tokenizer over a [`Scanner`].
//!
//! Splits one line at a time into whitespace-delimited tokens. A token that
//! starts with `'` or `"` runs to the matching quote and its value is the
//! verbatim interior: no escapes, and newlines inside quotes belong to the
//! token. End of stream inside a quoted token closes it implicitly.

use std::io::{self, Read};

use crate::scanner::Scanner;

/// Produces the tokens of one input line per [`read`](Tokenizer::read).
pub struct Tokenizer<R> {
    scanner: Scanner<R>,
}

impl<R: Read> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            scanner: Scanner::new(reader),
        }
    }

    /// Read the next line.
    ///
    /// Returns `Some(tokens)` for every line, `Some(vec![])` for a blank
    /// line, and `None` once the stream is exhausted with nothing left to
    /// return.
    pub fn read(&mut self) -> io::Result<Option<Vec<String>>> {
        self.scanner.reset_offset();
        let mut tokens = Vec::new();
        let mut current: Option<String> = None;

        loop {
            let Some(c) = self.scanner.next()? else {
                if let Some(token) = current.take() {
                    tokens.push(token);
                }
                if tokens.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(tokens));
            };

            match c {
                '\n' => {
                    if let Some(token) = current.take() {
                        tokens.push(token);
                    }
                    log::trace!("Tokenized line of {} chars", self.scanner.offset());
                    return Ok(Some(tokens));
                },
                c if c.is_whitespace() => {
                    if let Some(token) = current.take() {
                        tokens.push(token);
                    }
                },
                '\'' | '"' if current.is_none() => {
                    tokens.push(self.read_quoted(c)?);
                },
                c => current.get_or_insert_with(String::new).push(c),
            }
        }
    }

    /// Release the underlying reader.
    pub fn into_inner(self) -> R {
        self.scanner.into_inner()
    }

    fn read_quoted(&mut self, quote: char) -> io::Result<String> {
        let mut token = String::new();
        while let Some(c) = self.scanner.next()? {
            if c == quote {
                return Ok(token);
            }
            token.push(c);
        }
        log::debug!("Unterminated {quote} quote closed by end of input");
        Ok(token)
    }
}

/// Tokenize a complete string, one token list per line.
pub fn tokenize_lines(input: &str) -> Vec<Vec<String>> {
    let mut tokenizer = Tokenizer::new(input.as_bytes());
    let mut lines = Vec::new();
    // Reading from a byte slice cannot fail.
    while let Ok(Some(tokens)) = tokenizer.read() {
        lines.push(tokens);
    }
    lines
}

/// Tokenize the first line of a string.
pub fn tokenize_line(input: &str) -> Vec<String> {
    Tokenizer::new(input.as_bytes())
        .read()
        .ok()
        .flatten()
        .unwrap_or_default()
}
