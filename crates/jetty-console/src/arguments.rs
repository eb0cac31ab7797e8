//! Drainable argument container.
//!
//! Every `consume_*` accessor removes the tokens it returns, so a command can
//! claim known flags and keyed values first and treat whatever remains as
//! positional arguments. Placeholders are resolved on the way out; tokens
//! that are never consumed are never resolved.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use jetty_types::error::{ConsoleError, Result};

use crate::placeholder::{NoResolver, PlaceholderResolver, resolve_placeholders};

/// Ordered, mutable token sequence with destructive typed accessors.
#[derive(Clone)]
pub struct Arguments {
    tokens: Vec<String>,
    resolver: Arc<dyn PlaceholderResolver>,
}

impl Arguments {
    pub fn new(tokens: Vec<String>, resolver: Arc<dyn PlaceholderResolver>) -> Self {
        Self { tokens, resolver }
    }

    /// Arguments that resolve no placeholders.
    pub fn literal<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(tokens.into_iter().map(Into::into).collect(), Arc::new(NoResolver))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Raw token at `index`, without consuming or resolving it.
    pub fn peek(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    /// Position of the first token equal to `token`.
    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.tokens.iter().position(|t| t == token)
    }

    /// Position of the last token equal to any of `markers`.
    pub fn last_index_of_any(&self, markers: &[&str]) -> Option<usize> {
        self.tokens
            .iter()
            .rposition(|t| markers.contains(&t.as_str()))
    }

    /// Move the tokens from `index` onward into a new container sharing
    /// this one's resolver.
    pub fn split_off(&mut self, index: usize) -> Arguments {
        let tail = self.tokens.split_off(index.min(self.tokens.len()));
        Arguments::new(tail, Arc::clone(&self.resolver))
    }

    pub fn resolver(&self) -> &Arc<dyn PlaceholderResolver> {
        &self.resolver
    }

    /// Remove and return the first token.
    pub fn consume_string(&mut self) -> Option<String> {
        self.consume_string_at(0)
    }

    /// Remove and return the token at `index`.
    pub fn consume_string_at(&mut self, index: usize) -> Option<String> {
        if index >= self.tokens.len() {
            return None;
        }
        let raw = self.tokens.remove(index);
        Some(self.resolve(&raw))
    }

    /// Remove and return every remaining token.
    pub fn consume_strings(&mut self) -> Vec<String> {
        let raw = std::mem::take(&mut self.tokens);
        raw.iter().map(|t| self.resolve(t)).collect()
    }

    /// Remove the first token and parse it as an integer literal.
    pub fn consume_long(&mut self) -> Result<Option<i64>> {
        self.consume_string().map(|s| decode_long(&s)).transpose()
    }

    /// Remove the first occurrence of `flag`; returns whether it was there.
    pub fn consume_flag(&mut self, flag: &str) -> bool {
        match self.index_of(flag) {
            Some(index) => {
                self.tokens.remove(index);
                true
            },
            None => false,
        }
    }

    /// Remove `key` and the token following it, returning that value.
    ///
    /// `Ok(None)` if `key` is absent; an argument error if `key` is the
    /// last token.
    pub fn consume_keyed_string(&mut self, key: &str) -> Result<Option<String>> {
        let Some(index) = self.index_of(key) else {
            return Ok(None);
        };
        if index + 1 >= self.tokens.len() {
            self.tokens.remove(index);
            return Err(ConsoleError::argument(format!("Missing value for {key}")));
        }
        self.tokens.remove(index);
        Ok(self.consume_string_at(index))
    }

    /// Remove `key` and every token after it, returning those tokens.
    pub fn consume_keyed_strings(&mut self, key: &str) -> Result<Option<Vec<String>>> {
        let Some(index) = self.index_of(key) else {
            return Ok(None);
        };
        let mut tail = self.split_off(index);
        tail.tokens.remove(0);
        if tail.is_empty() {
            return Err(ConsoleError::argument(format!("Missing value for {key}")));
        }
        Ok(Some(tail.consume_strings()))
    }

    /// Remove `key` and the following token, as a path.
    pub fn consume_keyed_file(&mut self, key: &str) -> Result<Option<PathBuf>> {
        Ok(self.consume_keyed_string(key)?.map(PathBuf::from))
    }

    /// Remove the first token as a path. Existence is not checked.
    pub fn consume_file(&mut self) -> Option<PathBuf> {
        self.consume_string().map(PathBuf::from)
    }

    /// Remove every remaining token as a path.
    pub fn consume_files(&mut self) -> Vec<PathBuf> {
        self.consume_strings().into_iter().map(PathBuf::from).collect()
    }

    fn resolve(&self, raw: &str) -> String {
        resolve_placeholders(raw, self.resolver.as_ref())
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Arguments").field(&self.tokens).finish()
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

/// Parse an integer literal: optional sign, then `0x`/`0X`/`#` for hex, a
/// leading `0` for octal, decimal otherwise.
pub fn decode_long(literal: &str) -> Result<i64> {
    let invalid = || ConsoleError::argument(format!("Invalid number: {literal}"));
    let (negative, body) = match literal.as_bytes().first() {
        Some(b'-') => (true, &literal[1..]),
        Some(b'+') => (false, &literal[1..]),
        _ => (false, literal),
    };
    let (radix, digits) = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .or_else(|| body.strip_prefix('#'))
    {
        (16, hex)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };
    if digits.is_empty() || digits.starts_with(['-', '+']) {
        return Err(invalid());
    }
    // Parse with the sign attached so i64::MIN is representable.
    let signed = if negative {
        format!("-{digits}")
    } else {
        digits.to_string()
    };
    i64::from_str_radix(&signed, radix).map_err(|_| invalid())
}
