//! Table-name prefixing for SQL text.
//!
//! Statements name tables as `{table}`; the braces are replaced by the
//! connection's prefix for that table. Quoted literals and identifiers are
//! left untouched, so JSON or serialized data inside string values survives.

use crate::config::{Driver, TablePrefix};

/// Quote tracking shared by the SQL scanners.
///
/// Backslash escapes inside quotes are honoured only for drivers that
/// support them; elsewhere `'C:\'` is a complete literal.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QuoteState {
    quote: Option<char>,
    backslash_escapes: bool,
}

impl QuoteState {
    pub(crate) fn new(driver: Driver) -> Self {
        Self {
            quote: None,
            backslash_escapes: driver.backslash_escapes(),
        }
    }

    pub(crate) fn is_quoted(&self) -> bool {
        self.quote.is_some()
    }

    /// Feed the next character. Returns `true` when `c` escapes the
    /// character that follows it.
    pub(crate) fn advance(&mut self, c: char) -> bool {
        match self.quote {
            Some(q) if c == '\\' && q != '`' && self.backslash_escapes => true,
            Some(q) => {
                if c == q {
                    self.quote = None;
                }
                false
            }
            None => {
                if matches!(c, '\'' | '"' | '`') {
                    self.quote = Some(c);
                }
                false
            }
        }
    }
}

/// Replace every `{table}` placeholder outside quotes with the prefixed name
pub fn prefix_tables(sql: &str, prefix: &TablePrefix, driver: Driver) -> String {
    let mut out = String::with_capacity(sql.len() + 16);
    let mut quotes = QuoteState::new(driver);
    let mut chars = sql.char_indices();

    while let Some((index, c)) = chars.next() {
        if c == '{' && !quotes.is_quoted() {
            if let Some(table) = placeholder_at(sql, index) {
                out.push_str(prefix.for_table(table));
                out.push_str(table);
                // skip the identifier and the closing brace
                chars.nth(table.len());
                continue;
            }
        }

        out.push(c);
        if quotes.advance(c) {
            if let Some((_, escaped)) = chars.next() {
                out.push(escaped);
            }
        }
    }

    out
}

/// Table name of a `{name}` placeholder starting at `open`, if well-formed
fn placeholder_at(sql: &str, open: usize) -> Option<&str> {
    let rest = &sql[open + 1..];
    let close = rest.find('}')?;
    let name = &rest[..close];
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(name)
    } else {
        None
    }
}
