//! SQL script splitting.

use crate::config::Driver;
use crate::storage::prefix::QuoteState;

/// Split a SQL script into statements.
///
/// Statements end at `;` outside quoted strings. `--` line comments and
/// `/* */` block comments outside quotes are dropped. Empty statements are
/// skipped. Backslash escapes inside literals follow `driver`.
pub fn split_statements(script: &str, driver: Driver) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quotes = QuoteState::new(driver);
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        if !quotes.is_quoted() {
            match c {
                '-' if chars.peek() == Some(&'-') => {
                    for skipped in chars.by_ref() {
                        if skipped == '\n' {
                            current.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    let mut last = '\0';
                    for skipped in chars.by_ref() {
                        if last == '*' && skipped == '/' {
                            break;
                        }
                        last = skipped;
                    }
                    current.push(' ');
                    continue;
                }
                ';' => {
                    push_statement(&mut statements, &mut current);
                    continue;
                }
                _ => {}
            }
        }

        current.push(c);
        if quotes.advance(c) {
            if let Some(escaped) = chars.next() {
                current.push(escaped);
            }
        }
    }
    push_statement(&mut statements, &mut current);

    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}
