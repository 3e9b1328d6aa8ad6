//! Quote-aware line tokenizer.
//!
//! Protocol lines are space-delimited, but values containing spaces are
//! wrapped in double quotes (`DEVN:"My Node"`). Whitespace inside quotes is
//! literal; the quote characters themselves never appear in the output
//! tokens.

/// Split one line remainder into tokens.
///
/// Whitespace outside double quotes delimits tokens, whitespace inside is
/// kept, quote characters are stripped. An unmatched quote runs to the end
/// of the input; the trailing token is still produced.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Quote a value for an outbound command field.
///
/// Wraps the text in double quotes and escapes embedded quote characters
/// so the device's tokenizer sees one field.
pub fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        if ch == '"' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}
