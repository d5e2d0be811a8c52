//! Textual rewrite rules for malformed manifests.
//!
//! Every rule is a pure `&str -> Option<String>` returning `None` when it has
//! nothing to change. They share one lexer that finds string literals, so
//! separator rules never look inside strings and the escaping rule never
//! looks outside them.

use std::ops::Range;

/// A named rewrite rule
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&str) -> Option<String>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Rules in the order they are tried
pub const RULES: [Rule; 3] = [
    Rule {
        name: "insert_missing_separator",
        apply: insert_missing_separator,
    },
    Rule {
        name: "remove_trailing_separator",
        apply: remove_trailing_separator,
    },
    Rule {
        name: "escape_windows_paths",
        apply: escape_windows_paths,
    },
];

/// A string literal found by the lexer
#[derive(Debug, Clone, PartialEq, Eq)]
struct Literal {
    /// Byte span including both quotes (or to end of text when unterminated)
    span: Range<usize>,
    terminated: bool,
}

impl Literal {
    fn interior(&self) -> Range<usize> {
        let end = if self.terminated {
            self.span.end - 1
        } else {
            self.span.end
        };
        self.span.start + 1..end
    }
}

/// Find every string literal, treating a backslash as escaping the next byte
fn scan_literals(text: &str) -> Vec<Literal> {
    let bytes = text.as_bytes();
    let mut literals = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }

        let start = i;
        i += 1;
        let mut terminated = false;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => {
                    i += 1;
                    terminated = true;
                    break;
                }
                _ => i += 1,
            }
        }
        let end = i.min(bytes.len());
        literals.push(Literal {
            span: start..end,
            terminated,
        });
    }

    literals
}

/// Per-byte flag: true when the byte belongs to a string literal
fn string_mask(text: &str, literals: &[Literal]) -> Vec<bool> {
    let mut mask = vec![false; text.len()];
    for literal in literals {
        for flag in &mut mask[literal.span.clone()] {
            *flag = true;
        }
    }
    mask
}

fn next_significant(bytes: &[u8], from: usize) -> Option<usize> {
    (from..bytes.len()).find(|&i| !bytes[i].is_ascii_whitespace())
}

/// Insert the `,` missing between a value and the next `"key":`
///
/// A value ends at a `}` or `]` outside strings, or at the closing quote of
/// a string that is not itself a key.
pub fn insert_missing_separator(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let literals = scan_literals(text);
    let mask = string_mask(text, &literals);

    let is_key_at = |start: usize| -> bool {
        literals
            .binary_search_by_key(&start, |l| l.span.start)
            .ok()
            .map(|idx| &literals[idx])
            .filter(|l| l.terminated)
            .and_then(|l| next_significant(bytes, l.span.end))
            .map_or(false, |after| bytes[after] == b':')
    };

    let mut value_ends: Vec<usize> = bytes
        .iter()
        .enumerate()
        .filter(|(i, b)| !mask[*i] && (**b == b'}' || **b == b']'))
        .map(|(i, _)| i + 1)
        .collect();
    value_ends.extend(
        literals
            .iter()
            .filter(|l| l.terminated)
            .map(|l| l.span.end),
    );
    value_ends.sort_unstable();

    let inserts: Vec<usize> = value_ends
        .into_iter()
        .filter(|&end| {
            next_significant(bytes, end)
                .map_or(false, |next| bytes[next] == b'"' && is_key_at(next))
        })
        .collect();

    if inserts.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(text.len() + inserts.len());
    let mut last = 0;
    for at in inserts {
        out.push_str(&text[last..at]);
        out.push(',');
        last = at;
    }
    out.push_str(&text[last..]);
    Some(out)
}

/// Remove a `,` that directly precedes `}` or `]`
pub fn remove_trailing_separator(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let literals = scan_literals(text);
    let mask = string_mask(text, &literals);

    let removals: Vec<usize> = (0..bytes.len())
        .filter(|&i| !mask[i] && bytes[i] == b',')
        .filter(|&i| {
            next_significant(bytes, i + 1)
                .map_or(false, |next| bytes[next] == b'}' || bytes[next] == b']')
        })
        .collect();

    if removals.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for at in removals {
        out.push_str(&text[last..at]);
        last = at + 1;
    }
    out.push_str(&text[last..]);
    Some(out)
}

/// Double the lone backslashes of string literals that contain an invalid
/// escape sequence, such as `"C:\Users\me"`.
///
/// Literals whose escapes are all valid are left alone, as are `\\` pairs
/// and `\"` in the literals that do get rewritten.
pub fn escape_windows_paths(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let literals = scan_literals(text);

    let mut out = String::with_capacity(text.len() + 8);
    let mut last = 0;
    let mut changed = false;

    for literal in &literals {
        let interior = literal.interior();
        if interior.is_empty() || !has_invalid_escape(&bytes[interior.clone()]) {
            continue;
        }

        out.push_str(&text[last..interior.start]);
        let mut i = interior.start;
        while i < interior.end {
            if bytes[i] == b'\\' {
                let pair = i + 1 < interior.end && matches!(bytes[i + 1], b'\\' | b'"');
                if pair {
                    out.push_str(&text[i..i + 2]);
                    i += 2;
                } else {
                    out.push_str("\\\\");
                    i += 1;
                }
            } else {
                let ch_len = utf8_len(bytes[i]);
                out.push_str(&text[i..i + ch_len]);
                i += ch_len;
            }
        }
        last = interior.end;
        changed = true;
    }

    if !changed {
        return None;
    }
    out.push_str(&text[last..]);
    Some(out)
}

fn has_invalid_escape(interior: &[u8]) -> bool {
    let mut i = 0;
    while i < interior.len() {
        if interior[i] != b'\\' {
            i += 1;
            continue;
        }
        match interior.get(i + 1) {
            Some(b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't') => i += 2,
            Some(b'u') => {
                let hex = interior.get(i + 2..i + 6);
                if hex.map_or(false, |h| h.iter().all(u8::is_ascii_hexdigit)) {
                    i += 6;
                } else {
                    return true;
                }
            }
            _ => return true,
        }
    }
    false
}

fn utf8_len(first: u8) -> usize {
    match first {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}
