use std::collections::BTreeMap;

use crate::constants::RELEASE_KEY_HEADER;
use crate::KeyValues;

/// Renders a flat mapping as `key=value` lines sorted by key, preceded by the
/// release key header when one is known.
pub(crate) fn encode_properties(
    values: &KeyValues,
    release_key: Option<&str>,
) -> String {
    let mut out = String::new();
    if let Some(release_key) = release_key {
        out.push_str(RELEASE_KEY_HEADER);
        out.push_str(release_key);
        out.push('\n');
    }

    let sorted: BTreeMap<_, _> = values.iter().collect();
    for (key, value) in sorted {
        out.push_str(&escape(key, true));
        out.push('=');
        out.push_str(&escape(value, false));
        out.push('\n');
    }
    out
}

/// Parses the output of [`encode_properties`] as well as hand-written files:
/// `#`/`!` comments, blank lines, `=` or `:` separators.
pub(crate) fn decode_properties(content: &str) -> (KeyValues, Option<String>) {
    let mut values = KeyValues::new();
    let mut release_key = None;

    for line in content.lines() {
        if let Some(key) = line.strip_prefix(RELEASE_KEY_HEADER) {
            let key = key.trim();
            if !key.is_empty() {
                release_key = Some(key.to_string());
            }
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let (raw_key, raw_value) = split_unescaped(trimmed);
        values.insert(unescape(trim_end_unescaped(raw_key)), unescape(raw_value.trim_start()));
    }

    (values, release_key)
}

fn escape(
    s: &str,
    is_key: bool,
) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '=' | ':' if is_key => {
                out.push('\\');
                out.push(c);
            }
            '#' | '!' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Trims trailing whitespace that is not itself escaped.
fn trim_end_unescaped(s: &str) -> &str {
    let mut end = s.len();
    while end > 0 && s[..end].ends_with([' ', '\t']) {
        let backslashes = s[..end - 1].chars().rev().take_while(|c| *c == '\\').count();
        if backslashes % 2 == 1 {
            break;
        }
        end -= 1;
    }
    &s[..end]
}

/// Splits at the first `=` or `:` not preceded by a backslash.
fn split_unescaped(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..i], &line[i + 1..]),
            _ => {}
        }
    }
    (line, "")
}
