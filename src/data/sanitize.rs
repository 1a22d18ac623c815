//! Field sanitizers and validators applied during normalization
//!
//! Each recognized row field has exactly one function here; the normalizer
//! never reflects over arbitrary keys.

use serde_json::Value;

/// Characters kept by [`sanitize_email`] besides ASCII letters and digits
const EMAIL_EXTRA_CHARS: &str = "!#$%&'*+-=?^_`{|}~@.[]";

/// Reduces arbitrary text to a single line of plain text
///
/// Strips HTML tags, drops percent-encoded octets, collapses runs of
/// whitespace (including newlines and tabs) into one space and trims.
pub fn sanitize_text(input: &str) -> String {
    let stripped = strip_tags(input);
    let decoded = strip_percent_octets(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sanitizes a JSON value as plain text; non-scalar values are rejected
pub fn text_field(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    let clean = sanitize_text(&raw);
    if clean.is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// Sanitizes an email address, returning `None` unless the result is email-shaped
pub fn sanitize_email(input: &str) -> Option<String> {
    let filtered: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || EMAIL_EXTRA_CHARS.contains(*c))
        .collect();
    if is_email_shaped(&filtered) {
        Some(filtered)
    } else {
        None
    }
}

/// JSON counterpart of [`sanitize_email`]
pub fn email_field(value: &Value) -> Option<String> {
    value.as_str().and_then(sanitize_email)
}

/// Validates an integer field
///
/// Accepts JSON integers, floats without a fractional part and decimal
/// strings with an optional sign. Leading zeros are rejected the same way
/// they are for strings like `"007"`.
pub fn int_field(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => parse_int(s),
        _ => None,
    }
}

fn parse_int(input: &str) -> Option<i64> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('+'))
        .unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    trimmed.trim_start_matches('+').parse().ok()
}

fn is_email_shaped(candidate: &str) -> bool {
    let mut parts = candidate.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || local.starts_with('.') || local.ends_with('.') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

/// Removes `<...>` tags
///
/// A `<` only opens a tag when followed by a letter, `/`, `!` or `?` and
/// closed by a later `>`; any other `<` is kept as text.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let opens_tag = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'));
        match after.find('>') {
            Some(end) if opens_tag => rest = &after[end + 1..],
            _ => {
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn strip_percent_octets(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            i += 3;
            continue;
        }
        match input[i..].chars().next() {
            Some(c) => {
                out.push(c);
                i += c.len_utf8();
            }
            None => break,
        }
    }
    out
}
