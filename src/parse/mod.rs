//! Parsers for the string encodings exchanged with the display server
//!
//! The helpers in this module are the shared lexical layer: the generic
//! `token=value` list grammar, integer readers, and a brace-aware splitter.

pub mod metamode;
pub mod mode;
pub mod modeline;
pub mod server_info;

use crate::constants::grammar::HEADER_SEPARATOR;
use crate::errors::{LayoutError, Result};
use crate::geometry::{Rect, Size};

/// Parse a `token=value[, token=value...]` list, calling `apply` once per
/// pair. A value wrapped in parentheses may contain commas.
///
/// Parsing stops at the first malformed segment (missing `=`, empty token,
/// unterminated parenthesis). Pairs applied before it stay applied.
pub fn parse_token_value_pairs<F>(input: &str, mut apply: F) -> Result<()>
where
    F: FnMut(&str, &str),
{
    let mut rest = input;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(());
        }

        let comma = rest.find(',');
        let eq = match rest.find('=') {
            Some(eq) if comma.is_none_or(|c| eq < c) => eq,
            _ => {
                let segment = comma.map_or(rest, |c| &rest[..c]);
                return Err(LayoutError::malformed(format!(
                    "expected 'token=value', found '{}'",
                    segment.trim()
                )));
            }
        };

        let token = rest[..eq].trim();
        if token.is_empty() {
            return Err(LayoutError::malformed(format!(
                "missing token before '=' in '{}'",
                rest.trim()
            )));
        }

        let after = rest[eq + 1..].trim_start();
        let (value, remaining) = if let Some(inner) = after.strip_prefix('(') {
            let close = inner.find(')').ok_or_else(|| {
                LayoutError::malformed(format!("unterminated '(' in value of '{}'", token))
            })?;
            let tail = inner[close + 1..].trim_start();
            let remaining = if tail.is_empty() {
                ""
            } else if let Some(next) = tail.strip_prefix(',') {
                next
            } else {
                return Err(LayoutError::malformed(format!(
                    "unexpected '{}' after value of '{}'",
                    tail, token
                )));
            };
            (inner[..close].trim(), remaining)
        } else {
            match after.find(',') {
                Some(c) => (after[..c].trim(), &after[c + 1..]),
                None => (after.trim(), ""),
            }
        };

        apply(token, value);
        rest = remaining;
    }
}

/// Split `record` at the first `::` into (header, body)
pub fn split_header(record: &str) -> (Option<&str>, &str) {
    match record.find(HEADER_SEPARATOR) {
        Some(pos) => (
            Some(&record[..pos]),
            &record[pos + HEADER_SEPARATOR.len()..],
        ),
        None => (None, record),
    }
}

/// Split on `sep` outside of `{...}` blocks
pub fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Read an optionally signed decimal integer, returning it and the rest
pub fn read_integer(input: &str) -> Option<(i32, &str)> {
    let bytes = input.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    let value = input[..end].parse::<i32>().ok()?;
    Some((value, &input[end..]))
}

/// Read `WxH`
pub fn read_size(input: &str) -> Option<(Size, &str)> {
    let (width, rest) = read_integer(input)?;
    let rest = rest.strip_prefix(['x', 'X'])?;
    let (height, rest) = read_integer(rest)?;
    Some((Size::new(width, height), rest))
}

/// Read `X+Y` / `X-Y` (the leading `+` of `+X+Y` already consumed)
pub fn read_offset(input: &str) -> Option<((i32, i32), &str)> {
    let (x, rest) = read_integer(input)?;
    if !rest.starts_with(['+', '-']) {
        return None;
    }
    let (y, rest) = read_integer(rest)?;
    Some(((x, y), rest))
}

/// Parse a complete `WxH` value
pub fn parse_size(value: &str) -> Option<Size> {
    match read_size(value.trim())? {
        (size, "") => Some(size),
        _ => None,
    }
}

/// Parse a complete `WxH+X+Y` value; the offset is optional
pub fn parse_rect(value: &str) -> Option<Rect> {
    let (size, rest) = read_size(value.trim())?;
    if rest.is_empty() {
        return Some(Rect::new(0, 0, size.width, size.height));
    }
    let rest = rest.strip_prefix('+').unwrap_or(rest);
    match read_offset(rest)? {
        ((x, y), "") => Some(Rect::new(x, y, size.width, size.height)),
        _ => None,
    }
}

/// Interpret yes/no style booleans
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Some(true),
        "no" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}
