//! Text-producing transforms: string, html, bytes, boolean and coordinates.

use crate::stringutils::decode_lossy;
use crate::transform::{CellValue, Transform, TransformContext};
use crate::value::Value;

const NULL_TEXT: &str = "<NULL>";
const ELLIPSIS: &str = " [...]";

/// Python-style line splitting: every line boundary character counts, `\r\n`
/// is one boundary, and a trailing boundary adds no empty line.
fn split_lines(s: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let boundary = matches!(
            c,
            '\n' | '\r' | '\u{b}' | '\u{c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}' | '\u{2028}' | '\u{2029}'
        );
        if !boundary {
            continue;
        }
        lines.push(&s[start..i]);
        let mut end = i + c.len_utf8();
        if c == '\r'
            && let Some(&(j, '\n')) = chars.peek()
        {
            chars.next();
            end = j + 1;
        }
        start = end;
    }
    if start < s.len() {
        lines.push(&s[start..]);
    }
    lines
}

/// Escape control characters the way a debug representation would.
fn escape_controls(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if u32::from(c) < 0x20 || c == '\u{7f}' => {
                escaped.push_str(&format!("\\x{:02x}", u32::from(c)));
            }
            c => escaped.push(c),
        }
    }
    escaped
}

fn decode(bytes: &[u8], ctx: &TransformContext<'_>) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => match ctx.decode_fallback {
            Some(fallback) => fallback(bytes),
            None => decode_lossy(bytes),
        },
    }
}

fn finish_text(text: String, ctx: &TransformContext<'_>) -> String {
    let text = if text.starts_with('\0') {
        escape_controls(&text)
    } else {
        text
    };
    let text = if ctx.oneline {
        split_lines(&text).join(" ")
    } else {
        text
    };
    match ctx.max_length {
        Some(max) if text.chars().count() > max => {
            let cut: String = text.chars().take(max).collect();
            format!("{cut}{ELLIPSIS}")
        }
        _ => text,
    }
}

/// Display text for any value: `<NULL>` for null, UTF-8 decoding for blobs,
/// then line joining and truncation as set in `ctx`.
pub fn format_string(value: &Value, ctx: &TransformContext<'_>) -> String {
    let text = match value {
        Value::Null => return NULL_TEXT.to_string(),
        Value::Text(text) => text.clone(),
        Value::Blob(bytes) => decode(bytes, ctx),
        other => other.to_string(),
    };
    finish_text(text, ctx)
}

/// Resolve HTML character references.
///
/// Handles the XML entities, `&nbsp;` and numeric references; anything else
/// is kept verbatim.
pub fn unescape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let c = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Human-readable size with binary prefixes, e.g. `2.3 kB`.
///
/// Returns `None` for negative sizes.
pub fn humanize_bytes(bytes: f64) -> Option<String> {
    const UNITS: [(&str, u64); 6] = [
        ("PB", 1 << 50),
        ("TB", 1 << 40),
        ("GB", 1 << 30),
        ("MB", 1 << 20),
        ("kB", 1 << 10),
        ("B", 0),
    ];
    UNITS
        .iter()
        .find(|(_, factor)| bytes >= *factor as f64)
        .map(|(suffix, factor)| format!("{:.1} {suffix}", bytes / (*factor).max(1) as f64))
}

/// The default transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringTransform;

impl Transform for StringTransform {
    fn apply(&self, value: &Value, ctx: &TransformContext<'_>) -> CellValue {
        CellValue::Text(format_string(value, ctx))
    }
}

/// Unescapes HTML entities, collapsing whitespace in one-line mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTransform;

impl Transform for HtmlTransform {
    fn apply(&self, value: &Value, ctx: &TransformContext<'_>) -> CellValue {
        let text = match value {
            Value::Null => return CellValue::Text(NULL_TEXT.to_string()),
            Value::Text(text) => text.clone(),
            Value::Blob(bytes) => decode(bytes, ctx),
            other => other.to_string(),
        };
        let text = unescape_html(&text);
        let text = if ctx.oneline {
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            text
        };
        CellValue::Text(finish_text(text, ctx))
    }
}

/// Yes/no indicator.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanTransform;

impl Transform for BooleanTransform {
    fn apply(&self, value: &Value, _ctx: &TransformContext<'_>) -> CellValue {
        CellValue::Indicator(value.is_truthy())
    }

    fn inverse(&self, value: &Value) -> Option<Value> {
        Some(Value::from(value.is_truthy()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BytesTransform;

impl Transform for BytesTransform {
    fn apply(&self, value: &Value, ctx: &TransformContext<'_>) -> CellValue {
        let text = match value {
            Value::Null => Some(String::new()),
            Value::Integer(_) | Value::Real(_) => value.as_f64().and_then(humanize_bytes),
            _ => None,
        };
        CellValue::Text(text.unwrap_or_else(|| format_string(value, ctx)))
    }
}

/// Coordinates stored as up to 8 digits with six implied decimals:
/// `12345678` is `12.345678`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DegreeDecimalTransform;

impl DegreeDecimalTransform {
    fn format(digits: &str) -> Option<String> {
        if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let padded = format!("{digits:0>7}");
        let (whole, fraction) = padded.split_at(padded.len() - 6);
        Some(format!("{whole}.{fraction}"))
    }
}

impl Transform for DegreeDecimalTransform {
    fn apply(&self, value: &Value, ctx: &TransformContext<'_>) -> CellValue {
        let text = value.as_str().and_then(Self::format);
        CellValue::Text(text.unwrap_or_else(|| format_string(value, ctx)))
    }
}
