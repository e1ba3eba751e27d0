//! Text helpers for rendering arbitrary stored values.

/// Whether `c` can be shown as is: any character from space upwards, plus
/// the whitespace controls `\t` through `\r`.
pub fn is_printable(c: char) -> bool {
    u32::from(c) >= 32 || ('\u{9}'..='\u{d}').contains(&c)
}

/// Replace every character that is not [printable](is_printable) with
/// U+FFFD.
pub fn replace_non_printable(s: &str) -> String {
    s.chars()
        .map(|c| if is_printable(c) { c } else { char::REPLACEMENT_CHARACTER })
        .collect()
}

/// Decode bytes that are not valid UTF-8: lossy decoding followed by
/// [`replace_non_printable`].
pub fn decode_lossy(bytes: &[u8]) -> String {
    replace_non_printable(&String::from_utf8_lossy(bytes))
}
