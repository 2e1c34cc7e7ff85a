//! Shared utility helpers.

/// Case-insensitive starts_with check without allocating.
#[inline]
pub fn starts_with_ci(haystack: &str, needle: &str) -> bool {
    haystack.len() >= needle.len()
        && haystack.as_bytes()[..needle.len()].eq_ignore_ascii_case(needle.as_bytes())
}

/// Lower-cased lookup key for an identifier.
#[inline]
pub fn ident_key(value: &str) -> String {
    value.to_lowercase()
}

/// Wrap an identifier in `quote`, doubling any embedded quote characters.
///
/// Backticks are closed by backticks; `"` and `[` follow the usual ANSI and
/// T-SQL rules.
pub fn quote_ident(value: &str, quote: char) -> String {
    let close = match quote {
        '[' => ']',
        other => other,
    };
    let escaped = value.replace(close, &format!("{close}{close}"));
    format!("{quote}{escaped}{close}")
}
