use std::borrow::Cow;

/// Ellipsis appended to truncated text
const ELLIPSIS: &str = "...";

/// Truncates a string to at most `max_chars` characters.
///
/// If truncation is necessary, appends "..." after the kept characters, so
/// the result may be up to `max_chars + 3` characters long. Counting is by
/// Unicode scalar value, never splitting a multi-byte character.
///
/// Returns `Cow::Borrowed` when the string already fits.
///
/// # Examples
///
/// ```
/// use newspush::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 5), "Hello...");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        None => Cow::Borrowed(s),
        Some((cut, _)) => Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS)),
    }
}

/// Converts an HTML fragment to a single line of plain text.
///
/// Markup is removed with `nanohtml2text`. Entities it leaves behind are
/// decoded with `htmlescape`; text with a malformed entity is kept as is.
/// Whitespace runs collapse to a single space and the result is trimmed.
pub fn html_to_text(html: &str) -> String {
    let text = nanohtml2text::html2text(html);
    let decoded = if text.contains('&') {
        htmlescape::decode_html(&text).unwrap_or(text)
    } else {
        text
    };
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip ASCII control characters except tab, newline and carriage return.
///
/// Feed text ends up in chat messages, where stray control bytes render as
/// garbage. Returns `Cow::Borrowed` when there is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_stripped = |c: char| c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r');
    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_stripped(c)).collect())
}
