//! Formatting helpers for chat replies.

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count with base-1024 units, e.g. `12.34 MB`.
///
/// Values past the terabyte range stay in TB.
pub fn human_readable_size(bytes: u64, decimal_places: usize) -> String {
    let mut size = bytes as f64;
    for unit in &SIZE_UNITS[..SIZE_UNITS.len() - 1] {
        if size < 1024.0 {
            return format!("{size:.decimal_places$} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.decimal_places$} TB")
}

/// Format seconds as `m:ss`, or `h:mm:ss` past one hour.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Escape text for the Bot API's HTML parse mode.
///
/// Only `&`, `<` and `>` are significant there; everything else, including
/// Markdown punctuation, is shown as typed.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
