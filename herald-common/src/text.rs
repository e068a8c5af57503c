//! SMS text shaping.
//!
//! Truncation is byte-budgeted (GSM segment limits are byte limits) but
//! always cuts on a `char` boundary.

/// Maximum byte length of a single SMS segment.
pub const SINGLE_SMS_MAX_BYTES: usize = 160;

/// Maximum byte length of a concatenated SMS.
pub const CONCAT_SMS_MAX_BYTES: usize = 1600;

/// Truncate `text` to at most `max` bytes.
///
/// Text within budget is returned untouched. Otherwise three bytes are
/// reserved for the `"..."` suffix and the cut prefers the last space in the
/// right half of the prefix, falling back to a hard cut. A budget below four
/// bytes leaves no room for the suffix, so the text is hard-cut only.
#[must_use]
pub fn truncate_message(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }

    if max < 4 {
        return text[..floor_char_boundary(text, max)].to_string();
    }

    let budget = floor_char_boundary(text, max - 3);
    let prefix = &text[..budget];
    let half = floor_char_boundary(prefix, budget / 2);

    match prefix[half..].rfind(' ') {
        Some(offset) => format!("{}...", &prefix[..half + offset]),
        None => format!("{prefix}..."),
    }
}

/// The largest index `<= max` that falls on a `char` boundary.
fn floor_char_boundary(text: &str, max: usize) -> usize {
    let mut index = max.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
