//! Text helpers shared by the extractor, the aggregator and the renderers.

use std::borrow::Cow;

const BULLET_MARKERS: [char; 3] = ['*', '-', '•'];

/// Bounds applied to every extracted free-text value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLimits {
    /// Values shorter than this (in chars) count as a miss.
    pub min_value_chars: usize,
    /// Longer values are cut to this many chars.
    pub max_field_chars: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            min_value_chars: 4,
            max_field_chars: 150,
        }
    }
}

pub fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Returns the text after a leading bullet marker, or `None` when the line is
/// not a bullet.
pub fn strip_bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix(BULLET_MARKERS)?;
    Some(rest.trim_start_matches(BULLET_MARKERS).trim())
}

pub fn clean_value(raw: &str, limits: FieldLimits) -> Option<String> {
    let value = raw.trim();
    let value = strip_bullet(value).unwrap_or(value);
    let value = value.trim_matches(|c: char| c == '*' || c.is_whitespace());

    if value.chars().count() < limits.min_value_chars.max(1) {
        return None;
    }

    Some(truncate_chars(value, limits.max_field_chars))
}

pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => value[..byte_idx].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// `needles` must already be lowercase.
pub fn contains_any(haystack: &str, needles: &[String]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|needle| lower.contains(needle.as_str()))
}

pub fn lowercase_all<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| value.as_ref().trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}
