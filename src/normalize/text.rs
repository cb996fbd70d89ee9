//! Text and label normalization.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Trim, lowercase and strip diacritics (NFD decomposition, combining marks dropped).
///
/// ```
/// use pharmacy_audit::normalize::text::normalize_text;
///
/// assert_eq!(normalize_text("  Éphédrine Forte "), "ephedrine forte");
/// ```
pub fn normalize_text(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Normalize a column label for alias lookup.
///
/// On top of [`normalize_text`], runs of whitespace, `-` and `.` collapse into a single `_`
/// so that `"PA HT"`, `"pa-ht"` and `"pa_ht"` all map to the same key.
pub fn normalize_label(label: &str) -> String {
    let text = normalize_text(label);
    let mut out = String::with_capacity(text.len());
    let mut pending_sep = false;
    for c in text.chars() {
        if c.is_whitespace() || c == '-' || c == '.' || c == '_' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.push(c);
    }
    out
}
