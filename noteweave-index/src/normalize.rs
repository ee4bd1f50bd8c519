//! Title identity: Unicode NFC composition followed by case folding.
//!
//! Every cache key goes through [`normalize`]; comparing raw titles anywhere
//! else produces duplicate documents and missed backlinks.

use unicode_normalization::UnicodeNormalization;

/// Canonical key for a title or link target.
pub fn normalize(title: &str) -> String {
    // Lowercasing can produce decomposed sequences (e.g. 'İ'), so compose again.
    let composed: String = title.trim().nfc().collect();
    composed.to_lowercase().nfc().collect()
}

/// Whether two titles name the same document.
pub fn titles_match(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// NFC-compose without case folding, for display strings.
pub fn compose(text: &str) -> String {
    text.nfc().collect()
}
