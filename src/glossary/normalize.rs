//! TextNormalizer - Canonical text forms for glossary comparison
//!
//! All matching happens on normalized text: lowercased, trimmed, with
//! invisible formatting characters removed. Scanned labels additionally
//! lose UI decoration (a trailing colon, a trailing count badge) that
//! never appears in stored triggers.

use regex::Regex;

// =============================================================================
// Constants
// =============================================================================

/// Zero-width and invisible formatting characters that hosts routinely
/// inject into rendered labels (i18n wrappers, copy/paste artifacts).
const INVISIBLE_CHARS: [char; 7] = [
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{200E}', // left-to-right mark
    '\u{200F}', // right-to-left mark
    '\u{2060}', // word joiner
    '\u{FEFF}', // BOM / zero-width no-break space
];

/// Soft hyphen, stripped alongside the zero-width set.
const SOFT_HYPHEN: char = '\u{00AD}';

// =============================================================================
// TextNormalizer
// =============================================================================

/// Canonicalizes text for comparison.
///
/// Two entry points with one shared core:
/// - `normalize_trigger` for stored triggers/aliases
/// - `normalize_label` for scanned tree text, which also strips a trailing
///   colon and a trailing parenthesized count (e.g. `"Deals (24)"`)
pub struct TextNormalizer {
    count_badge_re: Regex,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer {
    pub fn new() -> Self {
        // "(24)" style count badges appended to list/column headers
        let count_badge_re = Regex::new(r"\(\d+\)\s*$").unwrap();
        Self { count_badge_re }
    }

    /// Normalize a stored trigger or alias.
    pub fn normalize_trigger(&self, raw: &str) -> String {
        strip_invisible(raw).trim().to_lowercase()
    }

    /// Normalize scanned label text.
    ///
    /// Applies trigger normalization, then removes one trailing colon and
    /// one trailing count badge. Decoration stripping runs on labels only;
    /// a trigger that genuinely ends in a colon stays intact.
    pub fn normalize_label(&self, raw: &str) -> String {
        let mut text = self.normalize_trigger(raw);

        if let Some(stripped) = text.strip_suffix(':') {
            text = stripped.trim_end().to_string();
        }

        if let Some(badge_start) = self.count_badge_re.find(&text).map(|m| m.start()) {
            text.truncate(badge_start);
            let trimmed = text.trim_end().len();
            text.truncate(trimmed);
        }

        text
    }
}

/// Remove invisible formatting characters. Returns the input unchanged
/// (no allocation beyond the output string) when none are present.
fn strip_invisible(raw: &str) -> String {
    if raw.chars().any(|c| INVISIBLE_CHARS.contains(&c) || c == SOFT_HYPHEN) {
        raw.chars()
            .filter(|c| !INVISIBLE_CHARS.contains(c) && *c != SOFT_HYPHEN)
            .collect()
    } else {
        raw.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
