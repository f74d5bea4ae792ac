//! Redaction of payment codes.
//!
//! Every piece of user text that is logged, forwarded to the model, or quoted
//! in an outbound message goes through [`redact`] first.

use std::sync::LazyLock;

use regex::Regex;

/// Placeholder substituted for every matched code.
pub const REDACTION_PLACEHOLDER: &str = "[REDACTED]";

/// Amazon gift-card code shape: `XXXX-XXXXXX-XXXX`, uppercase alphanumerics.
///
/// Word boundaries are ASCII-only, so a code glued to an accented letter
/// (`éAB12-CD3456-EF78`) still matches.
pub static GIFT_CARD_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\b)[A-Z0-9]{4}-[A-Z0-9]{6}-[A-Z0-9]{4}(?-u:\b)")
        .expect("gift card pattern compiles")
});

/// Replace every gift-card code in `text` with [`REDACTION_PLACEHOLDER`].
///
/// Idempotent, and never fails: empty input yields empty output.
pub fn redact(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    GIFT_CARD_CODE
        .replace_all(text, REDACTION_PLACEHOLDER)
        .into_owned()
}

/// Redact, then cut to at most `max_chars` characters (appending `...` when cut).
pub fn redact_preview(text: &str, max_chars: usize) -> String {
    let redacted = redact(text);
    if redacted.chars().count() <= max_chars {
        return redacted;
    }
    let mut preview: String = redacted.chars().take(max_chars).collect();
    preview.push_str("...");
    preview
}
