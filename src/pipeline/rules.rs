//! Pre-LLM payment-code detection.
//!
//! Runs on the raw message text before anything else sees it. A match routes
//! the message to the payment channel and the answer pipeline is skipped.

use tracing::debug;

use crate::safety::GIFT_CARD_CODE;

/// Why a message was flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiftCardMatch {
    /// Text contains a code-shaped token.
    CodePattern,
    /// Text contains one of the configured keywords.
    Keyword(String),
}

/// Gift-card detector: code pattern plus case-insensitive keyword match.
#[derive(Debug, Clone, Default)]
pub struct GiftCardDetector {
    keywords: Vec<String>,
}

impl GiftCardDetector {
    /// Detector with the given keywords (compared lowercased).
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// Detector with no keywords (code pattern only).
    pub fn pattern_only() -> Self {
        Self::default()
    }

    /// Configured keywords, lowercased.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// True if `text` carries a gift-card code or mentions a keyword.
    pub fn detect(&self, text: &str) -> bool {
        self.classify(text).is_some()
    }

    /// Like [`detect`](Self::detect) but reports what matched.
    pub fn classify(&self, text: &str) -> Option<GiftCardMatch> {
        if text.is_empty() {
            return None;
        }
        if GIFT_CARD_CODE.is_match(text) {
            debug!("Message matched gift card code pattern");
            return Some(GiftCardMatch::CodePattern);
        }
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lower.contains(k.as_str()))
            .map(|k| {
                debug!(keyword = %k, "Message matched gift card keyword");
                GiftCardMatch::Keyword(k.clone())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_code_shaped_token() {
        let detector = GiftCardDetector::pattern_only();
        assert!(detector.detect("my code is AB12-CD3456-EF78"));
        assert_eq!(
            detector.classify("AB12-CD3456-EF78"),
            Some(GiftCardMatch::CodePattern)
        );
    }

    #[test]
    fn detects_code_after_accented_letter() {
        let detector = GiftCardDetector::pattern_only();
        assert_eq!(
            detector.classify("éAB12-CD3456-EF78"),
            Some(GiftCardMatch::CodePattern)
        );
        assert!(!detector.detect("XAB12-CD3456-EF78"));
    }

    #[test]
    fn keywords_match_case_insensitively() {
        let detector = GiftCardDetector::new(["Gift Card", "carte cadeau"]);
        assert!(detector.detect("I paid with a GIFT CARD yesterday"));
        assert!(detector.detect("J'ai une Carte Cadeau"));
        assert_eq!(
            detector.classify("gift card please"),
            Some(GiftCardMatch::Keyword("gift card".into()))
        );
    }

    #[test]
    fn plain_questions_pass() {
        let detector = GiftCardDetector::new(["gift card"]);
        assert!(!detector.detect("How do I activate my license key?"));
        assert!(!detector.detect("ab12-cd3456-ef78"));
    }

    #[test]
    fn empty_text_is_never_flagged() {
        let detector = GiftCardDetector::new(["gift card"]);
        assert!(!detector.detect(""));
    }

    #[test]
    fn blank_keywords_are_dropped() {
        let detector = GiftCardDetector::new(["", "  ", "code amazon"]);
        assert_eq!(detector.keywords(), ["code amazon"]);
        assert!(!detector.detect("anything at all"));
    }

    #[test]
    fn detection_is_pure() {
        let detector = GiftCardDetector::new(["gift card"]);
        let text = "gift card AB12-CD3456-EF78";
        assert_eq!(detector.classify(text), detector.classify(text));
        assert_eq!(text, "gift card AB12-CD3456-EF78");
    }
}
