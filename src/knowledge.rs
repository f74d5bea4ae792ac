//! FAQ corpus and keyword-overlap relevance scoring.
//!
//! The corpus is a JSON array of `{question, answer, keywords?}` loaded once at
//! startup and read-only afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::FAQ_TOP_K;
use crate::error::KnowledgeError;

/// One FAQ entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Best matches for a query, strongest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub entries: Vec<FaqEntry>,
    /// Score of the first entry, 0 when nothing matched.
    pub best_score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<FaqEntry>,
}

impl KnowledgeBase {
    /// Read a corpus file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<FaqEntry> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), entries = entries.len(), "Loaded FAQ corpus");
        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<FaqEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Score every entry against `query` and return the top matches.
    ///
    /// Score = 2 per entry keyword contained in the query, plus 1 per query
    /// word contained in the question, plus 0.5 per query word contained in
    /// the answer. Zero scores are dropped; ties keep corpus order.
    pub fn search(&self, query: &str) -> SearchResult {
        let lower_query = query.to_lowercase();
        let words: Vec<&str> = lower_query.split_whitespace().collect();
        if words.is_empty() {
            return SearchResult::default();
        }

        let mut scored: Vec<(f64, &FaqEntry)> = self
            .entries
            .iter()
            .map(|entry| (score(entry, &lower_query, &words), entry))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        // `sort_by` is stable, so equal scores stay in corpus order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let best_score = scored.first().map(|(s, _)| *s).unwrap_or(0.0);
        let entries = scored
            .into_iter()
            .take(FAQ_TOP_K)
            .map(|(_, entry)| entry.clone())
            .collect();

        SearchResult {
            entries,
            best_score,
        }
    }
}

fn score(entry: &FaqEntry, lower_query: &str, words: &[&str]) -> f64 {
    let question = entry.question.to_lowercase();
    let answer = entry.answer.to_lowercase();

    let keyword_hits = entry
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && lower_query.contains(k.as_str()))
        .count();
    let question_hits = words.iter().filter(|w| question.contains(**w)).count();
    let answer_hits = words.iter().filter(|w| answer.contains(**w)).count();

    2.0 * keyword_hits as f64 + question_hits as f64 + 0.5 * answer_hits as f64
}

/// Render entries as model context.
pub fn format_context(entries: &[FaqEntry]) -> String {
    if entries.is_empty() {
        return "No relevant FAQ entries found.".to_string();
    }
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| format!("FAQ Entry {}:\nQ: {}\nA: {}", i + 1, e.question, e.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn entry(question: &str, answer: &str, keywords: &[&str]) -> FaqEntry {
        FaqEntry {
            question: question.into(),
            answer: answer.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn corpus() -> KnowledgeBase {
        KnowledgeBase::from_entries(vec![
            entry(
                "How do I activate my license key?",
                "Open the software and paste the key.",
                &["activate", "license"],
            ),
            entry(
                "My payment is pending",
                "Verification can take a few hours.",
                &["payment", "pending"],
            ),
            entry("Where is the download?", "Check your email.", &[]),
        ])
    }

    #[test]
    fn scoring_weights_keywords_question_and_answer() {
        let kb = KnowledgeBase::from_entries(vec![entry(
            "license question",
            "license answer",
            &["license"],
        )]);
        // keyword 2 + question 1 + answer 0.5
        let result = kb.search("license");
        assert_eq!(result.best_score, 3.5);
        assert_eq!(result.entries.len(), 1);
    }

    #[test]
    fn best_match_comes_first() {
        let result = corpus().search("how to activate license");
        assert_eq!(result.entries[0].question, "How do I activate my license key?");
        assert!(result.best_score >= 4.0);
    }

    #[test]
    fn unrelated_query_scores_zero() {
        let result = corpus().search("xyzzy");
        assert!(result.entries.is_empty());
        assert_eq!(result.best_score, 0.0);
    }

    #[test]
    fn empty_query_matches_nothing() {
        let result = corpus().search("   ");
        assert_eq!(result, SearchResult::default());
    }

    #[test]
    fn ties_keep_corpus_order_and_top_three() {
        let kb = KnowledgeBase::from_entries(
            (0..5)
                .map(|i| entry(&format!("refund {i}"), "n/a", &[]))
                .collect(),
        );
        let result = kb.search("refund");
        assert_eq!(result.entries.len(), 3);
        assert_eq!(result.entries[0].question, "refund 0");
        assert_eq!(result.entries[2].question, "refund 2");
        assert_eq!(result.best_score, 1.0);
    }

    #[test]
    fn context_formatting() {
        let kb = corpus();
        let text = format_context(&kb.entries()[..2]);
        assert!(text.starts_with("FAQ Entry 1:\nQ: How do I activate my license key?\nA: "));
        assert!(text.contains("\n\nFAQ Entry 2:\nQ: My payment is pending"));
        assert_eq!(format_context(&[]), "No relevant FAQ entries found.");
    }

    #[test]
    fn load_defaults_missing_keywords() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"question": "Q1", "answer": "A1", "keywords": ["k"]}},
                {{"question": "Q2", "answer": "A2"}}]"#
        )
        .unwrap();

        let kb = KnowledgeBase::load(file.path()).unwrap();
        assert_eq!(kb.entries().len(), 2);
        assert!(kb.entries()[1].keywords.is_empty());
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = KnowledgeBase::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, KnowledgeError::Io(_)));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        let malformed = KnowledgeBase::load(&bad).unwrap_err();
        assert!(matches!(malformed, KnowledgeError::Parse(_)));
    }
}
