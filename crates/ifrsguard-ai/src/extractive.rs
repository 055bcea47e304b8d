//! Deterministic generator that quotes the lead sentence of each passage.
//!
//! Needs no model or network. Used by the CLI when no endpoint is configured
//! and by tests that need stable draft text.

use async_trait::async_trait;
use ifrsguard_core::{Citation, Passage};
use tracing::debug;

use crate::{DraftGenerator, GenerateError};

#[derive(Debug, Clone, Default)]
pub struct ExtractiveGenerator {
    /// Cap on sentences quoted per draft; `None` quotes one per passage.
    max_sentences: Option<usize>,
}

impl ExtractiveGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_sentences(max_sentences: usize) -> Self {
        Self {
            max_sentences: Some(max_sentences),
        }
    }
}

#[async_trait]
impl DraftGenerator for ExtractiveGenerator {
    async fn generate(&self, prompt: &str, passages: &[Passage]) -> Result<String, GenerateError> {
        let limit = self.max_sentences.unwrap_or(passages.len());
        let lines: Vec<String> = passages
            .iter()
            .filter_map(|p| lead_sentence(&p.text).map(|s| (p, s)))
            .take(limit)
            .map(|(p, sentence)| format!("{}: {sentence}", Citation::from_passage(p)))
            .collect();
        if lines.is_empty() {
            return Err(GenerateError::Empty);
        }
        debug!(prompt_len = prompt.len(), sentences = lines.len(), "extractive draft");
        Ok(lines.join("\n"))
    }
}

/// First sentence of `text`, whitespace-normalised.
fn lead_sentence(text: &str) -> Option<String> {
    let normalised = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalised.is_empty() {
        return None;
    }
    let end = normalised
        .char_indices()
        .find(|(i, c)| {
            matches!(c, '.' | '?' | '!')
                && normalised[i + c.len_utf8()..]
                    .chars()
                    .next()
                    .is_none_or(char::is_whitespace)
        })
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(normalised.len());
    Some(normalised[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn passage(text: &str, paragraph: &str) -> Passage {
        Passage {
            text: text.into(),
            standard: "IFRS 13".into(),
            section: "Definition".into(),
            paragraph: paragraph.into(),
            relevance_score: 0.9,
            source_document_id: "ifrs13".into(),
        }
    }

    #[test]
    fn lead_sentence_stops_at_terminal_punctuation() {
        assert_eq!(
            lead_sentence("Level 1 inputs are quoted prices.  Level 2 follows.").as_deref(),
            Some("Level 1 inputs are quoted prices.")
        );
        assert_eq!(
            lead_sentence("See para 72.1 for details").as_deref(),
            Some("See para 72.1 for details")
        );
        assert!(lead_sentence("   ").is_none());
    }

    #[tokio::test]
    async fn quotes_one_sentence_per_passage_with_citation() {
        let draft = ExtractiveGenerator::new()
            .generate(
                "Question: What is fair value?",
                &[
                    passage("Fair value is an exit price. It is market based.", "9"),
                    passage("A fair value measurement assumes an orderly transaction.", "15"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(
            draft,
            "IFRS 13 ¶9 (Definition): Fair value is an exit price.\n\
             IFRS 13 ¶15 (Definition): A fair value measurement assumes an orderly transaction."
        );
    }

    #[tokio::test]
    async fn respects_sentence_cap() {
        let draft = ExtractiveGenerator::with_max_sentences(1)
            .generate("q", &[passage("One.", "1"), passage("Two.", "2")])
            .await
            .unwrap();
        assert_eq!(draft.lines().count(), 1);
    }

    #[tokio::test]
    async fn empty_passages_is_an_error() {
        let result = ExtractiveGenerator::new().generate("q", &[]).await;
        assert!(matches!(result, Err(GenerateError::Empty)));
    }
}
