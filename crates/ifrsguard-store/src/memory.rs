//! In-memory chunk index with keyword relevance scoring.
//!
//! Serves both collaborator contracts ([`PassageSearch`] and [`DocumentStore`])
//! for the CLI and tests. Reads run concurrently; inserts take a write lock.

use std::collections::{BTreeMap, HashSet};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::search::metadata_keys;
use crate::{DocumentStore, PassageSearch, SearchHit, StoreError};

/// A stored unit of text plus its retrieval metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub standard: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub paragraph: String,
    pub source_document_id: String,
}

impl Chunk {
    pub fn metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (metadata_keys::STANDARD.to_string(), self.standard.clone()),
            (metadata_keys::SECTION.to_string(), self.section.clone()),
            (metadata_keys::PARAGRAPH.to_string(), self.paragraph.clone()),
            (
                metadata_keys::SOURCE_DOCUMENT_ID.to_string(),
                self.source_document_id.clone(),
            ),
        ])
    }
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    chunks: RwLock<Vec<Chunk>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks: RwLock::new(chunks),
        }
    }

    /// Load chunks from a JSON-lines file, one [`Chunk`] object per line.
    pub fn load_jsonl(path: &Path) -> Result<Self, StoreError> {
        let file = std::fs::File::open(path)?;
        let mut chunks = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(&line)
                .map_err(|e| StoreError::Other(format!("{}:{}: {e}", path.display(), n + 1)))?;
            chunks.push(chunk);
        }
        info!(count = chunks.len(), path = %path.display(), "loaded chunk index");
        Ok(Self::from_chunks(chunks))
    }

    pub fn insert(&self, chunk: Chunk) -> Result<(), StoreError> {
        self.chunks
            .write()
            .map_err(|e| StoreError::Other(format!("index lock poisoned: {e}")))?
            .push(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PassageSearch for MemoryIndex {
    async fn search(
        &self,
        query: &str,
        filter: &BTreeMap<String, String>,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let chunks = self
            .chunks
            .read()
            .map_err(|e| StoreError::Unavailable(format!("index lock poisoned: {e}")))?;

        let mut hits: Vec<SearchHit> = chunks
            .iter()
            .filter_map(|chunk| {
                let metadata = chunk.metadata();
                let matches = filter
                    .iter()
                    .all(|(key, value)| metadata.get(key).is_some_and(|v| v == value));
                if !matches {
                    return None;
                }
                let score = keyword_relevance(query, &chunk.text);
                (score >= score_threshold).then(|| SearchHit {
                    text: chunk.text.clone(),
                    metadata,
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

#[async_trait]
impl DocumentStore for MemoryIndex {
    async fn get_document(&self, doc_id: &str) -> Result<Option<String>, StoreError> {
        let chunks = self
            .chunks
            .read()
            .map_err(|e| StoreError::Unavailable(format!("index lock poisoned: {e}")))?;
        let parts: Vec<&str> = chunks
            .iter()
            .filter(|c| c.source_document_id == doc_id)
            .map(|c| c.text.as_str())
            .collect();
        Ok((!parts.is_empty()).then(|| parts.join("\n\n")))
    }
}

/// Keyword relevance in [0, 1]: `0.7 × word overlap + 0.3 × phrase score`.
///
/// Word overlap is the share of distinct query words present in the content.
/// The phrase score is 1 when the whole query occurs verbatim, otherwise 0.3
/// per query word longer than two characters found as a substring, capped at 1.
pub fn keyword_relevance(query: &str, content: &str) -> f32 {
    let query = query.trim().to_lowercase();
    let content = content.to_lowercase();

    let query_words: HashSet<&str> = words(&query).collect();
    if query_words.is_empty() {
        return 0.0;
    }
    let content_words: HashSet<&str> = words(&content).collect();
    let shared = query_words.intersection(&content_words).count();
    let overlap = shared as f32 / query_words.len() as f32;

    let phrase = if content.contains(&query) {
        1.0
    } else {
        query_words
            .iter()
            .filter(|w| w.len() > 2 && content.contains(**w))
            .count() as f32
            * 0.3
    };

    (overlap * 0.7 + phrase.min(1.0) * 0.3).min(1.0)
}

fn words(s: &str) -> impl Iterator<Item = &str> {
    s.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, standard: &str, doc: &str) -> Chunk {
        Chunk {
            text: text.into(),
            standard: standard.into(),
            section: "Measurement".into(),
            paragraph: "9".into(),
            source_document_id: doc.into(),
        }
    }

    fn index() -> MemoryIndex {
        MemoryIndex::from_chunks(vec![
            chunk(
                "Fair value is the price that would be received to sell an asset in an orderly transaction.",
                "IFRS 13",
                "ifrs13",
            ),
            chunk(
                "Fair value measurement assumes the transaction takes place in the principal market.",
                "IFRS 13",
                "ifrs13",
            ),
            chunk(
                "An entity shall recognise a loss allowance for expected credit losses.",
                "IFRS 9",
                "ifrs9",
            ),
        ])
    }

    #[test]
    fn exact_phrase_scores_highest() {
        let exact = keyword_relevance("fair value", "Fair value is the price.");
        let partial = keyword_relevance("fair value", "The value of the asset.");
        assert!(exact > partial);
        assert!((exact - 1.0).abs() < 1e-6);
        assert_eq!(keyword_relevance("", "anything"), 0.0);
    }

    #[tokio::test]
    async fn search_orders_by_score_and_truncates() {
        let hits = index()
            .search("fair value measurement", &BTreeMap::new(), 1, 0.0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.starts_with("Fair value measurement"));
    }

    #[tokio::test]
    async fn filter_is_exact_match_on_metadata() {
        let filter = BTreeMap::from([("standard".to_string(), "IFRS 9".to_string())]);
        let hits = index()
            .search("fair value measurement", &filter, 6, 0.2)
            .await
            .unwrap();
        assert!(hits.is_empty());

        let filter = BTreeMap::from([("standard".to_string(), "IFRS 13".to_string())]);
        let hits = index()
            .search("fair value measurement", &filter, 6, 0.2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.metadata["standard"] == "IFRS 13"));
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn threshold_drops_weak_hits() {
        let hits = index()
            .search("expected credit losses", &BTreeMap::new(), 6, 0.9)
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.score >= 0.9));
    }

    #[tokio::test]
    async fn get_document_joins_chunks() {
        let index = index();
        let doc = index.get_document("ifrs13").await.unwrap().unwrap();
        assert!(doc.contains("orderly transaction"));
        assert!(doc.contains("principal market"));
        assert!(index.get_document("missing").await.unwrap().is_none());
    }

    #[test]
    fn load_jsonl_reads_one_chunk_per_line() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            concat!(
                r#"{"text":"Lease term","standard":"IFRS 16","source_document_id":"lease-1"}"#,
                "\n\n",
                r#"{"text":"Right-of-use asset","standard":"IFRS 16","paragraph":"22","source_document_id":"lease-1"}"#,
                "\n"
            ),
        )
        .unwrap();
        let index = MemoryIndex::load_jsonl(tmp.path()).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn load_jsonl_reports_bad_line() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "{not json}\n").unwrap();
        let err = MemoryIndex::load_jsonl(tmp.path()).unwrap_err();
        assert!(err.to_string().contains(":1:"));
    }
}
