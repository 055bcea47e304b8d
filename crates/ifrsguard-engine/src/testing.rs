//! Collaborators with fixed behaviour, for tests and offline demos.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use ifrsguard_ai::{DraftGenerator, GenerateError};
use ifrsguard_core::{Citation, Passage};
use ifrsguard_store::{
    AuditRow, AuditSink, AuditStats, DocumentStore, PassageSearch, SearchHit, StoreError,
    metadata_keys,
};

/// Passage search over a fixed hit list with preassigned scores.
///
/// Honours filter, threshold and `k` like a real backend; the query text is ignored.
#[derive(Debug, Default)]
pub struct StaticSearch {
    hits: Vec<SearchHit>,
    calls: AtomicUsize,
}

impl StaticSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(
        mut self,
        text: &str,
        standard: &str,
        paragraph: &str,
        document_id: &str,
        score: f32,
    ) -> Self {
        self.hits.push(SearchHit {
            text: text.to_string(),
            metadata: BTreeMap::from([
                (metadata_keys::STANDARD.to_string(), standard.to_string()),
                (metadata_keys::SECTION.to_string(), String::new()),
                (metadata_keys::PARAGRAPH.to_string(), paragraph.to_string()),
                (metadata_keys::SOURCE_DOCUMENT_ID.to_string(), document_id.to_string()),
            ]),
            score,
        });
        self
    }

    /// Number of searches served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PassageSearch for StaticSearch {
    async fn search(
        &self,
        _query: &str,
        filter: &BTreeMap<String, String>,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut hits: Vec<SearchHit> = self
            .hits
            .iter()
            .filter(|h| h.score >= score_threshold)
            .filter(|h| filter.iter().all(|(key, value)| h.metadata.get(key) == Some(value)))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Passage search whose backend is always down.
#[derive(Debug, Default)]
pub struct FailingSearch;

#[async_trait]
impl PassageSearch for FailingSearch {
    async fn search(
        &self,
        _query: &str,
        _filter: &BTreeMap<String, String>,
        _k: usize,
        _score_threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// Document store over a fixed id → text map.
#[derive(Debug, Default)]
pub struct StaticDocuments {
    docs: BTreeMap<String, String>,
}

impl StaticDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, text: &str) -> Self {
        self.docs.insert(id.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl DocumentStore for StaticDocuments {
    async fn get_document(&self, doc_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.docs.get(doc_id).cloned())
    }
}

/// Generator that returns a canned reply (or fails) and counts its calls.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DraftGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _passages: &[Passage],
    ) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| GenerateError::Unavailable("model offline".into()))
    }
}

/// Audit sink that rejects every write.
#[derive(Debug, Default)]
pub struct FailingSink;

impl AuditSink for FailingSink {
    fn append(&self, _row: &AuditRow) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("audit database is read-only".into()))
    }

    fn recent(&self, _limit: usize) -> Result<Vec<RecordBatch>, StoreError> {
        Ok(Vec::new())
    }

    fn citations_for(&self, _interaction_id: &str) -> Result<Vec<Citation>, StoreError> {
        Ok(Vec::new())
    }

    fn stats(&self) -> Result<AuditStats, StoreError> {
        Ok(AuditStats::default())
    }
}
