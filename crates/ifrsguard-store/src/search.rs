//! Contracts for the external retrieval backends.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::StoreError;

/// Metadata keys every indexed chunk must carry.
pub mod metadata_keys {
    pub const STANDARD: &str = "standard";
    pub const SECTION: &str = "section";
    pub const PARAGRAPH: &str = "paragraph";
    pub const SOURCE_DOCUMENT_ID: &str = "source_document_id";
}

/// One raw search result as returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub score: f32,
}

/// Ranked passage search over an index of chunked standards and uploaded documents.
///
/// `filter` entries are exact-match constraints on chunk metadata. Results are
/// ordered by descending score, contain at most `k` hits, and never include a
/// hit scoring below `score_threshold`.
#[async_trait]
pub trait PassageSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filter: &BTreeMap<String, String>,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError>;
}

/// Raw document text lookup, used to confirm a document exists before analysis.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, doc_id: &str) -> Result<Option<String>, StoreError>;
}
