//! Topic-scoped retrieval over the external passage search.

use std::collections::BTreeMap;
use std::sync::Arc;

use ifrsguard_core::{Passage, TopicTag, UnknownTopic};
use ifrsguard_store::{PassageSearch, SearchHit, StoreError, metadata_keys};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error(transparent)]
    UnknownTopic(#[from] UnknownTopic),

    #[error("sources unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// Exact-match constraints for one retrieval.
///
/// `topic` and `standard` intersect: when both are given and name different
/// standards, nothing can match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub topic: Option<TopicTag>,
    pub standard: Option<String>,
    pub document_id: Option<String>,
}

impl Scope {
    pub fn topic(topic: Option<TopicTag>) -> Self {
        Self {
            topic,
            ..Self::default()
        }
    }

    /// The standard this scope is restricted to, if any.
    pub fn standard(&self) -> Option<&str> {
        self.topic
            .map(|t| t.standard())
            .or(self.standard.as_deref().map(str::trim))
    }

    /// Metadata filter for the search backend, or `None` when the scope is
    /// contradictory and can match nothing.
    pub fn filter(&self) -> Option<BTreeMap<String, String>> {
        let mut filter = BTreeMap::new();
        let topic_standard = self.topic.map(|t| t.standard());
        let explicit = self.standard.as_deref().map(str::trim);
        match (topic_standard, explicit) {
            (Some(a), Some(b)) if a != b => return None,
            (Some(s), _) | (None, Some(s)) => {
                filter.insert(metadata_keys::STANDARD.to_string(), s.to_string());
            }
            (None, None) => {}
        }
        if let Some(doc) = &self.document_id {
            filter.insert(metadata_keys::SOURCE_DOCUMENT_ID.to_string(), doc.clone());
        }
        Some(filter)
    }
}

/// Wraps a [`PassageSearch`] backend with topic scoping and result hygiene.
///
/// The scope filter is re-applied to whatever the backend returns, so a
/// backend that ignores filters or thresholds still yields correctly scoped,
/// ranked and truncated passages.
#[derive(Clone)]
pub struct TopicRetriever {
    search: Arc<dyn PassageSearch>,
}

impl TopicRetriever {
    pub fn new(search: Arc<dyn PassageSearch>) -> Self {
        Self { search }
    }

    /// Retrieve passages for `query`, restricted to the topic's standard when given.
    pub async fn retrieve(
        &self,
        query: &str,
        topic: Option<TopicTag>,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<Passage>, RetrieveError> {
        self.retrieve_scoped(query, &Scope::topic(topic), k, score_threshold)
            .await
    }

    /// Like [`retrieve`](Self::retrieve), resolving the topic from its wire
    /// name first. An unknown name fails before the backend is called.
    pub async fn retrieve_by_key(
        &self,
        query: &str,
        topic: Option<&str>,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<Passage>, RetrieveError> {
        let topic = topic.map(str::parse::<TopicTag>).transpose()?;
        self.retrieve(query, topic, k, score_threshold).await
    }

    pub async fn retrieve_scoped(
        &self,
        query: &str,
        scope: &Scope,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<Passage>, RetrieveError> {
        let Some(filter) = scope.filter() else {
            debug!(?scope, "contradictory scope, nothing to retrieve");
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits = self.search.search(query, &filter, k, score_threshold).await?;
        let mut passages: Vec<Passage> = hits
            .into_iter()
            .filter(|hit| hit.score >= score_threshold && matches_filter(hit, &filter))
            .map(to_passage)
            .collect();
        passages.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        passages.truncate(k);

        debug!(
            query_len = query.len(),
            standard = scope.standard().unwrap_or("*"),
            returned = passages.len(),
            "retrieved passages"
        );
        Ok(passages)
    }
}

fn matches_filter(hit: &SearchHit, filter: &BTreeMap<String, String>) -> bool {
    filter
        .iter()
        .all(|(key, value)| hit.metadata.get(key).is_some_and(|v| v == value))
}

fn to_passage(hit: SearchHit) -> Passage {
    let field = |key: &str| hit.metadata.get(key).cloned().unwrap_or_default();
    Passage {
        standard: field(metadata_keys::STANDARD),
        section: field(metadata_keys::SECTION),
        paragraph: field(metadata_keys::PARAGRAPH),
        source_document_id: field(metadata_keys::SOURCE_DOCUMENT_ID),
        relevance_score: hit.score.clamp(0.0, 1.0),
        text: hit.text,
    }
}
