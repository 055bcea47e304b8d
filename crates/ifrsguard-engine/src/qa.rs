//! Question answering: retrieve, weigh the evidence, draft.
//!
//! The returned answer is a draft. The engine runs it through the
//! [`Guardrail`](crate::Guardrail) before it is surfaced or audited.

use std::sync::Arc;

use ifrsguard_ai::{DraftGenerator, prompts};
use ifrsguard_core::{Answer, AnswerStatus, Passage, RetrievalConfig, TopicTag};
use tracing::{info, warn};

use crate::evidence::Evidence;
use crate::retriever::{RetrieveError, Scope, TopicRetriever};
use crate::{EngineError, reason};

/// Outcome of the retrieval stage.
enum Retrieved {
    Passages(Vec<Passage>),
    Empty,
    Unavailable(RetrieveError),
}

pub struct QaAgent {
    retriever: TopicRetriever,
    generator: Arc<dyn DraftGenerator>,
    retrieval: RetrievalConfig,
}

impl QaAgent {
    pub fn new(
        retriever: TopicRetriever,
        generator: Arc<dyn DraftGenerator>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            retriever,
            generator,
            retrieval,
        }
    }

    /// Draft an answer to `question`.
    ///
    /// `topic` and `standard_filter` both restrict retrieval by standard; when
    /// they disagree nothing is retrieved and the draft abstains.
    pub async fn answer(
        &self,
        question: &str,
        topic: Option<TopicTag>,
        standard_filter: Option<&str>,
    ) -> Result<Answer, EngineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(EngineError::InvalidInput("question is empty".into()));
        }
        let scope = Scope {
            topic,
            standard: standard_filter.map(str::to_string),
            document_id: None,
        };

        let passages = match self.retrieve(question, &scope).await {
            Retrieved::Passages(passages) => passages,
            Retrieved::Empty => {
                info!(standard = scope.standard().unwrap_or("*"), "no passages, abstaining");
                return Ok(Answer::abstain(reason::INSUFFICIENT_SOURCES));
            }
            Retrieved::Unavailable(e) => {
                warn!(error = %e, "retrieval failed, abstaining");
                return Ok(Answer::abstain(reason::SOURCES_UNAVAILABLE));
            }
        };

        let evidence = Evidence::assess(&passages, self.retrieval.max_passages_used);
        let prompt = prompts::question_prompt(question, scope.standard());
        let text = match self.generator.generate(&prompt, &evidence.used).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("generator returned an empty draft, abstaining");
                return Ok(Answer::abstain(reason::DRAFT_UNAVAILABLE));
            }
            Err(e) => {
                warn!(error = %e, "draft generation failed, abstaining");
                return Ok(Answer::abstain(reason::DRAFT_UNAVAILABLE));
            }
        };

        info!(
            passages = passages.len(),
            used = evidence.used.len(),
            confidence = evidence.confidence,
            "drafted answer"
        );
        Ok(Answer {
            status: AnswerStatus::Ok,
            text,
            citations: evidence.citations,
            confidence: evidence.confidence,
        })
    }

    async fn retrieve(&self, question: &str, scope: &Scope) -> Retrieved {
        match self
            .retriever
            .retrieve_scoped(
                question,
                scope,
                self.retrieval.k,
                self.retrieval.score_threshold,
            )
            .await
        {
            Ok(passages) if passages.is_empty() => Retrieved::Empty,
            Ok(passages) => Retrieved::Passages(passages),
            Err(e) => Retrieved::Unavailable(e),
        }
    }
}
