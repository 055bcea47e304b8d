//! Policy-guarded retrieval and compliance engine.
//!
//! Every request runs the same sequential pipeline:
//! retrieval → draft → guardrail → audit. Evidence and policy shortfalls come
//! back as ABSTAIN / NEEDS_REVIEW results; only caller mistakes detectable
//! before retrieval are raised as [`EngineError`]s.

mod analyzer;
mod audit;
mod chat;
mod error;
mod evidence;
mod guardrail;
mod qa;
mod retriever;
pub mod testing;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use ifrsguard_ai::DraftGenerator;
use ifrsguard_core::{
    Answer, ConfigError, EngineConfig, Feedback, Interaction, InteractionOutput, RequestKind,
    TopicTag,
};
use ifrsguard_store::{DocumentStore, PassageSearch};
use tracing::{info, warn};

pub use analyzer::{Analyzer, overall_confidence};
pub use audit::{AuditFailure, AuditWriter, audit_row};
pub use chat::{Intent, TOOL_ANALYZE, TOOL_ASK, classify};
pub use error::EngineError;
pub use evidence::{Evidence, confidence};
pub use guardrail::{Guarded, Guardrail, PolicyReport, Violation};
pub use qa::QaAgent;
pub use retriever::{RetrieveError, Scope, TopicRetriever};

/// Abstention reasons produced outside the guardrail.
pub mod reason {
    pub const INSUFFICIENT_SOURCES: &str = "insufficient sources";
    pub const SOURCES_UNAVAILABLE: &str = "sources unavailable";
    pub const DRAFT_UNAVAILABLE: &str = "draft unavailable";
    pub const DOCUMENT_NOT_FOUND: &str = "document not found";
    pub const UNSUPPORTED_REQUEST: &str =
        "unsupported request: ask about IFRS 9, 13 or 16, or ask to analyze a document";
}

/// Caller identity and the upstream rate-limit verdict for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub user_id: String,
    pub rate_limited: bool,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            rate_limited: false,
        }
    }

    pub fn rate_limited(mut self) -> Self {
        self.rate_limited = true;
        self
    }

    fn admit(&self) -> Result<(), EngineError> {
        if self.rate_limited {
            warn!(user_id = %self.user_id, "rate limited, request rejected");
            return Err(EngineError::RateLimited(self.user_id.clone()));
        }
        Ok(())
    }
}

/// Result of a chat turn: the routed tool and its final output.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub intent: Intent,
    pub output: InteractionOutput,
}

/// The external collaborators an [`Engine`] runs against.
pub struct Collaborators {
    pub search: Arc<dyn PassageSearch>,
    pub documents: Arc<dyn DocumentStore>,
    pub generator: Arc<dyn DraftGenerator>,
    pub audit: AuditWriter,
}

pub struct Engine {
    qa: QaAgent,
    analyzer: Analyzer,
    guardrail: Arc<Guardrail>,
    audit: AuditWriter,
}

impl Engine {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config);
        let guardrail = Arc::new(Guardrail::new(&config.policy)?);
        let retriever = TopicRetriever::new(collaborators.search);
        Ok(Self {
            qa: QaAgent::new(
                retriever.clone(),
                Arc::clone(&collaborators.generator),
                config.retrieval.clone(),
            ),
            analyzer: Analyzer::new(
                retriever,
                collaborators.generator,
                collaborators.documents,
                Arc::clone(&guardrail),
                Arc::clone(&config),
            ),
            guardrail,
            audit: collaborators.audit,
        })
    }

    pub fn audit(&self) -> &AuditWriter {
        &self.audit
    }

    /// Answer `question`, optionally scoped by topic wire name and/or standard.
    pub async fn ask(
        &self,
        ctx: &RequestContext,
        question: &str,
        topic: Option<&str>,
        standard_filter: Option<&str>,
    ) -> Result<Answer, EngineError> {
        ctx.admit()?;
        let topic = topic.map(str::parse::<TopicTag>).transpose()?;
        let answer = self.answer_guarded(question, topic, standard_filter).await?;
        self.record(
            ctx,
            RequestKind::Ask,
            question,
            InteractionOutput::Answer(answer.clone()),
            None,
            BTreeSet::new(),
        )
        .await;
        Ok(answer)
    }

    /// Evaluate `document_id` against the checklist for `standard`.
    pub async fn analyze(
        &self,
        ctx: &RequestContext,
        document_id: &str,
        standard: &str,
    ) -> Result<Feedback, EngineError> {
        ctx.admit()?;
        let feedback = self.analyzer.analyze(document_id, standard).await?;
        self.record(
            ctx,
            RequestKind::Analyze,
            &format!("analyze {} against {}", document_id.trim(), standard.trim()),
            InteractionOutput::Feedback(feedback.clone()),
            None,
            BTreeSet::from([document_id.trim().to_string()]),
        )
        .await;
        Ok(feedback)
    }

    /// Route a free-form message to `ask` or `analyze`.
    pub async fn chat(
        &self,
        ctx: &RequestContext,
        message: &str,
    ) -> Result<ChatReply, EngineError> {
        ctx.admit()?;
        if message.trim().is_empty() {
            return Err(EngineError::InvalidInput("message is empty".into()));
        }
        let intent = classify(message);
        let (output, document_ids) = match &intent {
            Intent::Ask { question, topic } => {
                let answer = self.answer_guarded(question, *topic, None).await?;
                (InteractionOutput::Answer(answer), BTreeSet::new())
            }
            Intent::Analyze {
                document_id,
                standard,
            } => {
                let feedback = self.analyzer.analyze(document_id, standard).await?;
                (
                    InteractionOutput::Feedback(feedback),
                    BTreeSet::from([document_id.clone()]),
                )
            }
            Intent::Unknown => (
                InteractionOutput::Answer(Answer::abstain(reason::UNSUPPORTED_REQUEST)),
                BTreeSet::new(),
            ),
        };
        info!(tool = intent.tool().unwrap_or("none"), "chat routed");
        self.record(ctx, RequestKind::Chat, message, output.clone(), intent.tool(), document_ids)
            .await;
        Ok(ChatReply { intent, output })
    }

    pub fn list_topics(&self) -> Vec<TopicTag> {
        TopicTag::ALL.to_vec()
    }

    /// Pre-flight policy check of a candidate answer.
    pub fn validate_policy(&self, candidate: &Answer) -> PolicyReport {
        self.guardrail.report(candidate)
    }

    async fn answer_guarded(
        &self,
        question: &str,
        topic: Option<TopicTag>,
        standard_filter: Option<&str>,
    ) -> Result<Answer, EngineError> {
        let draft = self.qa.answer(question, topic, standard_filter).await?;
        let answer = self.guardrail.validate(draft);
        if answer.is_ok() {
            info!(
                confidence = answer.confidence,
                citations = answer.citations.len(),
                "answer released"
            );
        } else {
            warn!(reason = %answer.text, "answer abstained");
        }
        Ok(answer)
    }

    async fn record(
        &self,
        ctx: &RequestContext,
        request_kind: RequestKind,
        input: &str,
        output: InteractionOutput,
        tool_used: Option<&str>,
        document_ids: BTreeSet<String>,
    ) {
        self.audit
            .record(Interaction {
                timestamp: Utc::now(),
                user_id: ctx.user_id.clone(),
                request_kind,
                input_digest: input.trim().to_string(),
                output,
                tool_used: tool_used.map(str::to_string),
                document_ids,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedGenerator, StaticDocuments, StaticSearch};
    use ifrsguard_core::{AnswerStatus, Status};
    use ifrsguard_store::MemoryAuditLog;

    fn engine(log: Arc<MemoryAuditLog>) -> Engine {
        let search = StaticSearch::new()
            .hit(
                "Fair value is the price received to sell an asset.",
                "IFRS 13",
                "9",
                "ifrs13",
                0.9,
            )
            .hit("Fair value is market based.", "IFRS 13", "2", "ifrs13", 0.85);
        Engine::new(
            EngineConfig::default(),
            Collaborators {
                search: Arc::new(search),
                documents: Arc::new(StaticDocuments::new()),
                generator: Arc::new(ScriptedGenerator::replying("Fair value is an exit price.")),
                audit: AuditWriter::new(log),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn ask_records_one_interaction() {
        let log = Arc::new(MemoryAuditLog::new());
        let engine = engine(log.clone());
        let ctx = RequestContext::new("reviewer-1");
        let answer = engine
            .ask(&ctx, "What is fair value?", Some("ifrs13_measurement"), None)
            .await
            .unwrap();
        assert_eq!(answer.status, AnswerStatus::Ok);
        let rows = log.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "reviewer-1");
        assert_eq!(rows[0].status, "OK");
    }

    #[tokio::test]
    async fn rejected_requests_leave_no_audit_record() {
        let log = Arc::new(MemoryAuditLog::new());
        let engine = engine(log.clone());
        let ctx = RequestContext::new("reviewer-1");

        let err = engine.ask(&ctx, "", None, None).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        let err = engine.ask(&ctx, "q?", Some("ifrs17"), None).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownTopic(_)));
        let err = engine
            .ask(&ctx.clone().rate_limited(), "What is fair value?", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RateLimited(_)));
        let err = engine.analyze(&ctx, "doc-1", "IFRS 99").await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownStandard(_)));

        assert!(log.rows().is_empty());
    }

    #[tokio::test]
    async fn chat_records_tool_used() {
        let log = Arc::new(MemoryAuditLog::new());
        let engine = engine(log.clone());
        let reply = engine
            .chat(&RequestContext::new("u"), "What is fair value under IFRS 13?")
            .await
            .unwrap();
        assert_eq!(reply.output.status(), Status::Ok);
        assert_eq!(log.rows()[0].tool_used.as_deref(), Some(TOOL_ASK));
        assert_eq!(log.rows()[0].request_kind, "chat");
    }

    #[tokio::test]
    async fn chat_small_talk_abstains() {
        let log = Arc::new(MemoryAuditLog::new());
        let engine = engine(log.clone());
        let reply = engine.chat(&RequestContext::new("u"), "hello").await.unwrap();
        assert_eq!(reply.intent, Intent::Unknown);
        assert_eq!(reply.output.status(), Status::Abstain);
        assert!(log.rows()[0].tool_used.is_none());
    }

    #[test]
    fn list_topics_is_the_closed_set() {
        let engine = engine(Arc::new(MemoryAuditLog::new()));
        let names: Vec<&str> = engine.list_topics().iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["ifrs9_impairment", "ifrs16_leases", "ifrs13_measurement"]);
    }
}
