//! Checklist analysis of one document against one standard.

use std::sync::Arc;

use ifrsguard_ai::{DraftGenerator, prompts};
use ifrsguard_core::{
    ChecklistItem, ChecklistTemplate, Citation, EngineConfig, Feedback, Requirement, Status,
};
use ifrsguard_store::DocumentStore;
use tracing::{debug, info, warn};

use crate::evidence::{Evidence, excerpt};
use crate::retriever::{RetrieveError, Scope, TopicRetriever};
use crate::{EngineError, Guardrail, reason};

const NOTE_EXCERPT_CHARS: usize = 160;

/// One evaluated requirement and whether any passage was found for it.
struct ItemOutcome {
    item: ChecklistItem,
    found_passages: bool,
}

pub struct Analyzer {
    retriever: TopicRetriever,
    generator: Arc<dyn DraftGenerator>,
    documents: Arc<dyn DocumentStore>,
    guardrail: Arc<Guardrail>,
    config: Arc<EngineConfig>,
}

impl Analyzer {
    pub fn new(
        retriever: TopicRetriever,
        generator: Arc<dyn DraftGenerator>,
        documents: Arc<dyn DocumentStore>,
        guardrail: Arc<Guardrail>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            retriever,
            generator,
            documents,
            guardrail,
            config,
        }
    }

    /// Evaluate `document_id` against the checklist for `standard`.
    ///
    /// The returned feedback has already passed the guardrail.
    pub async fn analyze(
        &self,
        document_id: &str,
        standard: &str,
    ) -> Result<Feedback, EngineError> {
        let document_id = document_id.trim();
        if document_id.is_empty() {
            return Err(EngineError::InvalidInput("document id is empty".into()));
        }
        let template = self
            .config
            .checklists
            .template(standard)
            .ok_or_else(|| EngineError::UnknownStandard(standard.trim().to_string()))?;

        match self.documents.get_document(document_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(document_id, "document not found, abstaining");
                return Ok(abstain(reason::DOCUMENT_NOT_FOUND));
            }
            Err(e) => {
                warn!(document_id, error = %e, "document store failed, abstaining");
                return Ok(abstain(reason::SOURCES_UNAVAILABLE));
            }
        }

        let mut outcomes = Vec::with_capacity(template.requirements.len());
        for requirement in &template.requirements {
            match self.evaluate(document_id, template, requirement).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(document_id, error = %e, "retrieval failed, abstaining");
                    return Ok(abstain(reason::SOURCES_UNAVAILABLE));
                }
            }
        }

        let draft = self.aggregate(template, outcomes);
        info!(
            document_id,
            standard = %template.standard,
            status = %draft.status,
            confidence = draft.confidence,
            "checklist evaluated"
        );
        Ok(self.guardrail.validate(draft))
    }

    async fn evaluate(
        &self,
        document_id: &str,
        template: &ChecklistTemplate,
        requirement: &Requirement,
    ) -> Result<ItemOutcome, RetrieveError> {
        let scope = Scope {
            topic: None,
            standard: Some(template.standard.clone()),
            document_id: Some(document_id.to_string()),
        };
        let retrieval = &self.config.retrieval;
        let passages = self
            .retriever
            .retrieve_scoped(
                &requirement.description,
                &scope,
                retrieval.k,
                retrieval.score_threshold,
            )
            .await?;

        let mut item = ChecklistItem {
            id: requirement.id.clone(),
            key: requirement.key.clone(),
            description: requirement.description.clone(),
            met: false,
            notes: None,
            citations: Vec::new(),
            is_critical: requirement.is_critical,
            confidence: 0.0,
        };
        let evidence = Evidence::assess(&passages, retrieval.max_passages_used);
        let Some(top) = evidence.used.first().cloned() else {
            item.notes = Some("No supporting passages found in the document".into());
            return Ok(ItemOutcome {
                item,
                found_passages: false,
            });
        };

        let addressed = self.verdict(template, requirement, &evidence).await;
        let supported = evidence.confidence >= self.config.analysis.evidence_floor;
        debug!(
            requirement = %requirement.id,
            addressed,
            supported,
            confidence = evidence.confidence,
            "requirement evaluated"
        );

        item.met = addressed && supported;
        item.notes = Some(format!(
            "{}: {}",
            Citation::from_passage(&top),
            excerpt(&top.text, NOTE_EXCERPT_CHARS)
        ));
        item.confidence = evidence.confidence;
        item.citations = evidence.citations;
        Ok(ItemOutcome {
            item,
            found_passages: true,
        })
    }

    /// Yes/no determination: the generator's verdict when it gives one,
    /// otherwise whether the passages mention any of the requirement's evidence terms.
    async fn verdict(
        &self,
        template: &ChecklistTemplate,
        requirement: &Requirement,
        evidence: &Evidence,
    ) -> bool {
        let prompt = prompts::checklist_prompt(&template.standard, &requirement.description);
        match self.generator.generate(&prompt, &evidence.used).await {
            Ok(reply) => {
                if let Some(verdict) = parse_verdict(&reply) {
                    return verdict;
                }
            }
            Err(e) => {
                debug!(requirement = %requirement.id, error = %e, "no generator verdict");
            }
        }
        mentions_evidence(requirement, evidence)
    }

    fn aggregate(&self, template: &ChecklistTemplate, outcomes: Vec<ItemOutcome>) -> Feedback {
        let any_found = outcomes.iter().any(|o| o.found_passages);
        let items: Vec<ChecklistItem> = outcomes.into_iter().map(|o| o.item).collect();

        if !any_found {
            return Feedback {
                status: Status::Abstain,
                summary: format!("Cannot analyze document: {}", reason::INSUFFICIENT_SOURCES),
                items,
                confidence: 0.0,
            };
        }

        let confidence = overall_confidence(&items, template.has_critical());
        let critical_failures = items.iter().filter(|i| i.is_critical && !i.met).count();
        let status = if confidence < self.config.policy.min_confidence {
            Status::Abstain
        } else if critical_failures > 0 {
            Status::NeedsReview
        } else {
            Status::Ok
        };
        let summary = summarize(&template.standard, &items, critical_failures, status);
        Feedback {
            status,
            summary,
            items,
            confidence,
        }
    }
}

fn abstain(reason: &str) -> Feedback {
    Feedback::abstain(format!("Cannot analyze document: {reason}"))
}

/// Minimum item confidence when the template has critical items, else the mean.
pub fn overall_confidence(items: &[ChecklistItem], has_critical: bool) -> f32 {
    if items.is_empty() {
        return 0.0;
    }
    if has_critical {
        items.iter().map(|i| i.confidence).fold(f32::INFINITY, f32::min)
    } else {
        items.iter().map(|i| i.confidence).sum::<f32>() / items.len() as f32
    }
}

/// `Some(true)` for a reply opening with "yes", `Some(false)` for "no".
fn parse_verdict(reply: &str) -> Option<bool> {
    let first = reply
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())?
        .to_ascii_lowercase();
    match first.as_str() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

fn mentions_evidence(requirement: &Requirement, evidence: &Evidence) -> bool {
    let terms: Vec<String> = requirement
        .evidence_terms
        .iter()
        .map(|t| t.to_lowercase())
        .collect();
    evidence.used.iter().any(|p| {
        let text = p.text.to_lowercase();
        terms.iter().any(|t| text.contains(t.as_str()))
    })
}

fn summarize(
    standard: &str,
    items: &[ChecklistItem],
    critical_failures: usize,
    status: Status,
) -> String {
    let total = items.len();
    let met = items.iter().filter(|i| i.met).count();
    let pct = if total == 0 {
        0.0
    } else {
        met as f32 / total as f32 * 100.0
    };

    let mut parts = vec![format!(
        "Document analysis completed with {pct:.1}% compliance ({met}/{total} items met)."
    )];
    if critical_failures > 0 {
        let noun = if critical_failures == 1 { "requirement" } else { "requirements" };
        parts.push(format!("{critical_failures} critical {noun} not met."));
    }
    if status == Status::Abstain {
        parts.push("Low confidence in analysis; manual review recommended.".into());
    }
    parts.push(if pct >= 80.0 {
        format!("Document shows good {standard} compliance.")
    } else if pct >= 60.0 {
        format!("Document shows moderate {standard} compliance; some improvements needed.")
    } else {
        format!("Document shows poor {standard} compliance; significant improvements needed.")
    });
    parts.join(" ")
}
