//! End-to-end scenarios against in-memory collaborators.

use std::sync::Arc;

use ifrsguard_ai::ExtractiveGenerator;
use ifrsguard_core::{Answer, AnswerStatus, Citation, EngineConfig, Status};
use ifrsguard_engine::testing::{FailingSink, ScriptedGenerator, StaticDocuments, StaticSearch};
use ifrsguard_engine::{
    AuditWriter, Collaborators, Engine, Guardrail, RequestContext, Violation,
};
use ifrsguard_store::{AuditSink, MemoryAuditLog};
use pretty_assertions::assert_eq;

fn standards_corpus() -> StaticSearch {
    StaticSearch::new()
        .hit(
            "Fair value is the price that would be received to sell an asset in an orderly transaction.",
            "IFRS 13", "9", "ifrs13-standard", 0.9,
        )
        .hit(
            "A fair value measurement is for a particular asset or liability.",
            "IFRS 13", "11", "ifrs13-standard", 0.85,
        )
        .hit(
            "A fair value measurement assumes the transaction takes place in the principal market.",
            "IFRS 13", "16", "ifrs13-standard", 0.81,
        )
}

/// Valuation memo that never states a hierarchy level.
fn doc_42_corpus(search: StaticSearch) -> StaticSearch {
    search
        .hit(
            "The principal market for the bonds is the London OTC market. The income approach is applied.",
            "IFRS 13", "24", "doc-42", 0.85,
        )
        .hit(
            "Observable inputs such as quoted yields are maximised; non-performance risk is reflected.",
            "IFRS 13", "67", "doc-42", 0.85,
        )
        .hit(
            "Fair value disclosures are presented in note 12.",
            "IFRS 13", "93", "doc-42", 0.85,
        )
}

fn engine_with(search: StaticSearch, log: Arc<dyn AuditSink>) -> Engine {
    Engine::new(
        EngineConfig::default(),
        Collaborators {
            search: Arc::new(search),
            documents: Arc::new(
                StaticDocuments::new().with("doc-42", "Valuation memo for corporate bonds"),
            ),
            generator: Arc::new(ExtractiveGenerator::new()),
            audit: AuditWriter::new(log),
        },
    )
    .unwrap()
}

fn ctx() -> RequestContext {
    RequestContext::new("reviewer-1")
}

#[tokio::test]
async fn scenario_a_fair_value_question_is_answered_with_ifrs13_citations() {
    let log = Arc::new(MemoryAuditLog::new());
    let engine = engine_with(standards_corpus(), log.clone());

    let answer = engine
        .ask(&ctx(), "What is fair value measurement?", Some("ifrs13_measurement"), None)
        .await
        .unwrap();

    assert_eq!(answer.status, AnswerStatus::Ok, "{}", answer.text);
    assert!(answer.confidence <= 0.9);
    assert!(answer.confidence >= 0.65);
    assert!(!answer.citations.is_empty());
    assert!(answer.citations.iter().all(|c| c.standard == "IFRS 13"));

    let rows = log.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].citations, answer.citations);
}

#[tokio::test]
async fn scenario_b_mismatched_topic_abstains() {
    let log = Arc::new(MemoryAuditLog::new());
    let engine = engine_with(standards_corpus(), log.clone());

    let answer = engine
        .ask(&ctx(), "What is fair value measurement?", Some("ifrs9_impairment"), None)
        .await
        .unwrap();

    assert_eq!(answer, Answer::abstain("insufficient sources"));
    assert_eq!(log.rows()[0].status, "ABSTAIN");
}

#[test]
fn scenario_c_overconfident_language_escalates() {
    let guardrail = Guardrail::new(&EngineConfig::default().policy).unwrap();
    let draft = Answer {
        status: AnswerStatus::Ok,
        text: "This is guaranteed to be compliant".into(),
        citations: vec![Citation {
            standard: "IFRS 13".into(),
            paragraph: Some("72".into()),
            section: Some("Fair value hierarchy".into()),
        }],
        confidence: 0.9,
    };

    assert_eq!(guardrail.check(&draft), Some(Violation::OverconfidentLanguage));
    let out = guardrail.validate(draft);
    assert_eq!(out.status, AnswerStatus::Abstain);
    assert_eq!(out.text, "Policy violation: overconfident language");
    assert!(out.citations.is_empty());
}

#[tokio::test]
async fn scenario_d_failed_critical_item_needs_review() {
    let log = Arc::new(MemoryAuditLog::new());
    let engine = engine_with(doc_42_corpus(standards_corpus()), log.clone());

    let feedback = engine.analyze(&ctx(), "doc-42", "IFRS 13").await.unwrap();

    assert_eq!(feedback.status, Status::NeedsReview, "{}", feedback.summary);
    let hierarchy = feedback
        .items
        .iter()
        .find(|i| i.key == "hierarchy_classification")
        .unwrap();
    assert!(hierarchy.is_critical);
    assert!(!hierarchy.met);
    assert!(
        feedback
            .items
            .iter()
            .filter(|i| i.key != "hierarchy_classification")
            .all(|i| i.met)
    );
    assert!((feedback.confidence - 0.8).abs() < 0.01, "{}", feedback.confidence);
    // Only the analysed document is cited.
    assert!(feedback.citations().all(|c| c.paragraph.as_deref() != Some("9")));

    let rows = log.rows();
    assert_eq!(rows[0].status, "NEEDS_REVIEW");
    assert_eq!(rows[0].document_ids, vec!["doc-42"]);
}

#[tokio::test]
async fn analysis_without_document_passages_abstains() {
    // doc-42 exists but none of its passages are indexed.
    let engine = engine_with(standards_corpus(), Arc::new(MemoryAuditLog::new()));
    let feedback = engine.analyze(&ctx(), "doc-42", "IFRS 13").await.unwrap();
    assert_eq!(feedback.status, Status::Abstain);
}

#[tokio::test]
async fn missing_document_is_an_audited_abstention() {
    let log = Arc::new(MemoryAuditLog::new());
    let engine = engine_with(standards_corpus(), log.clone());

    let feedback = engine.analyze(&ctx(), "doc-missing", "IFRS 13").await.unwrap();

    assert_eq!(feedback.status, Status::Abstain);
    assert!(feedback.summary.contains("document not found"));
    assert!(feedback.items.is_empty());
    let rows = log.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "ABSTAIN");
    assert_eq!(rows[0].document_ids, vec!["doc-missing"]);
}

#[tokio::test]
async fn final_ok_citations_come_from_retrieved_standards() {
    let search = standards_corpus().hit(
        "Lessees recognise a right-of-use asset.",
        "IFRS 16", "22", "ifrs16-standard", 0.95,
    );
    let engine = engine_with(search, Arc::new(MemoryAuditLog::new()));
    let answer = engine
        .ask(&ctx(), "What is fair value measurement?", None, Some("IFRS 13"))
        .await
        .unwrap();
    assert!(answer.is_ok());
    assert!(answer.citations.iter().all(|c| c.standard == "IFRS 13"));
}

#[tokio::test]
async fn weak_evidence_is_escalated_by_the_confidence_floor() {
    let search = StaticSearch::new().hit(
        "Fair value hierarchy.",
        "IFRS 13", "72", "ifrs13-standard", 0.5,
    );
    let engine = engine_with(search, Arc::new(MemoryAuditLog::new()));
    let answer = engine.ask(&ctx(), "fair value hierarchy", None, None).await.unwrap();
    assert_eq!(answer.status, AnswerStatus::Abstain);
    assert_eq!(answer.text, "Policy violation: confidence below threshold");
}

#[tokio::test]
async fn audit_failure_does_not_alter_the_result() {
    let healthy = engine_with(standards_corpus(), Arc::new(MemoryAuditLog::new()));
    let broken = engine_with(standards_corpus(), Arc::new(FailingSink));

    let q = "What is fair value measurement?";
    let a = healthy.ask(&ctx(), q, Some("ifrs13_measurement"), None).await.unwrap();
    let b = broken.ask(&ctx(), q, Some("ifrs13_measurement"), None).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(broken.audit().failure_count(), 1);
    assert_eq!(healthy.audit().failure_count(), 0);
}

#[tokio::test]
async fn overconfident_generator_output_never_reaches_the_caller() {
    let log = Arc::new(MemoryAuditLog::new());
    let engine = Engine::new(
        EngineConfig::default(),
        Collaborators {
            search: Arc::new(standards_corpus()),
            documents: Arc::new(StaticDocuments::new()),
            generator: Arc::new(ScriptedGenerator::replying(
                "Fair value is certainly the exit price.",
            )),
            audit: AuditWriter::new(log.clone()),
        },
    )
    .unwrap();

    let answer = engine
        .ask(&ctx(), "What is fair value?", Some("ifrs13_measurement"), None)
        .await
        .unwrap();
    assert_eq!(answer.status, AnswerStatus::Abstain);
    assert!(!log.rows()[0].output.contains("certainly"));
}

#[test]
fn validate_policy_reports_every_violation() {
    let engine = engine_with(StaticSearch::new(), Arc::new(MemoryAuditLog::new()));
    let candidate = Answer {
        status: AnswerStatus::Ok,
        text: "Always use this for legal representation.".into(),
        citations: vec![],
        confidence: 0.4,
    };
    let report = engine.validate_policy(&candidate);
    assert!(!report.valid);
    assert_eq!(
        report.violations,
        vec![
            "missing citation",
            "confidence below threshold",
            "overconfident language",
            "restricted advice category",
        ]
    );
}

#[cfg(feature = "duckdb")]
#[tokio::test]
async fn interactions_persist_to_duckdb() {
    use ifrsguard_store::DuckAuditStore;

    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("audit.duckdb");
    let store = Arc::new(DuckAuditStore::open_persistent(&path).unwrap());
    let engine = engine_with(doc_42_corpus(standards_corpus()), store.clone());

    engine.analyze(&ctx(), "doc-42", "IFRS 13").await.unwrap();
    engine.ask(&ctx(), "What is fair value?", None, None).await.unwrap();

    assert_eq!(store.interaction_count().unwrap(), 2);
    assert_eq!(store.interactions_for_document("doc-42").unwrap().len(), 1);
    let stats = store.stats().unwrap();
    assert_eq!(stats.needs_review, 1);
}
