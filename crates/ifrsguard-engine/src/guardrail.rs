//! Policy guardrail: the last gate before a result is surfaced or audited.
//!
//! Pure logic over in-memory values. Rules are evaluated in a fixed order and
//! the first violation escalates the draft to ABSTAIN:
//!
//! 1. missing citation
//! 2. confidence below threshold
//! 3. overconfident language
//! 4. restricted advice category
//!
//! Drafts that already abstain pass through untouched, so `validate` is idempotent.

use std::fmt;

use ifrsguard_core::{Answer, AnswerStatus, Citation, ConfigError, Feedback, PolicyConfig, Status};
use regex::Regex;
use serde::{Serialize, Serializer};

/// A violated policy rule. `Display` yields the reason recorded on escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    MissingCitation,
    ConfidenceBelowThreshold,
    OverconfidentLanguage,
    RestrictedAdvice,
}

impl Violation {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingCitation => "missing citation",
            Self::ConfidenceBelowThreshold => "confidence below threshold",
            Self::OverconfidentLanguage => "overconfident language",
            Self::RestrictedAdvice => "restricted advice category",
        }
    }
}

impl Serialize for Violation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.reason())
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Pre-flight result: every violated rule, in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyReport {
    pub valid: bool,
    pub violations: Vec<String>,
}

/// A draft result the guardrail can inspect and escalate.
pub trait Guarded: Sized {
    /// Whether the draft asserts something (as opposed to abstaining).
    fn asserts(&self) -> bool;

    fn citations(&self) -> Vec<&Citation>;

    fn confidence(&self) -> f32;

    /// The text subject to the language rules.
    fn text(&self) -> &str;

    /// Turn the draft into an abstention carrying `violation` as its reason.
    fn escalate(self, violation: Violation) -> Self;
}

fn abstention_message(violation: Violation) -> String {
    format!("Policy violation: {violation}")
}

impl Guarded for Answer {
    fn asserts(&self) -> bool {
        self.status == AnswerStatus::Ok
    }

    fn citations(&self) -> Vec<&Citation> {
        self.citations.iter().collect()
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn escalate(self, violation: Violation) -> Self {
        Self {
            status: AnswerStatus::Abstain,
            text: abstention_message(violation),
            citations: Vec::new(),
            confidence: self.confidence,
        }
    }
}

impl Guarded for Feedback {
    fn asserts(&self) -> bool {
        self.status != Status::Abstain
    }

    fn citations(&self) -> Vec<&Citation> {
        Feedback::citations(self).collect()
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }

    fn text(&self) -> &str {
        &self.summary
    }

    fn escalate(self, violation: Violation) -> Self {
        Self {
            status: Status::Abstain,
            summary: abstention_message(violation),
            items: self
                .items
                .into_iter()
                .map(|mut item| {
                    item.citations.clear();
                    item
                })
                .collect(),
            confidence: self.confidence,
        }
    }
}

/// Compiled policy. Build once from [`PolicyConfig`] and share.
#[derive(Debug, Clone)]
pub struct Guardrail {
    min_confidence: f32,
    disallowed: Vec<Regex>,
    restricted: Vec<Regex>,
}

impl Guardrail {
    pub fn new(policy: &PolicyConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            min_confidence: policy.min_confidence,
            disallowed: compile_terms(&policy.disallowed_language)?,
            restricted: compile_terms(&policy.restricted_advice)?,
        })
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Every rule `draft` violates, in evaluation order.
    pub fn violations<T: Guarded>(&self, draft: &T) -> Vec<Violation> {
        let mut found = Vec::new();
        let citations = draft.citations();
        let unsourced = citations.iter().any(|c| !c.has_standard());
        if (draft.asserts() && citations.is_empty()) || unsourced {
            found.push(Violation::MissingCitation);
        }
        if draft.confidence() < self.min_confidence {
            found.push(Violation::ConfidenceBelowThreshold);
        }
        let text = draft.text();
        if self.disallowed.iter().any(|re| re.is_match(text)) {
            found.push(Violation::OverconfidentLanguage);
        }
        if self.restricted.iter().any(|re| re.is_match(text)) {
            found.push(Violation::RestrictedAdvice);
        }
        found
    }

    /// The first violated rule, if any. Abstaining drafts never violate.
    pub fn check<T: Guarded>(&self, draft: &T) -> Option<Violation> {
        if !draft.asserts() {
            return None;
        }
        self.violations(draft).into_iter().next()
    }

    /// Pass `draft` through unchanged, or escalate it to ABSTAIN on the first violation.
    pub fn validate<T: Guarded>(&self, draft: T) -> T {
        match self.check(&draft) {
            Some(violation) => draft.escalate(violation),
            None => draft,
        }
    }

    /// Pre-flight check reporting all violated rules. Like [`check`](Self::check),
    /// an abstaining candidate is always valid.
    pub fn report<T: Guarded>(&self, candidate: &T) -> PolicyReport {
        if !candidate.asserts() {
            return PolicyReport {
                valid: true,
                violations: Vec::new(),
            };
        }
        let violations: Vec<String> = self
            .violations(candidate)
            .into_iter()
            .map(|v| v.reason().to_string())
            .collect();
        PolicyReport {
            valid: violations.is_empty(),
            violations,
        }
    }
}

/// Case-insensitive, word-bounded pattern per configured term.
fn compile_terms(terms: &[String]) -> Result<Vec<Regex>, ConfigError> {
    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(t)))
                .map_err(|e| ConfigError::Invalid(format!("policy term {t:?}: {e}")))
        })
        .collect()
}
