//! Request-scoped results (answers, feedback) and the audit record built from them.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A retrieved unit of source text.
///
/// Owned by the request that retrieved it; never shared across requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// e.g. "IFRS 13".
    pub standard: String,
    pub section: String,
    pub paragraph: String,
    /// 0–1, higher is better.
    pub relevance_score: f32,
    pub source_document_id: String,
}

/// Pointer from an answer or checklist item back to the passage it rests on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub standard: String,
    pub paragraph: Option<String>,
    pub section: Option<String>,
}

impl Citation {
    /// Derive a citation from a passage. Empty section/paragraph metadata becomes `None`.
    pub fn from_passage(passage: &Passage) -> Self {
        Self {
            standard: passage.standard.trim().to_string(),
            paragraph: non_empty(&passage.paragraph),
            section: non_empty(&passage.section),
        }
    }

    /// Whether the citation names a standard at all.
    pub fn has_standard(&self) -> bool {
        !self.standard.trim().is_empty()
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.standard)?;
        if let Some(paragraph) = &self.paragraph {
            write!(f, " ¶{paragraph}")?;
        }
        if let Some(section) = &self.section {
            write!(f, " ({section})")?;
        }
        Ok(())
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Status of a question-answering result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerStatus {
    Ok,
    Abstain,
}

/// Status of any engine result. Feedback uses all three; answers never carry `NeedsReview`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    NeedsReview,
    Abstain,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NeedsReview => "NEEDS_REVIEW",
            Self::Abstain => "ABSTAIN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AnswerStatus> for Status {
    fn from(status: AnswerStatus) -> Self {
        match status {
            AnswerStatus::Ok => Self::Ok,
            AnswerStatus::Abstain => Self::Abstain,
        }
    }
}

/// Result of a question-answering request.
///
/// `OK` answers carry at least one citation and a confidence at or above the
/// policy floor; `ABSTAIN` answers carry the reason in `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub status: AnswerStatus,
    pub text: String,
    pub citations: Vec<Citation>,
    pub confidence: f32,
}

impl Answer {
    /// Abstention with the given reason, no citations and zero confidence.
    pub fn abstain(reason: impl Into<String>) -> Self {
        Self {
            status: AnswerStatus::Abstain,
            text: reason.into(),
            citations: Vec::new(),
            confidence: 0.0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AnswerStatus::Ok
    }
}

/// One evaluated compliance requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub key: String,
    pub description: String,
    pub met: bool,
    pub notes: Option<String>,
    pub citations: Vec<Citation>,
    pub is_critical: bool,
    /// Evidence confidence behind the `met` determination.
    pub confidence: f32,
}

/// Aggregate compliance result for one document against one standard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub status: Status,
    pub summary: String,
    pub items: Vec<ChecklistItem>,
    pub confidence: f32,
}

impl Feedback {
    /// Abstention with the given reason and no evaluated items.
    pub fn abstain(reason: impl Into<String>) -> Self {
        Self {
            status: Status::Abstain,
            summary: reason.into(),
            items: Vec::new(),
            confidence: 0.0,
        }
    }

    /// All citations across items, in item order.
    pub fn citations(&self) -> impl Iterator<Item = &Citation> {
        self.items.iter().flat_map(|item| item.citations.iter())
    }

    /// Critical items whose requirement is not met.
    pub fn critical_failures(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.items.iter().filter(|item| item.is_critical && !item.met)
    }
}

/// Kind of request that produced an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Ask,
    Analyze,
    Chat,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Analyze => "analyze",
            Self::Chat => "chat",
        }
    }
}

/// The final result recorded for an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InteractionOutput {
    Answer(Answer),
    Feedback(Feedback),
}

impl InteractionOutput {
    pub fn status(&self) -> Status {
        match self {
            Self::Answer(answer) => answer.status.into(),
            Self::Feedback(feedback) => feedback.status,
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Self::Answer(answer) => answer.confidence,
            Self::Feedback(feedback) => feedback.confidence,
        }
    }

    pub fn citations(&self) -> Vec<&Citation> {
        match self {
            Self::Answer(answer) => answer.citations.iter().collect(),
            Self::Feedback(feedback) => feedback.citations().collect(),
        }
    }
}

/// Audit record of one completed request. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub request_kind: RequestKind,
    /// Representation of the request; redacted before persistence.
    pub input_digest: String,
    pub output: InteractionOutput,
    pub tool_used: Option<String>,
    pub document_ids: BTreeSet<String>,
}

impl Interaction {
    pub fn status(&self) -> Status {
        self.output.status()
    }

    pub fn confidence(&self) -> f32 {
        self.output.confidence()
    }
}
