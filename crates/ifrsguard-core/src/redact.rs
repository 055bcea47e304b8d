//! Regex-based PII redaction applied to every text field before it is persisted.

use lazy_static::lazy_static;
use regex::Regex;

/// Category of personally identifiable information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiKind {
    CardNumber,
    Iban,
    Email,
    GovernmentId,
    Phone,
}

impl PiiKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CardNumber => "card_number",
            Self::Iban => "iban",
            Self::Email => "email",
            Self::GovernmentId => "government_id",
            Self::Phone => "phone",
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::CardNumber => "[CARD_REDACTED]",
            Self::Iban => "[IBAN_REDACTED]",
            Self::Email => "[EMAIL_REDACTED]",
            Self::GovernmentId => "[ID_REDACTED]",
            Self::Phone => "[PHONE_REDACTED]",
        }
    }
}

lazy_static! {
    /// Scan order matters: card numbers and IBANs are replaced before the
    /// shorter digit-run patterns can match inside them.
    static ref PATTERNS: Vec<(PiiKind, Regex)> = vec![
        (
            PiiKind::CardNumber,
            Regex::new(r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b").unwrap(),
        ),
        (
            PiiKind::Iban,
            Regex::new(r"\b[A-Z]{2}\d{2}[A-Z0-9]{4}\d{7}[A-Z0-9]{0,16}\b").unwrap(),
        ),
        (
            PiiKind::Email,
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
        ),
        (
            PiiKind::GovernmentId,
            Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
        ),
        (
            PiiKind::Phone,
            Regex::new(r"(?:\+?1[-.\s]?)?\(?\b\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap(),
        ),
    ];
}

/// Redacted text plus how many matches of each kind were replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redacted {
    pub text: String,
    pub counts: Vec<(PiiKind, usize)>,
}

impl Redacted {
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}

/// Replace every PII match in `text` with its placeholder.
pub fn redact(text: &str) -> Redacted {
    let mut out = text.to_string();
    let mut counts = Vec::new();
    for (kind, pattern) in PATTERNS.iter() {
        let n = pattern.find_iter(&out).count();
        if n > 0 {
            out = pattern.replace_all(&out, kind.placeholder()).into_owned();
            counts.push((*kind, n));
        }
    }
    Redacted { text: out, counts }
}
