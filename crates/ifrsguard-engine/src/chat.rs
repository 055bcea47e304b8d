//! Intent routing for free-form chat messages.

use lazy_static::lazy_static;
use regex::Regex;

use ifrsguard_core::TopicTag;

pub const TOOL_ASK: &str = "ifrs_ask";
pub const TOOL_ANALYZE: &str = "analyze_document";

/// Standard assumed for analysis requests that name none.
const DEFAULT_ANALYSIS_STANDARD: &str = "IFRS 13";

lazy_static! {
    static ref ANALYZE_VERB: Regex =
        Regex::new(r"(?i)\b(?:analy[sz]e|review|audit|check|assess)\b").unwrap();
    static ref DOC_ID: Regex = Regex::new(r"(?i)\b(doc[-_][\w-]+)").unwrap();
    static ref DOC_NAMED: Regex = Regex::new(r"(?i)\bdocument\s+(?:id\s+)?([\w][\w.-]*)").unwrap();
    static ref STANDARD: Regex = Regex::new(r"(?i)\bIFRS\s*(9|13|16)\b").unwrap();
    static ref QUESTION: Regex = Regex::new(
        r"(?i)(\?\s*$|^\s*(?:what|how|when|which|why|does|do|is|are|can|should|explain|define|describe)\b|\bifrs\b|\bfair value\b|\blease|\bimpairment\b|\bcredit loss)"
    )
    .unwrap();
    static ref IFRS9: Regex =
        Regex::new(r"(?i)\bifrs\s*9\b|\bimpairment\b|\bcredit loss|\becl\b").unwrap();
    static ref IFRS16: Regex = Regex::new(r"(?i)\bifrs\s*16\b|\blease").unwrap();
    static ref IFRS13: Regex = Regex::new(r"(?i)\bifrs\s*13\b|\bfair value\b").unwrap();
}

/// What a chat message asks the engine to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Ask {
        question: String,
        topic: Option<TopicTag>,
    },
    Analyze {
        document_id: String,
        standard: String,
    },
    Unknown,
}

impl Intent {
    /// Tool name recorded in the audit trail.
    pub fn tool(&self) -> Option<&'static str> {
        match self {
            Self::Ask { .. } => Some(TOOL_ASK),
            Self::Analyze { .. } => Some(TOOL_ANALYZE),
            Self::Unknown => None,
        }
    }
}

/// Classify a chat message. Analysis needs both an analysis verb and a
/// document reference; anything IFRS-flavoured or phrased as a question is asked.
pub fn classify(message: &str) -> Intent {
    let message = message.trim();
    if message.is_empty() {
        return Intent::Unknown;
    }

    if ANALYZE_VERB.is_match(message) {
        let doc = DOC_ID
            .captures(message)
            .map(|c| c[1].trim_end_matches('.').to_string())
            .or_else(|| named_document(message));
        if let Some(document_id) = doc {
            let standard = STANDARD
                .captures(message)
                .map(|c| format!("IFRS {}", &c[1]))
                .unwrap_or_else(|| DEFAULT_ANALYSIS_STANDARD.to_string());
            return Intent::Analyze {
                document_id,
                standard,
            };
        }
    }

    if QUESTION.is_match(message) {
        return Intent::Ask {
            question: message.to_string(),
            topic: infer_topic(message),
        };
    }
    Intent::Unknown
}

/// Id following the word "document", when it looks like an identifier
/// rather than the next English word.
fn named_document(message: &str) -> Option<String> {
    DOC_NAMED
        .captures_iter(message)
        .map(|c| c[1].trim_end_matches('.').to_string())
        .find(|id| {
            id.chars()
                .any(|c| c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
        })
}

/// Topic implied by the message, when exactly one standard is mentioned.
fn infer_topic(message: &str) -> Option<TopicTag> {
    let hits: Vec<TopicTag> = [
        (TopicTag::Ifrs9Impairment, &*IFRS9),
        (TopicTag::Ifrs16Leases, &*IFRS16),
        (TopicTag::Ifrs13Measurement, &*IFRS13),
    ]
    .into_iter()
    .filter(|(_, re)| re.is_match(message))
    .map(|(topic, _)| topic)
    .collect();
    match hits.as_slice() {
        [topic] => Some(*topic),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn analysis_request_with_standard() {
        assert_eq!(
            classify("Please analyze doc-42 against IFRS 16"),
            Intent::Analyze {
                document_id: "doc-42".into(),
                standard: "IFRS 16".into(),
            }
        );
    }

    #[test]
    fn analysis_request_defaults_standard() {
        assert_eq!(
            classify("Review document valuation_q3.pdf."),
            Intent::Analyze {
                document_id: "valuation_q3.pdf".into(),
                standard: "IFRS 13".into(),
            }
        );
    }

    #[test]
    fn plain_words_after_document_are_not_ids() {
        assert_eq!(
            classify("Please check the document against IFRS 16"),
            Intent::Ask {
                question: "Please check the document against IFRS 16".into(),
                topic: Some(TopicTag::Ifrs16Leases),
            }
        );
        assert_eq!(
            classify("Review the document for doc-7"),
            Intent::Analyze {
                document_id: "doc-7".into(),
                standard: "IFRS 13".into(),
            }
        );
        assert_eq!(
            classify("Review document draft then document memo_2024"),
            Intent::Analyze {
                document_id: "memo_2024".into(),
                standard: "IFRS 13".into(),
            }
        );
    }

    #[test]
    fn analysis_verb_without_document_is_a_question() {
        let intent = classify("How do I assess impairment under IFRS 9?");
        assert_eq!(
            intent,
            Intent::Ask {
                question: "How do I assess impairment under IFRS 9?".into(),
                topic: Some(TopicTag::Ifrs9Impairment),
            }
        );
        assert_eq!(intent.tool(), Some(TOOL_ASK));
    }

    #[test]
    fn ambiguous_topic_is_left_open() {
        let Intent::Ask { topic, .. } = classify("Compare fair value and lease accounting?") else {
            panic!("expected ask");
        };
        assert_eq!(topic, None);
    }

    #[test]
    fn small_talk_is_unknown() {
        assert_eq!(classify("hello there"), Intent::Unknown);
        assert_eq!(classify("   "), Intent::Unknown);
        assert_eq!(Intent::Unknown.tool(), None);
    }
}
