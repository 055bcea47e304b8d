//! Evidence accounting: which passages a draft rests on, how confident it may
//! be, and the citations it is allowed to carry.

use std::collections::HashSet;

use ifrsguard_core::{Citation, Passage};

/// The passages a draft is built from, with the confidence and citations they justify.
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    pub used: Vec<Passage>,
    pub confidence: f32,
    pub citations: Vec<Citation>,
}

impl Evidence {
    /// Take the top `max_used` passages (already ranked) as the evidence base.
    pub fn assess(passages: &[Passage], max_used: usize) -> Self {
        let used: Vec<Passage> = passages.iter().take(max_used).cloned().collect();
        let scores: Vec<f32> = used.iter().map(|p| p.relevance_score).collect();
        Self {
            confidence: confidence(&scores),
            citations: citations(&used),
            used,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Confidence from the relevance scores of the passages used.
///
/// `avg × (0.5 + 0.5 × coverage)` with `coverage = 1 − 0.5ⁿ`, capped at the
/// best score. Rises with the number of corroborating passages and with their
/// average relevance, and never exceeds the strongest passage.
pub fn confidence(scores: &[f32]) -> f32 {
    if scores.is_empty() {
        return 0.0;
    }
    let n = scores.len() as i32;
    let avg = scores.iter().sum::<f32>() / scores.len() as f32;
    let max = scores.iter().copied().fold(f32::MIN, f32::max);
    let coverage = 1.0 - 0.5f32.powi(n);
    (avg * (0.5 + 0.5 * coverage)).min(max).clamp(0.0, 1.0)
}

/// One citation per distinct (standard, section, paragraph), in passage order.
pub fn citations(passages: &[Passage]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    passages
        .iter()
        .map(Citation::from_passage)
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// Whitespace-normalised prefix of `text`, at most `max_chars` long.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let normalised = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalised.chars().count() <= max_chars {
        return normalised;
    }
    let cut: String = normalised.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
