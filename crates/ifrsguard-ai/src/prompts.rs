//! Prompt templates for the draft generator.

use ifrsguard_core::Passage;

/// Maximum characters of a passage quoted into a prompt.
const PASSAGE_EXCERPT_CHARS: usize = 500;

/// Leading instruction on checklist prompts asking a language model for a
/// YES/NO verdict. The analyzer reads the verdict from the reply's first word.
pub const VERDICT_MARKER: &str = "Reply YES or NO first.";

pub const SYSTEM_PROMPT: &str = "\
You are an IFRS assistant covering IFRS 9, IFRS 13 and IFRS 16.

Answer only from the sources provided with the question. Do not use outside knowledge.
Cite every statement as (standard, paragraph, section).
If the sources are insufficient, conflicting or unclear, say so and stop.
Do not give tax, legal or investment advice.
Prefer measured wording: say what the standard requires, not what is certain.";

/// Prompt for a free-text question, optionally naming the standard in scope.
pub fn question_prompt(question: &str, standard: Option<&str>) -> String {
    match standard {
        Some(standard) => format!("Question ({standard}): {}", question.trim()),
        None => format!("Question: {}", question.trim()),
    }
}

/// Prompt for a single checklist requirement, expecting a YES/NO verdict.
pub fn checklist_prompt(standard: &str, description: &str) -> String {
    format!(
        "{VERDICT_MARKER} Does the document address the following {standard} requirement: {description}?"
    )
}

/// Numbered source block for inclusion in a chat-completion request.
pub fn sources_block(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return "No relevant sources found.".to_string();
    }
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let excerpt: String = p.text.chars().take(PASSAGE_EXCERPT_CHARS).collect();
            let ellipsis = if p.text.chars().count() > PASSAGE_EXCERPT_CHARS {
                "..."
            } else {
                ""
            };
            format!(
                "Source {n} (relevance {score:.2})\nStandard: {standard}\nSection: {section}\nParagraph: {paragraph}\n{excerpt}{ellipsis}",
                n = i + 1,
                score = p.relevance_score,
                standard = p.standard,
                section = or_unknown(&p.section),
                paragraph = or_unknown(&p.paragraph),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn or_unknown(s: &str) -> &str {
    if s.is_empty() { "unknown" } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str) -> Passage {
        Passage {
            text: text.into(),
            standard: "IFRS 16".into(),
            section: String::new(),
            paragraph: "18".into(),
            relevance_score: 0.75,
            source_document_id: "ifrs16".into(),
        }
    }

    #[test]
    fn checklist_prompt_leads_with_verdict_marker() {
        let prompt = checklist_prompt("IFRS 13", "Level 1, 2 or 3 classification");
        assert!(prompt.starts_with(VERDICT_MARKER));
        assert!(prompt.contains("following IFRS 13 requirement: Level 1, 2 or 3 classification?"));
    }

    #[test]
    fn sources_block_numbers_and_truncates() {
        let long = "x".repeat(PASSAGE_EXCERPT_CHARS + 10);
        let block = sources_block(&[passage("Lease term."), passage(&long)]);
        assert!(block.starts_with("Source 1 (relevance 0.75)"));
        assert!(block.contains("Section: unknown"));
        assert!(block.contains("Source 2"));
        assert!(block.ends_with("..."));
    }

    #[test]
    fn question_prompt_names_standard() {
        assert_eq!(
            question_prompt(" What is a lease? ", Some("IFRS 16")),
            "Question (IFRS 16): What is a lease?"
        );
    }
}
