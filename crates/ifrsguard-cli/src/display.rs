//! Vertical card display for engine results.
//!
//! Each `format_*` function renders a result as a plain-text card; the
//! matching `print_*` function writes it to stdout.

use ifrsguard_core::{Answer, ChecklistItem, Citation, Feedback, Status, TopicTag};
use ifrsguard_engine::PolicyReport;
use ifrsguard_store::AuditStats;

const MAX_NOTE_CHARS: usize = 160;

pub fn print_answer_card(answer: &Answer) {
    print!("{}", format_answer_card(answer));
}

pub fn print_feedback_card(feedback: &Feedback) {
    print!("{}", format_feedback_card(feedback));
}

pub fn print_policy_report(report: &PolicyReport) {
    print!("{}", format_policy_report(report));
}

pub fn print_stats(stats: &AuditStats) {
    print!("{}", format_stats(stats));
}

pub fn print_topics(topics: &[TopicTag]) {
    println!("=== Topics ===");
    for topic in topics {
        println!("  {:<26} {}", topic.as_str(), topic.standard());
    }
}

pub fn format_answer_card(answer: &Answer) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Answer [{}] ===\n", Status::from(answer.status)));
    out.push_str(&answer.text);
    out.push_str("\n\n");
    field(&mut out, "confidence", &format!("{:.2}", answer.confidence));
    section(&mut out, "Citations");
    citation_lines(&mut out, &answer.citations);
    out
}

pub fn format_feedback_card(feedback: &Feedback) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Feedback [{}] ===\n", feedback.status));
    out.push_str(&feedback.summary);
    out.push_str("\n\n");
    field(&mut out, "confidence", &format!("{:.2}", feedback.confidence));
    field(&mut out, "items", &feedback.items.len().to_string());
    field(
        &mut out,
        "critical failures",
        &feedback.critical_failures().count().to_string(),
    );

    if !feedback.items.is_empty() {
        section(&mut out, "Checklist");
        for item in &feedback.items {
            item_lines(&mut out, item);
        }
    }
    out
}

pub fn format_policy_report(report: &PolicyReport) -> String {
    let mut out = String::new();
    let verdict = if report.valid { "VALID" } else { "INVALID" };
    out.push_str(&format!("=== Policy [{verdict}] ===\n"));
    for violation in &report.violations {
        out.push_str(&format!("  - {violation}\n"));
    }
    out
}

pub fn format_stats(stats: &AuditStats) -> String {
    let mut out = String::new();
    out.push_str("=== Audit Trail ===\n");
    field(&mut out, "interactions", &stats.total.to_string());
    field(&mut out, "ok", &stats.ok.to_string());
    field(&mut out, "needs review", &stats.needs_review.to_string());
    field(&mut out, "abstain", &stats.abstain.to_string());
    field(&mut out, "mean confidence", &format!("{:.3}", stats.mean_confidence));
    out
}

// ── Helpers ──

fn section(out: &mut String, title: &str) {
    out.push_str(&format!("\n--- {title} ---\n"));
}

fn field(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!("  {:<26} {}\n", name, value));
}

fn citation_lines(out: &mut String, citations: &[Citation]) {
    if citations.is_empty() {
        out.push_str("  (none)\n");
    }
    for citation in citations {
        out.push_str(&format!("  {citation}\n"));
    }
}

fn item_lines(out: &mut String, item: &ChecklistItem) {
    let mark = if item.met { "[x]" } else { "[ ]" };
    let critical = if item.is_critical { " (critical)" } else { "" };
    out.push_str(&format!(
        "  {mark} {:<26} {:.2}{critical}\n",
        item.key, item.confidence
    ));
    if let Some(notes) = &item.notes {
        out.push_str(&format!("        {}\n", truncate(notes, MAX_NOTE_CHARS)));
    }
    for citation in &item.citations {
        out.push_str(&format!("        {citation}\n"));
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}
