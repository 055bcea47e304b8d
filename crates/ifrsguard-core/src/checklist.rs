//! Static, standard-specific compliance checklists.
//!
//! Templates are read-only. Each analysis request evaluates a template into a
//! fresh set of [`ChecklistItem`](crate::ChecklistItem)s; templates are never mutated.

use serde::{Deserialize, Serialize};

/// One requirement definition within a checklist template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub key: String,
    pub description: String,
    #[serde(default)]
    pub is_critical: bool,
    /// Keywords whose presence in supporting passages counts as evidence the
    /// requirement is addressed, when the draft generator gives no verdict.
    #[serde(default)]
    pub evidence_terms: Vec<String>,
}

/// Ordered requirements for one standard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistTemplate {
    pub standard: String,
    pub requirements: Vec<Requirement>,
}

impl ChecklistTemplate {
    pub fn has_critical(&self) -> bool {
        self.requirements.iter().any(|r| r.is_critical)
    }
}

/// Lookup of checklist templates by standard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChecklistCatalog {
    templates: Vec<ChecklistTemplate>,
}

impl ChecklistCatalog {
    pub fn new(templates: Vec<ChecklistTemplate>) -> Self {
        Self { templates }
    }

    /// Template for `standard`, matched case-insensitively ("ifrs 13" finds "IFRS 13").
    pub fn template(&self, standard: &str) -> Option<&ChecklistTemplate> {
        let standard = standard.trim();
        self.templates
            .iter()
            .find(|t| t.standard.eq_ignore_ascii_case(standard))
    }

    pub fn standards(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|t| t.standard.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for ChecklistCatalog {
    fn default() -> Self {
        Self::new(vec![ifrs13(), ifrs9(), ifrs16()])
    }
}

// ── Built-in templates ──

fn req(id: &str, description: &str, is_critical: bool, terms: &[&str]) -> Requirement {
    Requirement {
        id: id.to_string(),
        key: id.to_string(),
        description: description.to_string(),
        is_critical,
        evidence_terms: terms.iter().map(|t| t.to_string()).collect(),
    }
}

fn ifrs13() -> ChecklistTemplate {
    ChecklistTemplate {
        standard: "IFRS 13".into(),
        requirements: vec![
            req(
                "hierarchy_classification",
                "Fair value hierarchy level (Level 1, 2 or 3) is clearly classified",
                true,
                &["level 1", "level 2", "level 3", "hierarchy"],
            ),
            req(
                "principal_market_identified",
                "Principal (or most advantageous) market is identified",
                true,
                &["principal market", "most advantageous market"],
            ),
            req(
                "valuation_technique",
                "Valuation technique (market, income or cost approach) is described",
                false,
                &["market approach", "income approach", "cost approach", "valuation technique"],
            ),
            req(
                "observable_inputs",
                "Use of relevant observable inputs is maximised and unobservable inputs minimised",
                false,
                &["observable input", "unobservable input"],
            ),
            req(
                "non_performance_risk",
                "Non-performance risk, including own credit risk, is reflected in liability valuations",
                false,
                &["non-performance risk", "own credit"],
            ),
            req(
                "disclosures",
                "Required fair value measurement disclosures are provided",
                false,
                &["disclos"],
            ),
        ],
    }
}

fn ifrs9() -> ChecklistTemplate {
    ChecklistTemplate {
        standard: "IFRS 9".into(),
        requirements: vec![
            req(
                "ecl_model",
                "Expected credit loss model and measurement basis are described",
                true,
                &["expected credit loss", "ecl"],
            ),
            req(
                "staging_criteria",
                "Criteria for significant increase in credit risk (stage 1/2/3) are defined",
                true,
                &["significant increase in credit risk", "stage 2", "staging"],
            ),
            req(
                "forward_looking_information",
                "Forward-looking macroeconomic information is incorporated",
                false,
                &["forward-looking", "macroeconomic"],
            ),
            req(
                "write_off_policy",
                "Write-off policy is stated",
                false,
                &["write-off", "written off"],
            ),
        ],
    }
}

fn ifrs16() -> ChecklistTemplate {
    ChecklistTemplate {
        standard: "IFRS 16".into(),
        requirements: vec![
            req(
                "lease_identification",
                "Contract is assessed for whether it contains a lease",
                true,
                &["contains a lease", "right to control", "identified asset"],
            ),
            req(
                "lease_term",
                "Lease term, including extension and termination options, is determined",
                true,
                &["lease term", "extension option", "termination option"],
            ),
            req(
                "discount_rate",
                "Discount rate (interest rate implicit in the lease or incremental borrowing rate) is stated",
                false,
                &["incremental borrowing rate", "implicit in the lease", "discount rate"],
            ),
            req(
                "right_of_use_asset",
                "Right-of-use asset and lease liability recognition is described",
                false,
                &["right-of-use", "lease liability"],
            ),
        ],
    }
}
