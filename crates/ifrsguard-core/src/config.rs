//! Engine configuration: retrieval limits, policy thresholds and denylists, checklist templates.
//!
//! Loaded once (TOML, every field defaulted) and injected into each component
//! as an immutable value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ChecklistCatalog;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub checklists: ChecklistCatalog,
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, v: f32| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must lie in [0, 1], got {v}")))
            }
        };
        unit("retrieval.score_threshold", self.retrieval.score_threshold)?;
        unit("policy.min_confidence", self.policy.min_confidence)?;
        unit("analysis.evidence_floor", self.analysis.evidence_floor)?;
        if self.retrieval.k == 0 {
            return Err(ConfigError::Invalid("retrieval.k must be at least 1".into()));
        }
        if self.retrieval.max_passages_used == 0 {
            return Err(ConfigError::Invalid(
                "retrieval.max_passages_used must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum passages returned per retrieval.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Passages scoring below this are dropped before ranking.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    /// Passages handed to the draft generator (and therefore citable).
    #[serde(default = "default_max_passages_used")]
    pub max_passages_used: usize,
}

fn default_k() -> usize {
    6
}

fn default_score_threshold() -> f32 {
    0.2
}

fn default_max_passages_used() -> usize {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            score_threshold: default_score_threshold(),
            max_passages_used: default_max_passages_used(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Overconfident terms, matched case-insensitively on word boundaries.
    #[serde(default = "default_disallowed_language")]
    pub disallowed_language: Vec<String>,
    /// Advice categories the engine must not answer.
    #[serde(default = "default_restricted_advice")]
    pub restricted_advice: Vec<String>,
}

fn default_min_confidence() -> f32 {
    0.65
}

fn default_disallowed_language() -> Vec<String> {
    ["guaranteed", "guarantee", "always", "certainly", "definitely", "risk-free"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_restricted_advice() -> Vec<String> {
    ["tax structuring", "legal representation", "investment advice"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            disallowed_language: default_disallowed_language(),
            restricted_advice: default_restricted_advice(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Items whose evidence confidence falls below this are never judged met.
    #[serde(default = "default_evidence_floor")]
    pub evidence_floor: f32,
}

fn default_evidence_floor() -> f32 {
    0.6
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            evidence_floor: default_evidence_floor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.retrieval.k, 6);
        assert_eq!(config.policy.min_confidence, 0.65);
        assert!(config.checklists.template("IFRS 13").is_some());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [policy]
            min_confidence = 0.8
            restricted_advice = ["tax structuring"]
            "#,
        )
        .unwrap();
        assert_eq!(config.policy.min_confidence, 0.8);
        assert_eq!(config.policy.restricted_advice, vec!["tax structuring"]);
        assert!(config.policy.disallowed_language.contains(&"guaranteed".to_string()));
        assert_eq!(config.retrieval.score_threshold, 0.2);
    }

    #[test]
    fn custom_checklists_replace_builtins() {
        let config = EngineConfig::from_toml(
            r#"
            [[checklists]]
            standard = "IFRS 13"

            [[checklists.requirements]]
            id = "hierarchy_classification"
            key = "hierarchy_classification"
            description = "Hierarchy level classified"
            is_critical = true
            "#,
        )
        .unwrap();
        let template = config.checklists.template("IFRS 13").unwrap();
        assert_eq!(template.requirements.len(), 1);
        assert!(config.checklists.template("IFRS 9").is_none());
    }

    #[test]
    fn out_of_range_threshold_is_invalid() {
        let err = EngineConfig::from_toml("[policy]\nmin_confidence = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = EngineConfig::from_toml("[retrieval]\nk = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = EngineConfig::from_toml("[policy\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
