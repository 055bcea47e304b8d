//! Closed set of retrieval topics, each scoped to exactly one accounting standard.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Retrieval topic. Every variant maps to one standard through [`TopicTag::standard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicTag {
    #[serde(rename = "ifrs9_impairment")]
    Ifrs9Impairment,
    #[serde(rename = "ifrs16_leases")]
    Ifrs16Leases,
    #[serde(rename = "ifrs13_measurement")]
    Ifrs13Measurement,
}

impl TopicTag {
    pub const ALL: [TopicTag; 3] = [
        TopicTag::Ifrs9Impairment,
        TopicTag::Ifrs16Leases,
        TopicTag::Ifrs13Measurement,
    ];

    /// The standard whose passages this topic is restricted to.
    pub fn standard(&self) -> &'static str {
        match self {
            Self::Ifrs9Impairment => "IFRS 9",
            Self::Ifrs16Leases => "IFRS 16",
            Self::Ifrs13Measurement => "IFRS 13",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ifrs9Impairment => "ifrs9_impairment",
            Self::Ifrs16Leases => "ifrs16_leases",
            Self::Ifrs13Measurement => "ifrs13_measurement",
        }
    }
}

impl fmt::Display for TopicTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for TopicTag {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str().eq_ignore_ascii_case(key))
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}
