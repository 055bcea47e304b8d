use ifrsguard_core::UnknownTopic;
use thiserror::Error;

/// Failures raised to the caller.
///
/// All are detectable before retrieval starts. Evidence and policy shortfalls
/// are reported through the result's status instead, and audit persistence
/// failures through [`AuditFailure`](crate::AuditFailure).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    UnknownTopic(#[from] UnknownTopic),

    #[error("no checklist template for standard: {0}")]
    UnknownStandard(String),

    #[error("too many requests for {0}")]
    RateLimited(String),
}
