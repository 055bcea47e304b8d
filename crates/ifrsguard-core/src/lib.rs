pub mod checklist;
pub mod config;
pub mod model;
pub mod redact;
pub mod schema;
pub mod topic;

pub use checklist::{ChecklistCatalog, ChecklistTemplate, Requirement};
pub use config::{AnalysisConfig, ConfigError, EngineConfig, PolicyConfig, RetrievalConfig};
pub use model::{
    Answer, AnswerStatus, ChecklistItem, Citation, Feedback, Interaction, InteractionOutput,
    Passage, RequestKind, Status,
};
pub use redact::{Redacted, redact};
pub use schema::audit;
pub use topic::{TopicTag, UnknownTopic};
