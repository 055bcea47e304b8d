//! Storage layer: passage search and document contracts, in-memory backends,
//! DuckDB (audit trail), LanceDB (vector passage search).

mod audit;
mod error;
mod memory;
mod search;

pub use audit::{AuditRow, AuditSink, AuditStats, MemoryAuditLog};
pub use error::StoreError;
pub use memory::{Chunk, MemoryIndex, keyword_relevance};
pub use search::{DocumentStore, PassageSearch, SearchHit, metadata_keys};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckAuditStore;

#[cfg(feature = "lancedb")]
mod lance;
#[cfg(feature = "lancedb")]
pub use lance::{LanceSearch, QueryEmbedder, read_parquet};
