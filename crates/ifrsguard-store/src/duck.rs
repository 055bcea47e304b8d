//! DuckDB audit store: interactions, citations and document associations.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use arrow::record_batch::RecordBatch;
use duckdb::{Connection, params};
use ifrsguard_core::{Citation, audit};
use tracing::info;

use crate::{AuditRow, AuditSink, AuditStats, StoreError};

/// Durable audit trail backed by DuckDB.
///
/// Three tables: `interactions` keyed by an opaque interaction id, and
/// `interaction_citations` / `interaction_documents` foreign-keyed to it.
/// Each [`append`](AuditSink::append) runs in its own transaction so a reader
/// never observes an interaction without its child rows.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckAuditStore {
    conn: Mutex<Connection>,
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS interactions (
    interaction_id VARCHAR PRIMARY KEY,
    timestamp      TIMESTAMP NOT NULL,
    user_id        VARCHAR NOT NULL,
    request_kind   VARCHAR NOT NULL,
    input_digest   VARCHAR NOT NULL,
    output         VARCHAR NOT NULL,
    status         VARCHAR NOT NULL,
    confidence     FLOAT   NOT NULL,
    tool_used      VARCHAR
);
CREATE TABLE IF NOT EXISTS interaction_citations (
    interaction_id VARCHAR NOT NULL REFERENCES interactions(interaction_id),
    position       INTEGER NOT NULL,
    standard       VARCHAR NOT NULL,
    paragraph      VARCHAR,
    section        VARCHAR,
    PRIMARY KEY (interaction_id, position)
);
CREATE TABLE IF NOT EXISTS interaction_documents (
    interaction_id VARCHAR NOT NULL REFERENCES interactions(interaction_id),
    document_id    VARCHAR NOT NULL,
    PRIMARY KEY (interaction_id, document_id)
);
";

impl DuckAuditStore {
    /// Open an in-memory audit store.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent audit store at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened audit store");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    // ── Counts ──

    pub fn interaction_count(&self) -> Result<usize, StoreError> {
        self.count_table(audit::INTERACTIONS_TABLE)
    }

    pub fn citation_count(&self) -> Result<usize, StoreError> {
        self.count_table(audit::CITATIONS_TABLE)
    }

    pub fn document_count(&self) -> Result<usize, StoreError> {
        self.count_table(audit::DOCUMENTS_TABLE)
    }

    fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let conn = self.lock()?;
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Interaction ids associated with a document, newest first.
    pub fn interactions_for_document(&self, document_id: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT d.interaction_id FROM interaction_documents d
             JOIN interactions i USING (interaction_id)
             WHERE d.document_id = ?
             ORDER BY i.timestamp DESC",
        )?;
        let ids = stmt
            .query_map([document_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ── Escape hatch ──

    /// Execute arbitrary read-only SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }
}

impl AuditSink for DuckAuditStore {
    fn append(&self, row: &AuditRow) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO interactions VALUES (?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?, ?)",
            params![
                row.interaction_id,
                row.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
                row.user_id,
                row.request_kind,
                row.input_digest,
                row.output,
                row.status,
                row.confidence,
                row.tool_used,
            ],
        )?;

        for (position, citation) in row.citations.iter().enumerate() {
            tx.execute(
                "INSERT INTO interaction_citations VALUES (?, ?, ?, ?, ?)",
                params![
                    row.interaction_id,
                    position as i32,
                    citation.standard,
                    citation.paragraph,
                    citation.section,
                ],
            )?;
        }

        for document_id in &row.document_ids {
            tx.execute(
                "INSERT INTO interaction_documents VALUES (?, ?)",
                params![row.interaction_id, document_id],
            )?;
        }

        tx.commit()?;
        info!(
            interaction_id = %row.interaction_id,
            citations = row.citations.len(),
            documents = row.document_ids.len(),
            "audit interaction written"
        );
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<RecordBatch>, StoreError> {
        self.query_arrow(&format!(
            "SELECT interaction_id, timestamp, user_id, request_kind, input_digest,
                    output, status, confidence, tool_used
             FROM interactions
             ORDER BY timestamp DESC
             LIMIT {limit}"
        ))
    }

    fn citations_for(&self, interaction_id: &str) -> Result<Vec<Citation>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT standard, paragraph, section FROM interaction_citations
             WHERE interaction_id = ? ORDER BY position",
        )?;
        let citations = stmt
            .query_map([interaction_id], |row| {
                Ok(Citation {
                    standard: row.get(0)?,
                    paragraph: row.get(1)?,
                    section: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(citations)
    }

    fn stats(&self) -> Result<AuditStats, StoreError> {
        let conn = self.lock()?;
        let stats = conn.query_row(
            "SELECT count(*)::BIGINT,
                    count(*) FILTER (WHERE status = 'OK')::BIGINT,
                    count(*) FILTER (WHERE status = 'NEEDS_REVIEW')::BIGINT,
                    count(*) FILTER (WHERE status = 'ABSTAIN')::BIGINT,
                    coalesce(avg(confidence), 0)::DOUBLE
             FROM interactions",
            [],
            |row| {
                Ok(AuditStats {
                    total: row.get::<_, i64>(0)? as usize,
                    ok: row.get::<_, i64>(1)? as usize,
                    needs_review: row.get::<_, i64>(2)? as usize,
                    abstain: row.get::<_, i64>(3)? as usize,
                    mean_confidence: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }
}
