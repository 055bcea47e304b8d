//! Append-only audit sink contract and the in-memory implementation.

use std::sync::{Arc, Mutex};

use arrow::array::{ArrayRef, Float32Array, StringArray, TimestampMicrosecondArray};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use ifrsguard_core::{Citation, audit};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A redacted interaction ready for persistence, with its child rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRow {
    pub interaction_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub request_kind: String,
    pub input_digest: String,
    /// Final result serialised as JSON.
    pub output: String,
    pub status: String,
    pub confidence: f32,
    pub tool_used: Option<String>,
    pub citations: Vec<Citation>,
    pub document_ids: Vec<String>,
}

/// Aggregate counts over the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditStats {
    pub total: usize,
    pub ok: usize,
    pub needs_review: usize,
    pub abstain: usize,
    pub mean_confidence: f64,
}

/// Durable, append-only store of interactions.
///
/// `append` writes the interaction row, its citation rows and its document
/// rows as one all-or-nothing unit. There is no update or delete.
pub trait AuditSink: Send + Sync {
    fn append(&self, row: &AuditRow) -> Result<(), StoreError>;

    /// Most recent interactions, newest first, shaped as [`audit::interaction_schema`].
    fn recent(&self, limit: usize) -> Result<Vec<RecordBatch>, StoreError>;

    fn citations_for(&self, interaction_id: &str) -> Result<Vec<Citation>, StoreError>;

    fn stats(&self) -> Result<AuditStats, StoreError>;
}

/// Audit sink holding rows in process memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    rows: Mutex<Vec<AuditRow>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row appended so far, in append order.
    pub fn rows(&self) -> Vec<AuditRow> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<AuditRow>>, StoreError> {
        self.rows
            .lock()
            .map_err(|e| StoreError::Other(format!("audit log mutex poisoned: {e}")))
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, row: &AuditRow) -> Result<(), StoreError> {
        self.lock()?.push(row.clone());
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<RecordBatch>, StoreError> {
        let mut rows = self.lock()?.clone();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit);
        Ok(vec![interactions_batch(&rows)?])
    }

    fn citations_for(&self, interaction_id: &str) -> Result<Vec<Citation>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .find(|r| r.interaction_id == interaction_id)
            .map(|r| r.citations.clone())
            .unwrap_or_default())
    }

    fn stats(&self) -> Result<AuditStats, StoreError> {
        let rows = self.lock()?;
        let count = |status: &str| rows.iter().filter(|r| r.status == status).count();
        let total = rows.len();
        let mean_confidence = if total == 0 {
            0.0
        } else {
            rows.iter().map(|r| r.confidence as f64).sum::<f64>() / total as f64
        };
        Ok(AuditStats {
            total,
            ok: count("OK"),
            needs_review: count("NEEDS_REVIEW"),
            abstain: count("ABSTAIN"),
            mean_confidence,
        })
    }
}

fn interactions_batch(rows: &[AuditRow]) -> Result<RecordBatch, StoreError> {
    let utf8 = |f: fn(&AuditRow) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let columns: Vec<ArrayRef> = vec![
        utf8(|r| r.interaction_id.as_str()),
        Arc::new(
            TimestampMicrosecondArray::from(
                rows.iter()
                    .map(|r| r.timestamp.timestamp_micros())
                    .collect::<Vec<_>>(),
            )
            .with_timezone("UTC"),
        ),
        utf8(|r| r.user_id.as_str()),
        utf8(|r| r.request_kind.as_str()),
        utf8(|r| r.input_digest.as_str()),
        utf8(|r| r.output.as_str()),
        utf8(|r| r.status.as_str()),
        Arc::new(Float32Array::from(
            rows.iter().map(|r| r.confidence).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            rows.iter()
                .map(|r| r.tool_used.as_deref())
                .collect::<Vec<_>>(),
        )),
    ];
    Ok(RecordBatch::try_new(
        Arc::new(audit::interaction_schema()),
        columns,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(id: &str, status: &str, confidence: f32, secs: i64) -> AuditRow {
        AuditRow {
            interaction_id: id.into(),
            timestamp: Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap(),
            user_id: "reviewer-1".into(),
            request_kind: "ask".into(),
            input_digest: "What is fair value?".into(),
            output: "{}".into(),
            status: status.into(),
            confidence,
            tool_used: None,
            citations: vec![Citation {
                standard: "IFRS 13".into(),
                paragraph: Some("9".into()),
                section: None,
            }],
            document_ids: vec![],
        }
    }

    #[test]
    fn recent_is_newest_first_and_limited() {
        let log = MemoryAuditLog::new();
        log.append(&row("a", "OK", 0.8, 0)).unwrap();
        log.append(&row("b", "ABSTAIN", 0.0, 20)).unwrap();
        log.append(&row("c", "OK", 0.9, 10)).unwrap();

        let batches = log.recent(2).unwrap();
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(*batch.schema(), audit::interaction_schema());
        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(ids.value(0), "b");
        assert_eq!(ids.value(1), "c");
    }

    #[test]
    fn stats_counts_by_status() {
        let log = MemoryAuditLog::new();
        log.append(&row("a", "OK", 0.8, 0)).unwrap();
        log.append(&row("b", "NEEDS_REVIEW", 0.7, 1)).unwrap();
        log.append(&row("c", "ABSTAIN", 0.0, 2)).unwrap();

        let stats = log.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!((stats.ok, stats.needs_review, stats.abstain), (1, 1, 1));
        assert!((stats.mean_confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn citations_for_unknown_interaction_is_empty() {
        let log = MemoryAuditLog::new();
        log.append(&row("a", "OK", 0.8, 0)).unwrap();
        assert_eq!(log.citations_for("a").unwrap().len(), 1);
        assert!(log.citations_for("zzz").unwrap().is_empty());
    }
}
