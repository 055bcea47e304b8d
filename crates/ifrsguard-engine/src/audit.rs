//! Audit log writer: redacts and persists every completed interaction.
//!
//! Persistence never fails the caller. Failures are logged, counted, and sent
//! on an optional side channel as [`AuditFailure`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ifrsguard_core::{Interaction, InteractionOutput, redact};
use ifrsguard_store::{AuditRow, AuditSink};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// A failed audit write, reported out of band.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditFailure {
    pub interaction_id: String,
    pub error: String,
}

#[derive(Clone)]
pub struct AuditWriter {
    inner: Arc<Inner>,
}

struct Inner {
    sink: Arc<dyn AuditSink>,
    failures: AtomicU64,
    side_channel: Option<mpsc::UnboundedSender<AuditFailure>>,
}

impl Inner {
    fn report(&self, interaction_id: &str, err: String) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        error!(interaction_id, error = %err, "audit write failed");
        if let Some(tx) = &self.side_channel {
            let _ = tx.send(AuditFailure {
                interaction_id: interaction_id.to_string(),
                error: err,
            });
        }
    }
}

impl AuditWriter {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                failures: AtomicU64::new(0),
                side_channel: None,
            }),
        }
    }

    /// Writer that also reports failures on the returned receiver.
    pub fn with_side_channel(
        sink: Arc<dyn AuditSink>,
    ) -> (Self, mpsc::UnboundedReceiver<AuditFailure>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = Self {
            inner: Arc::new(Inner {
                sink,
                failures: AtomicU64::new(0),
                side_channel: Some(tx),
            }),
        };
        (writer, rx)
    }

    pub fn sink(&self) -> &Arc<dyn AuditSink> {
        &self.inner.sink
    }

    /// Audit writes that have failed since the writer was created.
    pub fn failure_count(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }

    /// Redact and append `interaction`.
    ///
    /// The append runs on the blocking pool and completes even if the
    /// awaiting future is dropped.
    pub async fn record(&self, interaction: Interaction) {
        let interaction_id = Uuid::new_v4().to_string();
        let row = match audit_row(&interaction_id, &interaction) {
            Ok(row) => row,
            Err(e) => {
                self.inner.report(&interaction_id, e.to_string());
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        let handle = tokio::task::spawn_blocking(move || match inner.sink.append(&row) {
            Ok(()) => info!(
                interaction_id = %row.interaction_id,
                request_kind = %row.request_kind,
                status = %row.status,
                "interaction recorded"
            ),
            Err(e) => inner.report(&row.interaction_id, e.to_string()),
        });
        if let Err(e) = handle.await {
            self.inner.report(&interaction_id, format!("audit task failed: {e}"));
        }
    }
}

/// Build the persisted row: text fields redacted, output serialised as JSON.
pub fn audit_row(interaction_id: &str, interaction: &Interaction) -> serde_json::Result<AuditRow> {
    let digest = redact(&interaction.input_digest);
    let user = redact(&interaction.user_id);
    let tool = interaction.tool_used.as_deref().map(redact);
    let (output, output_redactions) = redact_output(&interaction.output);
    let redactions = digest.total()
        + user.total()
        + tool.as_ref().map_or(0, |t| t.total())
        + output_redactions;
    if redactions > 0 {
        let kinds: Vec<&str> = digest
            .counts
            .iter()
            .chain(&user.counts)
            .map(|(kind, _)| kind.as_str())
            .collect();
        debug!(interaction_id, redactions, ?kinds, "redacted interaction");
    }

    Ok(AuditRow {
        interaction_id: interaction_id.to_string(),
        timestamp: interaction.timestamp,
        user_id: user.text,
        request_kind: interaction.request_kind.as_str().to_string(),
        input_digest: digest.text,
        status: output.status().as_str().to_string(),
        confidence: output.confidence(),
        tool_used: tool.map(|t| t.text),
        citations: output.citations().into_iter().cloned().collect(),
        document_ids: interaction.document_ids.iter().cloned().collect(),
        output: serde_json::to_string(&output)?,
    })
}

/// Copy of `output` with every free-text field redacted, plus the match count.
fn redact_output(output: &InteractionOutput) -> (InteractionOutput, usize) {
    let mut count = 0;
    let mut scrub = |text: &str| {
        let r = redact(text);
        count += r.total();
        r.text
    };
    let redacted = match output {
        InteractionOutput::Answer(answer) => {
            let mut answer = answer.clone();
            answer.text = scrub(&answer.text);
            InteractionOutput::Answer(answer)
        }
        InteractionOutput::Feedback(feedback) => {
            let mut feedback = feedback.clone();
            feedback.summary = scrub(&feedback.summary);
            for item in &mut feedback.items {
                item.notes = item.notes.as_deref().map(&mut scrub);
            }
            InteractionOutput::Feedback(feedback)
        }
    };
    (redacted, count)
}
