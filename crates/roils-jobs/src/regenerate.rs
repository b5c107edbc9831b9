//! Forced regeneration of a single record.

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use roils_core::{event_key, new_run_id, Error, Result};

use crate::evaluation::EvaluationStage;
use crate::report::RecordOutcome;
use crate::summary::SummaryStage;

/// Outcome of regenerating one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegenerateReport {
    pub key: String,
    pub summary: RecordOutcome,
    /// `None` when the summary the evaluation reads was not rewritten, so the
    /// evaluation was not attempted.
    pub evaluation: Option<RecordOutcome>,
}

/// Regenerate the summary, then the evaluation, for `event:<event_id>`,
/// ignoring existing values. Uses each stage's configured model.
pub async fn regenerate(
    summary: &SummaryStage,
    evaluation: &EvaluationStage,
    event_id: &str,
) -> Result<RegenerateReport> {
    let key = event_key(event_id);
    let span = info_span!("regenerate", run_id = %new_run_id(), record_key = %key);

    async {
        if summary.context().store.fields(&key).await?.is_empty() {
            return Err(Error::NotFound(key));
        }

        let summary_outcome = summary
            .summarize_record(&key, summary.model(), false)
            .await?;

        // The evaluation only depends on this summary when it reads the same model's field.
        let reads_fresh_summary = evaluation.summary_model() == summary.model();
        let evaluation_outcome = if !reads_fresh_summary || summary_outcome == RecordOutcome::Written {
            Some(
                evaluation
                    .evaluate_record(&key, evaluation.model(), false)
                    .await?,
            )
        } else {
            warn!(outcome = ?summary_outcome, "Summary not regenerated; skipping evaluation");
            None
        };

        info!(
            summary = ?summary_outcome,
            evaluation = ?evaluation_outcome,
            "Regeneration complete"
        );
        Ok(RegenerateReport {
            key,
            summary: summary_outcome,
            evaluation: evaluation_outcome,
        })
    }
    .instrument(span)
    .await
}
