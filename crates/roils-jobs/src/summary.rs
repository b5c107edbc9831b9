//! Summary Stage.

use std::time::Instant;

use tracing::{debug, info, info_span, warn, Instrument};

use roils_core::{
    defaults, new_run_id, non_blank, normalize_summary, FieldKey, GenerationRequest, ModelId,
    Result, SummaryConfig,
};

use crate::generation::{attempt, Attempt};
use crate::report::{RecordOutcome, StageReport};
use crate::scan::KeyScanner;
use crate::StageContext;

/// Generates one summary per record for a given model.
pub struct SummaryStage {
    ctx: StageContext,
    config: SummaryConfig,
}

impl SummaryStage {
    pub fn new(ctx: StageContext, config: SummaryConfig) -> Self {
        Self { ctx, config }
    }

    pub fn context(&self) -> &StageContext {
        &self.ctx
    }

    /// Configured summary model.
    pub fn model(&self) -> &ModelId {
        &self.config.model
    }

    /// Summarize every `event:*` record.
    ///
    /// With `resume`, records that already carry a summary for `model` are
    /// skipped, so a repeated run writes nothing new.
    pub async fn run_summaries(&self, model: &ModelId, resume: bool) -> Result<StageReport> {
        let span = info_span!(
            "summary_stage",
            run_id = %new_run_id(),
            model = %model,
            resume
        );
        self.run_inner(model, resume).instrument(span).await
    }

    async fn run_inner(&self, model: &ModelId, resume: bool) -> Result<StageReport> {
        let start = Instant::now();
        let mut report = StageReport::new(model);
        let mut scanner = KeyScanner::new(
            self.ctx.store.as_ref(),
            defaults::EVENT_PATTERN,
            self.ctx.scan_count,
        );

        info!(subsystem = "jobs", component = "summary_stage", "Starting summary run");
        while let Some(keys) = scanner.next_page().await? {
            for key in keys {
                let outcome = self.summarize_record(&key, model, resume).await?;
                report.record(outcome);
            }
        }
        report.finish();

        info!(
            subsystem = "jobs",
            component = "summary_stage",
            scanned = report.scanned,
            written = report.written,
            skipped = report.skipped_existing,
            soft_failures = report.soft_failures,
            timeouts = report.timeouts,
            duration_ms = start.elapsed().as_millis() as u64,
            "Summary run complete"
        );
        Ok(report)
    }

    /// Summarize one record. Store errors propagate; backend failures become
    /// the returned outcome.
    pub async fn summarize_record(
        &self,
        key: &str,
        model: &ModelId,
        resume: bool,
    ) -> Result<RecordOutcome> {
        let store = self.ctx.store.as_ref();
        let field = FieldKey::summary(model).field_name();

        if resume && store.exists(key, &field).await? {
            debug!(record_key = key, "Summary exists; skipping");
            return Ok(RecordOutcome::SkippedExisting);
        }

        let narrative = store.get(key, defaults::NARRATIVE_FIELD).await?;
        let Some(narrative) = non_blank(narrative.as_deref()) else {
            warn!(record_key = key, "Narrative missing or empty; skipping");
            return Ok(RecordOutcome::MissingPrecondition);
        };

        let request = GenerationRequest {
            key: key.to_string(),
            model: model.clone(),
            prompt: self
                .config
                .prompt
                .render(&[("narrative", narrative.trim())]),
            options: self.config.options.clone(),
        };
        debug!(record_key = key, prompt_len = request.prompt.len(), "Prompt built");

        match attempt(&self.ctx, &request, normalize_summary).await? {
            Attempt::Completed(summary) => {
                store.set(key, &field, &summary).await?;
                info!(
                    record_key = key,
                    model = %model,
                    response_len = summary.len(),
                    "Summary written"
                );
                Ok(RecordOutcome::Written)
            }
            Attempt::Failed(outcome) => Ok(outcome),
        }
    }
}
