//! Evaluation Stage.
//!
//! The first pass visits every record. After each pass the key space is
//! re-scanned for records whose evaluation is still absent while narrative
//! and summary are present; later passes visit only those. The run stops
//! when nothing is pending, when a later pass fills nothing (fixed point),
//! or at `max_passes`.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, info_span, warn, Instrument};

use roils_core::{
    defaults, new_run_id, non_blank, normalize_evaluation, EvaluationConfig, FieldKey,
    GenerationRequest, ModelId, Result,
};

use crate::generation::{attempt, Attempt};
use crate::report::{EvaluationReport, RecordOutcome};
use crate::scan::KeyScanner;
use crate::StageContext;

/// Evaluates stored summaries against their narratives.
pub struct EvaluationStage {
    ctx: StageContext,
    config: EvaluationConfig,
    /// Model whose summaries are evaluated.
    summary_model: ModelId,
}

impl EvaluationStage {
    pub fn new(ctx: StageContext, config: EvaluationConfig, summary_model: ModelId) -> Self {
        Self {
            ctx,
            config,
            summary_model,
        }
    }

    pub fn context(&self) -> &StageContext {
        &self.ctx
    }

    /// Configured evaluation model.
    pub fn model(&self) -> &ModelId {
        &self.config.model
    }

    pub fn summary_model(&self) -> &ModelId {
        &self.summary_model
    }

    pub async fn run_evaluations(&self, model: &ModelId, resume: bool) -> Result<EvaluationReport> {
        let span = info_span!(
            "evaluation_stage",
            run_id = %new_run_id(),
            model = %model,
            summary_model = %self.summary_model,
            resume
        );
        self.run_inner(model, resume).instrument(span).await
    }

    async fn run_inner(&self, model: &ModelId, resume: bool) -> Result<EvaluationReport> {
        let start = Instant::now();
        let max_passes = self.config.max_passes.max(1);
        let mut report = EvaluationReport::new(model);

        info!(subsystem = "jobs", component = "evaluation_stage", max_passes, "Starting evaluation run");

        // Pass 1: every record.
        let mut pass = 1;
        let mut filled = 0;
        let mut scanner = KeyScanner::new(
            self.ctx.store.as_ref(),
            defaults::EVENT_PATTERN,
            self.ctx.scan_count,
        );
        while let Some(keys) = scanner.next_page().await? {
            for key in keys {
                let outcome = self.evaluate_record(&key, model, resume).await?;
                if outcome == RecordOutcome::Written {
                    filled += 1;
                }
                report.totals.record(outcome);
            }
        }

        loop {
            report.passes = pass;
            let pending = self.pending_keys(model).await?;
            info!(pass, filled, pending = pending.len(), "Evaluation pass complete");

            if pending.is_empty() {
                break;
            }
            if pass > 1 && filled == 0 {
                warn!(
                    pass,
                    pending = pending.len(),
                    "No progress in last pass; stopping with evaluations pending"
                );
                report.pending = pending;
                break;
            }
            if pass >= max_passes {
                warn!(
                    pass,
                    pending = pending.len(),
                    "Pass limit reached; stopping with evaluations pending"
                );
                report.pending = pending;
                report.pass_limit_reached = true;
                break;
            }

            pass += 1;
            filled = 0;
            for key in &pending {
                let outcome = self.evaluate_record(key, model, true).await?;
                if outcome == RecordOutcome::Written {
                    filled += 1;
                }
                report.totals.record(outcome);
            }
        }
        report.totals.finish();

        info!(
            subsystem = "jobs",
            component = "evaluation_stage",
            passes = report.passes,
            scanned = report.totals.scanned,
            written = report.totals.written,
            soft_failures = report.totals.soft_failures,
            timeouts = report.totals.timeouts,
            pending = report.pending.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Evaluation run complete"
        );
        Ok(report)
    }

    /// Evaluate one record. Store errors propagate; backend failures become
    /// the returned outcome.
    pub async fn evaluate_record(
        &self,
        key: &str,
        model: &ModelId,
        resume: bool,
    ) -> Result<RecordOutcome> {
        let store = self.ctx.store.as_ref();
        let field = FieldKey::evaluation(model).field_name();

        if resume && store.exists(key, &field).await? {
            debug!(record_key = key, "Evaluation exists; skipping");
            return Ok(RecordOutcome::SkippedExisting);
        }

        let narrative = store.get(key, defaults::NARRATIVE_FIELD).await?;
        let summary = store
            .get(key, &FieldKey::summary(&self.summary_model).field_name())
            .await?;
        let (Some(narrative), Some(summary)) = (
            non_blank(narrative.as_deref()),
            non_blank(summary.as_deref()),
        ) else {
            warn!(record_key = key, "Missing narrative or summary; skipping");
            return Ok(RecordOutcome::MissingPrecondition);
        };

        let request = GenerationRequest {
            key: key.to_string(),
            model: model.clone(),
            prompt: self.config.prompt.render(&[
                ("narrative", narrative.trim()),
                ("summary", summary.trim()),
            ]),
            options: self.config.options.clone(),
        };
        debug!(record_key = key, prompt_len = request.prompt.len(), "Prompt built");

        match attempt(&self.ctx, &request, normalize_evaluation).await? {
            Attempt::Completed(evaluation) => {
                store.set(key, &field, &evaluation).await?;
                info!(
                    record_key = key,
                    model = %model,
                    response_len = evaluation.len(),
                    "Evaluation written"
                );
                Ok(RecordOutcome::Written)
            }
            Attempt::Failed(outcome) => Ok(outcome),
        }
    }

    /// Whether a record still needs an evaluation it could get.
    async fn is_pending(&self, key: &str, model: &ModelId) -> Result<bool> {
        let store = self.ctx.store.as_ref();
        if store
            .exists(key, &FieldKey::evaluation(model).field_name())
            .await?
        {
            return Ok(false);
        }
        let narrative = store.get(key, defaults::NARRATIVE_FIELD).await?;
        if non_blank(narrative.as_deref()).is_none() {
            return Ok(false);
        }
        let summary = store
            .get(key, &FieldKey::summary(&self.summary_model).field_name())
            .await?;
        Ok(non_blank(summary.as_deref()).is_some())
    }

    /// Keys a further pass could still fill. Only these are held in memory;
    /// the rest of the key space streams through page by page.
    async fn pending_keys(&self, model: &ModelId) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        let mut queued = HashSet::new();
        let mut scanner = KeyScanner::new(
            self.ctx.store.as_ref(),
            defaults::EVENT_PATTERN,
            self.ctx.scan_count,
        );
        while let Some(keys) = scanner.next_page().await? {
            for key in keys {
                if !queued.contains(&key) && self.is_pending(&key, model).await? {
                    queued.insert(key.clone());
                    pending.push(key);
                }
            }
        }
        Ok(pending)
    }
}
