//! Run reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use roils_core::ModelId;

/// What happened to one record in one visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RecordOutcome {
    /// A generated field was written.
    Written,
    /// Resume mode and the field already existed.
    SkippedExisting,
    /// Narrative (or source summary) absent or blank.
    MissingPrecondition,
    /// Backend answered but produced nothing usable, or was unreachable.
    SoftFailure,
    /// The request deadline elapsed; `restarted` is false when the restart failed.
    TimedOut { restarted: bool },
}

/// Counters for one stage run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub model: String,
    /// Record visits, across all passes.
    pub scanned: usize,
    pub written: usize,
    pub skipped_existing: usize,
    pub missing_precondition: usize,
    pub soft_failures: usize,
    pub timeouts: usize,
    pub restart_failures: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl StageReport {
    pub fn new(model: &ModelId) -> Self {
        Self {
            model: model.to_string(),
            scanned: 0,
            written: 0,
            skipped_existing: 0,
            missing_precondition: 0,
            soft_failures: 0,
            timeouts: 0,
            restart_failures: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, outcome: RecordOutcome) {
        self.scanned += 1;
        match outcome {
            RecordOutcome::Written => self.written += 1,
            RecordOutcome::SkippedExisting => self.skipped_existing += 1,
            RecordOutcome::MissingPrecondition => self.missing_precondition += 1,
            RecordOutcome::SoftFailure => self.soft_failures += 1,
            RecordOutcome::TimedOut { restarted } => {
                self.timeouts += 1;
                if !restarted {
                    self.restart_failures += 1;
                }
            }
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// Evaluation Stage report: totals over every pass plus termination details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    #[serde(flatten)]
    pub totals: StageReport,
    /// Passes run, first pass included.
    pub passes: u32,
    /// Keys still missing an evaluation although their inputs are present.
    pub pending: Vec<String>,
    /// The run stopped on the pass bound rather than a fixed point.
    pub pass_limit_reached: bool,
}

impl EvaluationReport {
    pub fn new(model: &ModelId) -> Self {
        Self {
            totals: StageReport::new(model),
            passes: 0,
            pending: Vec::new(),
            pass_limit_reached: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}
