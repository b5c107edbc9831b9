//! # roils-jobs
//!
//! Batch stages of the ROILS pipeline.
//!
//! This crate provides:
//! - [`SummaryStage`]: one summary per record and model, resumable
//! - [`EvaluationStage`]: faithfulness evaluations with a bounded fixed-point re-scan
//! - [`clear_model_data`]: removal of one model's generated fields
//! - [`regenerate`]: forced summary + evaluation for a single record
//! - [`export_csv`]: flat CSV extract of narratives, summaries and evaluations
//! - [`RecordPager`]: page-by-page record listing
//!
//! Records are processed strictly one at a time. Store errors abort a run;
//! backend failures are absorbed per record and counted in the run report.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use roils_jobs::{StageContext, SummaryStage};
//!
//! let ctx = StageContext::new(store, backend, lifecycle);
//! let stage = SummaryStage::new(ctx, config.summary.clone());
//! let report = stage.run_summaries(&config.summary.model, true).await?;
//! println!("{} summaries written", report.written);
//! ```

pub mod browse;
pub mod evaluation;
pub mod export;
mod generation;
pub mod maintenance;
pub mod regenerate;
pub mod report;
mod scan;
pub mod summary;

use std::sync::Arc;

// Re-export core types
pub use roils_core::*;

pub use browse::RecordPager;
pub use evaluation::EvaluationStage;
pub use export::{export_csv, export_to_path};
pub use maintenance::clear_model_data;
pub use regenerate::{regenerate, RegenerateReport};
pub use report::{EvaluationReport, RecordOutcome, StageReport};
pub use summary::SummaryStage;

/// Collaborators shared by every stage.
#[derive(Clone)]
pub struct StageContext {
    pub store: Arc<dyn RecordStore>,
    pub backend: Arc<dyn GenerationBackend>,
    pub lifecycle: Arc<dyn LifecycleController>,
    /// SCAN `COUNT` hint.
    pub scan_count: usize,
}

impl StageContext {
    pub fn new(
        store: Arc<dyn RecordStore>,
        backend: Arc<dyn GenerationBackend>,
        lifecycle: Arc<dyn LifecycleController>,
    ) -> Self {
        Self {
            store,
            backend,
            lifecycle,
            scan_count: defaults::SCAN_COUNT,
        }
    }

    pub fn with_scan_count(mut self, scan_count: usize) -> Self {
        self.scan_count = scan_count.max(1);
        self
    }
}
