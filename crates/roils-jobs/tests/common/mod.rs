//! Shared fixtures for stage tests.

#![allow(dead_code)]

use std::sync::Arc;

use roils_inference::mock::{MockGenerationBackend, MockLifecycleController};
use roils_jobs::{
    EvaluationConfig, EvaluationStage, ModelId, StageContext, SummaryConfig, SummaryStage,
};
use roils_store::MemoryRecordStore;

pub fn model(name: &str) -> ModelId {
    ModelId::new(name).unwrap()
}

pub struct Harness {
    pub store: MemoryRecordStore,
    pub backend: MockGenerationBackend,
    pub lifecycle: MockLifecycleController,
}

impl Harness {
    pub fn new(store: MemoryRecordStore, backend: MockGenerationBackend) -> Self {
        Self {
            store,
            backend,
            lifecycle: MockLifecycleController::new(),
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: MockLifecycleController) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Small scan pages so multi-page iteration is exercised.
    pub fn context(&self) -> StageContext {
        StageContext::new(
            Arc::new(self.store.clone()),
            Arc::new(self.backend.clone()),
            Arc::new(self.lifecycle.clone()),
        )
        .with_scan_count(2)
    }

    pub fn summary_stage(&self) -> SummaryStage {
        SummaryStage::new(self.context(), SummaryConfig::default())
    }

    pub fn evaluation_stage(&self) -> EvaluationStage {
        EvaluationStage::new(self.context(), EvaluationConfig::default(), model("mistral"))
    }

    pub fn field(&self, key: &str, field: &str) -> Option<String> {
        self.store.snapshot().get(key).and_then(|r| r.get(field)).cloned()
    }
}
