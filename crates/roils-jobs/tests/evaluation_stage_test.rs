//! Evaluation Stage: preconditions and the fixed-point re-scan.

mod common;

use common::{model, Harness};
use roils_inference::mock::MockGenerationBackend;
use roils_jobs::{EvaluationConfig, EvaluationStage, GenerationOutcome, SummaryStage};
use roils_store::MemoryRecordStore;

const SUMMARY: &str = "mistral:LLM Summary";
const EVALUATION: &str = "mistral:LLM Evaluation";

fn summarized(records: &[(&str, &str, &str)]) -> MemoryRecordStore {
    let store = MemoryRecordStore::new();
    for (key, narrative, summary) in records {
        store.seed(key, "Narrative", narrative);
        store.seed(key, SUMMARY, summary);
    }
    store
}

#[tokio::test]
async fn test_always_succeeding_backend_terminates_within_two_passes() {
    let store = summarized(&[
        ("event:1", "Wrong dose delivered.", "Dose error."),
        ("event:2", "Patient fell.", "Fall."),
        ("event:3", "Label mismatch.", "Wrong label."),
    ]);
    let h = Harness::new(store, MockGenerationBackend::new().with_default_text("Faithful."));

    let report = h
        .evaluation_stage()
        .run_evaluations(&model("mistral"), true)
        .await
        .unwrap();

    assert!(report.passes <= 2);
    assert!(report.is_complete());
    assert_eq!(report.totals.written, 3);
    assert_eq!(h.backend.call_count(), 3);
    for key in ["event:1", "event:2", "event:3"] {
        assert_eq!(h.field(key, EVALUATION).as_deref(), Some("Faithful."));
    }
}

#[tokio::test]
async fn test_server_error_triggers_second_pass() {
    let store = summarized(&[("event:3", "Label mismatch.", "Wrong label.")]);
    let backend = MockGenerationBackend::new()
        .with_default_text("Faithful.")
        .script_for(
            "event:3",
            [GenerationOutcome::RequestFailed {
                status: 500,
                body: "internal error".into(),
            }],
        );
    let h = Harness::new(store, backend);

    let report = h
        .evaluation_stage()
        .run_evaluations(&model("mistral"), true)
        .await
        .unwrap();

    assert_eq!(report.passes, 2);
    assert_eq!(h.backend.calls_for("event:3"), 2);
    assert_eq!(report.totals.soft_failures, 1);
    assert_eq!(h.field("event:3", EVALUATION).as_deref(), Some("Faithful."));
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_persistent_failure_stops_at_fixed_point() {
    let store = summarized(&[("event:3", "Label mismatch.", "Wrong label.")]);
    let backend = MockGenerationBackend::new().with_default(GenerationOutcome::RequestFailed {
        status: 500,
        body: "internal error".into(),
    });
    let h = Harness::new(store, backend);

    let report = h
        .evaluation_stage()
        .run_evaluations(&model("mistral"), true)
        .await
        .unwrap();

    // Pass 1 fails, pass 2 fills nothing: stop.
    assert_eq!(report.passes, 2);
    assert_eq!(report.pending, vec!["event:3".to_string()]);
    assert!(!report.pass_limit_reached);
    assert_eq!(h.field("event:3", EVALUATION), None);
}

#[tokio::test]
async fn test_pass_limit_bounds_the_rescan() {
    let store = summarized(&[
        ("event:1", "a", "A."),
        ("event:2", "b", "B."),
        ("event:3", "c", "C."),
    ]);
    // Each pass fills exactly one record, so progress never stalls on its own.
    let timeout = || GenerationOutcome::Timeout { elapsed_ms: 45_000 };
    let backend = MockGenerationBackend::new()
        .with_default_text("Faithful.")
        .script_for("event:2", [timeout()])
        .script_for("event:3", [timeout(), timeout()]);
    let h = Harness::new(store, backend);
    let config = EvaluationConfig {
        max_passes: 2,
        ..EvaluationConfig::default()
    };
    let stage = EvaluationStage::new(h.context(), config, model("mistral"));

    let report = stage.run_evaluations(&model("mistral"), true).await.unwrap();

    assert_eq!(report.passes, 2);
    assert!(report.pass_limit_reached);
    assert_eq!(report.pending, vec!["event:3".to_string()]);
    assert_eq!(h.lifecycle.restart_count(), 3);
    assert_eq!(report.totals.timeouts, 3);
}

#[tokio::test]
async fn test_requires_narrative_and_summary() {
    let store = MemoryRecordStore::new();
    store.seed("event:1", "Narrative", "Wrong dose delivered.");
    store.seed("event:2", SUMMARY, "Orphan summary.");
    store.seed("event:3", "Narrative", "Patient fell.");
    store.seed("event:3", SUMMARY, "   ");
    store.seed("event:4", "Narrative", "Label mismatch.");
    store.seed("event:4", SUMMARY, "Wrong label.");
    let h = Harness::new(store, MockGenerationBackend::new());

    let report = h
        .evaluation_stage()
        .run_evaluations(&model("mistral"), true)
        .await
        .unwrap();

    assert_eq!(report.totals.missing_precondition, 3);
    assert_eq!(report.totals.written, 1);
    assert!(report.is_complete());
    assert_eq!(report.passes, 1);
    for key in ["event:1", "event:2", "event:3"] {
        assert_eq!(h.field(key, EVALUATION), None, "{key} must not be evaluated");
    }
    assert!(h.field("event:4", EVALUATION).is_some());
}

#[tokio::test]
async fn test_prompt_contains_narrative_and_summary() {
    let store = summarized(&[("event:1", "Wrong dose delivered.", "Dose error.")]);
    let h = Harness::new(store, MockGenerationBackend::new().with_default_text("\n\n Faithful."));

    h.evaluation_stage()
        .run_evaluations(&model("mistral"), true)
        .await
        .unwrap();

    let prompt = &h.backend.calls()[0].prompt;
    assert!(prompt.contains("Wrong dose delivered."));
    assert!(prompt.contains("Dose error."));
    assert_eq!(h.field("event:1", EVALUATION).as_deref(), Some("Faithful."));
}

#[tokio::test]
async fn test_resume_skips_existing_evaluations() {
    let store = summarized(&[("event:1", "Wrong dose delivered.", "Dose error.")]);
    store.seed("event:1", EVALUATION, "Already evaluated.");
    let h = Harness::new(store, MockGenerationBackend::new());

    let report = h
        .evaluation_stage()
        .run_evaluations(&model("mistral"), true)
        .await
        .unwrap();

    assert_eq!(report.totals.skipped_existing, 1);
    assert_eq!(h.backend.call_count(), 0);
    assert_eq!(
        h.field("event:1", EVALUATION).as_deref(),
        Some("Already evaluated.")
    );
}

#[tokio::test]
async fn test_reads_configured_summary_model() {
    let store = MemoryRecordStore::new();
    store.seed("event:1", "Narrative", "Wrong dose delivered.");
    store.seed("event:1", "llama3:LLM Summary", "Llama summary.");
    let h = Harness::new(store, MockGenerationBackend::new().with_default_text("Faithful."));
    let stage = EvaluationStage::new(h.context(), EvaluationConfig::default(), model("llama3"));

    let report = stage.run_evaluations(&model("mistral"), true).await.unwrap();

    assert_eq!(report.totals.written, 1);
    assert!(h.backend.calls()[0].prompt.contains("Llama summary."));
}

#[tokio::test]
async fn test_summaries_then_evaluations() {
    let store = MemoryRecordStore::new().with_narratives([
        ("event:1", "Wrong dose delivered."),
        ("event:2", ""),
    ]);
    let h = Harness::new(store, MockGenerationBackend::new().with_default_text("Text."));
    let summaries: SummaryStage = h.summary_stage();

    summaries.run_summaries(&model("mistral"), true).await.unwrap();
    let report = h
        .evaluation_stage()
        .run_evaluations(&model("mistral"), true)
        .await
        .unwrap();

    assert_eq!(report.totals.written, 1);
    assert!(h.field("event:1", EVALUATION).is_some());
    assert_eq!(h.field("event:2", EVALUATION), None);
}
