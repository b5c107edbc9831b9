//! Clear Model Data, single-record regeneration, export, and browsing.

mod common;

use common::{model, Harness};
use roils_inference::mock::MockGenerationBackend;
use roils_jobs::{
    clear_model_data, export_csv, export_to_path, regenerate, Error, EvaluationConfig,
    EvaluationStage, FieldKind, GenerationOutcome, RecordOutcome, RecordPager,
};
use roils_store::MemoryRecordStore;

fn two_models() -> MemoryRecordStore {
    let store = MemoryRecordStore::new();
    for key in ["event:1", "event:2", "event:3"] {
        store.seed(key, "Narrative", "Wrong dose delivered.");
        store.seed(key, "mistral:LLM Summary", "A summary.");
        store.seed(key, "mistral:LLM Evaluation", "A evaluation.");
        store.seed(key, "mistral:7b:LLM Summary", "B summary.");
        store.seed(key, "llama3:LLM Summary", "C summary.");
    }
    store
}

#[tokio::test]
async fn test_clear_leaves_other_models_untouched() {
    let store = two_models();

    let deleted = clear_model_data(&store, 2, &model("mistral"), None).await.unwrap();

    assert_eq!(deleted, 6);
    for (key, record) in store.snapshot() {
        assert!(!record.contains_key("mistral:LLM Summary"), "{key}");
        assert!(!record.contains_key("mistral:LLM Evaluation"), "{key}");
        assert_eq!(record["mistral:7b:LLM Summary"], "B summary.");
        assert_eq!(record["llama3:LLM Summary"], "C summary.");
        assert_eq!(record["Narrative"], "Wrong dose delivered.");
    }
}

#[tokio::test]
async fn test_clear_visits_every_record_when_hashes_disappear() {
    let store = MemoryRecordStore::new();
    for key in ["event:1", "event:2", "event:3", "event:4"] {
        store.seed(key, "mistral:LLM Summary", "Only field.");
    }

    let deleted = clear_model_data(&store, 1, &model("mistral"), None).await.unwrap();

    assert_eq!(deleted, 4);
    assert!(store.is_empty(), "remaining: {:?}", store.snapshot().keys());
}

#[tokio::test]
async fn test_clear_single_kind() {
    let store = two_models();

    let deleted = clear_model_data(&store, 10, &model("mistral"), Some(FieldKind::Evaluation))
        .await
        .unwrap();

    assert_eq!(deleted, 3);
    let snapshot = store.snapshot();
    assert!(snapshot["event:1"].contains_key("mistral:LLM Summary"));
    assert!(!snapshot["event:1"].contains_key("mistral:LLM Evaluation"));
}

#[tokio::test]
async fn test_clear_unknown_model_is_noop() {
    let store = two_models();
    let before = store.snapshot();

    let deleted = clear_model_data(&store, 10, &model("phi3"), None).await.unwrap();

    assert_eq!(deleted, 0);
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn test_regenerate_overwrites_summary_and_evaluation() {
    let store = MemoryRecordStore::new();
    store.seed("event:7", "Narrative", "Wrong dose delivered.");
    store.seed("event:7", "mistral:LLM Summary", "Stale.");
    store.seed("event:7", "mistral:LLM Evaluation", "Stale.");
    let backend = MockGenerationBackend::new()
        .script_for(
            "event:7",
            [
                GenerationOutcome::Completed {
                    text: "Fresh summary.".into(),
                },
                GenerationOutcome::Completed {
                    text: "Fresh evaluation.".into(),
                },
            ],
        );
    let h = Harness::new(store, backend);

    let report = regenerate(&h.summary_stage(), &h.evaluation_stage(), "7")
        .await
        .unwrap();

    assert_eq!(report.key, "event:7");
    assert_eq!(report.summary, RecordOutcome::Written);
    assert_eq!(report.evaluation, Some(RecordOutcome::Written));
    assert_eq!(h.field("event:7", "mistral:LLM Summary").as_deref(), Some("Fresh summary."));
    assert_eq!(
        h.field("event:7", "mistral:LLM Evaluation").as_deref(),
        Some("Fresh evaluation.")
    );
    assert!(h.backend.calls()[1].prompt.contains("Fresh summary."));
}

#[tokio::test]
async fn test_regenerate_skips_evaluation_when_summary_fails() {
    let store = MemoryRecordStore::new().with_narratives([("event:7", "Wrong dose delivered.")]);
    let backend = MockGenerationBackend::new()
        .script_for("event:7", [GenerationOutcome::Timeout { elapsed_ms: 45_000 }]);
    let h = Harness::new(store, backend);

    let report = regenerate(&h.summary_stage(), &h.evaluation_stage(), "event:7")
        .await
        .unwrap();

    assert_eq!(report.summary, RecordOutcome::TimedOut { restarted: true });
    assert_eq!(report.evaluation, None);
    assert_eq!(h.backend.call_count(), 1);
    assert_eq!(h.lifecycle.restart_count(), 1);
}

#[tokio::test]
async fn test_regenerate_evaluates_configured_summary_model_after_summary_failure() {
    let store = MemoryRecordStore::new();
    store.seed("event:7", "Narrative", "Wrong dose delivered.");
    store.seed("event:7", "llama3:LLM Summary", "Llama summary.");
    let backend = MockGenerationBackend::new()
        .with_default_text("Faithful.")
        .script_for("event:7", [GenerationOutcome::Timeout { elapsed_ms: 45_000 }]);
    let h = Harness::new(store, backend);
    let evaluations = EvaluationStage::new(h.context(), EvaluationConfig::default(), model("llama3"));

    let report = regenerate(&h.summary_stage(), &evaluations, "event:7")
        .await
        .unwrap();

    assert_eq!(report.summary, RecordOutcome::TimedOut { restarted: true });
    assert_eq!(report.evaluation, Some(RecordOutcome::Written));
    assert!(h.backend.calls()[1].prompt.contains("Llama summary."));
    assert_eq!(h.field("event:7", "mistral:LLM Evaluation").as_deref(), Some("Faithful."));
}

#[tokio::test]
async fn test_regenerate_missing_record() {
    let h = Harness::new(MemoryRecordStore::new(), MockGenerationBackend::new());

    let result = regenerate(&h.summary_stage(), &h.evaluation_stage(), "404").await;

    assert!(matches!(result, Err(Error::NotFound(key)) if key == "event:404"));
}

#[tokio::test]
async fn test_export_csv_quotes_and_cleans_cells() {
    let store = MemoryRecordStore::new();
    store.seed("event:1", "Narrative", "  Wrong dose,\n\n\ndelivered.  ");
    store.seed("event:1", "mistral:LLM Summary", "Dose \"error\".");
    store.seed("event:2", "Narrative", "Patient fell.");

    let mut out = Vec::new();
    let rows = export_csv(&store, 1, &model("mistral"), &model("mistral"), &mut out)
        .await
        .unwrap();

    assert_eq!(rows, 2);
    let csv = String::from_utf8(out).unwrap();
    let expected = concat!(
        "Key,Narrative,mistral Summary,mistral Evaluation\r\n",
        "event:1,\"Wrong dose,\ndelivered.\",\"Dose \"\"error\"\".\",\r\n",
        "event:2,Patient fell.,,\r\n",
    );
    assert_eq!(csv, expected);
}

#[tokio::test]
async fn test_export_to_path_is_read_only() {
    let store = two_models();
    let before = store.snapshot();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extract_summary.csv");

    let rows = export_to_path(&store, 10, &model("mistral"), &model("llama3"), &path)
        .await
        .unwrap();

    assert_eq!(rows, 3);
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.write_count(), 0);
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("Key,Narrative,mistral Summary,llama3 Evaluation\r\n"));
}

#[tokio::test]
async fn test_pager_fills_pages_across_empty_scan_pages() {
    let store = MemoryRecordStore::new();
    for i in 0..5 {
        store.seed(&format!("event:{i}"), "Narrative", "n");
        store.seed(&format!("aux:{i}"), "x", "y");
    }
    let mut pager = RecordPager::new(&store, 2);

    let mut sizes = Vec::new();
    let mut keys = Vec::new();
    while let Some(page) = pager.next_page().await.unwrap() {
        sizes.push(page.len());
        keys.extend(page.into_iter().map(|r| r.key));
    }

    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(keys, vec!["event:0", "event:1", "event:2", "event:3", "event:4"]);
}
