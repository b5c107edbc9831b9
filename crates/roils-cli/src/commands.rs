//! Command dispatch and startup wiring.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info};

use roils_core::{
    Error, FieldKind, GenerationBackend, LifecycleController, ModelId, PipelineConfig,
    RecordStore,
};
use roils_inference::{lifecycle_from_config, ContainerAction, OllamaClient, SshLifecycleController};
use roils_jobs::{
    clear_model_data, export_to_path, regenerate, EvaluationStage, RecordPager, StageContext,
    SummaryStage,
};
use roils_store::RedisRecordStore;

use crate::Command;

pub async fn dispatch(command: Command, config: &PipelineConfig) -> anyhow::Result<()> {
    match command {
        Command::Summarize { model, no_resume } => {
            let ctx = connect_all(config).await?;
            let stage = SummaryStage::new(ctx, config.summary.clone());
            let model = model.unwrap_or_else(|| config.summary.model.clone());
            let report = stage.run_summaries(&model, !no_resume).await?;
            print_json(&report)
        }
        Command::Evaluate { model, no_resume } => {
            let ctx = connect_all(config).await?;
            let stage = evaluation_stage(ctx, config);
            let model = model.unwrap_or_else(|| config.evaluation.model.clone());
            let report = stage.run_evaluations(&model, !no_resume).await?;
            print_json(&report)
        }
        Command::Run { no_resume, export } => {
            let ctx = connect_all(config).await?;
            let summaries = SummaryStage::new(ctx.clone(), config.summary.clone());
            let summary_report = summaries
                .run_summaries(&config.summary.model, !no_resume)
                .await?;
            print_json(&summary_report)?;

            let evaluations = evaluation_stage(ctx.clone(), config);
            let eval_report = evaluations
                .run_evaluations(&config.evaluation.model, !no_resume)
                .await?;
            print_json(&eval_report)?;

            if export {
                run_export(ctx.store.as_ref(), config, None).await?;
            }
            Ok(())
        }
        Command::Regenerate { event_id } => {
            let ctx = connect_all(config).await?;
            let summaries = SummaryStage::new(ctx.clone(), config.summary.clone());
            let evaluations = evaluation_stage(ctx, config);
            let report = regenerate(&summaries, &evaluations, &event_id).await?;
            print_json(&report)
        }
        Command::Clear { model, field } => {
            let store = connect_store(config).await?;
            clear(store.as_ref(), config, &model, field).await
        }
        Command::Export { output } => {
            let store = connect_store(config).await?;
            run_export(store.as_ref(), config, output.as_deref()).await
        }
        Command::Browse { page_size } => {
            let store = connect_store(config).await?;
            browse(store.as_ref(), page_size).await
        }
        Command::Container { action } => container(config, action).await,
        Command::Check => check(config).await,
    }
}

/// Connect the store and verify the backend. Either failing is fatal.
async fn connect_all(config: &PipelineConfig) -> anyhow::Result<StageContext> {
    let store = connect_store(config).await?;
    let backend = connect_backend(config).await?;
    let lifecycle: Arc<dyn LifecycleController> = lifecycle_from_config(config.lifecycle.as_ref())?;
    if config.lifecycle.is_none() {
        info!("No lifecycle target configured; backend timeouts will not trigger restarts");
    }
    Ok(StageContext::new(store, backend, lifecycle).with_scan_count(config.store.scan_count))
}

async fn connect_store(config: &PipelineConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store = RedisRecordStore::connect(&config.store)
        .await
        .context("record store unreachable")?;
    Ok(Arc::new(store))
}

async fn connect_backend(config: &PipelineConfig) -> anyhow::Result<Arc<dyn GenerationBackend>> {
    let client = OllamaClient::from_config(&config.backend)?;
    if !client.health_check().await? {
        return Err(Error::Connection(format!(
            "generation backend at {} is not responding",
            config.backend.endpoint
        ))
        .into());
    }
    Ok(Arc::new(client))
}

fn evaluation_stage(ctx: StageContext, config: &PipelineConfig) -> EvaluationStage {
    EvaluationStage::new(
        ctx,
        config.evaluation.clone(),
        config.evaluation_summary_model().clone(),
    )
}

async fn clear(
    store: &dyn RecordStore,
    config: &PipelineConfig,
    model: &ModelId,
    field: Option<FieldKind>,
) -> anyhow::Result<()> {
    let deleted = clear_model_data(store, config.store.scan_count, model, field).await?;
    println!("Deleted {} field(s) for model {}", deleted, model);
    Ok(())
}

async fn run_export(
    store: &dyn RecordStore,
    config: &PipelineConfig,
    output: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let path = output.unwrap_or(&config.export.path);
    let rows = export_to_path(
        store,
        config.store.scan_count,
        config.evaluation_summary_model(),
        &config.evaluation.model,
        path,
    )
    .await
    .with_context(|| format!("failed to export to {}", path.display()))?;
    println!("Exported {} record(s) to {}", rows, path.display());
    Ok(())
}

async fn browse(store: &dyn RecordStore, page_size: usize) -> anyhow::Result<()> {
    let mut pager = RecordPager::new(store, page_size);
    let mut page_no = 0;
    while let Some(records) = pager.next_page().await? {
        page_no += 1;
        println!("=== Page {} ===", page_no);
        for record in records {
            println!("{}", record.key);
            if let Some(narrative) = record.narrative() {
                println!("  Narrative: {}", narrative);
            }
            for (field, value) in &record.generated {
                println!("  {}: {}", field, value);
            }
        }
    }
    if page_no == 0 {
        println!("No records found");
    }
    Ok(())
}

async fn container(config: &PipelineConfig, action: ContainerAction) -> anyhow::Result<()> {
    let Some(lifecycle) = config.lifecycle.as_ref() else {
        bail!("no [lifecycle] section configured");
    };
    let controller = SshLifecycleController::from_config(lifecycle)?;
    if let Err(e) = controller.run(action).await {
        error!(action = %action, error = %e, "Container action failed");
        return Err(e.into());
    }
    println!("docker {} {} on {}: ok", action, lifecycle.container, lifecycle.host);
    Ok(())
}

async fn check(config: &PipelineConfig) -> anyhow::Result<()> {
    let store = RedisRecordStore::connect(&config.store).await;
    let store_ok = match &store {
        Ok(store) => {
            println!("store:   ok ({})", store.label());
            true
        }
        Err(e) => {
            println!("store:   FAILED ({})", e);
            false
        }
    };

    let backend_ok = match OllamaClient::from_config(&config.backend) {
        Ok(client) => client.health_check().await.unwrap_or(false),
        Err(_) => false,
    };
    println!(
        "backend: {} ({})",
        if backend_ok { "ok" } else { "FAILED" },
        config.backend.endpoint
    );

    match config.lifecycle.as_ref() {
        Some(l) => println!("lifecycle: {}@{} container {}", l.username, l.host, l.container),
        None => println!("lifecycle: not configured"),
    }

    if !(store_ok && backend_ok) {
        bail!("connectivity check failed");
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
