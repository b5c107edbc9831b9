//! # roils-core
//!
//! Core types, traits, and configuration for the ROILS incident summarization
//! pipeline.
//!
//! This crate provides the foundational pieces the other crates depend on:
//! - The error taxonomy shared by every component
//! - The record data model and structured, model-namespaced field keys
//! - Generation request/outcome value objects
//! - The three seam traits: [`RecordStore`], [`GenerationBackend`],
//!   [`LifecycleController`]
//! - The pipeline configuration object loaded once at startup

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod text;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{
    BackendConfig, ConfigError, ConfigResult, EvaluationConfig, ExportConfig, LifecycleConfig,
    PipelineConfig, StoreConfig, SummaryConfig,
};
pub use error::{Error, Result};
pub use models::*;
pub use text::{clean_export_text, normalize_evaluation, normalize_summary, PromptTemplate};
pub use traits::*;

/// Generate a new time-ordered run identifier (UUIDv7) for log correlation.
pub fn new_run_id() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}
